//! End-to-end scenarios driving the coordinator tree, configurators, and the
//! full pipeline the way a rendering host would.

use parking_lot::Mutex;
use scena_core::display::{AttachmentContext, DisplayMode, DisplayOptions};
use scena_core::envelope::{ActionRequest, EndViewModel, LifecycleRequest, OverlayViewModel};
use scena_engine::analytics;
use scena_engine::configurator::Configurator;
use scena_engine::coordinator::{Completion, CoordinatorTree, FlowOutcome, RunState};
use scena_engine::pipeline::{BusinessCore, InertBehavior, PresentationStyle, StageBehavior};
use scena_engine::router::StageActions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn tree() -> CoordinatorTree {
    CoordinatorTree::new(analytics::noop())
}

fn configurator(tree: &CoordinatorTree, behavior: Arc<dyn StageBehavior>) -> Arc<Configurator> {
    Arc::new(Configurator::new(
        behavior,
        PresentationStyle::default(),
        tree.analytics(),
        tree.settle_queue(),
    ))
}

/// Ends itself with the "save" intent when asked to save, flagging the data
/// as changed and carrying the action payload out as results.
struct SaveBehavior;

impl StageBehavior for SaveBehavior {
    fn on_action(&self, action: &ActionRequest, business: &BusinessCore) {
        if action.intent == "save" {
            business.busy(true);
            business.busy(false);
            business.end_stage("save", true, action.payload.clone());
        }
    }
}

#[test]
fn test_flow_completion_fires_exactly_once() {
    let mut tree = tree();
    let id = tree.create(None).unwrap();
    let completions = Arc::new(AtomicUsize::new(0));

    let completions_inner = completions.clone();
    tree.start(
        id,
        Completion::Flag(Box::new(move |_| {
            completions_inner.fetch_add(1, Ordering::SeqCst);
        })),
    )
    .unwrap();

    tree.stop(id, None).unwrap();
    tree.stop(id, None).unwrap();
    tree.cancel(id).unwrap();
    tree.stop_and_cancel(id).unwrap();

    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(tree.state(id).unwrap(), RunState::Terminated);
}

#[test]
fn test_user_dismissal_and_programmatic_end_collapse() {
    let mut tree = tree();
    let id = tree.create(None).unwrap();
    tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();

    let cfg = configurator(&tree, Arc::new(InertBehavior));
    let terminals = Arc::new(Mutex::new(Vec::new()));
    let terminals_inner = terminals.clone();
    let handle = tree
        .start_stage(
            id,
            &cfg,
            DisplayMode::ModalPageSheet,
            DisplayOptions::default(),
            &AttachmentContext::default(),
            None,
            StageActions::new().on("close", move |_, outcome| {
                terminals_inner.lock().push(outcome.clone());
            }),
        )
        .unwrap();

    // The user swipes the sheet away while code also decides to close.
    handle.requests.lifecycle.publish(&LifecycleRequest::DidClose);
    cfg.end_stage("close", false, None);

    tree.transition_completed(cfg.stage());

    let terminals = terminals.lock();
    assert_eq!(terminals.len(), 1);
    assert_eq!(terminals[0].intent, "close");
    assert!(terminals[0].end);
}

#[test]
fn test_stage_reports_running_immediately_after_launch() {
    let mut tree = tree();
    let id = tree.create(None).unwrap();
    tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();

    let cfg = configurator(&tree, Arc::new(InertBehavior));
    assert!(!cfg.is_running());

    let handle = tree
        .start_stage(
            id,
            &cfg,
            DisplayMode::ModalFormSheet,
            DisplayOptions::default(),
            &AttachmentContext::default(),
            None,
            StageActions::new(),
        )
        .unwrap();

    // Running is observable before the presentation transition settles.
    assert!(cfg.is_running());
    assert!(!handle.plan.is_noop());
}

#[test]
fn test_blank_intent_routes_to_blank_handler_only() {
    let mut tree = tree();
    let id = tree.create(None).unwrap();
    tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();

    let cfg = configurator(&tree, Arc::new(InertBehavior));
    let named = Arc::new(AtomicUsize::new(0));
    let blank = Arc::new(AtomicUsize::new(0));
    let fallback = Arc::new(AtomicUsize::new(0));
    let (named_inner, blank_inner, fallback_inner) =
        (named.clone(), blank.clone(), fallback.clone());

    tree.start_stage(
        id,
        &cfg,
        DisplayMode::None,
        DisplayOptions::default(),
        &AttachmentContext::default(),
        None,
        StageActions::new()
            .on("refresh", move |_, _| {
                named_inner.fetch_add(1, Ordering::SeqCst);
            })
            .on_blank(move |_, _| {
                blank_inner.fetch_add(1, Ordering::SeqCst);
            })
            .or_no_match(move |_, _| {
                fallback_inner.fetch_add(1, Ordering::SeqCst);
            }),
    )
    .unwrap();

    cfg.send("", None).unwrap();
    cfg.send("refresh", None).unwrap();
    cfg.send("unknown", None).unwrap();
    tree.dispatch_pending();

    assert_eq!(blank.load(Ordering::SeqCst), 1);
    assert_eq!(named.load(Ordering::SeqCst), 1);
    assert_eq!(fallback.load(Ordering::SeqCst), 1);
}

#[test]
fn test_restart_after_termination_resets_hierarchy() {
    let mut tree = tree();
    let root = tree.create(None).unwrap();
    let child = tree.create(Some(root)).unwrap();
    let grandchild = tree.create(Some(child)).unwrap();

    for id in [root, child, grandchild] {
        tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();
    }
    tree.stop(root, None).unwrap();

    tree.start(root, Completion::Flag(Box::new(|_| {}))).unwrap();

    assert_eq!(tree.state(root).unwrap(), RunState::Started);
    assert!(tree.children(root).unwrap().is_empty());
    for id in [child, grandchild] {
        assert_eq!(tree.state(id).unwrap(), RunState::NotStarted);
        assert!(tree.children(id).unwrap().is_empty());
    }
}

#[test]
fn test_save_flow_end_to_end() {
    let mut tree = tree();
    let id = tree.create(None).unwrap();

    let flow_result = Arc::new(Mutex::new(None));
    let flow_result_inner = flow_result.clone();
    tree.start(
        id,
        Completion::Results(Box::new(move |outcome| {
            *flow_result_inner.lock() = Some(outcome);
        })),
    )
    .unwrap();

    let cfg = configurator(&tree, Arc::new(SaveBehavior));
    let handle = tree
        .start_stage(
            id,
            &cfg,
            DisplayMode::ModalFormSheet,
            DisplayOptions::default(),
            &AttachmentContext::default(),
            None,
            StageActions::new().on("save", move |tree, outcome| {
                assert!(outcome.end);
                assert!(outcome.data_changed);
                tree.stop(id, outcome.results.clone()).unwrap();
            }),
        )
        .unwrap();

    // The host sees the spinner pulse and the end signal as view models.
    let spinner_events = Arc::new(Mutex::new(Vec::new()));
    let spinner_inner = spinner_events.clone();
    let _spinner_sub = handle
        .view_models
        .spinner
        .subscribe(move |vm: &OverlayViewModel| {
            spinner_inner.lock().push(vm.visible);
        });
    let ended_with = Arc::new(Mutex::new(None));
    let ended_inner = ended_with.clone();
    let _end_sub = handle
        .view_models
        .stage_end
        .subscribe(move |vm: &EndViewModel| {
            *ended_inner.lock() = Some(vm.intent.clone());
        });

    let payload = serde_json::json!({"draft": 7});
    handle
        .requests
        .action
        .publish(&ActionRequest::with_payload("save", payload.clone()));

    assert_eq!(*spinner_events.lock(), vec![true, false]);
    assert_eq!(ended_with.lock().as_deref(), Some("save"));

    // Terminal routing waits for the modal dismissal to settle.
    assert!(flow_result.lock().is_none());
    tree.transition_completed(cfg.stage());

    assert_eq!(
        *flow_result.lock(),
        Some(FlowOutcome {
            success: true,
            results: Some(payload),
        })
    );
    assert_eq!(tree.state(id).unwrap(), RunState::Terminated);
    assert_eq!(tree.active_route_count(), 0);
}
