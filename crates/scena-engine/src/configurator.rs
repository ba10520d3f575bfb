//! # Configurator
//!
//! One configurator owns one stage: its pipeline graph, its attachment mode,
//! and the guarded path by which the stage reports outcomes back to the
//! coordinator that launched it.
//!
//! The lifecycle is deliberately asymmetric. Wiring (`configure_stage`)
//! happens lazily and exactly once; running (`run_stage`) may happen many
//! times over the same wiring; ending (`end_stage`) is a one-shot per run,
//! enforced with a compare-and-swap so concurrent end paths (user dismissal
//! racing a programmatic close) collapse to a single terminal outcome. Each
//! run bumps an epoch counter, and terminal delivery deferred through the
//! settle queue re-checks that epoch before firing, so a stage restarted
//! while a transition was still settling never reports a stale outcome.

use crate::analytics::Analytics;
use crate::errors::EngineError;
use crate::pipeline::{
    PresentationStyle, RequestChannels, StageBehavior, StagePipeline, ViewModelChannels,
};
use crate::settle::SettleQueue;
use parking_lot::Mutex;
use scena_core::channel::SubscriptionSet;
use scena_core::display::{
    resolve_dismissal, resolve_transition, AttachmentContext, DismissalPlan, DisplayMode,
    DisplayOptions, TransitionPlan,
};
use scena_core::envelope::{EndResponse, LifecycleRequest};
use scena_core::identifiers::{CoordinatorId, StageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// What a stage reports back to the coordinator layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// The coordinator the stage was launched under.
    pub coordinator: CoordinatorId,
    /// The intent named by the stage; empty means "no specific intent".
    pub intent: String,
    /// Whether this outcome is terminal for the stage.
    pub end: bool,
    /// Whether the stage changed domain data.
    pub data_changed: bool,
    /// Opaque result payload.
    pub results: Option<Value>,
}

/// Where outcomes go. The coordinator layer hands the configurator a sink
/// that enqueues onto its dispatch queue; outcomes are never routed from
/// inside configurator calls.
pub type OutcomeSink = Arc<dyn Fn(StageOutcome) + Send + Sync>;

/// The surface handed to the rendering collaborator when a stage runs:
/// the resolved attach recipe plus the two channel sets the display layer
/// talks through.
pub struct DisplayHandle {
    /// The stage being attached.
    pub stage: StageId,
    /// Attach recipe resolved against the current hierarchy.
    pub plan: TransitionPlan,
    /// Channels for the display layer to emit into.
    pub requests: RequestChannels,
    /// Channels for the display layer to consume.
    pub view_models: ViewModelChannels,
}

struct RunContext {
    coordinator: CoordinatorId,
    mode: DisplayMode,
    sink: OutcomeSink,
}

/// Owns one stage's pipeline and lifecycle guards.
pub struct Configurator {
    stage: StageId,
    behavior: Arc<dyn StageBehavior>,
    style: PresentationStyle,
    analytics: Arc<dyn Analytics>,
    settle: Arc<SettleQueue>,
    pipeline: Mutex<Option<StagePipeline>>,
    subscriptions: Mutex<SubscriptionSet>,
    started: AtomicBool,
    ending: AtomicBool,
    epoch: AtomicU64,
    run: Mutex<Option<RunContext>>,
}

impl Configurator {
    /// Create an unwired configurator for a fresh stage.
    #[must_use]
    pub fn new(
        behavior: Arc<dyn StageBehavior>,
        style: PresentationStyle,
        analytics: Arc<dyn Analytics>,
        settle: Arc<SettleQueue>,
    ) -> Self {
        Self {
            stage: StageId::new(),
            behavior,
            style,
            analytics,
            settle,
            pipeline: Mutex::new(None),
            subscriptions: Mutex::new(SubscriptionSet::new()),
            started: AtomicBool::new(false),
            ending: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            run: Mutex::new(None),
        }
    }

    /// The stage this configurator owns.
    #[must_use]
    pub fn stage(&self) -> StageId {
        self.stage
    }

    /// Whether the stage is currently running: started and not ending.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.ending.load(Ordering::SeqCst)
    }

    /// Wire the pipeline graph. Lazy and idempotent: the first call
    /// assembles the triad and subscribes the configurator to the stage's
    /// end signals; later calls are no-ops.
    pub fn configure_stage(self: &Arc<Self>) {
        let _ = self.ensure_pipeline();
    }

    fn ensure_pipeline(
        self: &Arc<Self>,
    ) -> (RequestChannels, ViewModelChannels, Arc<crate::pipeline::BusinessCore>) {
        let mut pipeline = self.pipeline.lock();
        if let Some(assembled) = pipeline.as_ref() {
            return (
                assembled.requests.clone(),
                assembled.view_models().clone(),
                assembled.business.clone(),
            );
        }

        let assembled = StagePipeline::assemble(
            self.behavior.clone(),
            self.style.clone(),
            self.analytics.clone(),
        );
        let subscriptions = vec![
            // The domain behavior ends the stage through its business layer;
            // the configurator turns that into the terminal outcome.
            assembled.business.responses().stage_end.subscribe({
                let this = Arc::downgrade(self);
                move |end: &EndResponse| {
                    if let Some(configurator) = Weak::upgrade(&this) {
                        configurator.end_stage(&end.intent, end.data_changed, end.results.clone());
                    }
                }
            }),
            // A user-driven close (swipe-down, drawer tap-out) arrives as a
            // lifecycle notification and must collapse into the same guard.
            assembled.requests.lifecycle.subscribe({
                let this = Arc::downgrade(self);
                move |event: &LifecycleRequest| {
                    if *event == LifecycleRequest::DidClose {
                        if let Some(configurator) = Weak::upgrade(&this) {
                            configurator.end_stage("close", false, None);
                        }
                    }
                }
            }),
        ];
        self.subscriptions.lock().replace(subscriptions);

        let triad = (
            assembled.requests.clone(),
            assembled.view_models().clone(),
            assembled.business.clone(),
        );
        *pipeline = Some(assembled);
        triad
    }

    /// Launch the stage: wires if needed, re-arms the end guard, resolves
    /// the attach recipe, starts the business layer, and returns the
    /// display surface.
    pub fn run_stage(
        self: &Arc<Self>,
        coordinator: CoordinatorId,
        mode: DisplayMode,
        options: DisplayOptions,
        ctx: &AttachmentContext,
        init: Option<Value>,
        sink: OutcomeSink,
    ) -> DisplayHandle {
        let (requests, view_models, business) = self.ensure_pipeline();
        // A previous end detached the business layer; re-binding replaces
        // rather than duplicates, so this is safe on every run.
        business.bind(&requests);
        self.restart_ending();
        *self.run.lock() = Some(RunContext {
            coordinator,
            mode,
            sink,
        });

        let plan = resolve_transition(mode, options, ctx, self.stage);
        tracing::debug!(
            stage = %self.stage,
            mode = mode.label(),
            noop = plan.is_noop(),
            "running stage"
        );

        business.start_stage(init);
        self.started.store(true, Ordering::SeqCst);

        DisplayHandle {
            stage: self.stage,
            plan,
            requests,
            view_models,
        }
    }

    /// Hand the running stage a fresh payload without restarting it.
    pub fn update_stage(&self, payload: Option<Value>) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::StageNotRunning);
        }
        let business = {
            let pipeline = self.pipeline.lock();
            pipeline.as_ref().map(|p| p.business.clone())
        };
        match business {
            Some(business) => {
                business.update_stage(payload);
                Ok(())
            }
            None => Err(EngineError::StageNotRunning),
        }
    }

    /// Report a non-terminal outcome to the coordinator layer.
    pub fn send(&self, intent: &str, results: Option<Value>) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::StageNotRunning);
        }
        let run = self.run.lock();
        let Some(run) = run.as_ref() else {
            return Err(EngineError::StageNotRunning);
        };
        (run.sink)(StageOutcome {
            coordinator: run.coordinator,
            intent: intent.to_string(),
            end: false,
            data_changed: false,
            results,
        });
        Ok(())
    }

    /// Terminal path. The first call per run wins; every later call is
    /// absorbed. Delivery of the terminal outcome waits for the in-flight
    /// display transition to settle, and is dropped if the stage has been
    /// relaunched in the meantime.
    pub fn end_stage(self: &Arc<Self>, intent: &str, data_changed: bool, results: Option<Value>) {
        if self
            .ending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(stage = %self.stage, intent, "stage already ending; end absorbed");
            return;
        }
        self.analytics.record_action("Configurator", "end_stage");

        let outcome = {
            let run = self.run.lock();
            run.as_ref().map(|run| {
                (
                    run.sink.clone(),
                    StageOutcome {
                        coordinator: run.coordinator,
                        intent: intent.to_string(),
                        end: true,
                        data_changed,
                        results,
                    },
                )
            })
        };

        // Release the pipeline before the terminal outcome is delivered so
        // no further requests reach the ended stage.
        let business = {
            let pipeline = self.pipeline.lock();
            pipeline.as_ref().map(|p| p.business.clone())
        };
        if let Some(business) = business {
            business.detach();
        }

        if let Some((sink, outcome)) = outcome {
            let epoch = self.epoch.load(Ordering::SeqCst);
            let this = Arc::downgrade(self);
            self.settle.defer(
                self.stage,
                Box::new(move || {
                    let Some(configurator) = Weak::upgrade(&this) else {
                        return;
                    };
                    if configurator.epoch.load(Ordering::SeqCst) != epoch {
                        tracing::debug!(
                            stage = %configurator.stage,
                            "stage relaunched before settle; terminal outcome dropped"
                        );
                        return;
                    }
                    sink(outcome);
                }),
            );
        }
    }

    /// Re-arm the end guard for a fresh run and invalidate any terminal
    /// outcome still waiting on the settle queue.
    pub fn restart_ending(&self) {
        self.ending.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// The detach recipe matching how the stage is currently attached.
    #[must_use]
    pub fn dismissal(&self, ctx: &AttachmentContext) -> DismissalPlan {
        let mode = self
            .run
            .lock()
            .as_ref()
            .map_or(DisplayMode::None, |run| run.mode);
        resolve_dismissal(mode, ctx, self.stage)
    }
}

impl std::fmt::Debug for Configurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configurator")
            .field("stage", &self.stage)
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("ending", &self.ending.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
