//! # Coordinator Tree
//!
//! The flow hierarchy as an arena of nodes addressed by [`CoordinatorId`].
//! Parent and child references are id lookups into the arena, never owning
//! or weak pointers, so the hierarchy cannot form reference cycles and every
//! parent/child mutation keeps both directions consistent.
//!
//! The tree is `&mut`-driven pure state: it takes no internal locks, and the
//! host drives it from a single logical timeline. Stage outcomes produced by
//! configurator callbacks land on a shared dispatch queue and are routed by
//! [`CoordinatorTree::dispatch_pending`] on that same timeline, which is
//! what lets routed handlers receive the tree mutably.

use crate::analytics::Analytics;
use crate::configurator::{Configurator, DisplayHandle, OutcomeSink, StageOutcome};
use crate::errors::EngineError;
use crate::router::{Routed, StageActions};
use crate::settle::SettleQueue;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use scena_core::display::{AttachmentContext, DisplayMode, DisplayOptions};
use scena_core::identifiers::{CoordinatorId, StageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

// ============================================================================
// Node state
// ============================================================================

/// A coordinator's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Created or reset; may be started.
    NotStarted,
    /// Actively coordinating a flow.
    Started,
    /// Finished; terminal until the next reset.
    Terminated,
}

/// What a finished flow hands back to whoever started it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowOutcome {
    /// True for a stop, false for any cancellation.
    pub success: bool,
    /// Results supplied to [`CoordinatorTree::stop`], if any.
    pub results: Option<Value>,
}

/// Completion registered at start; exactly one per activation.
pub enum Completion {
    /// Only success/failure matters.
    Flag(Box<dyn FnOnce(bool) + Send>),
    /// The caller wants the full outcome.
    Results(Box<dyn FnOnce(FlowOutcome) + Send>),
}

impl Completion {
    fn invoke(self, success: bool, results: Option<Value>) {
        match self {
            Self::Flag(f) => f(success),
            Self::Results(f) => f(FlowOutcome { success, results }),
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(_) => f.write_str("Completion::Flag"),
            Self::Results(_) => f.write_str("Completion::Results"),
        }
    }
}

struct CoordinatorNode {
    parent: Option<CoordinatorId>,
    children: IndexSet<CoordinatorId>,
    state: RunState,
    completion: Option<Completion>,
    // Set only while one of this node's outcomes is being routed; ancestor
    // walks during handler execution find the nearest active stage.
    latest_configurator: Option<Arc<Configurator>>,
}

impl CoordinatorNode {
    fn new(parent: Option<CoordinatorId>) -> Self {
        Self {
            parent,
            children: IndexSet::new(),
            state: RunState::NotStarted,
            completion: None,
            latest_configurator: None,
        }
    }
}

struct RouteEntry {
    coordinator: CoordinatorId,
    configurator: Arc<Configurator>,
    actions: StageActions,
}

type DispatchQueue = Arc<Mutex<VecDeque<(StageId, StageOutcome)>>>;

// ============================================================================
// Tree
// ============================================================================

/// Arena of coordinator nodes plus the stage dispatch machinery.
pub struct CoordinatorTree {
    nodes: IndexMap<CoordinatorId, CoordinatorNode>,
    routes: HashMap<StageId, RouteEntry>,
    queue: DispatchQueue,
    settle: Arc<SettleQueue>,
    analytics: Arc<dyn Analytics>,
}

impl CoordinatorTree {
    /// Empty tree.
    #[must_use]
    pub fn new(analytics: Arc<dyn Analytics>) -> Self {
        Self {
            nodes: IndexMap::new(),
            routes: HashMap::new(),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            settle: Arc::new(SettleQueue::new()),
            analytics,
        }
    }

    /// The settle queue configurators for this tree must share.
    #[must_use]
    pub fn settle_queue(&self) -> Arc<SettleQueue> {
        self.settle.clone()
    }

    /// The analytics worker injected into this tree's stages.
    #[must_use]
    pub fn analytics(&self) -> Arc<dyn Analytics> {
        self.analytics.clone()
    }

    // ------------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------------

    /// Create a node, registering it as a child of `parent` when given.
    pub fn create(&mut self, parent: Option<CoordinatorId>) -> Result<CoordinatorId, EngineError> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return Err(EngineError::UnknownCoordinator(parent));
            }
        }
        let id = CoordinatorId::new();
        self.nodes.insert(id, CoordinatorNode::new(parent));
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.insert(id);
            }
        }
        tracing::debug!(coordinator = %id, parent = ?parent, "coordinator created");
        Ok(id)
    }

    /// A node's current state.
    pub fn state(&self, id: CoordinatorId) -> Result<RunState, EngineError> {
        self.nodes
            .get(&id)
            .map(|node| node.state)
            .ok_or(EngineError::UnknownCoordinator(id))
    }

    /// A node's parent, if any.
    pub fn parent(&self, id: CoordinatorId) -> Result<Option<CoordinatorId>, EngineError> {
        self.nodes
            .get(&id)
            .map(|node| node.parent)
            .ok_or(EngineError::UnknownCoordinator(id))
    }

    /// A node's children, in registration order.
    pub fn children(&self, id: CoordinatorId) -> Result<Vec<CoordinatorId>, EngineError> {
        self.nodes
            .get(&id)
            .map(|node| node.children.iter().copied().collect())
            .ok_or(EngineError::UnknownCoordinator(id))
    }

    // ------------------------------------------------------------------------
    // Flow lifecycle
    // ------------------------------------------------------------------------

    /// Start a flow. A node that is not `NotStarted` gets its whole subtree
    /// reset first, so a restart always begins from a clean hierarchy.
    /// `completion` replaces whatever was registered before; exactly one
    /// completion exists per activation.
    pub fn start(&mut self, id: CoordinatorId, completion: Completion) -> Result<(), EngineError> {
        let state = self.state(id)?;
        if state != RunState::NotStarted {
            tracing::debug!(coordinator = %id, ?state, "restarting; resetting subtree first");
            self.reset(id)?;
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = RunState::Started;
            node.completion = Some(completion);
        }
        self.analytics.record_action("CoordinatorTree", "start");
        tracing::debug!(coordinator = %id, "flow started");
        Ok(())
    }

    /// Finish a flow successfully. The completion fires exactly once; a
    /// second termination of any kind is silently absorbed.
    pub fn stop(&mut self, id: CoordinatorId, results: Option<Value>) -> Result<(), EngineError> {
        self.terminate(id, true, results, "stop")
    }

    /// Abandon a flow. The completion fires with failure.
    pub fn cancel(&mut self, id: CoordinatorId) -> Result<(), EngineError> {
        self.terminate(id, false, None, "cancel")
    }

    /// Abandon a flow and force-end every stage still running anywhere in
    /// its subtree.
    pub fn stop_and_cancel(&mut self, id: CoordinatorId) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&id) {
            return Err(EngineError::UnknownCoordinator(id));
        }
        let subtree = self.collect_subtree(id);
        let mut stages: Vec<Arc<Configurator>> = self
            .routes
            .values()
            .filter(|entry| subtree.contains(&entry.coordinator))
            .map(|entry| entry.configurator.clone())
            .collect();
        // A stage whose outcome is being routed right now has its entry
        // pulled out of the route map, but its configurator is installed on
        // the owning node for the duration of the call; sweep those too so
        // terminating a hierarchy from inside one of its own handlers still
        // ends every stage.
        stages.extend(subtree.iter().filter_map(|node_id| {
            self.nodes
                .get(node_id)
                .and_then(|node| node.latest_configurator.clone())
        }));
        for configurator in stages {
            configurator.end_stage("cancel", false, None);
        }
        // Retire the subtree's routes so the deferred cancel outcomes are
        // dropped instead of routed into a torn-down flow.
        self.routes
            .retain(|_, entry| !subtree.contains(&entry.coordinator));
        self.terminate(id, false, None, "stop_and_cancel")
    }

    fn terminate(
        &mut self,
        id: CoordinatorId,
        success: bool,
        results: Option<Value>,
        op: &'static str,
    ) -> Result<(), EngineError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(EngineError::UnknownCoordinator(id))?;
        match node.state {
            RunState::Started => {}
            state => {
                tracing::debug!(coordinator = %id, ?state, op, "termination absorbed");
                return Ok(());
            }
        }
        node.state = RunState::Terminated;
        let completion = node.completion.take();
        self.analytics.record_action("CoordinatorTree", op);
        tracing::debug!(coordinator = %id, success, op, "flow terminated");
        if let Some(completion) = completion {
            completion.invoke(success, results);
        }
        Ok(())
    }

    /// Reset a subtree to `NotStarted`, descendants first. Every visited
    /// node ends with no children, no completion, and no running stages; a
    /// visited set guards against cyclic wiring.
    pub fn reset(&mut self, id: CoordinatorId) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&id) {
            return Err(EngineError::UnknownCoordinator(id));
        }
        let mut visited = IndexSet::new();
        self.reset_inner(id, &mut visited);
        Ok(())
    }

    fn reset_inner(&mut self, id: CoordinatorId, visited: &mut IndexSet<CoordinatorId>) {
        if !visited.insert(id) {
            return;
        }
        let children: Vec<CoordinatorId> = self
            .nodes
            .get(&id)
            .map(|node| node.children.iter().copied().collect())
            .unwrap_or_default();
        for child in &children {
            self.reset_inner(*child, visited);
        }
        self.routes.retain(|_, entry| entry.coordinator != id);
        for child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = None;
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = RunState::NotStarted;
            node.children.clear();
            node.completion = None;
            node.latest_configurator = None;
        }
        tracing::debug!(coordinator = %id, "coordinator reset");
    }

    /// Dispose of a subtree entirely: reset it, detach the top node from
    /// its parent, and drop every node from the arena.
    pub fn remove(&mut self, id: CoordinatorId) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&id) {
            return Err(EngineError::UnknownCoordinator(id));
        }
        let subtree = self.collect_subtree(id);
        self.reset(id)?;
        let parent = self.nodes.get(&id).and_then(|node| node.parent);
        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.shift_remove(&id);
            }
        }
        for node_id in subtree {
            self.nodes.shift_remove(&node_id);
        }
        tracing::debug!(coordinator = %id, "coordinator removed");
        Ok(())
    }

    /// Propagate a fresh payload through `id`'s subtree, skipping the
    /// `from` child (usually the child that originated the update) and any
    /// terminated branch. Every running stage owned by a visited node
    /// receives the payload.
    pub fn update(
        &mut self,
        id: CoordinatorId,
        payload: Option<Value>,
        from: Option<CoordinatorId>,
    ) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&id) {
            return Err(EngineError::UnknownCoordinator(id));
        }
        let mut visited = IndexSet::new();
        self.update_inner(id, &payload, from, &mut visited);
        Ok(())
    }

    fn update_inner(
        &mut self,
        id: CoordinatorId,
        payload: &Option<Value>,
        from: Option<CoordinatorId>,
        visited: &mut IndexSet<CoordinatorId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if node.state == RunState::Terminated {
            return;
        }
        let children: Vec<CoordinatorId> = node.children.iter().copied().collect();

        let stages: Vec<Arc<Configurator>> = self
            .routes
            .values()
            .filter(|entry| entry.coordinator == id)
            .map(|entry| entry.configurator.clone())
            .collect();
        for configurator in stages {
            if configurator.is_running() {
                if let Err(err) = configurator.update_stage(payload.clone()) {
                    tracing::debug!(coordinator = %id, %err, "stage update skipped");
                }
            }
        }

        for child in children {
            if Some(child) == from {
                continue;
            }
            self.update_inner(child, payload, from, visited);
        }
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    /// The stage of the nearest configurator currently routing an outcome,
    /// walking from `id` up through its ancestors. Meaningful only during
    /// handler execution; between dispatches every node's slot is clear.
    #[must_use]
    pub fn nearest_active_stage(&self, id: CoordinatorId) -> Option<StageId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.nodes.get(&current)?;
            if let Some(configurator) = &node.latest_configurator {
                return Some(configurator.stage());
            }
            cursor = node.parent;
        }
        None
    }

    /// Launch a stage under coordinator `id` and register its intent
    /// handlers. Outcomes the stage reports are queued and routed by
    /// [`CoordinatorTree::dispatch_pending`].
    #[allow(clippy::too_many_arguments)]
    pub fn start_stage(
        &mut self,
        id: CoordinatorId,
        configurator: &Arc<Configurator>,
        mode: DisplayMode,
        options: DisplayOptions,
        ctx: &AttachmentContext,
        init: Option<Value>,
        actions: StageActions,
    ) -> Result<DisplayHandle, EngineError> {
        let state = self.state(id)?;
        if state == RunState::Terminated {
            return Err(EngineError::CoordinatorTerminated(id));
        }

        let presenting = self.nearest_active_stage(id);
        tracing::debug!(
            coordinator = %id,
            stage = %configurator.stage(),
            mode = mode.label(),
            presenting = ?presenting,
            "starting stage"
        );

        let stage = configurator.stage();
        let sink: OutcomeSink = {
            let queue = self.queue.clone();
            Arc::new(move |outcome| {
                queue.lock().push_back((stage, outcome));
            })
        };
        let handle = configurator.run_stage(id, mode, options, ctx, init, sink);
        self.routes.insert(
            stage,
            RouteEntry {
                coordinator: id,
                configurator: configurator.clone(),
                actions,
            },
        );
        Ok(handle)
    }

    /// Drain the dispatch queue, routing each queued outcome to its stage's
    /// handler table. During each routing call the owning node's
    /// configurator slot is installed so descendants launched by the
    /// handler can discover their presenting stage; the slot is cleared
    /// before the next outcome. A terminal outcome retires the route.
    pub fn dispatch_pending(&mut self) {
        loop {
            let next = self.queue.lock().pop_front();
            let Some((stage, outcome)) = next else {
                return;
            };
            let Some(mut entry) = self.routes.remove(&stage) else {
                tracing::debug!(
                    stage = %stage,
                    intent = %outcome.intent,
                    "outcome for retired stage dropped"
                );
                continue;
            };

            if let Some(node) = self.nodes.get_mut(&entry.coordinator) {
                node.latest_configurator = Some(entry.configurator.clone());
            }
            let routed = entry.actions.route(self, &outcome);
            if let Some(node) = self.nodes.get_mut(&entry.coordinator) {
                node.latest_configurator = None;
            }
            if routed == Routed::Unhandled {
                tracing::debug!(stage = %stage, intent = %outcome.intent, "outcome unhandled");
            }

            // The handler may have relaunched the stage (its fresh route
            // entry wins over the one we pulled out) or terminated the
            // owning flow; a flow that is no longer running gets no route
            // back.
            let still_started = self
                .nodes
                .get(&entry.coordinator)
                .is_some_and(|node| node.state == RunState::Started);
            if !outcome.end && still_started {
                self.routes.entry(stage).or_insert(entry);
            }
        }
    }

    /// The rendering collaborator finished its attach/detach transition for
    /// `stage`: fire the deferred continuations and route whatever outcomes
    /// they produce.
    pub fn transition_completed(&mut self, stage: StageId) {
        self.settle.complete(stage);
        self.dispatch_pending();
    }

    /// Fallback for hosts without a transition-completion signal: settle
    /// everything pending, then route.
    pub fn flush_transitions(&mut self) {
        self.settle.flush();
        self.dispatch_pending();
    }

    /// Number of stages with live routes.
    #[must_use]
    pub fn active_route_count(&self) -> usize {
        self.routes.len()
    }

    fn collect_subtree(&self, id: CoordinatorId) -> IndexSet<CoordinatorId> {
        let mut subtree = IndexSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !subtree.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().copied());
            }
        }
        subtree
    }
}

impl std::fmt::Debug for CoordinatorTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorTree")
            .field("nodes", &self.nodes.len())
            .field("routes", &self.routes.len())
            .field("queued", &self.queue.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics;
    use crate::pipeline::{InertBehavior, PresentationStyle};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tree() -> CoordinatorTree {
        CoordinatorTree::new(analytics::noop())
    }

    fn configurator(tree: &CoordinatorTree) -> Arc<Configurator> {
        Arc::new(Configurator::new(
            Arc::new(InertBehavior),
            PresentationStyle::default(),
            tree.analytics(),
            tree.settle_queue(),
        ))
    }

    #[test]
    fn test_create_keeps_both_directions_consistent() {
        let mut tree = tree();
        let root = tree.create(None).unwrap();
        let child = tree.create(Some(root)).unwrap();

        assert_eq!(tree.parent(child).unwrap(), Some(root));
        assert_eq!(tree.children(root).unwrap(), vec![child]);
        assert_eq!(tree.state(child).unwrap(), RunState::NotStarted);
    }

    #[test]
    fn test_create_under_unknown_parent_fails() {
        let mut tree = tree();
        let ghost = CoordinatorId::new();
        assert_eq!(
            tree.create(Some(ghost)),
            Err(EngineError::UnknownCoordinator(ghost))
        );
    }

    #[test]
    fn test_stop_fires_completion_once() {
        let mut tree = tree();
        let id = tree.create(None).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_inner = fired.clone();
        tree.start(
            id,
            Completion::Flag(Box::new(move |success| {
                assert!(success);
                fired_inner.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        tree.stop(id, None).unwrap();
        tree.stop(id, None).unwrap();
        tree.cancel(id).unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(tree.state(id).unwrap(), RunState::Terminated);
    }

    #[test]
    fn test_cancel_reports_failure_with_results_completion() {
        let mut tree = tree();
        let id = tree.create(None).unwrap();
        let seen = Arc::new(Mutex::new(None));

        let seen_inner = seen.clone();
        tree.start(
            id,
            Completion::Results(Box::new(move |outcome| {
                *seen_inner.lock() = Some(outcome);
            })),
        )
        .unwrap();
        tree.cancel(id).unwrap();

        assert_eq!(
            *seen.lock(),
            Some(FlowOutcome {
                success: false,
                results: None,
            })
        );
    }

    #[test]
    fn test_restart_resets_subtree_first() {
        let mut tree = tree();
        let root = tree.create(None).unwrap();
        let child = tree.create(Some(root)).unwrap();

        tree.start(root, Completion::Flag(Box::new(|_| {}))).unwrap();
        tree.start(child, Completion::Flag(Box::new(|_| {}))).unwrap();
        tree.stop(root, None).unwrap();

        // Terminated; starting again must reset the whole subtree.
        tree.start(root, Completion::Flag(Box::new(|_| {}))).unwrap();
        assert_eq!(tree.state(root).unwrap(), RunState::Started);
        assert_eq!(tree.state(child).unwrap(), RunState::NotStarted);
        assert!(tree.children(root).unwrap().is_empty());
        assert_eq!(tree.parent(child).unwrap(), None);
    }

    #[test]
    fn test_reset_is_depth_first_and_complete() {
        let mut tree = tree();
        let root = tree.create(None).unwrap();
        let mid = tree.create(Some(root)).unwrap();
        let leaf = tree.create(Some(mid)).unwrap();

        for id in [root, mid, leaf] {
            tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();
        }
        tree.reset(root).unwrap();

        for id in [root, mid, leaf] {
            assert_eq!(tree.state(id).unwrap(), RunState::NotStarted);
            assert!(tree.children(id).unwrap().is_empty());
        }
    }

    #[test]
    fn test_remove_disposes_subtree_and_detaches_parent() {
        let mut tree = tree();
        let root = tree.create(None).unwrap();
        let child = tree.create(Some(root)).unwrap();
        let leaf = tree.create(Some(child)).unwrap();

        tree.remove(child).unwrap();

        assert!(tree.children(root).unwrap().is_empty());
        assert_eq!(
            tree.state(child),
            Err(EngineError::UnknownCoordinator(child))
        );
        assert_eq!(tree.state(leaf), Err(EngineError::UnknownCoordinator(leaf)));
    }

    #[test]
    fn test_update_skips_origin_child_and_terminated_branch() {
        let mut tree = tree();
        let root = tree.create(None).unwrap();
        let origin = tree.create(Some(root)).unwrap();
        let sibling = tree.create(Some(root)).unwrap();
        let dead = tree.create(Some(root)).unwrap();

        for id in [root, origin, sibling, dead] {
            tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();
        }
        tree.cancel(dead).unwrap();

        // Running stages under each node observe the propagation.
        let ctx = AttachmentContext::default();
        let mut handles = Vec::new();
        for id in [origin, sibling, dead] {
            let cfg = configurator(&tree);
            let launched = tree.start_stage(
                id,
                &cfg,
                DisplayMode::None,
                DisplayOptions::default(),
                &ctx,
                None,
                StageActions::new(),
            );
            handles.push((id, cfg, launched));
        }
        // The terminated node rejects new stages outright.
        assert!(matches!(
            &handles[2].2,
            Err(EngineError::CoordinatorTerminated(_))
        ));

        tree.update(root, Some(serde_json::json!({"v": 2})), Some(origin))
            .unwrap();
        // No panic and no delivery to the origin is the observable contract;
        // payload contents are covered by pipeline tests.
        assert_eq!(tree.state(sibling).unwrap(), RunState::Started);
    }

    #[test]
    fn test_stage_outcome_routes_to_handler() {
        let mut tree = tree();
        let id = tree.create(None).unwrap();
        tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();

        let cfg = configurator(&tree);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_inner = hits.clone();
        tree.start_stage(
            id,
            &cfg,
            DisplayMode::ModalFormSheet,
            DisplayOptions::default(),
            &AttachmentContext::default(),
            None,
            StageActions::new().on("save", move |_, outcome| {
                assert!(!outcome.end);
                hits_inner.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        cfg.send("save", None).unwrap();
        tree.dispatch_pending();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(tree.active_route_count(), 1);
    }

    #[test]
    fn test_terminal_outcome_retires_route_after_settle() {
        let mut tree = tree();
        let id = tree.create(None).unwrap();
        tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();

        let cfg = configurator(&tree);
        let ends = Arc::new(AtomicUsize::new(0));
        let ends_inner = ends.clone();
        tree.start_stage(
            id,
            &cfg,
            DisplayMode::Modal,
            DisplayOptions::default(),
            &AttachmentContext::default(),
            None,
            StageActions::new().on("close", move |_, outcome| {
                assert!(outcome.end);
                ends_inner.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        cfg.end_stage("close", false, None);
        cfg.end_stage("close", false, None);

        // Terminal delivery waits for the display transition to settle.
        assert_eq!(ends.load(Ordering::SeqCst), 0);
        tree.transition_completed(cfg.stage());

        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert_eq!(tree.active_route_count(), 0);
    }

    #[test]
    fn test_terminating_hierarchy_from_inside_handler_ends_own_stage() {
        let mut tree = tree();
        let root = tree.create(None).unwrap();
        tree.start(root, Completion::Flag(Box::new(|_| {}))).unwrap();

        let cfg = configurator(&tree);
        tree.start_stage(
            root,
            &cfg,
            DisplayMode::None,
            DisplayOptions::default(),
            &AttachmentContext::default(),
            None,
            StageActions::new().on("logout", move |tree, outcome| {
                tree.stop_and_cancel(outcome.coordinator).unwrap();
            }),
        )
        .unwrap();

        cfg.send("logout", None).unwrap();
        tree.dispatch_pending();

        // The stage whose handler tore the flow down is itself ended, and
        // its route does not survive into the terminated flow.
        assert!(!cfg.is_running());
        assert_eq!(tree.active_route_count(), 0);
        assert_eq!(tree.state(root).unwrap(), RunState::Terminated);
    }

    #[test]
    fn test_nearest_active_stage_visible_during_routing_only() {
        let mut tree = tree();
        let root = tree.create(None).unwrap();
        let child = tree.create(Some(root)).unwrap();
        for id in [root, child] {
            tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();
        }

        let cfg = configurator(&tree);
        let stage = cfg.stage();
        let observed = Arc::new(Mutex::new(None));
        let observed_inner = observed.clone();
        tree.start_stage(
            root,
            &cfg,
            DisplayMode::None,
            DisplayOptions::default(),
            &AttachmentContext::default(),
            None,
            StageActions::new().on("spawn", move |tree, _| {
                *observed_inner.lock() = tree.nearest_active_stage(child);
            }),
        )
        .unwrap();

        assert_eq!(tree.nearest_active_stage(child), None);
        cfg.send("spawn", None).unwrap();
        tree.dispatch_pending();

        assert_eq!(*observed.lock(), Some(stage));
        assert_eq!(tree.nearest_active_stage(child), None);
    }

    #[test]
    fn test_stop_and_cancel_force_ends_subtree_stages() {
        let mut tree = tree();
        let root = tree.create(None).unwrap();
        let child = tree.create(Some(root)).unwrap();
        for id in [root, child] {
            tree.start(id, Completion::Flag(Box::new(|_| {}))).unwrap();
        }

        let cfg = configurator(&tree);
        tree.start_stage(
            child,
            &cfg,
            DisplayMode::Modal,
            DisplayOptions::default(),
            &AttachmentContext::default(),
            None,
            StageActions::new(),
        )
        .unwrap();
        assert!(cfg.is_running());

        tree.stop_and_cancel(root).unwrap();
        assert!(!cfg.is_running());
        assert_eq!(tree.state(root).unwrap(), RunState::Terminated);
    }
}
