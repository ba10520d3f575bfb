//! Business layer of the stage pipeline.
//!
//! Translates display-originated Requests into Responses, owns the
//! "has this stage ended" guard, and owns the overlay counters that
//! de-duplicate busy/disabled signaling from nested business calls.
//! Domain behavior is injected through [`StageBehavior`].

use crate::analytics::Analytics;
use crate::pipeline::{RequestChannels, ResponseChannels};
use parking_lot::Mutex;
use scena_core::envelope::{
    ActionRequest, ConfirmationAnswer, ConfirmationResponse, DisabledViewResponse, EndResponse,
    ErrorResponse, LifecycleRequest, MessageResponse, MessageSeverity, SpinnerResponse,
    StartResponse, TitleResponse,
};
use scena_core::overlay::{OverlayCounter, OverlayRequest};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Domain behavior plugged into a stage's business layer.
///
/// All methods default to no-ops so behaviors implement only what they need.
/// Handlers run synchronously on the stage's timeline and emit downstream
/// through the [`BusinessCore`] they are handed.
pub trait StageBehavior: Send + Sync {
    /// The stage began running with `payload`.
    fn on_start(&self, payload: Option<&Value>, business: &BusinessCore) {
        let _ = (payload, business);
    }

    /// A fresh initialization payload arrived without a pipeline restart.
    fn on_update(&self, payload: Option<&Value>, business: &BusinessCore) {
        let _ = (payload, business);
    }

    /// A user action arrived from the display layer.
    fn on_action(&self, action: &ActionRequest, business: &BusinessCore) {
        let _ = (action, business);
    }

    /// The user answered a confirmation prompt.
    fn on_confirmation(&self, answer: &ConfirmationAnswer, business: &BusinessCore) {
        let _ = (answer, business);
    }

    /// A lifecycle notification arrived from the rendering collaborator.
    fn on_lifecycle(&self, event: LifecycleRequest, business: &BusinessCore) {
        let _ = (event, business);
    }
}

/// Behavior that reacts to nothing; useful for purely presentational stages.
#[derive(Debug, Default, Clone, Copy)]
pub struct InertBehavior;

impl StageBehavior for InertBehavior {}

/// One-shot end guard, re-armed on each appearance cycle.
#[derive(Debug, Default)]
struct EndGuard {
    ended: AtomicBool,
}

impl EndGuard {
    /// True exactly once per appearance cycle.
    fn should_end(&self) -> bool {
        !self.ended.swap(true, Ordering::SeqCst)
    }

    fn rearm(&self) {
        self.ended.store(false, Ordering::SeqCst);
    }
}

/// The business layer object.
pub struct BusinessCore {
    responses: ResponseChannels,
    subscriptions: Mutex<scena_core::channel::SubscriptionSet>,
    end_guard: EndGuard,
    spinner: Mutex<OverlayCounter>,
    disabled: Mutex<OverlayCounter>,
    behavior: Arc<dyn StageBehavior>,
    analytics: Arc<dyn Analytics>,
    init_payload: Mutex<Option<Value>>,
}

impl BusinessCore {
    /// Create an unbound business layer.
    #[must_use]
    pub fn new(behavior: Arc<dyn StageBehavior>, analytics: Arc<dyn Analytics>) -> Self {
        Self {
            responses: ResponseChannels::new(),
            subscriptions: Mutex::new(scena_core::channel::SubscriptionSet::new()),
            end_guard: EndGuard::default(),
            spinner: Mutex::new(OverlayCounter::new()),
            disabled: Mutex::new(OverlayCounter::new()),
            behavior,
            analytics,
            init_payload: Mutex::new(None),
        }
    }

    /// This layer's outgoing channels.
    #[must_use]
    pub fn responses(&self) -> &ResponseChannels {
        &self.responses
    }

    /// Attach all incoming handlers to the display layer's outgoing
    /// channels, replacing any prior subscriptions so a second bind never
    /// duplicates delivery.
    pub fn bind(self: &Arc<Self>, requests: &RequestChannels) {
        let subscriptions = vec![
            requests.lifecycle.subscribe({
                let this = Arc::downgrade(self);
                move |event: &LifecycleRequest| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.handle_lifecycle(*event);
                    }
                }
            }),
            requests.action.subscribe({
                let this = Arc::downgrade(self);
                move |action: &ActionRequest| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.analytics.record_action("BusinessCore", &action.intent);
                        core.behavior.on_action(action, &core);
                    }
                }
            }),
            requests.confirmation_answer.subscribe({
                let this = Arc::downgrade(self);
                move |answer: &ConfirmationAnswer| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.behavior.on_confirmation(answer, &core);
                    }
                }
            }),
        ];
        self.subscriptions.lock().replace(subscriptions);
    }

    fn handle_lifecycle(self: &Arc<Self>, event: LifecycleRequest) {
        if event == LifecycleRequest::DidAppear {
            self.end_guard.rearm();
        }
        self.behavior.on_lifecycle(event, self);
    }

    /// Begin the stage: records the payload and emits the Start response.
    pub fn start_stage(self: &Arc<Self>, payload: Option<Value>) {
        *self.init_payload.lock() = payload.clone();
        self.responses.stage_start.publish(&StartResponse {
            payload: payload.clone(),
        });
        self.behavior.on_start(payload.as_ref(), self);
    }

    /// Forward a new payload without restarting the pipeline.
    pub fn update_stage(self: &Arc<Self>, payload: Option<Value>) {
        *self.init_payload.lock() = payload.clone();
        self.behavior.on_update(payload.as_ref(), self);
    }

    /// The stored initialization payload.
    #[must_use]
    pub fn init_payload(&self) -> Option<Value> {
        self.init_payload.lock().clone()
    }

    /// One-shot end decision: true on the first call per appearance cycle,
    /// false thereafter. Re-armed by the next `DidAppear`.
    #[must_use]
    pub fn should_end_stage(&self) -> bool {
        self.end_guard.should_end()
    }

    /// Emit the End response if the stage has not already ended this cycle.
    pub fn end_stage(&self, intent: &str, data_changed: bool, results: Option<Value>) {
        if !self.should_end_stage() {
            tracing::debug!(intent, "stage already ended this cycle; end absorbed");
            return;
        }
        self.analytics.record_action("BusinessCore", "end_stage");
        self.responses.stage_end.publish(&EndResponse {
            intent: intent.to_string(),
            data_changed,
            results,
        });
    }

    /// Busy-spinner shortcut. Nested calls are counted; only the 0→1 and
    /// 1→0 edges reach the presentation layer.
    pub fn busy(&self, show: bool) {
        let request = if show {
            OverlayRequest::show()
        } else {
            OverlayRequest::hide()
        };
        if self.spinner.lock().apply(request).is_some() {
            self.responses.spinner.publish(&SpinnerResponse { request });
        }
    }

    /// Disabled-view shortcut with the same counting rules as [`busy`].
    ///
    /// [`busy`]: BusinessCore::busy
    pub fn disable_view(&self, show: bool) {
        let request = if show {
            OverlayRequest::show()
        } else {
            OverlayRequest::hide()
        };
        if self.disabled.lock().apply(request).is_some() {
            self.responses
                .disabled_view
                .publish(&DisabledViewResponse { request });
        }
    }

    /// Surface a transient message.
    pub fn message(&self, text: &str, severity: MessageSeverity, duration_ms: Option<u64>) {
        self.responses.message.publish(&MessageResponse {
            text: text.to_string(),
            severity,
            duration_ms,
        });
    }

    /// Surface an error with its own distinct code.
    pub fn error(&self, code: &str, message: &str) {
        self.responses.error.publish(&ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    /// Ask for confirmation before proceeding.
    pub fn confirm(&self, prompt: ConfirmationResponse) {
        self.responses.confirmation.publish(&prompt);
    }

    /// Update the stage title; also recorded as the current screen.
    pub fn set_title(&self, text: &str) {
        self.analytics.record_screen(text);
        self.responses.title.publish(&TitleResponse {
            text: text.to_string(),
        });
    }

    /// Release the layer: cancels subscriptions and recovers any overlay
    /// count the stage abandoned mid-flight.
    pub fn detach(&self) {
        self.subscriptions.lock().cancel_all();
        if self.spinner.lock().is_visible() {
            let request = OverlayRequest::force_hide();
            // Counter state and the downstream signal must agree.
            self.spinner.lock().apply(request);
            self.responses.spinner.publish(&SpinnerResponse { request });
        }
        if self.disabled.lock().is_visible() {
            let request = OverlayRequest::force_hide();
            self.disabled.lock().apply(request);
            self.responses
                .disabled_view
                .publish(&DisabledViewResponse { request });
        }
        *self.init_payload.lock() = None;
    }
}
