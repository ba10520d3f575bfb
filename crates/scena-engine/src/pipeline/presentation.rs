//! Presentation layer of the stage pipeline.
//!
//! Translates Responses into ViewModels, applying default styling and timing
//! policy so the same business outcome can be redecorated without touching
//! business rules. Also the serialization point for overlay visibility:
//! business layers may interleave spinner requests, and only this layer's
//! counter decides whether a become-visible/become-hidden event is emitted.

use crate::analytics::Analytics;
use crate::pipeline::{ResponseChannels, ViewModelChannels};
use parking_lot::Mutex;
use scena_core::channel::SubscriptionSet;
use scena_core::envelope::{
    ConfirmationResponse, ConfirmationViewModel, DisabledViewResponse, EndResponse, EndViewModel,
    ErrorResponse, ErrorViewModel, MessageResponse, MessageSeverity, MessageViewModel,
    OverlayViewModel, SpinnerResponse, StartResponse, StartViewModel, TitleResponse,
    TitleViewModel,
};
use scena_core::overlay::{OverlayCounter, OverlaySignal};
use std::sync::{Arc, Weak};

/// Default styling and timing policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationStyle {
    /// Message duration when the business layer specifies none.
    pub default_message_duration_ms: u64,
    /// Duration for warning and error messages.
    pub long_message_duration_ms: u64,
    /// Default confirm button label.
    pub confirm_label: String,
    /// Default cancel button label.
    pub cancel_label: String,
    /// Title used for error dialogs.
    pub error_title: String,
}

impl Default for PresentationStyle {
    fn default() -> Self {
        Self {
            default_message_duration_ms: 2_500,
            long_message_duration_ms: 3_500,
            confirm_label: "OK".to_string(),
            cancel_label: "Cancel".to_string(),
            error_title: "Something went wrong".to_string(),
        }
    }
}

/// The presentation layer object.
pub struct PresentationCore {
    view_models: ViewModelChannels,
    subscriptions: Mutex<SubscriptionSet>,
    spinner: Mutex<OverlayCounter>,
    disabled: Mutex<OverlayCounter>,
    style: PresentationStyle,
    analytics: Arc<dyn Analytics>,
}

impl PresentationCore {
    /// Create an unbound presentation layer.
    #[must_use]
    pub fn new(style: PresentationStyle, analytics: Arc<dyn Analytics>) -> Self {
        Self {
            view_models: ViewModelChannels::new(),
            subscriptions: Mutex::new(SubscriptionSet::new()),
            spinner: Mutex::new(OverlayCounter::new()),
            disabled: Mutex::new(OverlayCounter::new()),
            style,
            analytics,
        }
    }

    /// This layer's outgoing channels.
    #[must_use]
    pub fn view_models(&self) -> &ViewModelChannels {
        &self.view_models
    }

    /// Attach all incoming handlers to the business layer's outgoing
    /// channels, replacing any prior subscriptions so a second bind never
    /// duplicates delivery.
    pub fn bind(self: &Arc<Self>, responses: &ResponseChannels) {
        let subscriptions = vec![
            responses.stage_start.subscribe({
                let this = Arc::downgrade(self);
                move |r: &StartResponse| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.view_models.stage_start.publish(&StartViewModel {
                            payload: r.payload.clone(),
                        });
                    }
                }
            }),
            responses.stage_end.subscribe({
                let this = Arc::downgrade(self);
                move |r: &EndResponse| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.view_models.stage_end.publish(&EndViewModel {
                            intent: r.intent.clone(),
                        });
                    }
                }
            }),
            responses.confirmation.subscribe({
                let this = Arc::downgrade(self);
                move |r: &ConfirmationResponse| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.view_models
                            .confirmation
                            .publish(&core.decorate_confirmation(r));
                    }
                }
            }),
            responses.error.subscribe({
                let this = Arc::downgrade(self);
                move |r: &ErrorResponse| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.analytics.record_action("PresentationCore", "error");
                        core.view_models.error.publish(&ErrorViewModel {
                            title: core.style.error_title.clone(),
                            message: r.message.clone(),
                            code: r.code.clone(),
                        });
                    }
                }
            }),
            responses.message.subscribe({
                let this = Arc::downgrade(self);
                move |r: &MessageResponse| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.view_models.message.publish(&MessageViewModel {
                            text: r.text.clone(),
                            severity: r.severity,
                            duration_ms: core.message_duration(r),
                        });
                    }
                }
            }),
            responses.spinner.subscribe({
                let this = Arc::downgrade(self);
                move |r: &SpinnerResponse| {
                    if let Some(core) = Weak::upgrade(&this) {
                        let signal = core.spinner.lock().apply(r.request);
                        if let Some(signal) = signal {
                            core.view_models.spinner.publish(&OverlayViewModel {
                                visible: signal == OverlaySignal::BecameVisible,
                            });
                        }
                    }
                }
            }),
            responses.disabled_view.subscribe({
                let this = Arc::downgrade(self);
                move |r: &DisabledViewResponse| {
                    if let Some(core) = Weak::upgrade(&this) {
                        let signal = core.disabled.lock().apply(r.request);
                        if let Some(signal) = signal {
                            core.view_models.disabled_view.publish(&OverlayViewModel {
                                visible: signal == OverlaySignal::BecameVisible,
                            });
                        }
                    }
                }
            }),
            responses.title.subscribe({
                let this = Arc::downgrade(self);
                move |r: &TitleResponse| {
                    if let Some(core) = Weak::upgrade(&this) {
                        core.view_models.title.publish(&TitleViewModel {
                            text: r.text.clone(),
                        });
                    }
                }
            }),
        ];
        self.subscriptions.lock().replace(subscriptions);
    }

    fn decorate_confirmation(&self, r: &ConfirmationResponse) -> ConfirmationViewModel {
        ConfirmationViewModel {
            token: r.token.clone(),
            title: r.title.clone(),
            message: r.message.clone(),
            confirm_label: r
                .confirm_label
                .clone()
                .unwrap_or_else(|| self.style.confirm_label.clone()),
            cancel_label: r
                .cancel_label
                .clone()
                .unwrap_or_else(|| self.style.cancel_label.clone()),
        }
    }

    fn message_duration(&self, r: &MessageResponse) -> u64 {
        r.duration_ms.unwrap_or(match r.severity {
            MessageSeverity::Warning | MessageSeverity::Error => {
                self.style.long_message_duration_ms
            }
            MessageSeverity::Info | MessageSeverity::Success => {
                self.style.default_message_duration_ms
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::NoopAnalytics;
    use scena_core::overlay::OverlayRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bound() -> (Arc<PresentationCore>, ResponseChannels) {
        let responses = ResponseChannels::new();
        let core = Arc::new(PresentationCore::new(
            PresentationStyle::default(),
            Arc::new(NoopAnalytics),
        ));
        core.bind(&responses);
        (core, responses)
    }

    #[test]
    fn test_message_gets_default_duration() {
        let (core, responses) = bound();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_inner = seen.clone();
        let _sub = core.view_models().message.subscribe(move |vm: &MessageViewModel| {
            seen_inner.lock().push(vm.clone());
        });

        responses.message.publish(&MessageResponse {
            text: "saved".into(),
            severity: MessageSeverity::Success,
            duration_ms: None,
        });
        responses.message.publish(&MessageResponse {
            text: "failed".into(),
            severity: MessageSeverity::Error,
            duration_ms: None,
        });
        responses.message.publish(&MessageResponse {
            text: "custom".into(),
            severity: MessageSeverity::Info,
            duration_ms: Some(100),
        });

        let seen = seen.lock();
        assert_eq!(seen[0].duration_ms, 2_500);
        assert_eq!(seen[1].duration_ms, 3_500);
        assert_eq!(seen[2].duration_ms, 100);
    }

    #[test]
    fn test_confirmation_labels_default() {
        let (core, responses) = bound();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_inner = seen.clone();
        let _sub = core
            .view_models()
            .confirmation
            .subscribe(move |vm: &ConfirmationViewModel| {
                seen_inner.lock().push(vm.clone());
            });

        responses.confirmation.publish(&ConfirmationResponse {
            token: "t1".into(),
            title: "Discard?".into(),
            message: "Changes will be lost".into(),
            confirm_label: None,
            cancel_label: Some("Keep editing".into()),
        });

        let seen = seen.lock();
        assert_eq!(seen[0].confirm_label, "OK");
        assert_eq!(seen[0].cancel_label, "Keep editing");
    }

    #[test]
    fn test_spinner_serialized_across_emitters() {
        let (core, responses) = bound();
        let visible = Arc::new(AtomicUsize::new(0));
        let hidden = Arc::new(AtomicUsize::new(0));
        let (visible_inner, hidden_inner) = (visible.clone(), hidden.clone());
        let _sub = core.view_models().spinner.subscribe(move |vm: &OverlayViewModel| {
            if vm.visible {
                visible_inner.fetch_add(1, Ordering::SeqCst);
            } else {
                hidden_inner.fetch_add(1, Ordering::SeqCst);
            }
        });

        // Two interleaved business-side sources, each already edge-filtered,
        // still serialize to a single visible/hidden pair here.
        responses.spinner.publish(&SpinnerResponse {
            request: OverlayRequest::show(),
        });
        responses.spinner.publish(&SpinnerResponse {
            request: OverlayRequest::show(),
        });
        responses.spinner.publish(&SpinnerResponse {
            request: OverlayRequest::hide(),
        });
        responses.spinner.publish(&SpinnerResponse {
            request: OverlayRequest::hide(),
        });

        assert_eq!(visible.load(Ordering::SeqCst), 1);
        assert_eq!(hidden.load(Ordering::SeqCst), 1);
    }
}
