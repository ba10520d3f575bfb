//! # Stage Pipeline
//!
//! The three per-stage layer objects and the channel sets that connect them.
//! Layers never hold direct references into each other's internals; all
//! traffic flows through the fixed, named [`scena_core::channel::EventChannel`]
//! sets defined here:
//!
//! ```text
//! Display ──Requests──▶ Business ──Responses──▶ Presentation ──ViewModels──▶ Display
//! ```
//!
//! Delivery is synchronous, so a Response is fully processed by the
//! presentation layer before the emitting business code path returns.

mod business;
mod presentation;

pub use business::{BusinessCore, InertBehavior, StageBehavior};
pub use presentation::{PresentationCore, PresentationStyle};

use crate::analytics::Analytics;
use scena_core::channel::EventChannel;
use scena_core::envelope::{
    ActionRequest, ConfirmationAnswer, ConfirmationResponse, ConfirmationViewModel,
    DisabledViewResponse, EndResponse, EndViewModel, ErrorResponse, ErrorViewModel,
    LifecycleRequest, MessageResponse, MessageViewModel, OverlayViewModel, SpinnerResponse,
    StartResponse, StartViewModel, TitleResponse, TitleViewModel,
};
use std::sync::Arc;

/// Channels the display layer emits into (Display → Business).
#[derive(Clone, Default)]
pub struct RequestChannels {
    /// Lifecycle notifications from the rendering collaborator.
    pub lifecycle: EventChannel<LifecycleRequest>,
    /// User actions.
    pub action: EventChannel<ActionRequest>,
    /// Answers to confirmation prompts.
    pub confirmation_answer: EventChannel<ConfirmationAnswer>,
}

impl RequestChannels {
    /// Fresh, unsubscribed channel set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Channels the business layer emits into (Business → Presentation).
#[derive(Clone, Default)]
pub struct ResponseChannels {
    /// The stage began running.
    pub stage_start: EventChannel<StartResponse>,
    /// The stage decided it has ended.
    pub stage_end: EventChannel<EndResponse>,
    /// Confirmation prompt requests.
    pub confirmation: EventChannel<ConfirmationResponse>,
    /// Errors to surface.
    pub error: EventChannel<ErrorResponse>,
    /// Transient user messages.
    pub message: EventChannel<MessageResponse>,
    /// Busy-spinner accounting.
    pub spinner: EventChannel<SpinnerResponse>,
    /// Disabled-view accounting.
    pub disabled_view: EventChannel<DisabledViewResponse>,
    /// Title changes.
    pub title: EventChannel<TitleResponse>,
}

impl ResponseChannels {
    /// Fresh, unsubscribed channel set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Channels the presentation layer emits into (Presentation → Display).
#[derive(Clone, Default)]
pub struct ViewModelChannels {
    /// Decorated start signal.
    pub stage_start: EventChannel<StartViewModel>,
    /// Decorated end signal.
    pub stage_end: EventChannel<EndViewModel>,
    /// Fully-labeled confirmation prompts.
    pub confirmation: EventChannel<ConfirmationViewModel>,
    /// Error presentations.
    pub error: EventChannel<ErrorViewModel>,
    /// Messages with timing policy applied.
    pub message: EventChannel<MessageViewModel>,
    /// Serialized spinner visibility.
    pub spinner: EventChannel<OverlayViewModel>,
    /// Serialized disabled-view visibility.
    pub disabled_view: EventChannel<OverlayViewModel>,
    /// Title presentations.
    pub title: EventChannel<TitleViewModel>,
}

impl ViewModelChannels {
    /// Fresh, unsubscribed channel set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// One stage's assembled object graph.
pub struct StagePipeline {
    /// Channels the rendering collaborator publishes into.
    pub requests: RequestChannels,
    /// The business layer.
    pub business: Arc<BusinessCore>,
    /// The presentation layer.
    pub presentation: Arc<PresentationCore>,
}

impl StagePipeline {
    /// Build and wire the triad exactly once: business subscribes to the
    /// display's requests, presentation subscribes to the business's
    /// responses, and the analytics worker is injected into both layers.
    #[must_use]
    pub fn assemble(
        behavior: Arc<dyn StageBehavior>,
        style: PresentationStyle,
        analytics: Arc<dyn Analytics>,
    ) -> Self {
        let requests = RequestChannels::new();
        let business = Arc::new(BusinessCore::new(behavior, analytics.clone()));
        business.bind(&requests);
        let presentation = Arc::new(PresentationCore::new(style, analytics));
        presentation.bind(business.responses());
        Self {
            requests,
            business,
            presentation,
        }
    }

    /// The channel surface the display layer consumes.
    #[must_use]
    pub fn view_models(&self) -> &ViewModelChannels {
        self.presentation.view_models()
    }
}
