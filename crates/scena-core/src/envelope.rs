//! # Stage Event Envelopes
//!
//! The immutable value types exchanged between the three pipeline layers.
//! Requests flow Display → Business, Responses flow Business → Presentation,
//! and ViewModels flow Presentation → Display. Envelopes carry only plain
//! data and opaque JSON payloads, never ownership of UI objects.

use crate::overlay::OverlayRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Requests (Display → Business)
// ============================================================================

/// Lifecycle notification reported by the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleRequest {
    /// The view finished loading.
    DidLoad,
    /// The view is about to appear.
    WillAppear,
    /// The view appeared.
    DidAppear,
    /// The view is about to disappear.
    WillDisappear,
    /// The view disappeared.
    DidDisappear,
    /// The view was hidden without being torn down.
    DidHide,
    /// The view was closed by the container.
    DidClose,
}

/// A user action surfaced by the display layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Intent token describing the action.
    pub intent: String,
    /// Opaque action payload.
    pub payload: Option<Value>,
}

impl ActionRequest {
    /// Action with no payload.
    #[must_use]
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            payload: None,
        }
    }

    /// Action carrying a payload.
    #[must_use]
    pub fn with_payload(intent: impl Into<String>, payload: Value) -> Self {
        Self {
            intent: intent.into(),
            payload: Some(payload),
        }
    }
}

/// The user's answer to a confirmation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationAnswer {
    /// Which prompt this answers, echoed from the response.
    pub token: String,
    /// True if the user accepted.
    pub accepted: bool,
}

// ============================================================================
// Responses (Business → Presentation)
// ============================================================================

/// Business outcome severity, mapped by presentation onto display styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageSeverity {
    /// Informational.
    Info,
    /// Operation succeeded.
    Success,
    /// Something needs attention.
    Warning,
    /// Operation failed.
    Error,
}

/// The stage began running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    /// Initialization payload handed to the stage.
    pub payload: Option<Value>,
}

/// The stage decided it has ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndResponse {
    /// Intent token describing why the stage ended.
    pub intent: String,
    /// Whether the stage changed shared data.
    pub data_changed: bool,
    /// Results handed back to the flow.
    pub results: Option<Value>,
}

/// Ask the user to confirm before proceeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    /// Token to echo back in the [`ConfirmationAnswer`].
    pub token: String,
    /// Prompt title.
    pub title: String,
    /// Prompt body.
    pub message: String,
    /// Custom confirm label, if the default should not be used.
    pub confirm_label: Option<String>,
    /// Custom cancel label, if the default should not be used.
    pub cancel_label: Option<String>,
}

/// An error to surface downstream.
///
/// Every distinct condition carries its own `code`; the engine never
/// collapses separate conditions onto a shared code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable diagnostic code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message text.
    pub text: String,
    /// Severity of the underlying outcome.
    pub severity: MessageSeverity,
    /// Custom display duration; presentation applies its default when absent.
    pub duration_ms: Option<u64>,
}

/// Busy-spinner accounting change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinnerResponse {
    /// The requested counter change.
    pub request: OverlayRequest,
}

/// Disabled-view accounting change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledViewResponse {
    /// The requested counter change.
    pub request: OverlayRequest,
}

/// New stage title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleResponse {
    /// Title text.
    pub text: String,
}

// ============================================================================
// ViewModels (Presentation → Display)
// ============================================================================

/// Decorated start signal for the display layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartViewModel {
    /// Initialization payload for rendering.
    pub payload: Option<Value>,
}

/// Decorated end signal for the display layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndViewModel {
    /// Intent token describing why the stage ended.
    pub intent: String,
}

/// Fully-labeled confirmation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationViewModel {
    /// Token to echo back in the answer.
    pub token: String,
    /// Prompt title.
    pub title: String,
    /// Prompt body.
    pub message: String,
    /// Confirm button label, defaults applied.
    pub confirm_label: String,
    /// Cancel button label, defaults applied.
    pub cancel_label: String,
}

/// Error presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorViewModel {
    /// Dialog title.
    pub title: String,
    /// Dialog body.
    pub message: String,
    /// Stable diagnostic code for support surfaces.
    pub code: String,
}

/// Message presentation with timing policy applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageViewModel {
    /// Message text.
    pub text: String,
    /// Severity for styling.
    pub severity: MessageSeverity,
    /// Concrete display duration.
    pub duration_ms: u64,
}

/// Busy/disabled overlay visibility, already serialized through the
/// presentation layer's counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayViewModel {
    /// Whether the overlay should now be visible.
    pub visible: bool,
}

/// Title presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleViewModel {
    /// Title text.
    pub text: String,
}
