//! Scena Core - Pure Types for Stage Coordination
//!
//! This crate provides the leaf-level building blocks that the coordination
//! engine composes. Everything here is pure data or pure decision logic:
//!
//! - [`channel`]: typed, ordered, multi-subscriber event channels with
//!   cancellable subscription tokens
//! - [`envelope`]: the immutable Request / Response / ViewModel value types
//!   exchanged between pipeline layers
//! - [`display`]: the display-mode state machine that maps a requested mode
//!   plus options to a transition recipe
//! - [`overlay`]: reference-counted show/hide signaling for busy and
//!   disabled-view indicators
//! - [`identifiers`]: uuid-backed identifier newtypes
//!
//! No module in this crate performs I/O or touches platform APIs.

#![forbid(unsafe_code)]

/// Typed pub-sub channels with cancellable subscriptions
pub mod channel;

/// Display-mode resolution state machine
pub mod display;

/// Cross-layer event envelopes
pub mod envelope;

/// Coordinator, stage, and subscription identifiers
pub mod identifiers;

/// Reference-counted overlay signaling
pub mod overlay;

pub use channel::{EventChannel, Subscription, SubscriptionSet};
pub use display::{
    resolve_dismissal, resolve_transition, AttachmentContext, Decoration, DismissalPlan,
    DisplayMode, DisplayOptions, ModalStyle, NavBarPolicy, NoopReason, TransitionPlan,
    TransitionStep,
};
pub use identifiers::{CoordinatorId, StageId, SubscriptionId};
pub use overlay::{OverlayCounter, OverlayRequest, OverlaySignal};
