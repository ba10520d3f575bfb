//! # Overlay Signaling
//!
//! Reference-counted show/hide accounting for busy spinners and
//! disabled-view overlays. Several call sites may request the overlay
//! concurrently; only the 0→1 and 1→0 transitions are observable.

use serde::{Deserialize, Serialize};

/// A request to change overlay visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRequest {
    /// True to request the overlay shown, false to release one request.
    pub visible: bool,
    /// Clamp the running count to exactly 1 before applying the delta.
    ///
    /// Used to recover an overlay whose owning stage was abandoned
    /// mid-count: a forced hide always lands at 0.
    pub force_reset: bool,
}

impl OverlayRequest {
    /// Plain show request.
    #[must_use]
    pub fn show() -> Self {
        Self {
            visible: true,
            force_reset: false,
        }
    }

    /// Plain hide request.
    #[must_use]
    pub fn hide() -> Self {
        Self {
            visible: false,
            force_reset: false,
        }
    }

    /// Hide request that first clamps the count to 1.
    #[must_use]
    pub fn force_hide() -> Self {
        Self {
            visible: false,
            force_reset: true,
        }
    }
}

/// Observable overlay transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlaySignal {
    /// The running count moved 0→1.
    BecameVisible,
    /// The running count moved 1→0.
    BecameHidden,
}

/// Running show/hide counter.
///
/// Invariant: [`OverlaySignal::BecameVisible`] is produced iff the count
/// transitions 0→1 and [`OverlaySignal::BecameHidden`] iff it transitions
/// 1→0. Intermediate increments and decrements are silent, and a hide at 0
/// clamps without underflow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OverlayCounter {
    count: u32,
}

impl OverlayCounter {
    /// Create a counter at 0 (hidden).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current running count.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether the overlay is currently visible (count > 0).
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.count > 0
    }

    /// Register one show request.
    pub fn show(&mut self) -> Option<OverlaySignal> {
        self.apply(OverlayRequest::show())
    }

    /// Release one show request.
    pub fn hide(&mut self) -> Option<OverlaySignal> {
        self.apply(OverlayRequest::hide())
    }

    /// Apply a request, returning the transition it produced, if any.
    pub fn apply(&mut self, request: OverlayRequest) -> Option<OverlaySignal> {
        if request.force_reset {
            self.count = 1;
        }
        if request.visible {
            self.count += 1;
            (self.count == 1).then_some(OverlaySignal::BecameVisible)
        } else {
            match self.count {
                0 => None,
                1 => {
                    self.count = 0;
                    Some(OverlaySignal::BecameHidden)
                }
                _ => {
                    self.count -= 1;
                    None
                }
            }
        }
    }
}
