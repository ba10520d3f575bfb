//! # Display-Mode State Machine
//!
//! Pure decision logic mapping a requested display mode plus options to a
//! transition recipe. Nothing here touches a real container; the rendering
//! collaborator executes the returned plan.
//!
//! The resolver enforces the attachment policies that prevent presentation
//! races: modal re-presentation is refused, a push into an empty container
//! becomes a set-root, and a stage is never left duplicated inside a
//! navigation stack or tab list. Dismissal is always the inverse of how the
//! stage was attached.

use crate::identifiers::StageId;
use serde::{Deserialize, Serialize};

// ============================================================================
// Display modes and options
// ============================================================================

/// How a stage is attached to the visual hierarchy.
///
/// A pure value; it carries no mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    /// No attachment; the stage is driven headless.
    None,
    /// Slide-in drawer.
    Drawer {
        /// Animate the open/close transition.
        animated: bool,
    },
    /// Platform-default modal presentation.
    Modal,
    /// Modal over the current context only.
    ModalCurrentContext,
    /// Form-sheet modal.
    ModalFormSheet,
    /// Full-screen modal.
    ModalFullScreen,
    /// Page-sheet modal.
    ModalPageSheet,
    /// Popover modal.
    ModalPopover,
    /// Push onto the active navigation stack.
    NavPush {
        /// Animate the push.
        animated: bool,
    },
    /// Reset the navigation stack to this single stage.
    NavRoot {
        /// Animate the reset.
        animated: bool,
    },
    /// Replace only slot 0 of the navigation stack, preserving the rest.
    NavRootReplace,
    /// Insert into the tab container at `tab_index` (clamped to append).
    TabAdd {
        /// Animate the insertion.
        animated: bool,
        /// Requested slot in the tab list.
        tab_index: usize,
    },
}

impl DisplayMode {
    /// Whether this is one of the modal variants.
    #[must_use]
    pub fn is_modal(&self) -> bool {
        matches!(
            self,
            Self::Modal
                | Self::ModalCurrentContext
                | Self::ModalFormSheet
                | Self::ModalFullScreen
                | Self::ModalPageSheet
                | Self::ModalPopover
        )
    }

    /// Short label for diagnostics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Drawer { .. } => "drawer",
            Self::Modal => "modal",
            Self::ModalCurrentContext => "modal-current-context",
            Self::ModalFormSheet => "modal-form-sheet",
            Self::ModalFullScreen => "modal-full-screen",
            Self::ModalPageSheet => "modal-page-sheet",
            Self::ModalPopover => "modal-popover",
            Self::NavPush { .. } => "nav-push",
            Self::NavRoot { .. } => "nav-root",
            Self::NavRootReplace => "nav-root-replace",
            Self::TabAdd { .. } => "tab-add",
        }
    }
}

/// Concrete modal style for the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalStyle {
    /// Platform default.
    Default,
    /// Over current context.
    CurrentContext,
    /// Form sheet.
    FormSheet,
    /// Full screen.
    FullScreen,
    /// Page sheet.
    PageSheet,
    /// Popover.
    Popover,
}

/// Nav-bar visibility forcing, independent of the base mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NavBarPolicy {
    /// Leave whatever the container currently shows.
    #[default]
    Inherit,
    /// Force the bar hidden.
    Hidden,
    /// Force the bar shown.
    Shown,
}

/// Cross-cutting decorations layered on top of the base mode.
///
/// Options never assume a particular mode. Container-shaping options
/// (nav-bar forcing, nav-container wrapping) become pre-start steps;
/// stage-chrome options (the close affordance) become post-start steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayOptions {
    /// Nav-bar visibility forcing.
    pub nav_bar: NavBarPolicy,
    /// Add a "close" affordance to the presented stage.
    pub close_affordance: bool,
    /// Wrap the stage in its own navigation container before attaching.
    pub embed_in_nav_container: bool,
}

/// A decoration step derived from [`DisplayOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decoration {
    /// Force the nav bar hidden.
    ForceNavBarHidden,
    /// Force the nav bar shown.
    ForceNavBarShown,
    /// Wrap the stage in a fresh navigation container.
    WrapInNavContainer,
    /// Add a close affordance to the stage chrome.
    AddCloseAffordance,
}

// ============================================================================
// Attachment context
// ============================================================================

/// What the resolver needs to know about the current visual hierarchy and
/// the incoming stage. Supplied by the rendering collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentContext {
    /// Stages currently presented modally, outermost first.
    pub modal_stack: Vec<StageId>,
    /// Entries of the active navigation stack, root first.
    pub nav_stack: Vec<StageId>,
    /// Entries of the tab container, left to right.
    pub tabs: Vec<StageId>,
    /// Whether the current slot-0 navigation entry defines a tab item.
    pub root_defines_tab_item: bool,
    /// Whether the incoming stage defines its own tab item.
    pub stage_defines_tab_item: bool,
}

// ============================================================================
// Transition plans
// ============================================================================

/// Why a requested transition resolved to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoopReason {
    /// The stage is already presented modally; re-presenting would race.
    AlreadyPresentedModally,
    /// The stage is already the relevant stack entry.
    AlreadyInPlace,
    /// The mode requests no attachment at all.
    NoAttachment,
}

/// A single container operation the rendering collaborator must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionStep {
    /// Present modally with the given style.
    Present {
        /// Modal style.
        style: ModalStyle,
        /// Animate the presentation.
        animated: bool,
    },
    /// Open the drawer with the stage attached.
    OpenDrawer {
        /// Animate the open.
        animated: bool,
    },
    /// Remove the stage from the navigation stack at `index`.
    RemoveFromStack {
        /// Current position of the stage.
        index: usize,
    },
    /// Push onto the navigation stack.
    Push {
        /// Animate the push.
        animated: bool,
    },
    /// Drop every entry of the navigation stack.
    ClearStack,
    /// Install the stage as the navigation stack's sole root.
    SetStackRoot {
        /// Animate the install.
        animated: bool,
    },
    /// Swap only slot 0 of the navigation stack.
    ReplaceStackRoot {
        /// Carry the outgoing root's tab item onto the incoming stage.
        inherit_tab_item: bool,
    },
    /// Remove the stage from the tab container at `index`.
    RemoveTab {
        /// Current position of the stage.
        index: usize,
    },
    /// Insert the stage into the tab container at `index`.
    InsertTab {
        /// Insertion slot, already clamped to the container size.
        index: usize,
        /// Animate the insertion.
        animated: bool,
    },
}

/// The full recipe for attaching a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionPlan {
    /// Guard-rejected or nothing to do.
    Noop {
        /// Why nothing happens.
        reason: NoopReason,
    },
    /// Perform the attach.
    Perform {
        /// Decorations applied before the mode-specific steps.
        pre: Vec<Decoration>,
        /// Mode-specific container operations, in order.
        steps: Vec<TransitionStep>,
        /// Decorations applied after the mode-specific steps.
        post: Vec<Decoration>,
    },
}

impl TransitionPlan {
    /// Whether this plan performs any container operation.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop { .. })
    }

    fn perform(options: DisplayOptions, steps: Vec<TransitionStep>) -> Self {
        let mut pre = Vec::new();
        match options.nav_bar {
            NavBarPolicy::Inherit => {}
            NavBarPolicy::Hidden => pre.push(Decoration::ForceNavBarHidden),
            NavBarPolicy::Shown => pre.push(Decoration::ForceNavBarShown),
        }
        if options.embed_in_nav_container {
            pre.push(Decoration::WrapInNavContainer);
        }
        let mut post = Vec::new();
        if options.close_affordance {
            post.push(Decoration::AddCloseAffordance);
        }
        Self::Perform { pre, steps, post }
    }
}

/// The inverse recipe for detaching a stage, consistent with how it was
/// attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DismissalPlan {
    /// Dismiss the modal presentation.
    Dismiss {
        /// Animate the dismissal.
        animated: bool,
    },
    /// Pop the top navigation entry.
    Pop {
        /// Animate the pop.
        animated: bool,
    },
    /// Remove a non-top entry from the navigation stack.
    RemoveFromStack {
        /// Current position of the stage.
        index: usize,
    },
    /// Close the drawer.
    CloseDrawer {
        /// Animate the close.
        animated: bool,
    },
    /// Remove the stage from the tab container.
    RemoveTab {
        /// Current position of the stage.
        index: usize,
    },
    /// The stage holds no container slot; release it directly.
    Detach,
}

// ============================================================================
// Resolution
// ============================================================================

fn modal_style(mode: DisplayMode) -> ModalStyle {
    match mode {
        DisplayMode::ModalCurrentContext => ModalStyle::CurrentContext,
        DisplayMode::ModalFormSheet => ModalStyle::FormSheet,
        DisplayMode::ModalFullScreen => ModalStyle::FullScreen,
        DisplayMode::ModalPageSheet => ModalStyle::PageSheet,
        DisplayMode::ModalPopover => ModalStyle::Popover,
        _ => ModalStyle::Default,
    }
}

/// Resolve the attach recipe for `stage` under `mode` and `options`.
#[must_use]
pub fn resolve_transition(
    mode: DisplayMode,
    options: DisplayOptions,
    ctx: &AttachmentContext,
    stage: StageId,
) -> TransitionPlan {
    match mode {
        DisplayMode::None => TransitionPlan::Noop {
            reason: NoopReason::NoAttachment,
        },

        DisplayMode::Drawer { animated } => {
            TransitionPlan::perform(options, vec![TransitionStep::OpenDrawer { animated }])
        }

        DisplayMode::Modal
        | DisplayMode::ModalCurrentContext
        | DisplayMode::ModalFormSheet
        | DisplayMode::ModalFullScreen
        | DisplayMode::ModalPageSheet
        | DisplayMode::ModalPopover => {
            if ctx.modal_stack.contains(&stage) {
                return TransitionPlan::Noop {
                    reason: NoopReason::AlreadyPresentedModally,
                };
            }
            TransitionPlan::perform(
                options,
                vec![TransitionStep::Present {
                    style: modal_style(mode),
                    animated: true,
                }],
            )
        }

        DisplayMode::NavPush { animated } => {
            if ctx.nav_stack.is_empty() {
                return TransitionPlan::perform(
                    options,
                    vec![TransitionStep::SetStackRoot { animated }],
                );
            }
            if ctx.nav_stack.last() == Some(&stage) {
                return TransitionPlan::Noop {
                    reason: NoopReason::AlreadyInPlace,
                };
            }
            let mut steps = Vec::new();
            if let Some(index) = ctx.nav_stack.iter().position(|s| *s == stage) {
                steps.push(TransitionStep::RemoveFromStack { index });
            }
            steps.push(TransitionStep::Push { animated });
            TransitionPlan::perform(options, steps)
        }

        DisplayMode::NavRoot { animated } => {
            if ctx.nav_stack.as_slice() == [stage] {
                return TransitionPlan::Noop {
                    reason: NoopReason::AlreadyInPlace,
                };
            }
            let mut steps = Vec::new();
            if !ctx.nav_stack.is_empty() {
                steps.push(TransitionStep::ClearStack);
            }
            steps.push(TransitionStep::SetStackRoot { animated });
            TransitionPlan::perform(options, steps)
        }

        DisplayMode::NavRootReplace => {
            if ctx.nav_stack.first() == Some(&stage) {
                return TransitionPlan::Noop {
                    reason: NoopReason::AlreadyInPlace,
                };
            }
            if ctx.nav_stack.is_empty() {
                return TransitionPlan::perform(
                    options,
                    vec![TransitionStep::SetStackRoot { animated: false }],
                );
            }
            let mut steps = Vec::new();
            if let Some(index) = ctx.nav_stack.iter().position(|s| *s == stage) {
                // Can only be a non-zero slot here.
                steps.push(TransitionStep::RemoveFromStack { index });
            }
            steps.push(TransitionStep::ReplaceStackRoot {
                inherit_tab_item: ctx.root_defines_tab_item && !ctx.stage_defines_tab_item,
            });
            TransitionPlan::perform(options, steps)
        }

        DisplayMode::TabAdd { animated, tab_index } => {
            let mut steps = Vec::new();
            let mut len = ctx.tabs.len();
            if let Some(index) = ctx.tabs.iter().position(|s| *s == stage) {
                steps.push(TransitionStep::RemoveTab { index });
                len -= 1;
            }
            steps.push(TransitionStep::InsertTab {
                index: tab_index.min(len),
                animated,
            });
            TransitionPlan::perform(options, steps)
        }
    }
}

/// Resolve the detach recipe for a stage that was attached with `mode`.
#[must_use]
pub fn resolve_dismissal(
    mode: DisplayMode,
    ctx: &AttachmentContext,
    stage: StageId,
) -> DismissalPlan {
    match mode {
        DisplayMode::None => DismissalPlan::Detach,

        DisplayMode::Drawer { animated } => DismissalPlan::CloseDrawer { animated },

        DisplayMode::Modal
        | DisplayMode::ModalCurrentContext
        | DisplayMode::ModalFormSheet
        | DisplayMode::ModalFullScreen
        | DisplayMode::ModalPageSheet
        | DisplayMode::ModalPopover => DismissalPlan::Dismiss { animated: true },

        DisplayMode::NavPush { animated } => {
            if ctx.nav_stack.last() == Some(&stage) {
                DismissalPlan::Pop { animated }
            } else if let Some(index) = ctx.nav_stack.iter().position(|s| *s == stage) {
                DismissalPlan::RemoveFromStack { index }
            } else {
                DismissalPlan::Detach
            }
        }

        DisplayMode::NavRoot { .. } | DisplayMode::NavRootReplace => {
            match ctx.nav_stack.iter().position(|s| *s == stage) {
                Some(index) => DismissalPlan::RemoveFromStack { index },
                None => DismissalPlan::Detach,
            }
        }

        DisplayMode::TabAdd { .. } => match ctx.tabs.iter().position(|s| *s == stage) {
            Some(index) => DismissalPlan::RemoveTab { index },
            None => DismissalPlan::Detach,
        },
    }
}
