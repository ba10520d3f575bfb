//! # Intent Routing
//!
//! Maps a stage outcome's intent onto exactly one registered handler. The
//! categories are mutually exclusive: an empty intent goes to the blank
//! handler, a named intent goes to its matching handler, and anything else
//! goes to the fallback. At most one handler runs per outcome.
//!
//! Handlers receive the coordinator tree mutably, so a routed intent may
//! launch follow-up stages or terminate flows directly.

use crate::configurator::StageOutcome;
use crate::coordinator::CoordinatorTree;

/// A routed intent handler.
pub type IntentHandler = Box<dyn FnMut(&mut CoordinatorTree, &StageOutcome) + Send>;

/// Which category handled an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// A named handler matched the intent.
    Intent,
    /// The intent was empty and the blank handler ran.
    Blank,
    /// No named handler matched and the fallback ran.
    Fallback,
    /// No handler in the applicable category was registered.
    Unhandled,
}

/// The handler table registered when a stage is launched.
#[derive(Default)]
pub struct StageActions {
    handlers: Vec<(String, IntentHandler)>,
    blank: Option<IntentHandler>,
    fallback: Option<IntentHandler>,
}

impl StageActions {
    /// Empty table; every outcome routes to [`Routed::Unhandled`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a named intent. First registration wins on
    /// duplicates.
    #[must_use]
    pub fn on<F>(mut self, intent: &str, handler: F) -> Self
    where
        F: FnMut(&mut CoordinatorTree, &StageOutcome) + Send + 'static,
    {
        self.handlers.push((intent.to_string(), Box::new(handler)));
        self
    }

    /// Register the handler for outcomes with an empty intent.
    #[must_use]
    pub fn on_blank<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut CoordinatorTree, &StageOutcome) + Send + 'static,
    {
        self.blank = Some(Box::new(handler));
        self
    }

    /// Register the handler for named intents nothing else matched.
    #[must_use]
    pub fn or_no_match<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut CoordinatorTree, &StageOutcome) + Send + 'static,
    {
        self.fallback = Some(Box::new(handler));
        self
    }

    /// Route `outcome` to exactly one handler.
    pub fn route(&mut self, tree: &mut CoordinatorTree, outcome: &StageOutcome) -> Routed {
        if outcome.intent.is_empty() {
            return match self.blank.as_mut() {
                Some(handler) => {
                    handler(tree, outcome);
                    Routed::Blank
                }
                None => {
                    tracing::debug!(coordinator = %outcome.coordinator, "blank intent unhandled");
                    Routed::Unhandled
                }
            };
        }
        if let Some((_, handler)) = self
            .handlers
            .iter_mut()
            .find(|(intent, _)| *intent == outcome.intent)
        {
            handler(tree, outcome);
            return Routed::Intent;
        }
        match self.fallback.as_mut() {
            Some(handler) => {
                handler(tree, outcome);
                Routed::Fallback
            }
            None => {
                tracing::debug!(
                    coordinator = %outcome.coordinator,
                    intent = %outcome.intent,
                    "intent unhandled"
                );
                Routed::Unhandled
            }
        }
    }
}

impl std::fmt::Debug for StageActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageActions")
            .field(
                "intents",
                &self.handlers.iter().map(|(i, _)| i).collect::<Vec<_>>(),
            )
            .field("blank", &self.blank.is_some())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
