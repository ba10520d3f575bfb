//! # Scena Engine
//!
//! The stage lifecycle coordination engine: a hierarchical coordinator state
//! machine, the per-stage configurator lifecycle, and the three-layer event
//! pipeline that carries a stage's traffic from display requests through
//! business decisions to presentable view models.
//!
//! The engine is headless and platform-free. The rendering collaborator
//! executes the transition plans the engine resolves and reports lifecycle
//! notifications and transition completion back; everything in between is
//! deterministic, synchronous state machinery:
//!
//! - [`coordinator`] — the flow hierarchy as an id-addressed arena, flow
//!   start/stop/cancel with one-shot completions, stage launching, and
//!   single-timeline outcome dispatch.
//! - [`configurator`] — one stage's pipeline graph and its guarded
//!   end-once-per-run lifecycle.
//! - [`pipeline`] — the business and presentation layers and the typed
//!   channel sets connecting them.
//! - [`router`] — exclusive intent-to-handler routing for stage outcomes.
//! - [`settle`] — deferred continuations keyed to display transitions,
//!   replacing fixed settle delays with an explicit completion signal.
//! - [`analytics`] — the fire-and-forget recording capability injected into
//!   every layer.

pub mod analytics;
pub mod configurator;
pub mod coordinator;
pub mod errors;
pub mod pipeline;
pub mod router;
pub mod settle;

pub use analytics::{Analytics, NoopAnalytics};
pub use configurator::{Configurator, DisplayHandle, OutcomeSink, StageOutcome};
pub use coordinator::{Completion, CoordinatorTree, FlowOutcome, RunState};
pub use errors::EngineError;
pub use pipeline::{
    BusinessCore, InertBehavior, PresentationCore, PresentationStyle, RequestChannels,
    ResponseChannels, StageBehavior, StagePipeline, ViewModelChannels,
};
pub use router::{Routed, StageActions};
pub use settle::SettleQueue;
