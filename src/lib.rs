//! Scope plots crate root: re-exports and module wiring.
//!
//! Headless core of a multi-signal scope viewer. The crate is split into:
//! - `data`: signals, region indexing, X-Y correlation, timeshift and
//!   transform caches, background statistics and the `ScopeModel`
//! - `expr`: the expression language used by transforms and reference
//!   geometry
//! - `events`: typed change notifications
//! - `views`: time plot, X-Y plot and signals table frames
//! - `session`: the coordinator that routes model events to views
//! - `persistence`: JSON save/load of scope state
//! - `config`: session settings

pub mod config;
pub mod data;
pub mod events;
pub mod expr;
pub mod persistence;
pub mod session;
pub mod views;

// Public re-exports for a compact external API
pub use config::ScopeConfig;
pub use data::correlate::{correlate_in_region, get_correlated_indices, CorrelatedIndices};
pub use data::model::{ScopeModel, SignalView};
pub use data::region::{indices_of_region, Region};
pub use data::signals::{DataError, DataItem, DataItems, DataSet, PlotKind, Signal, SignalValues};
pub use data::stats::{compute_stats, SignalStats, StatKind};
pub use data::transform::TransformError;
pub use events::{ChangeKind, EventBus, EventFilter, ModelEvent};
pub use expr::{ExprError, Expression};
pub use persistence::{LoadReport, PersistError, ScopeStateSerde};
pub use session::ScopeSession;
pub use views::{SignalsTable, TimePlotView, View, ViewState, XyError, XyPlotView};
