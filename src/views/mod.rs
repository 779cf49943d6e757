//! Views derive render-ready frames from the model and react to the change
//! categories they depend on.

pub mod table;
pub mod time_plot;
pub mod xy_plot;

use crate::data::model::ScopeModel;
use crate::events::{ChangeKind, ModelEvent};

pub use table::{ColumnContributor, RowContext, RowFilter, SignalsTable, TableRow};
pub use time_plot::{TimePlotFrame, TimePlotView, Trace};
pub use xy_plot::{XyCurve, XyError, XyFrame, XyPlotView};

/// Lifecycle of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Uninitialized,
    /// Display items are known but there is no data yet.
    HasMetadataOnly,
    /// Data is present but nothing has been rendered.
    HasData,
    /// A frame has been produced; re-entered on every relevant change.
    Rendering,
}

impl ViewState {
    /// State before rendering, from what the model holds.
    pub fn of_model(model: &ScopeModel) -> Self {
        match (model.items().is_empty(), model.data().is_empty()) {
            (true, true) => ViewState::Uninitialized,
            (false, true) => ViewState::HasMetadataOnly,
            (_, false) => ViewState::HasData,
        }
    }
}

pub trait View {
    fn name(&self) -> &str;

    /// Change categories this view reacts to.
    fn interests(&self) -> ChangeKind;

    fn state(&self) -> ViewState;

    /// Called synchronously, after derived data is refreshed, for every
    /// event intersecting [`interests`](Self::interests).
    fn on_change(&mut self, event: &ModelEvent, model: &ScopeModel);
}
