//! Signals table: one row per signal, columns supplied by contributors.

use std::collections::HashSet;

use egui::Color32;
use tracing::debug;

use super::{View, ViewState};
use crate::data::model::ScopeModel;
use crate::data::signals::{ArrayId, DataItem, PlotKind, Samples};
use crate::data::stats::{SignalStats, StatKind, StatsComputer, StatsItem};
use crate::events::{ChangeKind, ModelEvent};

/// What a column sees of one row.
pub struct RowContext<'a> {
    pub item: &'a DataItem,
    pub model: &'a ScopeModel,
    /// Statistics over the current region, once computed.
    pub stats: Option<&'a SignalStats>,
}

/// A group of table columns.
pub trait ColumnContributor {
    fn headers(&self) -> Vec<String>;

    /// Changes that alter this contributor's cells.
    fn interests(&self) -> ChangeKind;

    /// One cell per header.
    fn cells(&self, row: &RowContext<'_>) -> Vec<String>;
}

pub struct VisibilityColumn;

impl ColumnContributor for VisibilityColumn {
    fn headers(&self) -> Vec<String> {
        vec!["Visible".into()]
    }

    fn interests(&self) -> ChangeKind {
        ChangeKind::VISIBILITY | ChangeKind::DATA_ITEMS
    }

    fn cells(&self, row: &RowContext<'_>) -> Vec<String> {
        let cell = match row.item.kind {
            PlotKind::Enum => "",
            PlotKind::Default if row.model.is_hidden(&row.item.name) => "no",
            PlotKind::Default => "yes",
        };
        vec![cell.into()]
    }
}

pub struct NameColumn;

impl ColumnContributor for NameColumn {
    fn headers(&self) -> Vec<String> {
        vec!["Name".into()]
    }

    fn interests(&self) -> ChangeKind {
        ChangeKind::DATA_ITEMS
    }

    fn cells(&self, row: &RowContext<'_>) -> Vec<String> {
        vec![row.item.name.clone()]
    }
}

pub struct StatsColumns {
    pub precision: usize,
}

impl ColumnContributor for StatsColumns {
    fn headers(&self) -> Vec<String> {
        StatKind::ALL.iter().map(|k| k.label().to_string()).collect()
    }

    fn interests(&self) -> ChangeKind {
        ChangeKind::DATA | ChangeKind::REGION | ChangeKind::TRANSFORMS
    }

    fn cells(&self, row: &RowContext<'_>) -> Vec<String> {
        StatKind::ALL
            .iter()
            .map(|k| k.format(row.stats, self.precision))
            .collect()
    }
}

pub struct TimeshiftColumn;

impl ColumnContributor for TimeshiftColumn {
    fn headers(&self) -> Vec<String> {
        vec!["Timeshift".into()]
    }

    fn interests(&self) -> ChangeKind {
        ChangeKind::TIMESHIFT
    }

    fn cells(&self, row: &RowContext<'_>) -> Vec<String> {
        let offset = row.model.timeshift(&row.item.name);
        if offset == 0.0 {
            vec![String::new()]
        } else {
            vec![format!("{offset}")]
        }
    }
}

/// The transform source, followed by its error when evaluation failed.
pub struct TransformColumn;

impl ColumnContributor for TransformColumn {
    fn headers(&self) -> Vec<String> {
        vec!["Transform".into()]
    }

    fn interests(&self) -> ChangeKind {
        ChangeKind::TRANSFORM | ChangeKind::DATA
    }

    fn cells(&self, row: &RowContext<'_>) -> Vec<String> {
        let name = &row.item.name;
        let source = row.model.transform_source(name).unwrap_or("");
        let cell = match row.model.transform_error(name) {
            Some(err) => format!("{source}  [{err}]"),
            None => source.to_string(),
        };
        vec![cell]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub name: String,
    pub color: Color32,
    pub cells: Vec<String>,
}

/// Rows whose name contains the filter text, in scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    pub text: String,
    /// Row indices, starting at the scan start and wrapping around.
    pub matches: Vec<usize>,
}

pub struct SignalsTable {
    state: ViewState,
    columns: Vec<Box<dyn ColumnContributor>>,
    rows: Vec<TableRow>,
    filter: Option<RowFilter>,
    stats: StatsComputer,
}

impl SignalsTable {
    /// A table with the standard columns: visibility, name, statistics,
    /// timeshift and transform.
    pub fn new(precision: usize, background_stats: bool) -> Self {
        Self::with_columns(
            vec![
                Box::new(VisibilityColumn),
                Box::new(NameColumn),
                Box::new(StatsColumns { precision }),
                Box::new(TimeshiftColumn),
                Box::new(TransformColumn),
            ],
            background_stats,
        )
    }

    pub fn with_columns(columns: Vec<Box<dyn ColumnContributor>>, background_stats: bool) -> Self {
        Self {
            state: ViewState::default(),
            columns,
            rows: Vec::new(),
            filter: None,
            stats: StatsComputer::new(background_stats),
        }
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().flat_map(|c| c.headers()).collect()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// The cell of `signal` under `header`.
    pub fn cell(&self, signal: &str, header: &str) -> Option<&str> {
        let col = self.headers().iter().position(|h| h == header)?;
        let row = self.rows.iter().find(|r| r.name == signal)?;
        row.cells.get(col).map(String::as_str)
    }

    /// Filter rows by a case-insensitive substring of the signal name,
    /// scanning from `start_row` (usually the last selected row) and wrapping
    /// around. Returns the number of matching rows. Empty text clears the
    /// filter and returns 0.
    pub fn apply_filter(&mut self, text: &str, start_row: usize) -> usize {
        if text.is_empty() {
            self.filter = None;
            return 0;
        }
        let needle = text.to_lowercase();
        let n = self.rows.len();
        let start = if n == 0 { 0 } else { start_row % n };
        let matches: Vec<usize> = (start..n)
            .chain(0..start)
            .filter(|&i| self.rows[i].name.to_lowercase().contains(&needle))
            .collect();
        let count = matches.len();
        debug!(text, count, "row filter applied");
        self.filter = Some(RowFilter {
            text: text.to_string(),
            matches,
        });
        count
    }

    pub fn filter(&self) -> Option<&RowFilter> {
        self.filter.as_ref()
    }

    /// Rows passing the filter in scan order, or every row when unfiltered.
    pub fn visible_rows(&self) -> Vec<&TableRow> {
        match &self.filter {
            Some(f) => f.matches.iter().filter_map(|&i| self.rows.get(i)).collect(),
            None => self.rows.iter().collect(),
        }
    }

    pub fn stats(&self) -> &StatsComputer {
        &self.stats
    }

    fn request_stats(&mut self, model: &ScopeModel) {
        let items = model
            .items()
            .iter()
            .filter_map(|item| {
                let view = model.view(&item.name)?;
                let values = view.values.as_numeric()?.clone();
                Some(StatsItem {
                    values,
                    timestamps: view.timestamps,
                })
            })
            .collect::<Vec<_>>();
        let live: HashSet<ArrayId> = items.iter().map(|i| i.values.id()).collect();
        self.stats.retain_sources(&live);
        self.stats.set_generation(model.generation());
        self.stats.request(items, model.region(), model.generation());
    }

    fn stats_of<'a>(stats: &'a StatsComputer, model: &ScopeModel, name: &str) -> Option<&'a SignalStats> {
        let view = model.view(name)?;
        let values: &Samples<f64> = view.values.as_numeric()?;
        stats.stats_for(values, &view.timestamps)?.as_ref()
    }

    fn rebuild_rows(&mut self, model: &ScopeModel) {
        let mut rows = Vec::with_capacity(model.items().len());
        for item in model.items().iter() {
            let ctx = RowContext {
                item,
                model,
                stats: Self::stats_of(&self.stats, model, &item.name),
            };
            rows.push(TableRow {
                name: item.name.clone(),
                color: item.color,
                cells: self.columns.iter().flat_map(|c| c.cells(&ctx)).collect(),
            });
        }
        self.rows = rows;
    }

    /// Pick up finished statistics. Returns whether any row changed.
    pub fn poll_stats(&mut self, model: &ScopeModel) -> bool {
        let completed = self.stats.poll();
        if completed.is_empty() {
            return false;
        }
        debug!(count = completed.len(), "stats completed");
        self.rebuild_rows(model);
        true
    }
}

impl View for SignalsTable {
    fn name(&self) -> &str {
        "Signals"
    }

    fn interests(&self) -> ChangeKind {
        self.columns
            .iter()
            .fold(ChangeKind::METADATA, |acc, c| acc | c.interests())
    }

    fn state(&self) -> ViewState {
        self.state
    }

    fn on_change(&mut self, event: &ModelEvent, model: &ScopeModel) {
        if event
            .kinds
            .intersects(ChangeKind::DATA | ChangeKind::TRANSFORMS | ChangeKind::REGION)
        {
            self.request_stats(model);
            self.stats.poll();
        }
        if event.kinds.intersects(ChangeKind::DATA_ITEMS) {
            // row set regenerated
            self.filter = None;
        }
        self.rebuild_rows(model);
        self.state = match ViewState::of_model(model) {
            ViewState::HasData => ViewState::Rendering,
            other => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::signals::{DataItems, DataSet, Signal};

    fn table_of(names: &[&str]) -> (SignalsTable, ScopeModel) {
        let mut ds = DataSet::new();
        for name in names {
            ds.insert(*name, Signal::numeric(name, vec![0.0, 1.0], vec![1.0, 2.0]).unwrap());
        }
        let mut model = ScopeModel::default();
        model.set_data_items(DataItems::for_data(&ds).iter().cloned().collect());
        model.set_data(ds);
        model.refresh();
        let mut table = SignalsTable::new(3, false);
        table.on_change(&ModelEvent::new(ChangeKind::ALL), &model);
        (table, model)
    }

    fn matched(table: &SignalsTable) -> Vec<&str> {
        table.visible_rows().iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn filter_counts_case_insensitive_matches() {
        let (mut table, _) = table_of(&["Alpha", "beta", "gamma", "alphabet"]);
        assert_eq!(table.apply_filter("alpha", 0), 2);
        assert_eq!(matched(&table), vec!["Alpha", "alphabet"]);
        assert_eq!(table.apply_filter("zeta", 0), 0);
        assert!(table.visible_rows().is_empty());
    }

    #[test]
    fn filter_scans_from_start_row_and_wraps() {
        let (mut table, _) = table_of(&["a1", "b", "a2", "a3"]);
        assert_eq!(table.apply_filter("a", 2), 3);
        assert_eq!(table.filter().unwrap().matches, vec![2, 3, 0]);
        assert_eq!(matched(&table), vec!["a2", "a3", "a1"]);
        assert_eq!(table.apply_filter("a", 6), 3);
        assert_eq!(table.filter().unwrap().matches, vec![2, 3, 0]);
    }

    #[test]
    fn empty_text_clears_filter() {
        let (mut table, model) = table_of(&["a", "b"]);
        table.apply_filter("a", 0);
        assert_eq!(table.visible_rows().len(), 1);
        assert_eq!(table.apply_filter("", 0), 0);
        assert!(table.filter().is_none());
        assert_eq!(table.visible_rows().len(), 2);

        table.apply_filter("b", 0);
        table.on_change(&ModelEvent::new(ChangeKind::DATA_ITEMS), &model);
        assert!(table.filter().is_none());
    }
}
