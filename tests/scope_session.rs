use std::cell::Cell;
use std::rc::Rc;

use egui::Color32;
use scope_plots::expr::Shape;
use scope_plots::{
    ChangeKind, DataItems, DataSet, ModelEvent, ScopeConfig, ScopeModel, ScopeSession, Signal, View, ViewState,
    XyError,
};

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn data() -> DataSet {
    let ts = vec![0.0, 1.0, 2.0, 3.0, 4.0];
    DataSet::new()
        .with("a", Signal::numeric("a", ts.clone(), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap())
        .with("b", Signal::numeric("b", ts, vec![2.0, 4.0, 6.0, 8.0, 10.0]).unwrap())
        .with("c", Signal::numeric("c", vec![0.3, 1.7, 2.2], vec![0.0, 1.0, 0.0]).unwrap())
}

fn session() -> ScopeSession {
    let mut s = ScopeSession::new(ScopeConfig {
        stats_worker: false,
        ..ScopeConfig::default()
    });
    let ds = data();
    s.set_data_items(DataItems::for_data(&ds).iter().cloned().collect());
    s.set_data(ds);
    s
}

#[test]
fn color_change_restyles_without_rebuilding() {
    let mut s = session();
    let (rebuilds, restyles, _) = s.time_plot().update_counts();
    s.set_color(&names(&["a"]), Color32::from_rgb(10, 20, 30));
    assert_eq!(s.time_plot().update_counts().0, rebuilds);
    assert_eq!(s.time_plot().update_counts().1, restyles + 1);
    assert_eq!(s.time_plot().trace("a").unwrap().color, Color32::from_rgb(10, 20, 30));
    assert_eq!(s.table().rows()[0].color, Color32::from_rgb(10, 20, 30));
}

#[test]
fn region_updates_overlay_and_statistics() {
    let mut s = session();
    assert_eq!(s.table().cell("b", "Max"), Some("10.000"));
    let (rebuilds, _, regions) = s.time_plot().update_counts();

    assert!(s.set_region(Some((1.0, 3.0))));
    assert_eq!(s.time_plot().frame().region, Some((1.0, 3.0)));
    assert_eq!(s.time_plot().update_counts().0, rebuilds);
    assert_eq!(s.time_plot().update_counts().2, regions + 1);
    assert_eq!(s.table().cell("b", "Max"), Some("8.000"));
    assert_eq!(s.table().cell("b", "Min"), Some("4.000"));

    s.set_region(Some((10.0, 11.0)));
    assert_eq!(s.table().cell("b", "Max"), Some(""));
    s.set_region(None);
    assert_eq!(s.table().cell("b", "Max"), Some("10.000"));
}

#[test]
fn timeshift_and_transform_reach_plot_and_table() {
    let mut s = session();
    s.set_timeshift(&names(&["a"]), 1.0);
    s.set_transform("b", "x / 2").unwrap();
    assert_eq!(s.time_plot().trace("a").unwrap().timestamps[0], 1.0);
    let b = s.time_plot().trace("b").unwrap();
    assert_eq!(b.values.as_numeric().unwrap().as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(s.table().cell("a", "Timeshift"), Some("1"));
    assert_eq!(s.table().cell("b", "Transform"), Some("x / 2"));
    assert_eq!(s.table().cell("b", "Avg"), Some("3.000"));

    assert!(s.set_transform("b", "x +").is_err());
    assert_eq!(s.model().transform_source("b"), Some("x / 2"));
}

#[test]
fn failed_transform_is_shown_inline_and_omitted_from_plot() {
    let mut s = session();
    s.set_transform("a", "x + data['nope']").unwrap();
    assert!(s.time_plot().trace("a").is_none());
    assert!(s.time_plot().trace("b").is_some());
    assert_eq!(
        s.table().cell("a", "Transform"),
        Some("x + data['nope']  [no data for 'nope']")
    );
    assert_eq!(s.table().cell("a", "Avg"), Some(""));
}

#[test]
fn hidden_signals_stay_in_frame() {
    let mut s = session();
    s.set_hidden(&names(&["a"]), true);
    assert!(!s.time_plot().trace("a").unwrap().visible);
    assert_eq!(s.table().cell("a", "Visible"), Some("no"));
    assert_eq!(s.table().cell("b", "Visible"), Some("yes"));
}

#[test]
fn xy_plot_correlates_and_restyles() {
    let mut s = session();
    assert_eq!(s.create_xy(&names(&["a", "b", "c"])), Err(XyError::SelectionCount(3)));
    s.create_xy(&names(&["a", "b"])).unwrap();
    let xy = s.xy_plot().unwrap();
    assert_eq!(xy.frame().curves[0].indices, ((0, 5), (0, 5)));
    let correlations = xy.correlation_count();

    s.set_color(&names(&["b"]), Color32::RED);
    let xy = s.xy_plot().unwrap();
    assert_eq!(xy.correlation_count(), correlations);
    assert_eq!(xy.frame().curves[0].color, Color32::RED);

    s.set_region(Some((1.0, 3.0)));
    let xy = s.xy_plot().unwrap();
    assert_eq!(xy.correlation_count(), correlations + 1);
    assert_eq!(xy.frame().curves[0].indices, ((1, 4), (1, 4)));
}

#[test]
fn uncorrelated_pairing_gives_diagnostic_and_others_render() {
    let mut s = session();
    s.create_xy(&names(&["a", "c"])).unwrap();
    s.add_xy_pairing("a", "b");
    let frame = s.xy_plot().unwrap().frame();
    assert_eq!(frame.curves.len(), 1);
    assert_eq!(frame.curves[0].y_name, "b");
    assert_eq!(frame.diagnostics, vec!["X/Y indices of a, c empty or do not match".to_string()]);
}

#[test]
fn reference_geometry_is_drawn_and_errors_are_kept() {
    let mut s = session();
    s.create_xy(&names(&["a", "b"])).unwrap();
    s.set_ref_geometry(None, "axvline(2)", None, None).unwrap();
    s.set_ref_geometry(None, "axhline(max(data['b']))  # b peak", None, None).unwrap();
    s.set_ref_geometry(None, "data['nope']", None, None).unwrap();

    let geo = &s.xy_plot().unwrap().frame().ref_geo;
    assert_eq!(geo.len(), 3);
    assert_eq!(geo[0].shapes, Ok(vec![Shape::VLine(2.0)]));
    assert_eq!(geo[1].shapes, Ok(vec![Shape::HLine(10.0)]));
    assert_eq!(geo[1].label, "b peak");
    assert!(geo[2].error_text().unwrap().starts_with("NoData: "));

    s.set_ref_geometry(Some(2), "", None, None).unwrap();
    s.set_ref_geometry(Some(0), "axvline(2)", None, Some(true)).unwrap();
    assert_eq!(s.xy_plot().unwrap().frame().ref_geo.len(), 1);
}

#[test]
fn removed_signals_leave_pairings_until_pruned() {
    let mut s = session();
    s.create_xy(&names(&["a", "b"])).unwrap();
    s.remove_signals(&names(&["b"]));
    assert!(s.time_plot().trace("b").is_none());
    assert_eq!(s.table().rows().len(), 2);
    assert_eq!(s.model().xy_pairings().len(), 1);
    assert!(s.xy_plot().unwrap().frame().curves.is_empty());
    assert_eq!(s.prune_xy_pairings("b"), 1);
    assert!(s.model().xy_pairings().is_empty());
}

struct RegionCounter {
    hits: Rc<Cell<usize>>,
    state: ViewState,
}

impl View for RegionCounter {
    fn name(&self) -> &str {
        "region counter"
    }

    fn interests(&self) -> ChangeKind {
        ChangeKind::REGION
    }

    fn state(&self) -> ViewState {
        self.state
    }

    fn on_change(&mut self, _event: &ModelEvent, model: &ScopeModel) {
        self.hits.set(self.hits.get() + 1);
        self.state = ViewState::of_model(model);
    }
}

#[test]
fn extra_views_receive_only_their_interests() {
    let mut s = session();
    let hits = Rc::new(Cell::new(0));
    s.add_view(Box::new(RegionCounter {
        hits: hits.clone(),
        state: ViewState::Uninitialized,
    }));
    assert_eq!(hits.get(), 1);

    s.set_color(&names(&["a"]), Color32::BLUE);
    s.set_timeshift(&names(&["a"]), 0.5);
    assert_eq!(hits.get(), 1);

    s.set_region(Some((0.0, 1.0)));
    assert_eq!(hits.get(), 2);
    assert_eq!(s.views().count(), 3);
    assert!(s.views().any(|v| v.name() == "region counter" && v.state() == ViewState::HasData));
}
