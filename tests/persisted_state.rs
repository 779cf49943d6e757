use egui::Color32;
use scope_plots::persistence::state_from_json;
use scope_plots::{DataItems, DataSet, LoadReport, PersistError, ScopeConfig, ScopeSession, Signal};

fn session() -> ScopeSession {
    let ts = vec![0.0, 1.0, 2.0, 3.0];
    let ds = DataSet::new()
        .with("x", Signal::numeric("x", ts.clone(), vec![0.0, 1.0, 0.0, -1.0]).unwrap())
        .with("y", Signal::numeric("y", ts, vec![1.0, 0.0, -1.0, 0.0]).unwrap());
    let mut s = ScopeSession::new(ScopeConfig {
        stats_worker: false,
        ..ScopeConfig::default()
    });
    s.set_data_items(DataItems::for_data(&ds).iter().cloned().collect());
    s.set_data(ds);
    s
}

#[test]
fn partial_load_applies_valid_entries() {
    let mut s = session();
    let state = state_from_json(
        r##"{
            "signals": {
                "x": {"timeshift": 0.5, "color": "#102030"},
                "y": {"transform": 12}
            },
            "region": [1.0, 2.0],
            "xy_pairings": [["x", "y"], "x"],
            "ref_geo": ["axvline(1)"]
        }"##,
    )
    .unwrap();
    let report = s.load_state(&state).unwrap();
    assert_eq!(report, LoadReport { applied: 4, skipped: 2, deferred: 0 });

    assert_eq!(s.model().timeshift("x"), 0.5);
    assert_eq!(s.model().items().get("x").unwrap().color, Color32::from_rgb(0x10, 0x20, 0x30));
    assert_eq!(s.model().transform_source("y"), None);
    assert_eq!(s.model().region().as_option(), Some((1.0, 2.0)));
    assert_eq!(s.model().xy_pairings().len(), 1);
    assert_eq!(s.model().ref_geo().len(), 1);

    // views saw the loaded state
    assert_eq!(s.time_plot().trace("x").unwrap().timestamps[0], 0.5);
    assert_eq!(s.time_plot().frame().region, Some((1.0, 2.0)));
}

#[test]
fn state_file_round_trip() {
    let mut s = session();
    s.set_transform("y", "x * -1").unwrap();
    s.set_hidden(&["x".to_string()], true);
    s.set_region(Some((0.0, 2.0)));
    s.create_xy(&["x".to_string(), "y".to_string()]).unwrap();

    let path = std::env::temp_dir().join(format!("scope-plots-state-{}.json", std::process::id()));
    s.save_state_to_path(&path).unwrap();

    let mut restored = session();
    let report = restored.load_state_from_path(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(report.skipped, 0);
    assert_eq!(restored.save_state(), s.save_state());
    assert!(restored.model().is_hidden("x"));
    assert_eq!(restored.table().cell("y", "Transform"), Some("x * -1"));
}

#[test]
fn saved_state_has_concrete_values() {
    let s = session();
    let json: serde_json::Value = serde_json::from_str(&s.save_state_json().unwrap()).unwrap();
    assert_eq!(json["region"], "auto");
    assert_eq!(json["signals"]["x"]["timeshift"], 0.0);
    assert_eq!(json["signals"]["x"]["transform"], "");
    assert_eq!(json["signals"]["x"]["hidden"], false);
    assert!(json["signals"]["x"]["color"].as_str().unwrap().starts_with('#'));
    assert_eq!(json["xy_pairings"], serde_json::json!([]));
}

#[test]
fn missing_file_is_an_error() {
    let mut s = session();
    let path = std::env::temp_dir().join("scope-plots-definitely-missing.json");
    assert!(matches!(s.load_state_from_path(&path), Err(PersistError::Io(_))));
}
