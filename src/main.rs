//! Headless demo: feeds synthetic sine/cosine signals through a scope session
//! and logs the resulting table and X-Y frame.
//!
//! Run with `RUST_LOG=debug cargo run --bin scope-demo` for cache and
//! propagation details.

use std::time::{Duration, Instant};

use scope_plots::{DataItems, DataSet, ScopeConfig, ScopeSession, Signal};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const SAMPLES: usize = 2_000;
const SAMPLE_PERIOD: f64 = 0.005;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn synthetic_data() -> Result<DataSet, scope_plots::DataError> {
    let ts: Vec<f64> = (0..SAMPLES).map(|i| i as f64 * SAMPLE_PERIOD).collect();
    let sin: Vec<f64> = ts.iter().map(|t| (2.0 * std::f64::consts::PI * t).sin()).collect();
    let cos: Vec<f64> = ts.iter().map(|t| (2.0 * std::f64::consts::PI * t).cos()).collect();
    // Slower clock, so it does not correlate with the others.
    let slow_ts: Vec<f64> = (0..SAMPLES / 4).map(|i| i as f64 * SAMPLE_PERIOD * 4.0).collect();
    let ramp: Vec<f64> = slow_ts.iter().map(|t| t * 0.5).collect();
    Ok(DataSet::new()
        .with("sin", Signal::numeric("sin", ts.clone(), sin)?)
        .with("cos", Signal::numeric("cos", ts, cos)?)
        .with("ramp", Signal::numeric("ramp", slow_ts, ramp)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut session = ScopeSession::new(ScopeConfig::default());
    let data = synthetic_data()?;
    session.set_data_items(DataItems::for_data(&data).iter().cloned().collect());
    session.set_data(data);

    session.set_region(Some((1.0, 4.0)));
    session.set_timeshift(&["ramp".to_string()], 0.25);
    session.set_transform("cos", "x * 2 + data['sin']")?;
    session.create_xy(&["sin".to_string(), "cos".to_string()])?;
    session.add_xy_pairing("sin", "ramp");
    session.set_ref_geometry(None, "axhline(mean(data['cos']))  # cos mean", None, None)?;

    let deadline = Instant::now() + Duration::from_secs(5);
    while session.table().cell("sin", "Avg").is_none_or(str::is_empty) && Instant::now() < deadline {
        session.poll_background();
        std::thread::sleep(Duration::from_millis(10));
    }

    let headers = session.table().headers();
    info!("{}", headers.join(" | "));
    for row in session.table().rows() {
        info!("{}", row.cells.join(" | "));
    }

    if let Some(xy) = session.xy_plot() {
        for curve in &xy.frame().curves {
            info!(
                x = curve.x_name.as_str(),
                y = curve.y_name.as_str(),
                x_range = ?curve.indices.0,
                y_range = ?curve.indices.1,
                segments = curve.segments.len(),
                "X-Y curve"
            );
        }
        for msg in &xy.frame().diagnostics {
            warn!("{msg}");
        }
        for outcome in &xy.frame().ref_geo {
            match outcome.error_text() {
                Some(err) => warn!("{err}"),
                None => info!(label = outcome.label.as_str(), "reference geometry drawn"),
            }
        }
    }

    info!("{}", session.save_state_json()?);
    Ok(())
}
