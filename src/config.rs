//! Configuration of a scope session.

use egui::Color32;

/// Settings passed to [`ScopeSession::new`](crate::session::ScopeSession::new).
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeConfig {
    // ── Table ────────────────────────────────────────────────────────────────
    /// Decimals shown for each statistic.
    pub stats_precision: usize,
    /// Compute statistics on a background worker thread. When `false`,
    /// statistics are computed inline on the calling thread.
    pub stats_worker: bool,

    // ── X-Y plots ────────────────────────────────────────────────────────────
    /// Number of opacity steps a correlated curve is split into.
    pub xy_fade_segments: usize,
    /// Color of new reference geometry entries without an explicit color.
    pub ref_geo_color: Color32,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            stats_precision: 3,
            stats_worker: true,
            xy_fade_segments: 16,
            ref_geo_color: Color32::DARK_GRAY,
        }
    }
}
