//! Logging setup and shared structured log lines.

use crate::dsp::spectrogram::AnalysisConfig;
use crate::render::raster::RasterLayout;
use std::sync::OnceLock;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_DIRECTIVE: &str = "spectrograph=info";

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

/// Install the global `tracing` subscriber. Safe to call more than once.
pub fn init() {
    TELEMETRY_INIT.get_or_init(|| {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(DEFAULT_DIRECTIVE)
                .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into())),
        };

        let installed = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init();
        if let Err(err) = installed {
            eprintln!("[telemetry] tracing subscriber unavailable: {err}");
        }
    });
}

pub fn analysis_config(reason: &str, config: &AnalysisConfig) {
    info!(
        "[analysis] {reason}: frame_length={}, bins={}, sample_rate={:.0}Hz, bin_width={:.3}Hz, history={}, window={:?} (symmetric={})",
        config.frame_length,
        config.bin_count(),
        config.sample_rate,
        config.bin_width_hz(),
        config.history_capacity,
        config.window,
        config.symmetric_window,
    );
}

pub fn raster_layout(layout: &RasterLayout) {
    info!(
        "[raster] layout: {}x{} px, column_width={}, visible_columns={}",
        layout.width,
        layout.height,
        layout.column_width,
        layout.visible_columns(),
    );
}
