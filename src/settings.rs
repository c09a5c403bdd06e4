use crate::dsp::spectrogram::{
    AnalysisConfig, DEFAULT_FRAME_LENGTH, DEFAULT_HISTORY_CAPACITY, DEFAULT_NORMALIZATION,
};
use crate::dsp::window::WindowKind;
use crate::engine::SpectrogramEngine;
use crate::render::{ChannelBlend, Colormap};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const SETTINGS_FILE_NAME: &str = "settings.json";
const APP_DIR_NAME: &str = "spectrograph";

/// Persisted engine state. Missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub frame_length: usize,
    pub history_capacity: usize,
    pub window: WindowKind,
    pub symmetric_window: bool,
    pub normalization: f32,
    pub gain_db: f32,
    pub delay_offset: i32,
    pub bottom_bin: usize,
    pub top_bin: Option<usize>,
    pub multiplier: f32,
    pub threshold: f32,
    pub colormap: Colormap,
    pub blend: Option<ChannelBlend>,
    pub peak_only: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frame_length: DEFAULT_FRAME_LENGTH,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            window: WindowKind::Hann,
            symmetric_window: true,
            normalization: DEFAULT_NORMALIZATION,
            gain_db: 0.0,
            delay_offset: 0,
            bottom_bin: 0,
            top_bin: None,
            multiplier: 1.0,
            threshold: 0.0,
            colormap: Colormap::default(),
            blend: None,
            peak_only: false,
        }
    }
}

impl EngineSettings {
    pub fn from_engine(engine: &SpectrogramEngine) -> Self {
        let analysis = engine.analysis();
        let style = engine.style();
        Self {
            frame_length: analysis.frame_length,
            history_capacity: analysis.history_capacity,
            window: analysis.window,
            symmetric_window: analysis.symmetric_window,
            normalization: analysis.normalization,
            gain_db: engine.gain_db(),
            delay_offset: engine.delay_offset(),
            bottom_bin: style.bottom_bin,
            top_bin: Some(style.top_bin),
            multiplier: style.multiplier,
            threshold: style.threshold,
            colormap: style.colormap,
            blend: (style.blend != ChannelBlend::for_colormap(style.colormap)).then_some(style.blend),
            peak_only: style.peak_only,
        }
    }

    /// Analysis configuration for building a new engine.
    pub fn analysis_config(&self, sample_rate: f32) -> AnalysisConfig {
        AnalysisConfig {
            sample_rate,
            frame_length: self.frame_length,
            history_capacity: self.history_capacity.max(1),
            window: self.window,
            symmetric_window: self.symmetric_window,
            normalization: if self.normalization.is_finite() && self.normalization > 0.0 {
                self.normalization
            } else {
                DEFAULT_NORMALIZATION
            },
        }
    }

    /// Push the user-facing controls into `engine`. Values are clamped by the
    /// engine's control layer.
    pub fn apply_to(&self, engine: &mut SpectrogramEngine) {
        engine.set_frame_length(self.frame_length);
        engine.set_history_capacity(self.history_capacity);
        if let Some(top) = self.top_bin {
            engine.set_top_bin(top);
        }
        engine.set_bottom_bin(self.bottom_bin);
        engine.set_multiplier(self.multiplier);
        engine.set_threshold(self.threshold);
        engine.set_colormap(self.colormap);
        if let Some(blend) = self.blend {
            engine.set_blend(blend);
        }
        engine.set_peak_only(self.peak_only);
        engine.set_gain_db(self.gain_db);
        engine.set_delay_offset(self.delay_offset);
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(dir).join(APP_DIR_NAME)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".config").join(APP_DIR_NAME)
    } else {
        PathBuf::from(".spectrograph")
    }
}

#[derive(Debug)]
pub struct SettingsManager {
    path: PathBuf,
    data: EngineSettings,
}

impl SettingsManager {
    pub fn load_or_default() -> Self {
        Self::load_from(config_dir().join(SETTINGS_FILE_NAME))
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = Self::load_from_disk(&path).unwrap_or_default();
        Self { path, data }
    }

    fn load_from_disk(path: &Path) -> Option<EngineSettings> {
        let contents = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(settings) => Some(settings),
            Err(err) => {
                warn!("[settings] failed to parse {path:?}: {err}");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.data
    }

    pub fn capture(&mut self, engine: &SpectrogramEngine) {
        self.data = EngineSettings::from_engine(engine);
    }

    /// Write-then-rename so a crash never leaves a truncated file behind.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.data).context("serializing settings")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json).with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RasterLayout;

    fn engine_from(settings: &EngineSettings) -> SpectrogramEngine {
        let mut engine = SpectrogramEngine::new(
            settings.analysis_config(48_000.0),
            RasterLayout::default(),
        );
        settings.apply_to(&mut engine);
        engine
    }

    #[test]
    fn partial_json_uses_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "frame_length": 2048, "colormap": "green-pink" }"#)
                .expect("parse");
        assert_eq!(settings.frame_length, 2048);
        assert_eq!(settings.colormap, Colormap::GreenPink);
        assert_eq!(settings.multiplier, 1.0);
        assert_eq!(settings.top_bin, None);
    }

    #[test]
    fn settings_round_trip_through_engine() {
        let settings = EngineSettings {
            frame_length: 512,
            top_bin: Some(200),
            bottom_bin: 10,
            multiplier: 3.0,
            threshold: 0.1,
            colormap: Colormap::Turbo,
            peak_only: true,
            gain_db: -6.0,
            delay_offset: 512,
            ..EngineSettings::default()
        };
        let engine = engine_from(&settings);
        assert_eq!(EngineSettings::from_engine(&engine), settings);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let settings = EngineSettings {
            frame_length: 1000,
            top_bin: Some(100_000),
            multiplier: 99.0,
            gain_db: 80.0,
            ..EngineSettings::default()
        };
        let engine = engine_from(&settings);
        assert_eq!(engine.analysis().frame_length, 1024);
        assert_eq!(engine.bin_range().top, 513);
        assert_eq!(engine.style().multiplier, 15.0);
        assert_eq!(engine.gain_db(), 30.0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let mut manager = SettingsManager::load_from(path.clone());
        assert_eq!(manager.settings(), &EngineSettings::default());

        let mut engine = engine_from(&EngineSettings::default());
        engine.set_colormap(Colormap::Viridis);
        engine.set_blend(ChannelBlend::Right);
        manager.capture(&engine);
        manager.save().expect("save");

        let reloaded = SettingsManager::load_from(path);
        assert_eq!(reloaded.settings().colormap, Colormap::Viridis);
        assert_eq!(reloaded.settings().blend, Some(ChannelBlend::Right));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "{ not json").expect("write");
        let manager = SettingsManager::load_from(path);
        assert_eq!(manager.settings(), &EngineSettings::default());
    }
}
