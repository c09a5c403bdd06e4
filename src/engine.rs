//! The per-tick driver tying transport, analysis and raster together.

pub mod export;

use crate::audio::{BlockReceiver, StereoBlock};
use crate::controls::{self, BinRange, ValueFormat};
use crate::cursor::{CursorContext, CursorReadout, bin_at_y};
use crate::dsp::Reconfigurable;
use crate::dsp::delay::ChannelDelay;
use crate::dsp::gain::PreGain;
use crate::dsp::spectrogram::{AnalysisConfig, ChannelAnalyzer, ColumnHistory};
use crate::render::{ChannelBlend, Colormap, Compositor, RasterGrid, RasterLayout, RasterStyle};
use crate::util::audio::bin_frequency;
use crate::util::telemetry;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Minimum number of ticks between two deferred full repaints.
pub const REPAINT_INTERVAL_TICKS: u32 = 4;

/// What one call to [`SpectrogramEngine::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub blocks: usize,
    pub columns: usize,
    pub repainted: bool,
}

#[derive(Debug)]
pub struct SpectrogramEngine {
    analysis: AnalysisConfig,
    left: ChannelAnalyzer,
    right: ChannelAnalyzer,
    gain: PreGain,
    delay: ChannelDelay,
    compositor: Compositor,
    grid: RasterGrid,
    frozen: bool,
    repaint_requested: bool,
    ticks_since_repaint: u32,
    reference_bin: Option<usize>,
    dirty: bool,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

impl SpectrogramEngine {
    pub fn new(analysis: AnalysisConfig, layout: RasterLayout) -> Self {
        let analysis = AnalysisConfig {
            frame_length: controls::sanitize_frame_length(analysis.frame_length),
            ..analysis
        };
        let style = RasterStyle {
            top_bin: analysis.bin_count(),
            ..RasterStyle::default()
        };
        telemetry::analysis_config("init", &analysis);
        telemetry::raster_layout(&layout);

        Self {
            left: ChannelAnalyzer::new(analysis),
            right: ChannelAnalyzer::new(analysis),
            gain: PreGain::default(),
            delay: ChannelDelay::default(),
            compositor: Compositor::new(style),
            grid: RasterGrid::new(layout),
            frozen: false,
            repaint_requested: false,
            ticks_since_repaint: REPAINT_INTERVAL_TICKS,
            reference_bin: None,
            dirty: true,
            scratch_left: Vec::new(),
            scratch_right: Vec::new(),
            analysis,
        }
    }

    /// One display tick: serve a pending repaint if the throttle allows, pick
    /// up sample-rate changes, then drain and analyse everything queued unless
    /// frozen.
    pub fn tick(&mut self, receiver: &BlockReceiver) -> TickReport {
        let mut report = TickReport::default();

        if self.repaint_requested && self.ticks_since_repaint >= REPAINT_INTERVAL_TICKS {
            self.repaint();
            report.repainted = true;
        }
        self.ticks_since_repaint = self.ticks_since_repaint.saturating_add(1);

        let sample_rate = receiver.sample_rate();
        if sample_rate != self.analysis.sample_rate {
            self.set_sample_rate(sample_rate);
        }

        if self.frozen {
            return report;
        }

        for block in receiver.drain() {
            report.blocks += 1;
            report.columns += self.ingest_block(&block);
        }
        report
    }

    /// Gain, delay, analysis and incremental raster for one block. Returns the
    /// number of new columns per channel.
    pub fn ingest_block(&mut self, block: &StereoBlock) -> usize {
        if block.is_empty() {
            return 0;
        }
        let frames = block.frames();

        self.scratch_left.clear();
        self.scratch_left.extend_from_slice(&block.left[..frames]);
        self.scratch_right.clear();
        self.scratch_right.extend_from_slice(&block.right[..frames]);
        self.gain.apply(&mut self.scratch_left);
        self.gain.apply(&mut self.scratch_right);

        let produced_left = self.left.feed(self.delay.left.process(&self.scratch_left));
        let produced_right = self.right.feed(self.delay.right.process(&self.scratch_right));
        debug_assert_eq!(produced_left, produced_right);

        let produced = produced_left.min(produced_right);
        if produced > 0 {
            self.compositor.append(
                &mut self.grid,
                self.left.history(),
                self.right.history(),
                produced,
            );
            self.dirty = true;
        }
        produced
    }

    /// Recompute the visible raster from history now.
    pub fn repaint(&mut self) {
        self.compositor
            .repaint(&mut self.grid, self.left.history(), self.right.history());
        self.repaint_requested = false;
        self.ticks_since_repaint = 0;
        self.dirty = true;
        debug!(
            "[engine] repainted {} columns",
            self.left.history().len().min(self.grid.layout().visible_columns())
        );
    }

    pub fn request_repaint(&mut self) {
        self.repaint_requested = true;
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn repaint_pending(&self) -> bool {
        self.repaint_requested
    }

    fn update_style(&mut self, update: impl FnOnce(&mut RasterStyle)) {
        let mut style = self.compositor.style();
        update(&mut style);
        self.compositor.set_style(style);
    }

    /// Change the analysis frame length. Clears history and raster and resets
    /// the bin range to the full spectrum.
    pub fn set_frame_length(&mut self, frame_length: usize) {
        let frame_length = controls::sanitize_frame_length(frame_length);
        if frame_length == self.analysis.frame_length {
            return;
        }
        self.reconfigure(AnalysisConfig {
            frame_length,
            ..self.analysis
        });
        let full = BinRange::full(self.analysis.bin_count());
        self.update_style(|style| {
            style.bottom_bin = full.bottom;
            style.top_bin = full.top;
        });
        self.delay.clear();
        self.grid.fill(self.compositor.style().floor);
        self.repaint_requested = false;
        self.dirty = true;
        telemetry::analysis_config("resolution", &self.analysis);
    }

    pub fn set_resolution_step(&mut self, step: u32) {
        self.set_frame_length(controls::frame_length_from_step(step));
    }

    /// Sample-rate changes only affect frequency labels; history is kept.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return;
        }
        self.reconfigure(AnalysisConfig {
            sample_rate,
            ..self.analysis
        });
        info!("[engine] sample rate now {sample_rate:.0}Hz");
    }

    pub fn set_history_capacity(&mut self, capacity: usize) {
        self.reconfigure(AnalysisConfig {
            history_capacity: capacity.max(1),
            ..self.analysis
        });
    }

    fn reconfigure(&mut self, analysis: AnalysisConfig) {
        self.analysis = analysis;
        self.left.update_config(analysis);
        self.right.update_config(analysis);
    }

    pub fn set_top_bin(&mut self, bin: usize) {
        let bin_count = self.analysis.bin_count();
        let range = self.bin_range().with_top(bin, bin_count);
        self.set_bin_range(range);
    }

    pub fn set_bottom_bin(&mut self, bin: usize) {
        let bin_count = self.analysis.bin_count();
        let range = self.bin_range().with_bottom(bin, bin_count);
        self.set_bin_range(range);
    }

    fn set_bin_range(&mut self, range: BinRange) {
        if range == self.bin_range() {
            return;
        }
        self.update_style(|style| {
            style.bottom_bin = range.bottom;
            style.top_bin = range.top;
        });
        self.request_repaint();
    }

    pub fn bin_range(&self) -> BinRange {
        let style = self.compositor.style();
        BinRange {
            bottom: style.bottom_bin,
            top: style.top_bin,
        }
    }

    pub fn set_multiplier(&mut self, multiplier: f32) {
        let multiplier = controls::clamp_multiplier(multiplier);
        self.update_style(|style| style.multiplier = multiplier);
        if self.frozen {
            self.request_repaint();
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        let threshold = controls::clamp_threshold(threshold);
        self.update_style(|style| style.threshold = threshold);
        if self.frozen {
            self.request_repaint();
        }
    }

    /// Select a colour map together with the blend it implies.
    pub fn set_colormap(&mut self, colormap: Colormap) {
        self.update_style(|style| {
            style.colormap = colormap;
            style.blend = ChannelBlend::for_colormap(colormap);
        });
        self.request_repaint();
    }

    pub fn cycle_colormap(&mut self) -> Colormap {
        let next = self.compositor.style().colormap.next();
        self.set_colormap(next);
        next
    }

    pub fn set_blend(&mut self, blend: ChannelBlend) {
        self.update_style(|style| style.blend = blend);
        self.request_repaint();
    }

    pub fn set_peak_only(&mut self, peak_only: bool) {
        if self.compositor.style().peak_only == peak_only {
            return;
        }
        self.update_style(|style| style.peak_only = peak_only);
        self.request_repaint();
    }

    pub fn toggle_peak_only(&mut self) -> bool {
        let peak_only = !self.compositor.style().peak_only;
        self.set_peak_only(peak_only);
        peak_only
    }

    /// Applies to blocks ingested from now on.
    pub fn set_gain_db(&mut self, db: f32) {
        self.gain = PreGain::new(controls::clamp_gain_db(db));
    }

    /// Signed inter-channel offset; negative delays the left channel.
    pub fn set_delay_offset(&mut self, offset: i32) {
        self.delay.set_offset(controls::clamp_delay_offset(offset));
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        if self.frozen != frozen {
            info!("[engine] {}", if frozen { "frozen" } else { "resumed" });
        }
        self.frozen = frozen;
    }

    pub fn toggle_freeze(&mut self) -> bool {
        self.set_frozen(!self.frozen);
        self.frozen
    }

    /// Place the reference line at pixel row `y`, or remove it.
    pub fn set_reference_row(&mut self, y: Option<f32>) {
        let bin_count = self.analysis.bin_count();
        self.reference_bin = y.map(|y| {
            bin_at_y(y, &self.grid.layout(), &self.compositor.style(), bin_count)
        });
    }

    pub fn reference_bin(&self) -> Option<usize> {
        self.reference_bin
    }

    pub fn cursor(&self, x: f32, y: f32) -> Option<CursorReadout> {
        let layout = self.grid.layout();
        let style = self.compositor.style();
        CursorContext {
            layout: &layout,
            style: &style,
            sample_rate: self.analysis.sample_rate,
            frame_length: self.analysis.frame_length,
            reference_bin: self.reference_bin,
        }
        .readout(x, y, self.left.history(), self.right.history())
    }

    pub fn frequency_at_bin(&self, bin: usize) -> f32 {
        bin_frequency(bin, self.analysis.sample_rate, self.analysis.frame_length)
    }

    /// Labels for the lowest and highest displayed bins (`top` is exclusive).
    pub fn bin_range_labels(&self) -> (String, String) {
        let range = self.bin_range();
        (
            ValueFormat::Hertz.format(self.frequency_at_bin(range.bottom)),
            ValueFormat::Hertz.format(self.frequency_at_bin(range.top.saturating_sub(1))),
        )
    }

    pub fn export_history(&self, directory: &Path) -> Result<PathBuf> {
        export::dump_to_dir(directory, self.left.history(), self.right.history())
    }

    /// Whether the raster changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn raster(&self) -> &RasterGrid {
        &self.grid
    }

    pub fn pixels(&self) -> &[u8] {
        self.grid.pack_rgba()
    }

    pub fn analysis(&self) -> AnalysisConfig {
        self.analysis
    }

    pub fn style(&self) -> RasterStyle {
        self.compositor.style()
    }

    pub fn gain_db(&self) -> f32 {
        self.gain.db()
    }

    pub fn delay_offset(&self) -> i32 {
        self.delay.offset()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn left_history(&self) -> &ColumnHistory {
        self.left.history()
    }

    pub fn right_history(&self) -> &ColumnHistory {
        self.right.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::block_channel;
    use crate::dsp::window::WindowKind;

    fn sine(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (core::f32::consts::TAU * frequency * n as f32 / sample_rate).sin())
            .collect()
    }

    fn engine(frame_length: usize) -> SpectrogramEngine {
        SpectrogramEngine::new(
            AnalysisConfig {
                frame_length,
                history_capacity: 64,
                window: WindowKind::Hann,
                symmetric_window: false,
                ..AnalysisConfig::default()
            },
            RasterLayout::new(40, 16, 2),
        )
    }

    #[test]
    fn tick_drains_and_rasterizes() {
        let (sender, receiver) = block_channel(8);
        let mut engine = engine(256);
        let tone = sine(3_000.0, 48_000.0, 1_024);
        sender.push(&tone, &tone);

        let report = engine.tick(&receiver);
        assert_eq!(report.blocks, 1);
        assert_eq!(report.columns, 4);
        assert_eq!(engine.left_history().len(), 4);
        assert!(engine.take_dirty());
        assert!(!engine.take_dirty());
        assert_eq!(engine.pixels().len(), 40 * 16 * 4);

        // Row 13 from the top samples bin 16.125, right on the tone.
        let tone_pixel = engine.raster().pixel(39, 13).expect("pixel");
        assert_ne!(tone_pixel, engine.style().floor);
        assert_eq!(engine.raster().pixel(0, 13), Some(engine.style().floor));
    }

    #[test]
    fn freeze_stops_draining() {
        let (sender, receiver) = block_channel(8);
        let mut engine = engine(256);
        engine.set_frozen(true);
        sender.push(&[0.1; 512], &[0.1; 512]);

        assert_eq!(engine.tick(&receiver).blocks, 0);
        assert_eq!(receiver.queued(), 1);

        engine.toggle_freeze();
        assert_eq!(engine.tick(&receiver).columns, 2);
    }

    #[test]
    fn repaints_are_throttled() {
        let (_sender, receiver) = block_channel(1);
        let mut engine = engine(256);

        engine.cycle_colormap();
        assert!(engine.tick(&receiver).repainted);

        engine.set_top_bin(50);
        let repainted: Vec<bool> = (0..5).map(|_| engine.tick(&receiver).repainted).collect();
        assert_eq!(repainted, vec![false, false, false, true, false]);
        assert!(!engine.repaint_pending());
    }

    #[test]
    fn multiplier_repaints_only_while_frozen() {
        let mut engine = engine(256);
        engine.set_multiplier(2.0);
        assert!(!engine.repaint_pending());
        engine.set_frozen(true);
        engine.set_threshold(0.5);
        assert!(engine.repaint_pending());
        assert_eq!(engine.style().threshold, 0.5);
        assert_eq!(engine.style().multiplier, 2.0);
    }

    #[test]
    fn resolution_change_resets_history_and_range() {
        let mut engine = engine(256);
        let block = StereoBlock::new(vec![0.2; 1_024], vec![0.2; 1_024]);
        engine.ingest_block(&block);
        engine.set_top_bin(40);
        assert_eq!(engine.bin_range(), BinRange { bottom: 0, top: 40 });

        engine.set_resolution_step(4);
        assert_eq!(engine.analysis().frame_length, 2_048);
        assert!(engine.left_history().is_empty());
        assert_eq!(engine.bin_range(), BinRange::full(1_025));
        assert!(!engine.repaint_pending());
    }

    #[test]
    fn sample_rate_change_keeps_history() {
        let (sender, receiver) = block_channel(4);
        let mut engine = engine(256);
        engine.ingest_block(&StereoBlock::new(vec![0.2; 512], vec![0.2; 512]));
        sender.set_sample_rate(96_000.0);
        engine.tick(&receiver);
        assert_eq!(engine.analysis().sample_rate, 96_000.0);
        assert_eq!(engine.left_history().len(), 2);
        assert_eq!(engine.frequency_at_bin(1), 375.0);
    }

    #[test]
    fn gain_floor_silences_input() {
        let mut engine = engine(256);
        engine.set_gain_db(-120.0);
        assert_eq!(engine.gain_db(), -90.0);
        let tone = sine(1_000.0, 48_000.0, 256);
        engine.ingest_block(&StereoBlock::new(tone.clone(), tone));
        let column = engine.left_history().latest().expect("column");
        assert_eq!(column.peak_magnitude, 0.0);
    }

    #[test]
    fn delay_shifts_left_channel_by_offset() {
        use core::f32::consts::FRAC_PI_2;

        let mut engine = engine(128);
        engine.set_delay_offset(-64);
        assert_eq!(engine.delay_offset(), -64);

        let silence = StereoBlock::new(vec![0.0; 128], vec![0.0; 128]);
        let mut impulse = vec![0.0; 128];
        impulse[32] = 1.0;
        engine.ingest_block(&silence);
        engine.ingest_block(&StereoBlock::new(impulse.clone(), impulse));

        // Hann weights samples 32 and 96 equally, so only the phase moves:
        // bin 1 turns by 2*pi*64/128 = pi between the two channels.
        let left = engine.left_history().latest().expect("left");
        let right = engine.right_history().latest().expect("right");
        assert!((left.magnitudes[1] - right.magnitudes[1]).abs() < 1e-5);
        assert!(right.magnitudes[1] > 0.0);
        assert!((right.phases[1] + FRAC_PI_2).abs() < 1e-3, "right {}", right.phases[1]);
        assert!((left.phases[1] - FRAC_PI_2).abs() < 1e-3, "left {}", left.phases[1]);
    }

    #[test]
    fn cursor_and_labels() {
        let mut engine = engine(256);
        engine.ingest_block(&StereoBlock::new(vec![0.3; 256 * 3], vec![0.3; 256 * 3]));
        engine.set_reference_row(Some(8.0));

        let readout = engine.cursor(39.0, 16.0).expect("readout");
        assert_eq!(readout.column, 2);
        assert_eq!(readout.bin, 0);
        assert_eq!(readout.reference_frequency, Some(engine.frequency_at_bin(64)));

        let (bottom, top) = engine.bin_range_labels();
        assert_eq!(bottom, "0.000Hz");
        assert_eq!(top, "24000.000Hz");
    }

    #[test]
    fn export_writes_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = engine(128);
        engine.ingest_block(&StereoBlock::new(vec![0.1; 256], vec![0.1; 256]));
        let path = engine.export_history(dir.path()).expect("export");
        let text = std::fs::read_to_string(path).expect("read");
        assert_eq!(text.lines().count(), 8);
    }
}
