//! Spectral columnizer: windowed frames in, bounded history of magnitude /
//! phase columns out.
//!
//! Magnitudes are normalized once, at extraction time, as
//! `factor * |X[k]| / (N / 2)`. Peak detection, thresholds and colour mapping
//! all read these normalized values, so a full-scale sine analysed through a
//! Hann window with the default factor of 2.0 reads close to 1.0.

use super::Reconfigurable;
use super::accumulator::FrameAccumulator;
use super::window::{WindowCache, WindowKind};
use crate::util::RingBuffer;
use crate::util::audio::{DEFAULT_SAMPLE_RATE, bin_frequency};
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex32;
use std::sync::Arc;

pub const MIN_FRAME_LENGTH: usize = 128;
pub const MAX_FRAME_LENGTH: usize = 16_384;
pub const DEFAULT_FRAME_LENGTH: usize = 1024;
pub const DEFAULT_HISTORY_CAPACITY: usize = 8192;
pub const DEFAULT_NORMALIZATION: f32 = 2.0;

/// Configuration for one channel's analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    pub sample_rate: f32,
    /// Frame (and hop) length in samples; a power of two.
    pub frame_length: usize,
    /// Maximum retained history columns.
    pub history_capacity: usize,
    pub window: WindowKind,
    /// Use the `N - 1` denominator so both window endpoints are zero.
    pub symmetric_window: bool,
    /// Scale applied on top of the `N / 2` amplitude normalization.
    pub normalization: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_length: DEFAULT_FRAME_LENGTH,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            window: WindowKind::Hann,
            symmetric_window: true,
            normalization: DEFAULT_NORMALIZATION,
        }
    }
}

impl AnalysisConfig {
    /// Bins per column: `N / 2 + 1`.
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.frame_length / 2 + 1
    }

    #[inline]
    pub fn bin_width_hz(&self) -> f32 {
        bin_frequency(1, self.sample_rate, self.frame_length)
    }

    fn window_coefficients(&self) -> Arc<[f32]> {
        WindowCache::global().get(self.window, self.frame_length, self.symmetric_window)
    }
}

/// One analysed frame. Immutable once produced; clones share storage.
#[derive(Debug, Clone)]
pub struct SpectralColumn {
    /// Monotonic index of this column within its channel since the last reset.
    pub sequence: u64,
    pub magnitudes: Arc<[f32]>,
    pub phases: Arc<[f32]>,
    /// Per-bin local-maximum flags.
    pub peaks: Arc<[bool]>,
    pub peak_bin: usize,
    pub peak_frequency: f32,
    pub peak_magnitude: f32,
}

impl SpectralColumn {
    #[inline]
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    #[inline]
    pub fn is_peak(&self, bin: usize) -> bool {
        self.peaks.get(bin).copied().unwrap_or(false)
    }
}

/// Linear interpolation of `bins` at fractional `position`.
///
/// Integer positions return the stored bin exactly. Positions must lie in
/// `[0, len)`; the upper neighbour is clamped at the last bin.
#[inline]
pub fn interpolate(bins: &[f32], position: f32) -> f32 {
    debug_assert!(!bins.is_empty());
    debug_assert!(
        position >= 0.0 && position < bins.len() as f32,
        "interpolation position {position} outside [0, {})",
        bins.len()
    );
    let lower = position as usize;
    let upper = (lower + 1).min(bins.len() - 1);
    let weight = position - lower as f32;
    let lower_value = bins[lower];
    if weight == 0.0 {
        return lower_value;
    }
    lower_value + (bins[upper] - lower_value) * weight
}

/// Real-to-complex transform plus magnitude/phase/peak extraction.
pub struct SpectralTransform {
    planner: RealFftPlanner<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    frame_length: usize,
}

impl std::fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("frame_length", &self.frame_length)
            .finish_non_exhaustive()
    }
}

impl SpectralTransform {
    pub fn new(frame_length: usize) -> Self {
        assert!(frame_length > 0, "frame length must be greater than zero");
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_length);
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        Self {
            planner,
            fft,
            spectrum,
            scratch,
            frame_length,
        }
    }

    pub fn resize(&mut self, frame_length: usize) {
        if frame_length == self.frame_length {
            return;
        }
        assert!(frame_length > 0, "frame length must be greater than zero");
        self.fft = self.planner.plan_fft_forward(frame_length);
        self.spectrum = self.fft.make_output_vec();
        self.scratch = self.fft.make_scratch_vec();
        self.frame_length = frame_length;
    }

    /// Transform one windowed frame. The frame is used as scratch space and
    /// holds garbage afterwards.
    pub fn process(
        &mut self,
        frame: &mut [f32],
        normalization: f32,
        sample_rate: f32,
        sequence: u64,
    ) -> SpectralColumn {
        self.fft
            .process_with_scratch(frame, &mut self.spectrum, &mut self.scratch)
            .expect("real FFT forward transform");

        let bins = self.spectrum.len();
        let scale = normalization / (self.frame_length as f32 / 2.0);
        let mut magnitudes = Vec::with_capacity(bins);
        let mut phases = Vec::with_capacity(bins);
        let mut peak_bin = 0;
        let mut peak_magnitude = 0.0f32;

        for (index, value) in self.spectrum.iter().enumerate() {
            let magnitude = value.norm() * scale;
            if magnitude > peak_magnitude {
                peak_magnitude = magnitude;
                peak_bin = index;
            }
            magnitudes.push(magnitude);
            phases.push(value.arg());
        }

        let peaks = local_peaks(&magnitudes);
        SpectralColumn {
            sequence,
            magnitudes: Arc::from(magnitudes),
            phases: Arc::from(phases),
            peaks: Arc::from(peaks),
            peak_bin,
            peak_frequency: peak_frequency(peak_bin, bins, sample_rate),
            peak_magnitude,
        }
    }
}

/// `bin * (sample_rate / (bins - 1) / 2)`, i.e. `bin * sample_rate / N`.
pub fn peak_frequency(bin: usize, bins: usize, sample_rate: f32) -> f32 {
    if bins < 2 {
        return 0.0;
    }
    bin as f32 * (sample_rate / (bins - 1) as f32 / 2.0)
}

/// A bin is a peak when it is non-zero, strictly above its lower neighbour and
/// not below its upper neighbour.
fn local_peaks(magnitudes: &[f32]) -> Vec<bool> {
    let last = magnitudes.len().saturating_sub(1);
    magnitudes
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            let above_lower = index == 0 || value > magnitudes[index - 1];
            let above_upper = index == last || value >= magnitudes[index + 1];
            value > 0.0 && above_lower && above_upper
        })
        .collect()
}

/// Bounded, append-only column history. On overflow exactly one column, the
/// oldest, is evicted per append.
#[derive(Debug, Clone)]
pub struct ColumnHistory {
    columns: RingBuffer<SpectralColumn>,
}

impl ColumnHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            columns: RingBuffer::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, column: SpectralColumn) -> Option<SpectralColumn> {
        self.columns.push(column)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.columns.capacity()
    }

    /// Column at `index`, where 0 is the oldest retained column.
    pub fn get(&self, index: usize) -> Option<&SpectralColumn> {
        self.columns.get(index)
    }

    pub fn latest(&self) -> Option<&SpectralColumn> {
        self.columns.newest()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SpectralColumn> + '_ {
        self.columns.iter()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.columns.set_capacity(capacity.max(1));
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }
}

/// Accumulator, transform and history for one channel.
#[derive(Debug)]
pub struct ChannelAnalyzer {
    config: AnalysisConfig,
    accumulator: FrameAccumulator,
    transform: SpectralTransform,
    history: ColumnHistory,
    next_sequence: u64,
}

impl ChannelAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            accumulator: FrameAccumulator::new(config.window_coefficients()),
            transform: SpectralTransform::new(config.frame_length),
            history: ColumnHistory::new(config.history_capacity),
            next_sequence: 0,
            config,
        }
    }

    pub fn history(&self) -> &ColumnHistory {
        &self.history
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn pending_samples(&self) -> usize {
        self.accumulator.pending()
    }

    /// Push samples through the pipeline. Returns how many columns were
    /// appended to the history by this call.
    pub fn feed(&mut self, samples: &[f32]) -> usize {
        let Self {
            config,
            accumulator,
            transform,
            history,
            next_sequence,
        } = self;

        accumulator.push(samples, |frame| {
            let column =
                transform.process(frame, config.normalization, config.sample_rate, *next_sequence);
            *next_sequence += 1;
            history.push(column);
        })
    }

    /// Drop carry and history; the column sequence restarts at zero.
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.history.clear();
        self.next_sequence = 0;
    }
}

impl Reconfigurable<AnalysisConfig> for ChannelAnalyzer {
    fn update_config(&mut self, config: AnalysisConfig) {
        let previous = std::mem::replace(&mut self.config, config);
        let frame_changed = previous.frame_length != config.frame_length
            || previous.window != config.window
            || previous.symmetric_window != config.symmetric_window;

        if frame_changed || previous.normalization != config.normalization {
            self.transform.resize(config.frame_length);
            self.accumulator.reset_window(config.window_coefficients());
            self.reset();
        }
        if previous.history_capacity != config.history_capacity {
            self.history.set_capacity(config.history_capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::audio::frequency_bin;

    fn sine(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| (core::f32::consts::TAU * frequency * n as f32 / sample_rate).sin())
            .collect()
    }

    fn config(frame_length: usize, history_capacity: usize) -> AnalysisConfig {
        AnalysisConfig {
            frame_length,
            history_capacity,
            symmetric_window: false,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn one_frame_produces_one_column() {
        let mut analyzer = ChannelAnalyzer::new(config(256, 16));
        assert_eq!(analyzer.feed(&vec![0.0; 256]), 1);
        assert_eq!(analyzer.history().len(), 1);
        assert_eq!(analyzer.history().latest().map(|c| c.len()), Some(129));
    }

    #[test]
    fn partial_frames_carry_between_feeds() {
        let mut analyzer = ChannelAnalyzer::new(config(256, 16));
        assert_eq!(analyzer.feed(&vec![0.1; 640]), 2);
        assert_eq!(analyzer.pending_samples(), 128);
        assert_eq!(analyzer.feed(&vec![0.1; 128]), 1);
        assert_eq!(analyzer.pending_samples(), 0);
    }

    #[test]
    fn detects_sine_frequency_peak() {
        let sample_rate = DEFAULT_SAMPLE_RATE;
        let frame_length = 2048;
        let frequency = 1_000.0;
        let mut analyzer = ChannelAnalyzer::new(config(frame_length, 4));
        analyzer.feed(&sine(frequency, sample_rate, frame_length));

        let column = analyzer.history().latest().expect("column");
        let bin_width = sample_rate / frame_length as f32;
        assert_eq!(
            column.peak_bin,
            frequency_bin(frequency, sample_rate, frame_length)
        );
        assert!((column.peak_frequency - frequency).abs() <= bin_width);
        assert!(column.is_peak(column.peak_bin));
    }

    #[test]
    fn full_scale_sine_reads_unity_with_default_normalization() {
        let frame_length = 1024;
        let mut analyzer = ChannelAnalyzer::new(config(frame_length, 4));
        analyzer.feed(&sine(3_000.0, 48_000.0, frame_length));
        let column = analyzer.history().latest().expect("column");
        assert_eq!(column.peak_bin, 64);
        assert!(
            (column.peak_magnitude - 1.0).abs() < 0.01,
            "peak magnitude {}",
            column.peak_magnitude
        );
    }

    #[test]
    fn end_to_end_one_second_of_3khz() {
        let mut analyzer = ChannelAnalyzer::new(AnalysisConfig {
            sample_rate: 48_000.0,
            frame_length: 1024,
            history_capacity: 8192,
            window: WindowKind::Hann,
            symmetric_window: false,
            normalization: 2.0,
        });
        let produced = analyzer.feed(&sine(3_000.0, 48_000.0, 48_000));

        assert_eq!(produced, 46);
        assert_eq!(analyzer.pending_samples(), 48_000 - 46 * 1_024);
        assert_eq!(analyzer.history().len(), 46);
        let bin_width = 48_000.0 / 1024.0;
        for column in analyzer.history().iter() {
            assert_eq!(column.peak_bin, 64);
            assert!((column.peak_frequency - 3_000.0).abs() <= bin_width);
        }
    }

    #[test]
    fn history_respects_cap_and_evicts_oldest_first() {
        let mut analyzer = ChannelAnalyzer::new(config(128, 4));
        for _ in 0..3 {
            analyzer.feed(&vec![0.0; 128 * 3]);
            assert!(analyzer.history().len() <= 4);
        }
        let sequences: Vec<u64> = analyzer.history().iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![5, 6, 7, 8]);
    }

    #[test]
    fn silence_has_no_peaks() {
        let mut analyzer = ChannelAnalyzer::new(config(128, 2));
        analyzer.feed(&vec![0.0; 128]);
        let column = analyzer.history().latest().expect("column");
        assert_eq!(column.peak_bin, 0);
        assert_eq!(column.peak_magnitude, 0.0);
        assert!(column.peaks.iter().all(|flag| !flag));
    }

    #[test]
    fn interpolation_is_exact_on_bins_and_linear_between() {
        let bins = [0.0f32, 0.4, 1.0, 0.2];
        for (k, value) in bins.iter().enumerate() {
            assert_eq!(interpolate(&bins, k as f32), *value);
        }
        for k in 0..bins.len() - 1 {
            let mid = interpolate(&bins, k as f32 + 0.5);
            assert!((mid - (bins[k] + bins[k + 1]) / 2.0).abs() < 1e-6);
        }
        assert!((interpolate(&bins, 1.25) - 0.55).abs() < 1e-6);
    }

    #[test]
    fn local_peak_flags() {
        let flags = local_peaks(&[0.5, 0.2, 0.8, 0.8, 0.1, 0.0, 0.3]);
        assert_eq!(flags, vec![true, false, true, false, false, false, true]);
    }

    #[test]
    fn peak_frequency_uses_bin_spacing() {
        assert!((peak_frequency(64, 513, 48_000.0) - 3_000.0).abs() < 1e-3);
        assert_eq!(peak_frequency(3, 1, 48_000.0), 0.0);
    }

    #[test]
    fn resolution_change_clears_history() {
        let mut analyzer = ChannelAnalyzer::new(config(256, 8));
        analyzer.feed(&vec![0.3; 600]);
        assert_eq!(analyzer.history().len(), 2);

        analyzer.update_config(config(512, 8));
        assert!(analyzer.history().is_empty());
        assert_eq!(analyzer.pending_samples(), 0);
        assert_eq!(analyzer.feed(&vec![0.3; 512]), 1);
        assert_eq!(analyzer.history().latest().map(|c| c.len()), Some(257));
    }
}
