mod audio;
mod controls;
mod cursor;
mod dsp;
mod engine;
mod render;
mod settings;
mod util;

use anyhow::{Context, Result};
use audio::BlockSender;
use audio::transport::BLOCK_CHANNEL_CAPACITY;
use controls::{Control, ValueFormat};
use dsp::vector;
use engine::SpectrogramEngine;
use render::RasterLayout;
use settings::SettingsManager;
use std::thread;
use std::time::{Duration, Instant};
use util::audio::DEFAULT_SAMPLE_RATE;
use util::telemetry;

use tracing::{debug, error, info};

const DEMO_DURATION: Duration = Duration::from_secs(4);
const TICK_INTERVAL: Duration = Duration::from_millis(16);
const REPORT_INTERVAL: Duration = Duration::from_secs(1);
const PRODUCER_BLOCK_FRAMES: usize = 2_048;

fn main() {
    telemetry::init();
    info!("Spectrograph starting up");

    if let Err(err) = run() {
        error!("[demo] failed: {err:#}");
    }
}

fn run() -> Result<()> {
    let mut settings = SettingsManager::load_or_default();
    let mut engine = SpectrogramEngine::new(
        settings.settings().analysis_config(DEFAULT_SAMPLE_RATE),
        RasterLayout::default(),
    );
    settings.settings().apply_to(&mut engine);
    log_controls(&engine);

    let (sender, mut receiver) = audio::block_channel(BLOCK_CHANNEL_CAPACITY);
    let producer = thread::Builder::new()
        .name("spectrograph-tone".into())
        .spawn(move || produce(sender, DEMO_DURATION))
        .context("spawning tone producer")?;

    let layout = engine.raster().layout();
    let probe = (layout.width as f32 - 1.0, layout.height as f32 / 2.0);
    engine.set_reference_row(Some(probe.1));
    if let Some(bin) = engine.reference_bin() {
        info!(
            "[demo] reference line at bin {bin} ({})",
            ValueFormat::Hertz.format(engine.frequency_at_bin(bin))
        );
    }

    let mut frame = Vec::new();
    let mut presented = 0usize;
    let mut last_report = Instant::now();
    let mut reports = 0u32;

    while !receiver.is_finished() {
        let report = engine.tick(&receiver);
        if report.columns > 0 {
            debug!(
                "[demo] tick: {} blocks, {} columns, repainted={}",
                report.blocks, report.columns, report.repainted
            );
        }
        if present(&mut engine, &mut frame) {
            presented += 1;
        }
        if last_report.elapsed() >= REPORT_INTERVAL {
            receiver.report_drops();
            if let Some(readout) = engine.cursor(probe.0, probe.1) {
                info!("[demo] cursor readout\n{readout}");
            }
            reports += 1;
            script_controls(&mut engine, reports);
            last_report = Instant::now();
        }
        thread::sleep(TICK_INTERVAL);
    }
    if engine.is_frozen() {
        engine.toggle_freeze();
    }
    engine.tick(&receiver);
    if present(&mut engine, &mut frame) {
        presented += 1;
    }
    info!(
        "[demo] presented {presented} frames of {} bytes",
        frame.len()
    );

    if producer.join().is_err() {
        error!("[demo] tone producer panicked");
    }

    engine.set_frozen(true);
    let (bottom, top) = engine.bin_range_labels();
    let (left, right) = (engine.left_history(), engine.right_history());
    info!(
        "[demo] {}/{} columns retained of {}, range {bottom} .. {top}, {} transport blocks sent",
        left.len(),
        right.len(),
        left.capacity(),
        receiver.sent_blocks()
    );
    if let (Some(l), Some(r)) = (left.latest(), right.latest()) {
        info!(
            "[demo] latest peaks: left {}, right {}",
            ValueFormat::Hertz.format(l.peak_frequency),
            ValueFormat::Hertz.format(r.peak_frequency)
        );
    }

    let directory = std::env::current_dir().context("resolving dump directory")?;
    let path = engine.export_history(&directory)?;
    info!("[demo] history written to {}", path.display());

    // Scripted changes are not preferences; persist what was loaded.
    settings.settings().apply_to(&mut engine);
    settings.capture(&engine);
    settings.save()?;
    info!("[demo] settings saved to {}", settings.path().display());
    Ok(())
}

/// Copy the packed raster out when it changed, as a texture upload would.
fn present(engine: &mut SpectrogramEngine, frame: &mut Vec<u8>) -> bool {
    if !engine.take_dirty() {
        return false;
    }
    frame.clear();
    frame.extend_from_slice(engine.pixels());
    true
}

/// Scripted panel interaction, one step per report interval.
fn script_controls(engine: &mut SpectrogramEngine, step: u32) {
    match step {
        1 => {
            let colormap = engine.cycle_colormap();
            info!("[demo] colormap: {colormap}");
        }
        2 => {
            engine.toggle_freeze();
            let peak_only = engine.toggle_peak_only();
            info!("[demo] peak-only: {peak_only}");
        }
        3 => {
            engine.toggle_freeze();
            let step = controls::step_from_frame_length(engine.analysis().frame_length) + 1;
            engine.set_resolution_step(step);
            info!(
                "[demo] {}",
                Control::Resolution.describe(
                    controls::step_from_frame_length(engine.analysis().frame_length) as f32
                )
            );
        }
        _ => {}
    }
}

fn control_value(engine: &SpectrogramEngine, control: Control) -> f32 {
    let style = engine.style();
    match control {
        Control::PreGain => engine.gain_db(),
        Control::Resolution => {
            controls::step_from_frame_length(engine.analysis().frame_length) as f32
        }
        Control::Delay => engine.delay_offset() as f32,
        Control::TopBin => style.top_bin as f32,
        Control::BottomBin => style.bottom_bin as f32,
        Control::Multiplier => style.multiplier,
        Control::Threshold => style.threshold,
    }
}

fn log_controls(engine: &SpectrogramEngine) {
    for control in Control::ALL {
        info!("[demo] {}", control.describe(control_value(engine, control)));
    }
    info!("[demo] colormap: {}", engine.style().colormap);
}

/// Phase-accumulating sine oscillator.
struct Oscillator {
    phase: f32,
}

impl Oscillator {
    fn render(&mut self, frequency: f32, amplitude: f32, sample_rate: f32, out: &mut [f32]) {
        let step = std::f32::consts::TAU * frequency / sample_rate;
        for sample in out.iter_mut() {
            *sample = self.phase.sin();
            self.phase = (self.phase + step) % std::f32::consts::TAU;
        }
        vector::scale(out, amplitude);
    }
}

/// Real-time paced stereo test signal: a fixed 3 kHz tone plus a rising
/// sweep, mixed as sum on the left and difference on the right.
fn produce(sender: BlockSender, duration: Duration) {
    let sample_rate = DEFAULT_SAMPLE_RATE;
    sender.set_sample_rate(sample_rate);

    let block_duration = Duration::from_secs_f32(PRODUCER_BLOCK_FRAMES as f32 / sample_rate);
    let mut tone = Oscillator { phase: 0.0 };
    let mut sweep = Oscillator { phase: 0.0 };
    let mut tone_block = vec![0.0; PRODUCER_BLOCK_FRAMES];
    let mut sweep_block = vec![0.0; PRODUCER_BLOCK_FRAMES];
    let started = Instant::now();

    while started.elapsed() < duration && !sender.is_closed() {
        let progress = started.elapsed().as_secs_f32() / duration.as_secs_f32();
        let sweep_frequency = 200.0 + progress * 7_800.0;

        tone.render(3_000.0, 0.5, sample_rate, &mut tone_block);
        sweep.render(sweep_frequency, 0.25, sample_rate, &mut sweep_block);

        let mut left = tone_block.clone();
        let mut right = tone_block.clone();
        vector::add(&mut left, &sweep_block);
        vector::subtract(&mut right, &sweep_block);

        sender.push(&left, &right);
        thread::sleep(block_duration);
    }

    info!(
        "[demo] tone producer finished; {} blocks dropped",
        sender.dropped_blocks()
    );
}
