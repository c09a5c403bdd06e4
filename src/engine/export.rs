//! Flat text dump of the retained history.
//!
//! Every column pair becomes four rows, `NNNN_left_mag`, `NNNN_left_phase`,
//! `NNNN_right_mag` and `NNNN_right_phase`, each followed by one
//! comma-terminated value per bin.

use crate::dsp::spectrogram::ColumnHistory;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Write both histories, oldest column first. Returns the number of column
/// pairs written.
pub fn write_history<W: Write>(
    mut writer: W,
    left: &ColumnHistory,
    right: &ColumnHistory,
) -> io::Result<usize> {
    let columns = left.len().min(right.len());
    for (index, (l, r)) in left.iter().zip(right.iter()).enumerate() {
        write_row(&mut writer, index, "left_mag", &l.magnitudes)?;
        write_row(&mut writer, index, "left_phase", &l.phases)?;
        write_row(&mut writer, index, "right_mag", &r.magnitudes)?;
        write_row(&mut writer, index, "right_phase", &r.phases)?;
    }
    writer.flush()?;
    Ok(columns)
}

fn write_row<W: Write>(writer: &mut W, index: usize, label: &str, values: &[f32]) -> io::Result<()> {
    write!(writer, "{index:04}_{label},")?;
    for value in values {
        write!(writer, "{value:.6},")?;
    }
    writeln!(writer)
}

pub fn dump_file_name(unix_seconds: u64) -> String {
    format!("dump_at_{unix_seconds}.csv")
}

/// Write the dump into `directory` under a timestamped name.
pub fn dump_to_dir(directory: &Path, left: &ColumnHistory, right: &ColumnHistory) -> Result<PathBuf> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let path = directory.join(dump_file_name(seconds));
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let columns = write_history(BufWriter::new(file), left, right)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("[export] wrote {columns} columns to {}", path.display());
    Ok(path)
}

/// Inverse of [`write_history`] for one row; used to sanity check dumps.
#[cfg_attr(not(test), allow(dead_code))]
pub fn parse_row(line: &str) -> Option<(usize, &str, Vec<f32>)> {
    let mut fields = line.trim_end().trim_end_matches(',').split(',');
    let (index, label) = fields.next()?.split_once('_')?;
    let values = fields.map(str::parse).collect::<Result<Vec<f32>, _>>().ok()?;
    Some((index.parse().ok()?, label, values))
}
