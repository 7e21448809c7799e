//! This module is responsible for getting corrected data out of the process

use std::io::Write;

use chrono::{DateTime, Datelike, Timelike, Utc};
use crossbeam_channel::{select, Receiver};
use tracing::{debug, info};

use crate::error::Result;
use crate::iq::IqFormat;
use crate::spectrum::SpectrumSnapshot;
use crate::SampleBatch;

/// Convert a chrono DateTime into a filename-safe timestamp string
fn file_timestamp(time: &DateTime<Utc>) -> String {
    format!(
        "{}-{:02}-{:02}T{:02}-{:02}-{:02}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// Output file name for a recording started at `time`
pub fn output_name_at(format: IqFormat, time: &DateTime<Utc>) -> String {
    format!("dedrift-{}.{}", file_timestamp(time), format.extension())
}

pub fn default_output_name(format: IqFormat) -> String {
    output_name_at(format, &Utc::now())
}

/// Drain corrected batches into `writer` until every sender is gone.
/// Returns the number of samples written.
pub fn write_samples<W: Write>(
    receiver: Receiver<SampleBatch>,
    mut writer: W,
    format: IqFormat,
) -> Result<u64> {
    let mut bytes = Vec::new();
    let mut written = 0u64;
    for batch in receiver {
        format.pack(&batch, &mut bytes);
        writer.write_all(&bytes)?;
        written += batch.len() as u64;
    }
    writer.flush()?;
    info!("Wrote {} corrected samples", written);
    Ok(written)
}

/// Frequency of the strongest bin, relative to the center of the snapshot
pub fn peak_frequency(snapshot: &SpectrumSnapshot) -> Option<f64> {
    let n = snapshot.bins.len();
    let (idx, _) = snapshot
        .bins
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    Some((idx as f64 - (n / 2) as f64) * snapshot.sample_rate / n as f64)
}

/// Watch both spectrum streams until they close, logging where the peak sits.
/// Returns how many snapshots were seen.
pub fn spectrum_consumer(
    segment: Receiver<SpectrumSnapshot>,
    full_band: Receiver<SpectrumSnapshot>,
) -> u64 {
    let mut seen = 0u64;
    loop {
        select! {
            recv(segment) -> msg => match msg {
                Ok(snapshot) => {
                    seen += 1;
                    log_peak(&snapshot);
                }
                // A closed receiver is always ready, so stop selecting on it
                Err(_) => return seen + drain(&full_band),
            },
            recv(full_band) -> msg => match msg {
                Ok(snapshot) => {
                    seen += 1;
                    log_peak(&snapshot);
                }
                Err(_) => return seen + drain(&segment),
            },
        }
    }
}

fn log_peak(snapshot: &SpectrumSnapshot) {
    if let Some(peak) = peak_frequency(snapshot) {
        debug!("Spectrum peak ({:?}): {:.1} Hz", snapshot.kind, peak);
    }
}

fn drain(receiver: &Receiver<SpectrumSnapshot>) -> u64 {
    let mut seen = 0;
    for snapshot in receiver {
        seen += 1;
        log_peak(&snapshot);
    }
    seen
}
