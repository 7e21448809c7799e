use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use dedrift::{
    args::{self, Args},
    capture::{sample_queue, FileSource},
    control::{Controller, Reconfigurator},
    exfil,
    monitoring::Telemetry,
    processing::ProcessingLoop,
    Error, Result,
};
use tracing::{info, warn};

fn main() -> Result<()> {
    // Get the CLI options
    let cli = Args::parse();
    // Setup logging
    tracing_subscriber::fmt()
        .with_max_level(args::convert_filter(cli.verbose.log_level_filter()))
        .init();
    info!("Starting beacon drift compensation");

    let config = cli.pipeline_config();
    let telemetry = Arc::new(Telemetry::default());
    let reconfigurator = Reconfigurator::new(&config, telemetry.clone());

    // Setup the channels between the threads
    let (queue_tx, queue_rx) = sample_queue();
    let (sink_tx, sink_rx) = crossbeam_channel::unbounded();

    // Build everything before any thread starts so bad config fails fast
    let (processing, spectra) =
        ProcessingLoop::new(&config, &reconfigurator, queue_rx, sink_tx, telemetry.clone())?;
    let stop = processing.stop_signal();

    let source = FileSource::open(&cli.input, cli.format, config.source.sample_rate)?
        .batch_size(cli.batch_size)
        .paced(!cli.fast);
    let controller = Controller::new(reconfigurator, source.tuner(), config.source.sample_rate);
    controller.set_sample_rate(config.source.sample_rate)?;
    controller.set_center_frequency(config.source.center_frequency)?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| exfil::default_output_name(cli.format).into());
    info!("Writing corrected samples to {}", output.display());
    let writer = BufWriter::new(File::create(&output)?);

    // Stop everything on ctrl-c
    let ctrlc_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("Caught ctrl-c, stopping");
        ctrlc_stop.stop();
    })
    .map_err(|e| Error::config(format!("could not install ctrl-c handler: {}", e)))?;

    // Spawn all the threads
    let format = cli.format;
    let exfil_thread = thread::Builder::new()
        .name("exfil".to_owned())
        .spawn(move || exfil::write_samples(sink_rx, writer, format))?;
    let spectrum_thread = thread::Builder::new()
        .name("spectra".to_owned())
        .spawn(move || exfil::spectrum_consumer(spectra.segment, spectra.full_band))?;
    let loop_handle = processing.spawn()?;
    let capture_stop = stop.clone();
    let capture_thread = thread::Builder::new()
        .name("capture".to_owned())
        .spawn(move || source.run(queue_tx, capture_stop))?;

    // Capture ends on EOF or ctrl-c, then the loop drains the queue and closes the sink
    let captured = capture_thread
        .join()
        .map_err(|_| Error::ThreadPanicked("capture"))??;
    info!("Captured {} samples", captured);
    // The loop owns the sink and spectrum senders, dropping it closes those streams
    drop(loop_handle.join()?);
    let written = exfil_thread
        .join()
        .map_err(|_| Error::ThreadPanicked("exfil"))??;
    let spectra = spectrum_thread
        .join()
        .map_err(|_| Error::ThreadPanicked("spectra"))?;

    if written != captured && !stop.is_stopped() {
        warn!("Captured {} samples but wrote {}", captured, written);
    }
    info!(
        "Done: {} batches, {} spectra, final lock offset {:.1} Hz",
        telemetry.batches(),
        spectra,
        telemetry.lock_offset()
    );
    Ok(())
}
