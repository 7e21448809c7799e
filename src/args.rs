//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::Parser;

use crate::capture::DEFAULT_BATCH_SIZE;
use crate::config::*;
use crate::iq::IqFormat;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Raw IQ recording to read samples from
    #[clap(short, long)]
    pub input: PathBuf,
    /// Where to write corrected samples (defaults to a timestamped file)
    #[clap(short, long)]
    pub output: Option<PathBuf>,
    /// Sample format of the input and output files (cu8 or cf32)
    #[clap(short, long, default_value = "cu8")]
    pub format: IqFormat,
    /// Sample rate of the recording, samples per second
    #[clap(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    pub sample_rate: u32,
    /// Frequency the recording was tuned to, in Hz
    #[clap(short, long, default_value_t = DEFAULT_CENTER_FREQUENCY)]
    pub center_frequency: u32,
    /// Offset of the beacon from the center frequency, in Hz
    #[clap(short, long, default_value_t = DEFAULT_BEACON_OFFSET, allow_hyphen_values = true)]
    pub beacon_offset: f64,
    /// Decimation of the translator in front of the tracking loop
    #[clap(short, long, default_value_t = DEFAULT_DECIMATION)]
    pub decimation: u32,
    /// DC gain of the translator low-pass
    #[clap(long, default_value_t = DEFAULT_TRANSLATOR_GAIN)]
    pub translator_gain: f64,
    /// Transition band width of the translator low-pass, in Hz
    #[clap(long, default_value_t = DEFAULT_TRANSLATOR_TRANSITION_WIDTH)]
    pub transition_width: f64,
    #[clap(long, default_value_t = DEFAULT_AGC_ATTACK_RATE)]
    pub agc_attack_rate: f32,
    #[clap(long, default_value_t = DEFAULT_AGC_DECAY_RATE)]
    pub agc_decay_rate: f32,
    #[clap(long, default_value_t = DEFAULT_AGC_REFERENCE)]
    pub agc_reference: f32,
    /// Initial AGC gain
    #[clap(long, default_value_t = DEFAULT_AGC_GAIN)]
    pub agc_gain: f32,
    #[clap(long, default_value_t = DEFAULT_AGC_MAX_GAIN)]
    pub agc_max_gain: f32,
    /// Normalized bandwidth of the carrier tracking loop
    #[clap(long, default_value_t = DEFAULT_LOOP_BANDWIDTH)]
    pub loop_bandwidth: f32,
    /// Larger FFTs with a Blackman-Harris window for the spectra
    #[clap(long)]
    pub high_quality_fft: bool,
    /// Spectrum snapshots per second
    #[clap(long, default_value_t = DEFAULT_SPECTRUM_FPS)]
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    pub fft_fps: u32,
    /// Samples per batch read from the input
    #[clap(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Read the input as fast as possible instead of in real time
    #[clap(long)]
    pub fast: bool,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

impl Args {
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.source = SourceConfig {
            sample_rate: self.sample_rate,
            center_frequency: self.center_frequency,
        };
        let p = &mut config.processing;
        p.beacon_offset = self.beacon_offset;
        p.decimation = self.decimation;
        p.translation = TranslationConfig {
            gain: self.translator_gain,
            transition_width: self.transition_width,
        };
        p.agc = AgcConfig {
            attack_rate: self.agc_attack_rate,
            decay_rate: self.agc_decay_rate,
            reference: self.agc_reference,
            gain: self.agc_gain,
            max_gain: self.agc_max_gain,
        };
        p.costas.bandwidth = self.loop_bandwidth;
        config.spectrum.fps = self.fft_fps;
        config.spectrum.high_quality = self.high_quality_fft;
        config
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config() {
        let args = Args::parse_from(["dedrift", "--input", "rec.cu8"]);
        assert_eq!(args.format, IqFormat::Cu8);
        assert!(args.output.is_none());
        assert_eq!(args.pipeline_config(), PipelineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "dedrift",
            "-i",
            "rec.cf32",
            "-f",
            "cf32",
            "--center-frequency",
            "740010000",
            "--beacon-offset",
            "-57000",
            "--loop-bandwidth",
            "0.02",
            "--high-quality-fft",
            "--fast",
        ]);
        assert_eq!(args.format, IqFormat::Cf32);
        assert!(args.fast);
        let config = args.pipeline_config();
        assert_eq!(config.source.center_frequency, 740_010_000);
        assert_eq!(config.processing.beacon_offset, -57_000.0);
        assert_eq!(config.processing.costas.bandwidth, 0.02);
        assert!(config.spectrum.high_quality);
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        assert!(Args::try_parse_from(["dedrift", "-i", "x", "--sample-rate", "0"]).is_err());
    }

    #[test]
    fn test_filter_conversion() {
        assert_eq!(
            convert_filter(log::LevelFilter::Debug),
            tracing_subscriber::filter::LevelFilter::DEBUG
        );
    }
}
