//! Run the endpointer over a WAV file and print the detected speech regions
//! as JSON.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use murmur_core::audio::resample::resample;
use murmur_core::audio::{downmix, f32_slice_to_i16};
use murmur_core::endpointer::nearest_sample_rate;
use murmur_core::{Endpointer, EndpointerConfig, VadMode};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Args {
    input: PathBuf,
    output: Option<PathBuf>,
    config: EndpointerConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Region {
    start: f64,
    end: f64,
    samples: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    file: String,
    source_rate: u32,
    sample_rate: u32,
    frame_length: f64,
    duration: f64,
    regions: Vec<Region>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("murmur=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("murmur-endpoint failed: {e:#}");
        std::process::exit(1);
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut config = EndpointerConfig::default();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .with_context(|| format!("missing value for {name}"))
        };
        match arg.as_str() {
            "--window" => {
                config.window = value("--window")?
                    .parse()
                    .context("invalid value for --window")?;
            }
            "--ratio" => {
                config.ratio = value("--ratio")?
                    .parse()
                    .context("invalid value for --ratio")?;
            }
            "--mode" => {
                config.mode = value("--mode")?
                    .parse::<VadMode>()
                    .map_err(|e| anyhow::anyhow!("invalid value for --mode: {e}"))?;
            }
            "--frame-length" => {
                config.frame_length = value("--frame-length")?
                    .parse()
                    .context("invalid value for --frame-length")?;
            }
            "--output" => output = Some(PathBuf::from(value("--output")?)),
            "--help" | "-h" => {
                println!(
                    "Usage: murmur-endpoint <file.wav> [--window <secs>] [--ratio <0..1>] \\
  [--mode loose|medium-loose|medium-strict|strict] [--frame-length 0.01|0.02|0.03] \\
  [--output <file.json>]"
                );
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown argument: {other}"),
            other => {
                if input.is_some() {
                    bail!("more than one input file given");
                }
                input = Some(PathBuf::from(other));
            }
        }
    }

    let Some(input) = input else {
        bail!("no input file given (see --help)");
    };
    Ok(Args {
        input,
        output,
        config,
    })
}

/// Read a WAV file as mono f32 in [-1, 1].
fn read_wav_mono(path: &Path) -> anyhow::Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };
    Ok((downmix(&interleaved, channels), spec.sample_rate))
}

fn run() -> anyhow::Result<()> {
    let args = parse_args()?;
    let (audio, source_rate) = read_wav_mono(&args.input)?;

    let sample_rate = nearest_sample_rate(source_rate);
    let pcm = f32_slice_to_i16(&resample(&audio, source_rate, sample_rate)?);

    let mut endpointer = Endpointer::new(EndpointerConfig {
        sample_rate,
        ..args.config
    })?;
    info!(
        file = %args.input.display(),
        source_rate,
        sample_rate,
        samples = pcm.len(),
        "endpointing"
    );

    let frame_size = endpointer.frame_size();
    let mut regions = Vec::new();
    let mut current: Option<Region> = None;

    let mut track = |ep: &Endpointer, speech: Option<Vec<i16>>, current: &mut Option<Region>| {
        let Some(samples) = speech else {
            return;
        };
        let region = current.get_or_insert(Region {
            start: ep.speech_start(),
            end: 0.0,
            samples: 0,
        });
        region.samples += samples.len();
        if !ep.in_speech() {
            region.end = ep.speech_end();
            debug!(start = region.start, end = region.end, "speech region");
            regions.extend(current.take());
        }
    };

    let mut chunks = pcm.chunks_exact(frame_size);
    for frame in &mut chunks {
        let speech = endpointer.process(frame)?;
        track(&endpointer, speech, &mut current);
    }
    let speech = endpointer.end_stream(chunks.remainder())?;
    track(&endpointer, speech, &mut current);

    let report = Report {
        file: args.input.display().to_string(),
        source_rate,
        sample_rate,
        frame_length: endpointer.frame_length(),
        duration: endpointer.timestamp(),
        regions,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), regions = report.regions.len(), "report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
