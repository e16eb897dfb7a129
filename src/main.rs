mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

use cli::Cli;
use peakprobe::config::{self, Config};
use peakprobe::{AnalysisResult, Analyzer};

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    #[serde(flatten)]
    result: &'a AnalysisResult,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };
    cli.apply_to(&mut cfg);

    for input in &cli.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }

    let analyzer = Analyzer::with_runner(cfg.runner(), cfg.options());

    let jobs = cli.jobs.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build worker pool")?;

    let pb = if cli.inputs.len() > 1 {
        let pb = ProgressBar::new(cli.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")
                .context("Invalid progress template")?
                .progress_chars("=>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    log::info!("Analysing {} file(s) with {} job(s)", cli.inputs.len(), jobs);

    let results: Vec<AnalysisResult> = pool.install(|| {
        cli.inputs
            .par_iter()
            .map(|input| {
                let result = analyzer.analyze(input);
                log_result(input, &result);
                pb.inc(1);
                result
            })
            .collect()
    });
    pb.finish_and_clear();

    let json = if let [single] = results.as_slice() {
        render(single, cli.pretty)?
    } else {
        let reports: Vec<FileReport> = cli
            .inputs
            .iter()
            .zip(&results)
            .map(|(input, result)| FileReport {
                file: input.display().to_string(),
                result,
            })
            .collect();
        render(&reports, cli.pretty)?
    };

    match cli.output {
        Some(ref path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }

    Ok(())
}

fn render<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("Failed to serialize results")
}

fn log_result(input: &Path, result: &AnalysisResult) {
    match (&result.duration_ms, &result.peaks) {
        (Some(ms), Some(peaks)) => {
            log::info!("{}: {:.1}s, {} peaks", input.display(), *ms as f64 / 1000.0, peaks.len())
        }
        (Some(ms), None) => {
            log::warn!("{}: {:.1}s, no waveform", input.display(), *ms as f64 / 1000.0)
        }
        _ => log::warn!("{}: could not be analysed", input.display()),
    }
}
