/// `pcd-info`: decode PCD files and report point counts and ranges
use indicatif::{ProgressBar, ProgressStyle};
use pcd_decoder::{DataMode, DecodeError, DecodedPointCloud, decode, write_pcd_file};
use rayon::prelude::*;
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum InfoError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, Serialize)]
struct FileReport {
    path: String,
    points: usize,
    has_intensity: bool,
    ranges: pcd_decoder::Ranges,
    #[serde(skip_serializing_if = "Option::is_none")]
    converted: Option<String>,
}

struct Options {
    json: bool,
    convert: Option<DataMode>,
    files: Vec<PathBuf>,
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut options = Options {
        json: false,
        convert: None,
        files: Vec::new(),
    };
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => options.json = true,
            "--to" => options.convert = Some(DataMode::from_string(iter.next()?)?),
            other => options.files.push(PathBuf::from(other)),
        }
    }
    (!options.files.is_empty()).then_some(options)
}

fn converted_path(path: &Path, mode: DataMode) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("cloud");
    path.with_file_name(format!("{stem}.{}.pcd", mode.as_str()))
}

fn process(path: &Path, convert: Option<DataMode>) -> Result<FileReport, InfoError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| InfoError::Io {
        path: display.clone(),
        source,
    })?;
    let cloud: DecodedPointCloud = decode(&bytes).map_err(|source| InfoError::Decode {
        path: display.clone(),
        source,
    })?;

    let converted = match convert {
        Some(mode) => {
            let target = converted_path(path, mode);
            write_pcd_file(&target, &cloud, mode).map_err(|source| InfoError::Io {
                path: target.display().to_string(),
                source,
            })?;
            Some(target.display().to_string())
        }
        None => None,
    };

    Ok(FileReport {
        path: display,
        points: cloud.len(),
        has_intensity: cloud.has_intensity(),
        ranges: cloud.ranges,
        converted,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(options) = parse_args(&args) else {
        eprintln!(
            "Usage: {} [--json] [--to ascii|binary|binary_compressed] <file.pcd>...",
            args.first().map(String::as_str).unwrap_or("pcd-info")
        );
        std::process::exit(1);
    };

    let pb = ProgressBar::new(options.files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")?
            .progress_chars("▉▊▋▌▍▎▏ "),
    );
    pb.set_message("Decoding");

    let results: Vec<Result<FileReport, InfoError>> = options
        .files
        .par_iter()
        .map(|path| {
            let result = process(path, options.convert);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_with_message("Decoded");

    let mut reports = Vec::with_capacity(results.len());
    let mut failures = 0;
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(err) => {
                warn!("{err}");
                failures += 1;
            }
        }
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}: {} points", report.path, report.points);
            println!("  X: {:.3} to {:.3}", report.ranges.x.min, report.ranges.x.max);
            println!("  Y: {:.3} to {:.3}", report.ranges.y.min, report.ranges.y.max);
            println!("  Z: {:.3} to {:.3}", report.ranges.z.min, report.ranges.z.max);
            if report.has_intensity {
                println!(
                    "  Intensity: {:.3} to {:.3}",
                    report.ranges.intensity.min, report.ranges.intensity.max
                );
            }
            if let Some(target) = &report.converted {
                println!("  Saved {target}");
            }
        }
    }

    info!("{} decoded, {} failed", reports.len(), failures);
    if failures > 0 {
        std::process::exit(2);
    }
    Ok(())
}
