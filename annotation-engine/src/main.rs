use annotation_engine::app::frames::Frames;
use annotation_engine::app::setup::create_app;
use annotation_engine::app::Cache;
use annotation_engine::{EngineConfig, FrameList};
use asset_cache::{CacheConfig, CacheStore, DiskMedium, FileFetcher, MemoryMedium, StoreMedium};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Default)]
struct Options {
    config: Option<PathBuf>,
    frames: Option<PathBuf>,
    pcd_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    task: Option<String>,
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut options = Options::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => options.config = Some(PathBuf::from(iter.next()?)),
            "--frames" => options.frames = Some(PathBuf::from(iter.next()?)),
            "--pcd-dir" => options.pcd_dir = Some(PathBuf::from(iter.next()?)),
            "--cache-dir" => options.cache_dir = Some(PathBuf::from(iter.next()?)),
            "--task" => options.task = Some(iter.next()?.clone()),
            _ => return None,
        }
    }
    Some(options)
}

/// Disk cache when a directory is given. A medium that cannot open leaves the store degraded.
fn open_medium(cache_dir: Option<&PathBuf>) -> Option<Box<dyn StoreMedium>> {
    match cache_dir {
        Some(dir) => match DiskMedium::open(dir.clone()) {
            Ok(medium) => Some(Box::new(medium)),
            Err(e) => {
                eprintln!("Cache directory {} unavailable: {}", dir.display(), e);
                None
            }
        },
        None => Some(Box::new(MemoryMedium::new())),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let Some(options) = parse_args(&args) else {
        eprintln!(
            "Usage: {} [--config engine.json] [--frames frames.json] [--pcd-dir dir] [--cache-dir dir] [--task name]",
            args.first().map(String::as_str).unwrap_or("annotation-engine")
        );
        std::process::exit(1);
    };

    let config = match &options.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    let (cache, frames) = match &options.frames {
        Some(path) => {
            let list = FrameList::from_json_file(path)?;
            let root = options
                .pcd_dir
                .clone()
                .or_else(|| path.parent().map(PathBuf::from))
                .unwrap_or_default();
            let task = options.task.clone().unwrap_or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("default")
                    .to_string()
            });
            let store = CacheStore::spawn(
                CacheConfig::new(task),
                open_medium(options.cache_dir.as_ref()),
                Arc::new(FileFetcher::with_root(root)),
            )?;
            (Some(Cache(store)), Some(Frames::new(list)))
        }
        None => (None, None),
    };

    create_app(config, cache, frames).run();
    Ok(())
}
