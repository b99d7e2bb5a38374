//! Example: live stacking a list of captured frames.
//!
//! Frames are described in a YAML manifest (a list of `LiveStackItem`s with
//! their detected stars). The worker calibrates, aligns and stacks them in
//! the background while this thread feeds the queue.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example live_stacking -- <frames.yaml> [livestack.yaml] [library.yaml]
//! ```
//!
//! Processed frame files are deleted unless `delete_processed_frames: false`
//! is set in the configuration.

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use livestack::{CalibrationLibrary, FitsCodec, LiveStackConfig, LiveStackItem, LiveStackWorker};

fn main() -> anyhow::Result<()> {
    common::log_setup::setup_logging("info")?;

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("Usage: {} <frames.yaml> [livestack.yaml] [library.yaml]", args[0]);
    }

    let manifest = Path::new(&args[1]);
    let text = std::fs::read_to_string(manifest).with_context(|| format!("Failed to read {}", manifest.display()))?;
    let items: Vec<LiveStackItem> =
        serde_yml::from_str(&text).with_context(|| format!("Invalid frame manifest {}", manifest.display()))?;

    let config = match args.get(2) {
        Some(path) => LiveStackConfig::load(Path::new(path))?,
        None => LiveStackConfig::default(),
    };
    let library = match args.get(3) {
        Some(path) => CalibrationLibrary::load(Path::new(path))?,
        None => CalibrationLibrary::new(),
    };

    println!(
        "Live stacking {} frames into {}",
        items.len(),
        config.stacks_dir().display()
    );

    let worker = LiveStackWorker::spawn(config, library, Arc::new(FitsCodec))?;
    let queue = worker.queue();
    for item in items {
        queue.blocking_enqueue(item).context("Worker stopped early")?;
    }
    drop(queue);

    let summary = worker.finish()?;
    println!("\n--- Stack Summary ---");
    println!("Seeded:   {}", summary.seeded);
    println!("Stacked:  {}", summary.stacked);
    println!("Rejected: {}", summary.rejected);
    println!("Failed:   {}", summary.failed);
    Ok(())
}
