// Example runner: animates the fill of one or more PNG icons and writes every frame.
//
// Usage: fill_level <output_dir> <input.png> [more.png ...]
// Set FILL_LEVEL_WORKERS to size the worker pool.

use anyhow::{Context, bail};
use fill_level::core_modules::pixel_buffer::PixelBuffer;
use fill_level::parallel_pipeline::{ParallelFillPipeline, WorkerPool};
use fill_level::pipeline::PipelineConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FRAMES: u32 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Argument Parsing ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("Usage: fill_level <output_dir> <input.png> [more.png ...]");
    }
    let output_dir = PathBuf::from(&args[1]);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    // --- 2. Image Loading ---
    let mut images = Vec::new();
    for input in &args[2..] {
        let image = PixelBuffer::open(input).with_context(|| format!("opening {input}"))?;
        println!("Loaded {input}: {}x{}", image.width(), image.height());
        images.push(image);
    }

    // --- 3. Worker Pool & Scans ---
    let config = PipelineConfig::from_env();
    println!("Starting {} workers", config.worker_count);
    let pool = Arc::new(WorkerPool::new(config));
    let mut animations = ParallelFillPipeline::load_all(Arc::clone(&pool), images).await?;

    // --- 4. Fill Loop ---
    for (index, animation) in animations.iter_mut().enumerate() {
        let image_dir = output_dir.join(format!("image_{index:02}"));
        std::fs::create_dir_all(&image_dir)?;

        for frame in 0..=FRAMES {
            let level = frame as f64 / FRAMES as f64;
            let cursor = animation.set_level(level).await?;
            save_frame(&image_dir, frame, animation)?;
            println!(
                "image {index} level {:>3}%: {cursor}/{} pixels filled",
                (level * 100.0).round(),
                animation.descriptor_count()
            );
        }
    }

    drop(animations);
    if let Ok(pool) = Arc::try_unwrap(pool) {
        pool.shutdown().await;
    }

    println!("Processing complete. Frames saved to {}", output_dir.display());
    Ok(())
}

fn save_frame(dir: &Path, frame: u32, animation: &ParallelFillPipeline) -> anyhow::Result<()> {
    let path = dir.join(format!("frame_{frame:03}.png"));
    let buffer = animation.frame().context("fill result was lost")?;
    buffer
        .save_png(&path)
        .with_context(|| format!("saving {}", path.display()))?;
    Ok(())
}
