use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use pathtrace::film::Film;
use pathtrace::integrator::{Integrator, RenderOptions};
use pathtrace::scene::demo::cornell_box;
use pathtrace::scene::UploadLimits;
use pathtrace::Float;

/// Progressively render the built-in Cornell box to a PNG.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value_t = 512)]
    width: u32,
    #[arg(long, default_value_t = 512)]
    height: u32,
    /// Total samples per pixel.
    #[arg(long, default_value_t = 64)]
    spp: u32,
    /// Samples per pixel added by each progressive pass.
    #[arg(long, default_value_t = 4)]
    spp_per_pass: u32,
    #[arg(long, default_value_t = 1.0)]
    exposure: Float,
    #[arg(long, default_value_t = 5)]
    max_depth: u32,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let scene = cornell_box().context("building demo scene")?;
    let packed = scene.pack(&UploadLimits::default())?;
    tracing::info!(bytes = packed.total_bytes(), "scene tables packed");

    let integrator = Integrator::new(RenderOptions {
        max_depth: args.max_depth,
        seed: args.seed,
        ..RenderOptions::default()
    });

    let mut film = Film::new(args.width, args.height);
    let per_pass = args.spp_per_pass.clamp(1, args.spp.max(1));
    let passes = (args.spp + per_pass - 1) / per_pass;
    let blocks = integrator.block_count(args.height);

    let progress = ProgressBar::new(passes as u64 * blocks as u64);
    progress.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} bands [{elapsed_precise}]")?);

    let mut discarded = 0;
    let mut done = 0;
    for _ in 0..passes {
        let spp = per_pass.min(args.spp - done);
        for block_y in 0..blocks {
            discarded += integrator.render_frame(&scene, &mut film, block_y, spp, args.exposure).discarded;
            progress.inc(1);
        }
        done += spp;
    }
    progress.finish();

    if discarded > 0 {
        tracing::warn!(discarded, "non-finite samples were dropped");
    }

    let bytes: Vec<u8> = film.frame_buffer().iter().flatten().copied().collect();
    let img = image::RgbaImage::from_raw(args.width, args.height, bytes)
        .context("frame buffer does not match the image dimensions")?;
    img.save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    tracing::info!(output = %args.output.display(), "done");
    Ok(())
}
