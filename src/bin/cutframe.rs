use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cutframe", version)]
struct Cli {
    /// Engine configuration JSON.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a single instant as a PNG.
    Frame(FrameArgs),
    /// Run one pre-render pass and print the cached ranges.
    Prerender(PrerenderArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Timeline time in seconds.
    #[arg(long)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Output size relative to the project canvas.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
}

#[derive(Parser, Debug)]
struct PrerenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Playhead in seconds the pass spreads out from.
    #[arg(long, default_value_t = 0.0)]
    playhead: f64,

    /// Override `prerender.max_batch`.
    #[arg(long)]
    max_batch: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => cutframe::EditorConfig::from_path(path)?,
        None => cutframe::EditorConfig::default(),
    };
    match cli.cmd {
        Command::Frame(args) => cmd_frame(&config, args).await,
        Command::Prerender(args) => cmd_prerender(config, args).await,
    }
}

fn read_project(path: &Path) -> anyhow::Result<cutframe::Timeline> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("open project '{}'", path.display()))?;
    let timeline = cutframe::Timeline::from_json_str(&s).with_context(|| "parse project JSON")?;
    Ok(timeline)
}

fn media_pool(in_path: &Path, config: &cutframe::EditorConfig) -> Arc<cutframe::MediaPool> {
    let root = in_path.parent().unwrap_or_else(|| Path::new("."));
    Arc::new(cutframe::MediaPool::new(
        Arc::new(cutframe::StillFactory::new(root)),
        Arc::new(cutframe::FsImageDecoder::new(root)),
        config.media_opts(),
    ))
}

async fn cmd_frame(config: &cutframe::EditorConfig, args: FrameArgs) -> anyhow::Result<()> {
    if !(args.scale.is_finite() && args.scale > 0.0) {
        anyhow::bail!("--scale must be > 0");
    }
    let timeline = read_project(&args.in_path)?;
    let pool = media_pool(&args.in_path, config);
    pool.sync_with(&timeline);
    if !pool.prepare_at(&timeline, args.time).await {
        tracing::warn!(time = args.time, "some media failed to load; frame is incomplete");
    }

    let canvas = config.project.canvas;
    let (w, h) = cutframe::scaled_size(canvas, args.scale);
    let (frame, ready) = cutframe::render_bitmap(&cutframe::CompositeInput {
        time: args.time,
        scene: &timeline,
        media: pool.as_ref(),
        live_mask: None,
        canvas,
        render_rect: cutframe::Rect::new(0.0, 0.0, f64::from(w), f64::from(h)),
    })?;
    if !ready {
        tracing::warn!(time = args.time, "rendered with missing media");
    }

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba8(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({}x{} @ {})",
        args.out.display(),
        frame.width(),
        frame.height(),
        cutframe::format_timecode(args.time, config.project.fps)
    );
    Ok(())
}

async fn cmd_prerender(
    mut config: cutframe::EditorConfig,
    args: PrerenderArgs,
) -> anyhow::Result<()> {
    if let Some(max_batch) = args.max_batch {
        config.prerender.max_batch = max_batch;
        config.validate()?;
    }
    let timeline = read_project(&args.in_path)?;
    let pool = media_pool(&args.in_path, &config);
    pool.sync_with(&timeline);

    let fps = config.project.fps;
    let cache = Arc::new(cutframe::FrameCache::new(fps));
    let prerender = Arc::new(cutframe::Prerenderer::new(
        cache.clone(),
        pool,
        config.prerender_opts(),
        cutframe::SharedTime::new(args.playhead),
    ));
    let scene = cutframe::RenderScene::new(timeline, config.project.canvas);
    let report = prerender.begin(scene, args.playhead).run().await;

    println!(
        "queued {} committed {} not-ready {}",
        report.queued, report.committed, report.not_ready
    );
    for (start, end) in cache.cached_time_ranges() {
        println!(
            "cached {} - {}",
            cutframe::format_timecode(start, fps),
            cutframe::format_timecode(end, fps)
        );
    }
    Ok(())
}
