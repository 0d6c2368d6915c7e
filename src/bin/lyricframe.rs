use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use lyricframe::encode::ffmpeg::ensure_parent_dir;
use lyricframe::{
    AudioTrack, BackgroundSource, FfmpegSink, FfmpegSinkOpts, FrameIndex, ImageBackground,
    RenderCache, RenderCacheOpts, RenderEnv, RenderJob, RenderJobOpts, SolidBackground,
    StyleConfig, SubtitleFormat, TranscriptFile, VideoBackground, probe_audio, save_subtitles,
};

#[derive(Parser, Debug)]
#[command(name = "lyricframe", version, about = "Render word-timed lyric videos")]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Plan lines and print them as JSON, SRT or WebVTT.
    Lines(LinesArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Render the full video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Print every style option with its default and effect.
    Options,
}

#[derive(Parser, Debug)]
struct JobArgs {
    /// Transcript JSON with word timestamps.
    #[arg(long)]
    transcript: PathBuf,

    /// Style JSON; omitted keys take their defaults.
    #[arg(long)]
    style: Option<PathBuf>,

    /// Audio file; its duration extends the timeline and it is muxed into renders.
    #[arg(long)]
    audio: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LinesFormat {
    Json,
    Srt,
    Vtt,
}

#[derive(Parser, Debug)]
struct LinesArgs {
    #[command(flatten)]
    job: JobArgs,

    #[arg(long, value_enum, default_value_t = LinesFormat::Json)]
    format: LinesFormat,

    /// Output file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Background image or video; the style's background color when omitted.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Background image or video; the style's background color when omitted.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Output video path; the container follows the extension.
    #[arg(long)]
    out: PathBuf,

    /// Overwrite output if it already exists.
    #[arg(long)]
    overwrite: bool,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Frames dispatched per chunk.
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Persist rendered frames here and reuse them on the next run.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Also write subtitles (.srt, .vtt or .json) next to the video.
    #[arg(long)]
    subtitles: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);
    match cli.cmd {
        Command::Lines(args) => cmd_lines(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
        Command::Options => cmd_options(),
    }
}

fn init_logging(level: &str, json: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
}

fn load_style(path: Option<&Path>) -> anyhow::Result<StyleConfig> {
    match path {
        Some(p) => StyleConfig::from_path(p)
            .with_context(|| format!("load style '{}'", p.display())),
        None => Ok(StyleConfig::default()),
    }
}

fn load_audio(path: Option<&Path>) -> anyhow::Result<Option<AudioTrack>> {
    path.map(|p| probe_audio(p).with_context(|| format!("probe audio '{}'", p.display())))
        .transpose()
}

fn plan(args: &JobArgs, opts: RenderJobOpts) -> anyhow::Result<RenderJob> {
    let style = load_style(args.style.as_deref())?;
    let audio = load_audio(args.audio.as_deref())?;
    let transcript = TranscriptFile::new(&args.transcript);
    let job = match audio {
        Some(audio) => RenderJob::transcribe_and_plan(&transcript, audio, &style, opts)?,
        None => {
            let words = transcript
                .load()
                .with_context(|| format!("load transcript '{}'", args.transcript.display()))?;
            RenderJob::plan(&words, &style, None, opts)?
        }
    };
    Ok(job)
}

fn open_background(
    path: Option<&Path>,
    style: &StyleConfig,
) -> anyhow::Result<Arc<dyn BackgroundSource>> {
    let Some(path) = path else {
        return Ok(Arc::new(SolidBackground::new(style.background_color)));
    };
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let source: Arc<dyn BackgroundSource> = match ext.as_str() {
        "png" | "jpg" | "jpeg" | "webp" | "bmp" | "gif" | "tif" | "tiff" => Arc::new(
            ImageBackground::open(path)
                .with_context(|| format!("open background image '{}'", path.display()))?,
        ),
        _ => Arc::new(
            VideoBackground::open(path)
                .with_context(|| format!("open background video '{}'", path.display()))?,
        ),
    };
    Ok(source)
}

fn cmd_lines(args: LinesArgs) -> anyhow::Result<()> {
    let job = plan(&args.job, RenderJobOpts::default())?;
    let format = match args.format {
        LinesFormat::Json => SubtitleFormat::Json,
        LinesFormat::Srt => SubtitleFormat::Srt,
        LinesFormat::Vtt => SubtitleFormat::Vtt,
    };
    let content = lyricframe::export::subtitles::render_subtitles(job.lines(), format)?;
    match args.out {
        Some(out) => {
            ensure_parent_dir(&out)?;
            std::fs::write(&out, content)
                .with_context(|| format!("write lines '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let job = plan(&args.job, RenderJobOpts::default())?;
    let background = open_background(args.background.as_deref(), job.compositor().style())?;
    let frame = job.render_frame(FrameIndex(args.frame), background)?;

    ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let opts = RenderJobOpts {
        threads: args.threads,
        chunk_size: args.chunk_size,
        ..RenderJobOpts::default()
    };
    let job = plan(&args.job, opts)?;
    let background = open_background(args.background.as_deref(), job.compositor().style())?;

    let mut env = RenderEnv::new(background);
    if let Some(dir) = args.cache_dir {
        let cache = RenderCache::new(RenderCacheOpts {
            disk_dir: Some(dir),
            ..RenderCacheOpts::default()
        })?;
        env = env.with_cache(Arc::new(cache));
    }

    let mut sink = FfmpegSink::new(FfmpegSinkOpts {
        overwrite: args.overwrite,
        ..FfmpegSinkOpts::new(args.out.clone())
    });
    let stats = job.render(&env, &mut sink)?;

    if let Some(subs) = args.subtitles.as_deref() {
        ensure_parent_dir(subs)?;
        save_subtitles(job.lines(), subs)?;
        eprintln!("wrote {}", subs.display());
    }

    eprintln!(
        "wrote {} ({} frames, {} rendered, {} cached)",
        args.out.display(),
        stats.frames_total,
        stats.frames_rendered,
        stats.frames_cached
    );
    Ok(())
}

fn cmd_options() -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    let width = StyleConfig::OPTIONS
        .iter()
        .map(|o| o.name.len())
        .max()
        .unwrap_or(0);
    for opt in StyleConfig::OPTIONS {
        writeln!(
            stdout,
            "{:<width$}  {:<10}  {}",
            opt.name, opt.default, opt.effect
        )?;
    }
    Ok(())
}
