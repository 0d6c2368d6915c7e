use crate::cache::fingerprint::{Fingerprint, fingerprint_lines, fingerprint_words, input_hash};
use crate::cache::store::{CacheKey, RenderCache};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{JobLocation, LyricError, LyricResult, Stage};
use crate::lines::segment::segment_words;
use crate::media::audio::AudioTrack;
use crate::media::background::{BackgroundResolver, BackgroundSource};
use crate::render::compositor::FrameCompositor;
use crate::render::frame::FrameRGBA;
use crate::session::budget::{WorkerBudget, WorkerPermit};
use crate::session::cancel::CancelToken;
use crate::session::retry::{RetryPolicy, run_with_retry};
use crate::style::config::StyleConfig;
use crate::timing::schedule::{ScheduledLine, schedule_lines};
use crate::timing::timeline::total_duration;
use crate::transcript::normalize::normalize_words;
use crate::transcript::source::Transcriber;
use crate::transcript::word::Word;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MAX_REORDER_BUFFER_BYTES: u64 = 128 * 1024 * 1024;

/// Options controlling planning and frame rendering.
#[derive(Clone, Debug)]
pub struct RenderJobOpts {
    /// Worker threads for the job's pool. `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Frames dispatched per chunk; cancellation is checked between chunks.
    pub chunk_size: usize,
    /// Bounded channel capacity between render workers and the encoder thread.
    pub channel_capacity: usize,
    pub retry: RetryPolicy,
    /// Per-call limit for background fetches.
    pub fetch_timeout: Duration,
    /// Limit for handing one frame to the encoder thread.
    pub handoff_timeout: Duration,
    /// Re-segmentation attempts with shorter lines when scheduling finds an overlap.
    pub reschedule_attempts: u32,
    /// Factor applied to `max_duration` on every re-segmentation, in `(0, 1)`.
    pub reschedule_factor: f64,
}

impl Default for RenderJobOpts {
    fn default() -> Self {
        Self {
            threads: None,
            chunk_size: 64,
            channel_capacity: 4,
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(10),
            handoff_timeout: Duration::from_secs(30),
            reschedule_attempts: 2,
            reschedule_factor: 0.5,
        }
    }
}

impl RenderJobOpts {
    fn validate(&self) -> LyricResult<()> {
        if self.threads == Some(0) {
            return Err(LyricError::validation(
                "render job 'threads' must be >= 1 when set",
            ));
        }
        let f = self.reschedule_factor;
        if f.is_nan() || f <= 0.0 || f >= 1.0 {
            return Err(LyricError::validation(
                "render job 'reschedule_factor' must be in (0, 1)",
            ));
        }
        Ok(())
    }
}

/// Shared collaborators for rendering a job.
///
/// The cache and budget are meant to be shared between jobs; the cancel token is per job.
#[derive(Clone)]
pub struct RenderEnv {
    pub background: Arc<dyn BackgroundSource>,
    pub cache: Option<Arc<RenderCache>>,
    pub budget: Option<Arc<WorkerBudget>>,
    pub cancel: CancelToken,
}

impl RenderEnv {
    pub fn new(background: Arc<dyn BackgroundSource>) -> Self {
        Self {
            background,
            cache: None,
            budget: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<RenderCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_budget(mut self, budget: Arc<WorkerBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RenderStats {
    /// Frames delivered to the sink.
    pub frames_total: u64,
    /// Frames composited in this run.
    pub frames_rendered: u64,
    /// Frames served from the cache.
    pub frames_cached: u64,
    /// Transient failures that were retried.
    pub retries: u64,
    /// Frames drawn over a frozen background frame.
    pub frames_frozen: u64,
}

/// A planned lyric video: normalized words, scheduled lines and a compositor.
///
/// Planning is single-threaded and fails fast on bad input. Rendering fans frames out over a
/// fixed-size pool and delivers them to a [`FrameSink`] strictly in timestamp order.
#[derive(Debug)]
pub struct RenderJob {
    words: Vec<Word>,
    lines: Arc<[ScheduledLine]>,
    compositor: Arc<FrameCompositor>,
    audio: Option<AudioTrack>,
    fps: Fps,
    duration_secs: f64,
    lines_fp: Fingerprint,
    input_hash: String,
    opts: RenderJobOpts,
}

impl RenderJob {
    /// Normalize, segment and schedule `raw`, then build the compositor for `style`.
    #[tracing::instrument(skip_all, fields(words = raw.len()))]
    pub fn plan(
        raw: &[Word],
        style: &StyleConfig,
        audio: Option<AudioTrack>,
        opts: RenderJobOpts,
    ) -> LyricResult<Self> {
        opts.validate()?;
        let compositor = FrameCompositor::new(style)?;
        let fps = style.fps()?;

        let raw_hash = input_hash(fingerprint_words(raw), compositor.fingerprint()).to_string();
        let words = normalize_words(raw, &style.normalize_opts())
            .map_err(|e| e.in_stage(Stage::Normalize, JobLocation::default(), &raw_hash))?;
        let hash = input_hash(fingerprint_words(&words), compositor.fingerprint()).to_string();

        let schedule_opts = style.schedule_opts();
        let mut segment_opts = style.segment_opts();
        let mut attempt = 0u32;
        let lines = loop {
            let lines = segment_words(&words, &segment_opts)
                .map_err(|e| e.in_stage(Stage::Segment, JobLocation::default(), &hash))?;
            match schedule_lines(&lines, &schedule_opts) {
                Ok(scheduled) => break scheduled,
                Err(LyricError::UnschedulableOverlap {
                    first,
                    second,
                    reason,
                }) if attempt < opts.reschedule_attempts => {
                    attempt += 1;
                    segment_opts.max_duration *= opts.reschedule_factor;
                    tracing::warn!(
                        first,
                        second,
                        %reason,
                        attempt,
                        max_duration = segment_opts.max_duration,
                        "lines overlap, re-segmenting with shorter lines"
                    );
                }
                Err(e) => {
                    let location = match &e {
                        LyricError::UnschedulableOverlap { first, .. } => {
                            JobLocation::at_line(*first)
                        }
                        _ => JobLocation::default(),
                    };
                    return Err(e.in_stage(Stage::Schedule, location, &hash));
                }
            }
        };

        let duration_secs = total_duration(&lines, audio.as_ref().map(|a| a.duration_secs));
        let lines_fp = fingerprint_lines(&lines);
        tracing::info!(
            lines = lines.len(),
            duration_secs,
            frames = fps.frames_covering(duration_secs),
            input = %hash,
            "planned render job"
        );

        Ok(Self {
            words,
            lines: lines.into(),
            compositor: Arc::new(compositor),
            audio,
            fps,
            duration_secs,
            lines_fp,
            input_hash: hash,
            opts,
        })
    }

    /// Obtain words from `transcriber` for `audio`, retrying transient failures, then plan.
    pub fn transcribe_and_plan(
        transcriber: &dyn Transcriber,
        audio: AudioTrack,
        style: &StyleConfig,
        opts: RenderJobOpts,
    ) -> LyricResult<Self> {
        let key = audio.duration_secs.to_bits();
        let words = run_with_retry(&opts.retry, key, &CancelToken::new(), |_| {
            transcriber.transcribe(&audio.path)
        })?
        .value;
        Self::plan(&words, style, Some(audio), opts)
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn lines(&self) -> &[ScheduledLine] {
        &self.lines
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Output length: audio duration or last display end, whichever is later.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn frame_count(&self) -> u64 {
        self.fps.frames_covering(self.duration_secs)
    }

    pub fn frame_time(&self, idx: FrameIndex) -> f64 {
        self.fps.frame_start_secs(idx)
    }

    /// Hash of normalized words and style, reported with every job error.
    pub fn input_hash(&self) -> &str {
        &self.input_hash
    }

    pub fn lines_fingerprint(&self) -> Fingerprint {
        self.lines_fp
    }

    /// Render a single frame (previews).
    pub fn render_frame(
        &self,
        idx: FrameIndex,
        background: Arc<dyn BackgroundSource>,
    ) -> LyricResult<FrameRGBA> {
        if idx.0 >= self.frame_count() {
            return Err(LyricError::validation(format!(
                "frame {} is outside the job's {} frames",
                idx.0,
                self.frame_count()
            )));
        }
        let t = self.frame_time(idx);
        let resolver = BackgroundResolver::new(
            background,
            self.opts.fetch_timeout,
            self.compositor.style().strict_bounds,
        );
        let bg = resolver
            .resolve(t, self.compositor.canvas())
            .map_err(|e| e.in_stage(Stage::Background, JobLocation::at_time(t), &self.input_hash))?;
        self.compositor
            .compose(t, &self.lines, &bg.frame)
            .map_err(|e| e.in_stage(Stage::Render, JobLocation::at_time(t), &self.input_hash))
    }

    /// Render every frame and stream it into `sink`.
    ///
    /// On failure or cancellation the sink is aborted and one aggregated
    /// [`LyricError::Job`] is returned. Frames already inserted into the cache stay there.
    pub fn render(&self, env: &RenderEnv, sink: &mut dyn FrameSink) -> LyricResult<RenderStats> {
        let span = tracing::info_span!("render", input = %self.input_hash);
        let _enter = span.enter();

        let res = self.render_inner(env, sink);
        match &res {
            Ok(stats) => tracing::info!(
                frames = stats.frames_total,
                rendered = stats.frames_rendered,
                cached = stats.frames_cached,
                retries = stats.retries,
                frozen = stats.frames_frozen,
                "render finished"
            ),
            Err(e) => {
                sink.abort();
                if matches!(e.root(), LyricError::Cancelled) {
                    tracing::info!("render cancelled, output discarded");
                } else {
                    tracing::error!(error = %e, "render failed, output discarded");
                }
            }
        }
        res
    }

    fn render_inner(&self, env: &RenderEnv, sink: &mut dyn FrameSink) -> LyricResult<RenderStats> {
        let hash = self.input_hash.as_str();
        let in_render = |e: LyricError| e.in_stage(Stage::Render, JobLocation::default(), hash);

        env.cancel.check().map_err(in_render)?;
        let threads = match self.opts.threads {
            Some(n) => n,
            None => rayon::current_num_threads(),
        };
        let permit: Option<WorkerPermit> = match env.budget.as_ref() {
            Some(b) => Some(b.acquire(threads, &env.cancel).map_err(in_render)?),
            None => None,
        };
        let threads = permit.as_ref().map_or(threads, WorkerPermit::count);
        let pool = build_thread_pool(threads).map_err(in_render)?;

        let canvas = self.compositor.canvas();
        let resolver = BackgroundResolver::new(
            env.background.clone(),
            self.opts.fetch_timeout,
            self.compositor.style().strict_bounds,
        );
        let cfg = SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps: self.fps,
            audio: self.audio.as_ref().map(|a| a.path.clone()),
        };

        let total = self.frame_count();
        let cap = self.opts.channel_capacity.max(1);
        let bytes_per_frame = (canvas.rgba_len() as u64).max(1);
        let max_chunk_by_mem = (MAX_REORDER_BUFFER_BYTES / bytes_per_frame).max(1);
        let chunk_size = normalized_chunk_size(self.opts.chunk_size)
            .min(max_chunk_by_mem)
            .min(total);

        let ctx = FrameCtx {
            job: self,
            cache: env.cache.as_deref(),
            resolver: &resolver,
            background_fp: resolver.fingerprint(),
            cancel: &env.cancel,
            counters: Counters::default(),
        };
        tracing::debug!(total, threads, chunk_size, "dispatching frames");

        // Encoder thread: deliver in index order regardless of completion order.
        let fps = self.fps;
        let res = std::thread::scope(|scope| -> LyricResult<()> {
            let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
            let sink_ref: &mut dyn FrameSink = sink;

            let enc = scope.spawn(move || -> Result<(), EncoderExit> {
                let at = |next: u64| JobLocation::at_time(fps.frame_start_secs(FrameIndex(next)));
                sink_ref.begin(cfg).map_err(|e| {
                    EncoderExit::Failed(e.in_stage(Stage::Encode, JobLocation::default(), hash))
                })?;

                let mut next = 0u64;
                let mut pending = HashMap::<u64, Arc<FrameRGBA>>::new();
                while next < total {
                    if let Some(frame) = pending.remove(&next) {
                        sink_ref.push_frame(FrameIndex(next), &frame).map_err(|e| {
                            EncoderExit::Failed(e.in_stage(Stage::Encode, at(next), hash))
                        })?;
                        next += 1;
                        continue;
                    }
                    let msg = rx.recv().map_err(|_| EncoderExit::Disconnected)?;
                    pending.insert(msg.idx.0, msg.frame);
                }

                sink_ref.end().map_err(|e| {
                    EncoderExit::Failed(e.in_stage(Stage::Encode, JobLocation::default(), hash))
                })
            });

            let mut produce = Ok(());
            let mut chunk_start = 0u64;
            while chunk_start < total {
                if let Err(e) = env.cancel.check() {
                    produce = Err(e.in_stage(
                        Stage::Render,
                        JobLocation::at_time(fps.frame_start_secs(FrameIndex(chunk_start))),
                        hash,
                    ));
                    break;
                }
                let chunk_end = (chunk_start + chunk_size).min(total);
                if let Err(e) = render_chunk(&ctx, &pool, &tx, chunk_start, chunk_end) {
                    produce = Err(e);
                    break;
                }
                chunk_start = chunk_end;
            }

            drop(tx);
            let enc_res = enc
                .join()
                .map_err(|_| LyricError::encode("encoder thread panicked"))
                .map_err(|e| e.in_stage(Stage::Encode, JobLocation::default(), hash))?;

            match (produce, enc_res) {
                // Producers only observe encoder failures as a closed channel.
                (_, Err(EncoderExit::Failed(e))) => Err(e),
                (Err(e), _) => Err(e),
                (Ok(()), Err(EncoderExit::Disconnected)) => Err(LyricError::encode(
                    "encoder channel disconnected unexpectedly",
                )
                .in_stage(Stage::Encode, JobLocation::default(), hash)),
                (Ok(()), Ok(())) => Ok(()),
            }
        });
        drop(permit);
        res?;

        Ok(ctx.counters.snapshot(total))
    }
}

#[derive(Debug)]
struct FrameMsg {
    idx: FrameIndex,
    frame: Arc<FrameRGBA>,
}

enum EncoderExit {
    Disconnected,
    Failed(LyricError),
}

#[derive(Default)]
struct Counters {
    rendered: AtomicU64,
    cached: AtomicU64,
    retries: AtomicU64,
    frozen: AtomicU64,
}

impl Counters {
    fn snapshot(&self, total: u64) -> RenderStats {
        RenderStats {
            frames_total: total,
            frames_rendered: self.rendered.load(Ordering::Relaxed),
            frames_cached: self.cached.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            frames_frozen: self.frozen.load(Ordering::Relaxed),
        }
    }
}

struct FrameCtx<'a> {
    job: &'a RenderJob,
    cache: Option<&'a RenderCache>,
    resolver: &'a BackgroundResolver,
    background_fp: Fingerprint,
    cancel: &'a CancelToken,
    counters: Counters,
}

fn render_chunk(
    ctx: &FrameCtx<'_>,
    pool: &rayon::ThreadPool,
    tx: &mpsc::SyncSender<FrameMsg>,
    start: u64,
    end: u64,
) -> LyricResult<()> {
    let job = ctx.job;
    let hash = job.input_hash.as_str();
    let canvas = job.compositor.canvas();

    pool.install(|| {
        (start..end).into_par_iter().try_for_each_init(
            || job.compositor.worker(),
            |worker, f| -> LyricResult<()> {
                let t = job.fps.frame_start_secs(FrameIndex(f));
                let at = JobLocation::at_time(t);
                ctx.cancel
                    .check()
                    .map_err(|e| e.in_stage(Stage::Render, at, hash))?;
                let worker = match worker.as_mut() {
                    Ok(w) => w,
                    Err(e) => {
                        return Err(LyricError::render(format!(
                            "failed to create compositor worker: {e}"
                        ))
                        .in_stage(Stage::Render, at, hash));
                    }
                };

                let key = CacheKey::new(
                    t,
                    job.compositor.fingerprint(),
                    job.lines_fp,
                    ctx.background_fp,
                );
                let cached = match ctx.cache {
                    Some(cache) => cache
                        .get(&key)
                        .map_err(|e| e.in_stage(Stage::Render, at, hash))?,
                    None => None,
                };

                let frame = match cached {
                    Some(frame) => {
                        ctx.counters.cached.fetch_add(1, Ordering::Relaxed);
                        frame
                    }
                    None => {
                        let retry_key = key.digest().lo;
                        let out = run_with_retry(&job.opts.retry, retry_key, ctx.cancel, |_| {
                            let bg = ctx
                                .resolver
                                .resolve(t, canvas)
                                .map_err(|e| e.in_stage(Stage::Background, at, hash))?;
                            let frame = worker
                                .compose(t, &job.lines, &bg.frame)
                                .map_err(|e| e.in_stage(Stage::Render, at, hash))?;
                            Ok((frame, bg.frozen))
                        })
                        .map_err(|e| e.in_stage(Stage::Render, at, hash))?;

                        let (frame, frozen) = out.value;
                        ctx.counters.rendered.fetch_add(1, Ordering::Relaxed);
                        ctx.counters
                            .retries
                            .fetch_add(u64::from(out.retries), Ordering::Relaxed);
                        if frozen {
                            ctx.counters.frozen.fetch_add(1, Ordering::Relaxed);
                        }
                        match ctx.cache {
                            Some(cache) => cache
                                .insert(key, Arc::new(frame))
                                .map_err(|e| e.in_stage(Stage::Render, at, hash))?,
                            None => Arc::new(frame),
                        }
                    }
                };

                let sent = run_with_retry(&job.opts.retry, f, ctx.cancel, |_| {
                    let msg = FrameMsg {
                        idx: FrameIndex(f),
                        frame: frame.clone(),
                    };
                    handoff(tx, msg, job.opts.handoff_timeout)
                })
                .map_err(|e| e.in_stage(Stage::Encode, at, hash))?;
                ctx.counters
                    .retries
                    .fetch_add(u64::from(sent.retries), Ordering::Relaxed);
                Ok(())
            },
        )
    })
}

/// Send `msg` to the encoder, waiting at most `timeout` for channel space.
fn handoff(tx: &mpsc::SyncSender<FrameMsg>, msg: FrameMsg, timeout: Duration) -> LyricResult<()> {
    let deadline = Instant::now() + timeout;
    let mut msg = msg;
    loop {
        match tx.try_send(msg) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(_)) => {
                return Err(LyricError::encode("encoder thread is not accepting frames"));
            }
            Err(TrySendError::Full(m)) => {
                if Instant::now() >= deadline {
                    return Err(LyricError::Timeout {
                        what: "encoder handoff".to_owned(),
                        after: timeout,
                    });
                }
                msg = m;
                std::thread::sleep(Duration::from_micros(200));
            }
        }
    }
}

fn normalized_chunk_size(chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        1
    } else {
        chunk_size as u64
    }
}

fn build_thread_pool(threads: usize) -> LyricResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(LyricError::validation("render job 'threads' must be >= 1"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("lyricframe-render-{i}"))
        .build()
        .map_err(|e| LyricError::transient(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/session/render_job.rs"]
mod tests;
