use crate::cache::fingerprint::{Fingerprint, fingerprint_bytes};
use crate::foundation::core::Canvas;
use crate::foundation::error::{LyricError, LyricResult};
use crate::foundation::timeout::{CallTracker, wait_or_kill};
use crate::render::frame::FrameRGBA;
use crate::style::color::Color;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Supplier of background frames.
pub trait BackgroundSource: Send + Sync {
    /// Frame for output time `t`, sized to `canvas`, or `None` when the source has no
    /// frame at `t` (e.g. the video is shorter than the lyrics).
    fn frame_at(&self, t: f64, canvas: Canvas) -> LyricResult<Option<Arc<FrameRGBA>>>;

    /// Latest time with a frame, or `None` for sources without an end.
    fn last_available_time(&self) -> Option<f64>;

    /// Content fingerprint used in frame cache keys.
    fn fingerprint(&self) -> Fingerprint;
}

type CanvasFrame = Mutex<Option<(Canvas, Arc<FrameRGBA>)>>;

fn cached_for_canvas(
    slot: &CanvasFrame,
    canvas: Canvas,
    build: impl FnOnce() -> LyricResult<Arc<FrameRGBA>>,
) -> LyricResult<Arc<FrameRGBA>> {
    let mut guard = slot
        .lock()
        .map_err(|_| LyricError::render("background frame lock poisoned"))?;
    if let Some((c, frame)) = guard.as_ref()
        && *c == canvas
    {
        return Ok(frame.clone());
    }
    let frame = build()?;
    *guard = Some((canvas, frame.clone()));
    Ok(frame)
}

/// Flat color background.
#[derive(Debug)]
pub struct SolidBackground {
    color: Color,
    frame: CanvasFrame,
}

impl SolidBackground {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            frame: Mutex::new(None),
        }
    }
}

impl BackgroundSource for SolidBackground {
    fn frame_at(&self, _t: f64, canvas: Canvas) -> LyricResult<Option<Arc<FrameRGBA>>> {
        let color = self.color.to_premul();
        cached_for_canvas(&self.frame, canvas, || {
            Ok(Arc::new(FrameRGBA::solid(canvas, color)))
        })
        .map(Some)
    }

    fn last_available_time(&self) -> Option<f64> {
        None
    }

    fn fingerprint(&self) -> Fingerprint {
        fingerprint_bytes("solid", &self.color.to_array())
    }
}

/// Still image stretched to the canvas with a Lanczos filter.
#[derive(Debug)]
pub struct ImageBackground {
    image: image::RgbaImage,
    fingerprint: Fingerprint,
    frame: CanvasFrame,
}

impl ImageBackground {
    /// Decode any format the `image` crate understands.
    pub fn open(path: &Path) -> LyricResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            LyricError::validation(format!(
                "failed to read background image '{}': {e}",
                path.display()
            ))
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| {
                LyricError::validation(format!(
                    "failed to decode background image '{}': {e}",
                    path.display()
                ))
            })?
            .to_rgba8();
        Ok(Self {
            image,
            fingerprint: fingerprint_bytes("image", &bytes),
            frame: Mutex::new(None),
        })
    }

    /// Wrap an already decoded straight-alpha image.
    pub fn from_rgba(image: image::RgbaImage) -> Self {
        let mut meta = Vec::with_capacity(8 + image.as_raw().len());
        meta.extend_from_slice(&image.width().to_le_bytes());
        meta.extend_from_slice(&image.height().to_le_bytes());
        meta.extend_from_slice(image.as_raw());
        Self {
            fingerprint: fingerprint_bytes("image", &meta),
            image,
            frame: Mutex::new(None),
        }
    }
}

impl BackgroundSource for ImageBackground {
    fn frame_at(&self, _t: f64, canvas: Canvas) -> LyricResult<Option<Arc<FrameRGBA>>> {
        cached_for_canvas(&self.frame, canvas, || {
            let resized = if self.image.dimensions() == (canvas.width, canvas.height) {
                self.image.clone()
            } else {
                image::imageops::resize(
                    &self.image,
                    canvas.width,
                    canvas.height,
                    image::imageops::FilterType::Lanczos3,
                )
            };
            Ok(Arc::new(FrameRGBA::from_straight_rgba(
                canvas.width,
                canvas.height,
                resized.into_raw(),
            )))
        })
        .map(Some)
    }

    fn last_available_time(&self) -> Option<f64> {
        None
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

/// Video file decoded frame by frame through the system `ffmpeg`.
#[derive(Clone, Debug)]
pub struct VideoBackground {
    path: PathBuf,
    duration_secs: f64,
    frame_secs: f64,
    fingerprint: Fingerprint,
    decode_timeout: Duration,
}

impl VideoBackground {
    /// Probe `path` with `ffprobe`.
    pub fn open(path: &Path) -> LyricResult<Self> {
        let info = probe_video(path)?;
        let meta = std::fs::metadata(path).map_err(|e| {
            LyricError::validation(format!("failed to stat '{}': {e}", path.display()))
        })?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos());
        let key = format!("{}|{}|{modified}", path.display(), meta.len());
        Ok(Self {
            path: path.to_path_buf(),
            duration_secs: info.duration_secs,
            frame_secs: info.frame_secs,
            fingerprint: fingerprint_bytes("video", key.as_bytes()),
            decode_timeout: Duration::from_secs(10),
        })
    }

    /// Kill a single-frame `ffmpeg` decode that runs longer than `timeout`.
    pub fn with_decode_timeout(mut self, timeout: Duration) -> Self {
        self.decode_timeout = timeout;
        self
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    fn last_frame_time(&self) -> f64 {
        (self.duration_secs - self.frame_secs).max(0.0)
    }
}

impl BackgroundSource for VideoBackground {
    fn frame_at(&self, t: f64, canvas: Canvas) -> LyricResult<Option<Arc<FrameRGBA>>> {
        if t > self.last_frame_time() + 1e-9 {
            return Ok(None);
        }
        let data = decode_video_frame_rgba8(&self.path, t, canvas, self.decode_timeout)?;
        match data {
            Some(bytes) => Ok(Some(Arc::new(FrameRGBA::from_straight_rgba(
                canvas.width,
                canvas.height,
                bytes,
            )))),
            None => Ok(None),
        }
    }

    fn last_available_time(&self) -> Option<f64> {
        Some(self.last_frame_time())
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

#[derive(Clone, Copy, Debug)]
struct VideoInfo {
    duration_secs: f64,
    frame_secs: f64,
}

fn probe_video(path: &Path) -> LyricResult<VideoInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        avg_frame_rate: Option<String>,
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| LyricError::transient(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(LyricError::validation(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| LyricError::validation(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| LyricError::validation("no video stream found"))?;

    let duration_secs = stream
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| LyricError::validation("ffprobe reported no video duration"))?;
    let frame_secs = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .map_or(0.0, |fps| 1.0 / fps);

    Ok(VideoInfo {
        duration_secs,
        frame_secs,
    })
}

fn parse_rate(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/').unwrap_or((s, "1"));
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

fn decode_video_frame_rgba8(
    path: &Path,
    t: f64,
    canvas: Canvas,
    timeout: Duration,
) -> LyricResult<Option<Vec<u8>>> {
    let mut child = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{t:.9}")])
        .arg("-i")
        .arg(path)
        .args([
            "-frames:v",
            "1",
            "-vf",
            &format!(
                "scale={}:{}:flags=lanczos",
                canvas.width, canvas.height
            ),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| LyricError::transient(format!("failed to run ffmpeg for video decode: {e}")))?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let status = wait_or_kill(&mut child, timeout, "video decode");
    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status?.success() {
        return Err(LyricError::transient(format!(
            "ffmpeg video decode failed for '{}' at {t:.3}s: {}",
            path.display(),
            String::from_utf8_lossy(&stderr).trim()
        )));
    }

    let expected_len = canvas.rgba_len();
    if stdout.is_empty() {
        return Ok(None);
    }
    if stdout.len() < expected_len {
        return Err(LyricError::render(format!(
            "decoded video frame has invalid size: got {} bytes, expected {expected_len}",
            stdout.len()
        )));
    }
    let mut bytes = stdout;
    bytes.truncate(expected_len);
    Ok(Some(bytes))
}

/// Read a child pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// A background frame chosen for one output time.
#[derive(Clone, Debug)]
pub struct ResolvedBackground {
    pub frame: Arc<FrameRGBA>,
    /// `true` when the source ran out and its last frame was reused.
    pub frozen: bool,
}

/// Applies fetch timeouts and the out-of-range policy to a [`BackgroundSource`].
///
/// When the source has no frame for a time, the resolver either fails
/// (`strict_bounds`) or reuses the frame at the source's last available time. The frozen
/// frame is fetched once and shared, so every worker freezes on identical pixels.
///
/// A fetch that overruns its timeout keeps running in the background. Fetching the same time
/// again waits for it instead of starting a second fetch, and dropping the resolver waits
/// for all of them.
pub struct BackgroundResolver {
    source: Arc<dyn BackgroundSource>,
    fetch_timeout: Duration,
    strict_bounds: bool,
    freeze: CanvasFrame,
    freeze_logged: AtomicBool,
    calls: CallTracker,
}

impl BackgroundResolver {
    pub fn new(
        source: Arc<dyn BackgroundSource>,
        fetch_timeout: Duration,
        strict_bounds: bool,
    ) -> Self {
        Self {
            source,
            fetch_timeout,
            strict_bounds,
            freeze: Mutex::new(None),
            freeze_logged: AtomicBool::new(false),
            calls: CallTracker::new("background fetch"),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.source.fingerprint()
    }

    /// Fetches that overran their timeout and are still running.
    pub fn overrun_fetches(&self) -> usize {
        self.calls.running()
    }

    /// Background for output time `t`.
    pub fn resolve(&self, t: f64, canvas: Canvas) -> LyricResult<ResolvedBackground> {
        if let Some(frame) = self.fetch(t, canvas)? {
            return Ok(ResolvedBackground {
                frame,
                frozen: false,
            });
        }

        if self.strict_bounds {
            return Err(LyricError::RenderTargetUnavailable {
                t,
                reason: "background has no frame at this time and strict_bounds is set"
                    .to_owned(),
            });
        }

        let frame = cached_for_canvas(&self.freeze, canvas, || self.freeze_frame(t, canvas))?;
        if !self.freeze_logged.swap(true, Ordering::Relaxed) {
            tracing::warn!(t, "background ran out of frames, freezing its last frame");
        } else {
            tracing::debug!(t, "using frozen background frame");
        }
        Ok(ResolvedBackground {
            frame,
            frozen: true,
        })
    }

    fn freeze_frame(&self, t: f64, canvas: Canvas) -> LyricResult<Arc<FrameRGBA>> {
        let last = self
            .source
            .last_available_time()
            .ok_or_else(|| LyricError::RenderTargetUnavailable {
                t,
                reason: "background has no frame and no last frame to freeze".to_owned(),
            })?;
        self.fetch(last, canvas)?
            .ok_or_else(|| LyricError::RenderTargetUnavailable {
                t,
                reason: format!("background has no frame at its last available time {last:.3}s"),
            })
    }

    fn fetch(&self, t: f64, canvas: Canvas) -> LyricResult<Option<Arc<FrameRGBA>>> {
        let source = self.source.clone();
        let frame = self
            .calls
            .call(t.to_bits(), self.fetch_timeout, move || source.frame_at(t, canvas))?;
        if let Some(f) = frame.as_ref()
            && (f.width != canvas.width || f.height != canvas.height)
        {
            return Err(LyricError::render(format!(
                "background frame is {}x{}, expected {}x{}",
                f.width, f.height, canvas.width, canvas.height
            )));
        }
        Ok(frame)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/background.rs"]
mod tests;
