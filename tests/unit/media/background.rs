use super::*;
use std::sync::atomic::AtomicUsize;

const CANVAS: Canvas = Canvas {
    width: 8,
    height: 6,
};

/// Frames exist up to `until`; red channel encodes the time in tenths.
struct Finite {
    until: f64,
    fetches: AtomicUsize,
}

impl Finite {
    fn new(until: f64) -> Self {
        Self {
            until,
            fetches: AtomicUsize::new(0),
        }
    }
}

impl BackgroundSource for Finite {
    fn frame_at(&self, t: f64, canvas: Canvas) -> LyricResult<Option<Arc<FrameRGBA>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if t > self.until {
            return Ok(None);
        }
        let r = (t * 10.0).round() as u8;
        Ok(Some(Arc::new(FrameRGBA::solid(
            canvas,
            Color::rgba(r, 0, 0, 255).to_premul(),
        ))))
    }

    fn last_available_time(&self) -> Option<f64> {
        Some(self.until)
    }

    fn fingerprint(&self) -> Fingerprint {
        fingerprint_bytes("finite", &self.until.to_le_bytes())
    }
}

struct Slow;

impl BackgroundSource for Slow {
    fn frame_at(&self, _t: f64, _canvas: Canvas) -> LyricResult<Option<Arc<FrameRGBA>>> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(None)
    }

    fn last_available_time(&self) -> Option<f64> {
        None
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::default()
    }
}

#[test]
fn solid_background_fills_canvas_and_is_reused() {
    let bg = SolidBackground::new(Color::rgba(10, 20, 30, 255));
    let a = bg.frame_at(0.0, CANVAS).unwrap().unwrap();
    let b = bg.frame_at(99.0, CANVAS).unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.canvas(), CANVAS);
    assert_eq!(a.pixel(7, 5), Some([10, 20, 30, 255]));
    assert_eq!(bg.last_available_time(), None);
}

#[test]
fn solid_fingerprint_tracks_color() {
    let a = SolidBackground::new(Color::BLACK).fingerprint();
    let b = SolidBackground::new(Color::WHITE).fingerprint();
    assert_ne!(a, b);
    assert_eq!(a, SolidBackground::new(Color::BLACK).fingerprint());
}

#[test]
fn image_background_is_resized_to_canvas() {
    let img = image::RgbaImage::from_pixel(3, 3, image::Rgba([0, 200, 0, 255]));
    let bg = ImageBackground::from_rgba(img);
    let frame = bg.frame_at(1.0, CANVAS).unwrap().unwrap();
    assert_eq!(frame.canvas(), CANVAS);
    assert_eq!(frame.pixel(4, 3), Some([0, 200, 0, 255]));
}

#[test]
fn resolver_passes_through_frames_in_range() {
    let r = BackgroundResolver::new(Arc::new(Finite::new(1.0)), Duration::from_secs(5), false);
    let got = r.resolve(0.5, CANVAS).unwrap();
    assert!(!got.frozen);
    assert_eq!(got.frame.pixel(0, 0), Some([5, 0, 0, 255]));
}

#[test]
fn resolver_freezes_on_last_available_frame() {
    let source = Arc::new(Finite::new(1.0));
    let r = BackgroundResolver::new(source.clone(), Duration::from_secs(5), false);
    let a = r.resolve(2.0, CANVAS).unwrap();
    let b = r.resolve(3.0, CANVAS).unwrap();
    assert!(a.frozen && b.frozen);
    assert_eq!(a.frame.pixel(0, 0), Some([10, 0, 0, 255]));
    assert!(Arc::ptr_eq(&a.frame, &b.frame));
    // 2.0 miss, 1.0 freeze fetch, 3.0 miss.
    assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
}

#[test]
fn strict_resolver_reports_unavailable_target() {
    let r = BackgroundResolver::new(Arc::new(Finite::new(1.0)), Duration::from_secs(5), true);
    let err = r.resolve(2.0, CANVAS).unwrap_err();
    assert!(matches!(err, LyricError::RenderTargetUnavailable { t, .. } if t == 2.0));
    assert!(!err.is_transient());
}

#[test]
fn slow_fetch_times_out_as_transient() {
    let r = BackgroundResolver::new(Arc::new(Slow), Duration::from_millis(20), false);
    let err = r.resolve(0.0, CANVAS).unwrap_err();
    assert!(matches!(err, LyricError::Timeout { .. }));
    assert!(err.is_transient());
}

#[test]
fn overrun_fetch_is_waited_for_not_repeated() {
    let r = BackgroundResolver::new(Arc::new(Slow), Duration::from_millis(20), false);
    assert!(r.resolve(0.0, CANVAS).is_err());
    assert_eq!(r.overrun_fetches(), 1);

    let err = r.resolve(0.0, CANVAS).unwrap_err();
    assert!(matches!(err, LyricError::Timeout { ref what, .. } if what.contains("still running")));
    assert_eq!(r.overrun_fetches(), 1);

    let begin = std::time::Instant::now();
    drop(r);
    assert!(begin.elapsed() > Duration::from_millis(100));
}

#[test]
fn parse_rate_handles_fractions() {
    assert_eq!(parse_rate("30/1"), Some(30.0));
    assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
    assert_eq!(parse_rate("0/0"), None);
    assert_eq!(parse_rate("25"), Some(25.0));
}
