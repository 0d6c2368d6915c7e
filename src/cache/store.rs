use crate::cache::fingerprint::{Fingerprint, StableHasher};
use crate::foundation::error::{LyricError, LyricResult};
use crate::render::frame::FrameRGBA;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

const DISK_MAGIC: &[u8; 4] = b"LFC1";

/// Identity of one composited frame.
///
/// Two frames with equal keys are pixel-identical: the key covers the output timestamp, every
/// pixel-affecting style option (font bytes included), the scheduled lines and the background.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub t_bits: u64,
    pub style: Fingerprint,
    pub lines: Fingerprint,
    pub background: Fingerprint,
}

impl CacheKey {
    pub fn new(t: f64, style: Fingerprint, lines: Fingerprint, background: Fingerprint) -> Self {
        Self {
            t_bits: t.to_bits(),
            style,
            lines,
            background,
        }
    }

    pub fn t(&self) -> f64 {
        f64::from_bits(self.t_bits)
    }

    /// Single 128-bit digest, used for shard selection and disk file names.
    pub fn digest(&self) -> Fingerprint {
        let mut h = StableHasher::new();
        h.write_u8(b'k');
        h.write_u64(self.t_bits);
        h.write_fingerprint(self.style);
        h.write_fingerprint(self.lines);
        h.write_fingerprint(self.background);
        h.finish()
    }
}

#[derive(Clone, Debug)]
pub struct RenderCacheOpts {
    /// Upper bound on bytes of pixel data held in memory.
    pub max_bytes: u64,
    /// Number of independently locked shards.
    pub shards: usize,
    /// Optional directory for a persistent second tier.
    pub disk_dir: Option<PathBuf>,
}

impl Default for RenderCacheOpts {
    fn default() -> Self {
        Self {
            max_bytes: 512 * 1024 * 1024,
            shards: 16,
            disk_dir: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub inserts: u64,
    /// Frames not retained in memory because the byte cap was reached.
    pub rejected: u64,
    pub bytes: u64,
}

type Shard = RwLock<HashMap<CacheKey, Arc<FrameRGBA>>>;

/// Content-addressed store of composited frames, shared across render jobs.
///
/// Lookups on different shards never contend. Inserts are first-writer-wins: when two
/// workers race on the same key, both end up holding the frame that was stored first.
///
/// Memory holds at most `max_bytes` of pixel data across all shards. Once full, new frames
/// are handed back to the caller but not retained (the disk tier still persists them), and
/// nothing already cached is evicted. A job longer than the cap therefore reuses its first
/// `max_bytes` worth of frames on every re-run. [`RenderCache::clear`] frees the memory tier.
pub struct RenderCache {
    shards: Vec<Shard>,
    max_bytes: u64,
    bytes: AtomicU64,
    full_logged: AtomicBool,
    disk_dir: Option<PathBuf>,
    hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    rejected: AtomicU64,
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache")
            .field("shards", &self.shards.len())
            .field("max_bytes", &self.max_bytes)
            .field("disk_dir", &self.disk_dir)
            .field("stats", &self.stats())
            .finish()
    }
}

impl RenderCache {
    pub fn new(opts: RenderCacheOpts) -> LyricResult<Self> {
        if opts.shards == 0 {
            return Err(LyricError::validation("cache shards must be >= 1"));
        }
        if let Some(dir) = opts.disk_dir.as_deref() {
            std::fs::create_dir_all(dir).map_err(|e| {
                LyricError::validation(format!(
                    "failed to create cache dir '{}': {e}",
                    dir.display()
                ))
            })?;
        }
        Ok(Self::with_limits(opts.shards, opts.max_bytes, opts.disk_dir))
    }

    /// In-memory cache with default limits.
    pub fn in_memory() -> Self {
        let opts = RenderCacheOpts::default();
        Self::with_limits(opts.shards, opts.max_bytes, None)
    }

    fn with_limits(shards: usize, max_bytes: u64, disk_dir: Option<PathBuf>) -> Self {
        Self {
            shards: (0..shards).map(|_| RwLock::new(HashMap::new())).collect(),
            max_bytes,
            bytes: AtomicU64::new(0),
            full_logged: AtomicBool::new(false),
            disk_dir,
            hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    fn shard(&self, key: &CacheKey) -> &Shard {
        let idx = (key.digest().lo % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    pub fn get(&self, key: &CacheKey) -> LyricResult<Option<Arc<FrameRGBA>>> {
        {
            let shard = self
                .shard(key)
                .read()
                .map_err(|_| LyricError::render("cache shard lock poisoned"))?;
            if let Some(frame) = shard.get(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(frame.clone()));
            }
        }

        if let Some(dir) = self.disk_dir.as_deref() {
            match read_disk_entry(&disk_path(dir, key)) {
                Ok(Some(frame)) => {
                    self.disk_hits.fetch_add(1, Ordering::Relaxed);
                    let frame = self.insert_memory(*key, Arc::new(frame))?;
                    return Ok(Some(frame));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        key = %key.digest(),
                        error = %e,
                        "ignoring unreadable cache entry"
                    );
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    /// Store `frame` under `key` and return the frame now associated with the key.
    pub fn insert(&self, key: CacheKey, frame: Arc<FrameRGBA>) -> LyricResult<Arc<FrameRGBA>> {
        let stored = self.insert_memory(key, frame)?;
        if let Some(dir) = self.disk_dir.as_deref() {
            let path = disk_path(dir, &key);
            if !path.exists()
                && let Err(e) = write_disk_entry(&path, &stored)
            {
                tracing::warn!(path = %path.display(), error = %e, "failed to persist cache entry");
            }
        }
        Ok(stored)
    }

    fn insert_memory(&self, key: CacheKey, frame: Arc<FrameRGBA>) -> LyricResult<Arc<FrameRGBA>> {
        let size = frame.data.len() as u64;
        let mut shard = self
            .shard(&key)
            .write()
            .map_err(|_| LyricError::render("cache shard lock poisoned"))?;
        if let Some(existing) = shard.get(&key) {
            return Ok(existing.clone());
        }

        // Reserve against the global cap so every shard shares one budget.
        let max = self.max_bytes;
        let reserved = self
            .bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| {
                b.checked_add(size).filter(|n| *n <= max)
            })
            .is_ok();
        if !reserved {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            if !self.full_logged.swap(true, Ordering::Relaxed) {
                tracing::info!(max_bytes = max, "frame cache is full, new frames are not retained");
            }
            return Ok(frame);
        }

        self.inserts.fetch_add(1, Ordering::Relaxed);
        shard.insert(key, frame.clone());
        Ok(frame)
    }

    /// Drop every frame held in memory. The disk tier is left untouched.
    pub fn clear(&self) {
        for shard in &self.shards {
            if let Ok(mut s) = shard.write() {
                let freed: u64 = s.values().map(|f| f.data.len() as u64).sum();
                s.clear();
                self.bytes.fetch_sub(freed, Ordering::AcqRel);
            }
        }
        self.full_logged.store(false, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().map_or(0, |s| s.len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

fn disk_path(dir: &Path, key: &CacheKey) -> PathBuf {
    dir.join(format!("{}.lfc", key.digest()))
}

fn read_disk_entry(path: &Path) -> LyricResult<Option<FrameRGBA>> {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LyricError::transient(format!("cache read failed: {e}"))),
    };
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| LyricError::transient(format!("cache read failed: {e}")))?;

    if bytes.len() < 12 || &bytes[..4] != DISK_MAGIC {
        return Err(LyricError::render("cache entry has a bad header"));
    }
    let width = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let height = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let data = bytes.split_off(12);
    let expected = (width as usize) * (height as usize) * 4;
    if data.len() != expected {
        return Err(LyricError::render(format!(
            "cache entry is truncated: {} bytes, expected {expected}",
            data.len()
        )));
    }
    Ok(Some(FrameRGBA {
        width,
        height,
        data,
        premultiplied: true,
    }))
}

fn write_disk_entry(path: &Path, frame: &FrameRGBA) -> LyricResult<()> {
    static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);
    let tmp = path.with_extension(format!(
        "tmp-{}-{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let write = || -> std::io::Result<()> {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(DISK_MAGIC)?;
        f.write_all(&frame.width.to_le_bytes())?;
        f.write_all(&frame.height.to_le_bytes())?;
        f.write_all(&frame.data)?;
        f.sync_all()?;
        std::fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        LyricError::transient(format!("cache write failed: {e}"))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/cache/store.rs"]
mod tests;
