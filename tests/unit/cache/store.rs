use super::*;
use crate::foundation::core::{Canvas, Rgba8Premul};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "lyricframe_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn key(t: f64) -> CacheKey {
    CacheKey::new(
        t,
        Fingerprint { hi: 1, lo: 2 },
        Fingerprint { hi: 3, lo: 4 },
        Fingerprint { hi: 5, lo: 6 },
    )
}

fn frame(v: u8) -> Arc<FrameRGBA> {
    Arc::new(FrameRGBA::solid(
        Canvas {
            width: 4,
            height: 2,
        },
        Rgba8Premul {
            r: v,
            g: v,
            b: v,
            a: 255,
        },
    ))
}

#[test]
fn key_digest_depends_on_every_component() {
    let base = key(1.0);
    assert_eq!(base.digest(), key(1.0).digest());
    assert_ne!(base.digest(), key(1.0 + 1e-12).digest());
    let other_bg = CacheKey {
        background: Fingerprint { hi: 5, lo: 7 },
        ..base
    };
    assert_ne!(base.digest(), other_bg.digest());
    assert_eq!(base.t(), 1.0);
}

#[test]
fn miss_then_hit() {
    let cache = RenderCache::in_memory();
    assert!(cache.get(&key(0.5)).unwrap().is_none());
    cache.insert(key(0.5), frame(9)).unwrap();
    let got = cache.get(&key(0.5)).unwrap().unwrap();
    assert_eq!(got.pixel(0, 0), Some([9, 9, 9, 255]));

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.inserts), (1, 1, 1));
    assert_eq!(stats.bytes, 32);
}

#[test]
fn first_writer_wins() {
    let cache = RenderCache::in_memory();
    let first = cache.insert(key(1.0), frame(1)).unwrap();
    let second = cache.insert(key(1.0), frame(2)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

fn capped(max_bytes: u64, shards: usize) -> RenderCache {
    RenderCache::new(RenderCacheOpts {
        max_bytes,
        shards,
        disk_dir: None,
    })
    .unwrap()
}

#[test]
fn full_cache_keeps_what_it_holds() {
    let cache = capped(64, 1);
    cache.insert(key(0.0), frame(0)).unwrap();
    cache.insert(key(1.0), frame(1)).unwrap();
    let served = cache.insert(key(2.0), frame(2)).unwrap();
    assert_eq!(served.pixel(0, 0), Some([2, 2, 2, 255]));

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&key(0.0)).unwrap().is_some());
    assert!(cache.get(&key(1.0)).unwrap().is_some());
    assert!(cache.get(&key(2.0)).unwrap().is_none());
    let stats = cache.stats();
    assert_eq!((stats.inserts, stats.rejected, stats.bytes), (2, 1, 64));
}

#[test]
fn byte_cap_spans_all_shards() {
    let cache = capped(64, 16);
    for i in 0..10 {
        cache.insert(key(i as f64), frame(i)).unwrap();
    }
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().bytes, 64);
    assert_eq!(cache.stats().rejected, 8);
}

#[test]
fn clear_frees_the_memory_tier() {
    let cache = capped(64, 4);
    cache.insert(key(0.0), frame(0)).unwrap();
    cache.insert(key(1.0), frame(1)).unwrap();
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.stats().bytes, 0);

    cache.insert(key(2.0), frame(2)).unwrap();
    assert!(cache.get(&key(2.0)).unwrap().is_some());
}

#[test]
fn zero_shards_is_rejected() {
    let err = RenderCache::new(RenderCacheOpts {
        shards: 0,
        ..RenderCacheOpts::default()
    })
    .unwrap_err();
    assert!(matches!(err, LyricError::Validation(_)));
}

#[test]
fn disk_tier_survives_a_new_cache() {
    let dir = temp_dir("cache_disk_tier");
    let opts = RenderCacheOpts {
        disk_dir: Some(dir.clone()),
        ..RenderCacheOpts::default()
    };
    {
        let cache = RenderCache::new(opts.clone()).unwrap();
        cache.insert(key(3.0), frame(77)).unwrap();
    }

    let cache = RenderCache::new(opts).unwrap();
    let got = cache.get(&key(3.0)).unwrap().unwrap();
    assert_eq!(got.pixel(3, 1), Some([77, 77, 77, 255]));
    assert_eq!(cache.stats().disk_hits, 1);
    assert_eq!(cache.len(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn corrupt_disk_entry_is_a_miss() {
    let dir = temp_dir("cache_corrupt");
    let cache = RenderCache::new(RenderCacheOpts {
        disk_dir: Some(dir.clone()),
        ..RenderCacheOpts::default()
    })
    .unwrap();
    std::fs::write(disk_path(&dir, &key(4.0)), b"LFC1\x02\x00").unwrap();
    assert!(cache.get(&key(4.0)).unwrap().is_none());
    assert_eq!(cache.stats().misses, 1);

    std::fs::remove_dir_all(&dir).unwrap();
}
