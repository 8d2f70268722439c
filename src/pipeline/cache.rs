//! Memoization of colorized results keyed by input content.

use std::fmt;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use twox_hash::XxHash64;

use crate::error::{Error, Result};
use crate::image::PixelArray;

/// Length of the hex form of a [`Fingerprint`].
const FINGERPRINT_HEX_LEN: usize = 16;

/// Content-derived key of a pixel array.
///
/// XxHash64 (seed 0) over height, width and channel count as little-endian `u64`s,
/// followed by the pixels in row-major HWC order. Pixel-identical arrays always
/// share a fingerprint whatever their memory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprint a pixel array.
    #[must_use]
    pub fn of(pixels: &PixelArray) -> Self {
        let (height, width, channels) = pixels.dim();

        let mut hasher = XxHash64::with_seed(0);
        for dim in [height, width, channels] {
            hasher.write(&(dim as u64).to_le_bytes());
        }
        match pixels.as_slice() {
            Some(contiguous) => hasher.write(contiguous),
            None => {
                for &value in pixels {
                    hasher.write_u8(value);
                }
            }
        }

        Self(hasher.finish())
    }

    /// The raw 64-bit digest.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    /// Parses exactly the [`Display`](fmt::Display) form: 16 lowercase hex digits.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || Error::InvalidParameter {
            name: "fingerprint".to_string(),
            reason: format!("`{s}` is not {FINGERPRINT_HEX_LEN} lowercase hex digits"),
        };

        let well_formed = s.len() == FINGERPRINT_HEX_LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(invalid());
        }

        u64::from_str_radix(s, 16).map(Self).map_err(|_| invalid())
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

/// Bounded LRU cache of colorized images.
///
/// The lock is only held for lookups and inserts, never while computing. Two
/// concurrent misses on the same fingerprint both compute; the later insert wins
/// and both callers still receive equal images.
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<LruCache<Fingerprint, Arc<PixelArray>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached result for `input`, computing and storing it on a miss.
    ///
    /// Errors from `compute` are returned as-is and nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns on failure.
    pub fn get_or_compute<F>(
        &self,
        input: &PixelArray,
        compute: F,
    ) -> Result<(Fingerprint, Arc<PixelArray>)>
    where
        F: FnOnce(&PixelArray) -> Result<PixelArray>,
    {
        let fingerprint = Fingerprint::of(input);

        if let Some(hit) = self.entries.lock().get(&fingerprint) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("cache hit for {fingerprint}");
            return Ok((fingerprint, Arc::clone(hit)));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("cache miss for {fingerprint}");

        let output = Arc::new(compute(input)?);
        self.entries.lock().put(fingerprint, Arc::clone(&output));

        Ok((fingerprint, output))
    }

    /// Look up a stored result without computing anything.
    #[must_use]
    pub fn get(&self, fingerprint: Fingerprint) -> Option<Arc<PixelArray>> {
        self.entries.lock().get(&fingerprint).cloned()
    }

    /// Number of stored results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}
