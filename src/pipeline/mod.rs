//! Colorization pipeline and its result cache.

mod cache;
mod colorize;

pub use cache::{CacheStats, Fingerprint, ResultCache};
pub use colorize::{Colorized, Config, Pipeline};
