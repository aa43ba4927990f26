//! The protein interaction network and its persisted path cache

pub mod interactome;
pub mod path_cache;

pub use interactome::{interactome_search, InteractomeError, InteractomeResult, MAX_INTERACTION_SCORE};
pub use path_cache::{CacheLoad, PathCacheError, PathCacheHeader, PathCacheResult};
