//! Attribution forwarding

mod fetcher;
mod locks;
mod poster;

pub use fetcher::{AttributionFetcher, StaticAttributionFetcher};
pub use poster::AttributionPoster;
