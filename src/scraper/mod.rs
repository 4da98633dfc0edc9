pub mod fetcher;
pub mod sources;
pub mod traits;

pub use fetcher::HttpFetcher;
pub use traits::{FetchRequest, Fetcher, SourceAdapter};

#[cfg(test)]
pub mod testing;
