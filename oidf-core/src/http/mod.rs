mod fetcher;

pub use fetcher::{Fetcher, FetcherConfig};
