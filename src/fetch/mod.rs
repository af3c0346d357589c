mod error;
mod fetcher;
mod http;

pub use fetcher::SourceFetcher;
pub use http::HttpSource;
