mod cache;
mod error;
mod store;
mod tle;
mod types;

pub use cache::CacheDir;
pub use store::ElementStore;
pub use tle::element_sets_from_text;
pub use types::ElementSet;
