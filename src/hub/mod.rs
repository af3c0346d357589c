mod error;
mod hub;
mod types;

pub use hub::BroadcastHub;
