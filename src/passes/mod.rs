mod error;
mod finder;
mod types;

pub use error::PassError;
pub use finder::passes;
pub use types::PassEvent;
