mod error;
mod propagator;

pub use error::PropagationError;
pub use propagator::propagate;
