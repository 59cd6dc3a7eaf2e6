// Application layer - use cases over the repository.
// The domain computations stay pure; this layer loads the roster and
// expense history, calls into them and reports what it found.

pub mod error;
pub mod reporting;
pub mod service;

pub use error::*;
pub use reporting::*;
pub use service::*;
