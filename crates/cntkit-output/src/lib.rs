//! Turns the toolkit's textual output back into typed data.
//!
//! Everything here is a pure function over text: node shapes from the
//! validation log, tensors from the tabular write format, and metrics from
//! the final-results line of a test run.

pub mod resolve;
pub mod sanitize;
pub mod sequences;
pub mod shapes;
pub mod summary;

pub use resolve::*;
pub use sanitize::*;
pub use sequences::*;
pub use shapes::*;
pub use summary::*;
