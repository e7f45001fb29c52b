pub mod action;
pub mod config;
pub mod context;
pub mod error;
pub mod reader;
pub mod sgd;
pub mod spec;
pub mod tensor;

pub use action::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use reader::*;
pub use sgd::*;
pub use spec::*;
pub use tensor::*;
