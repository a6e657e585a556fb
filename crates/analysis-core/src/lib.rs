pub mod error;
pub mod fiscal;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
