pub mod error;
pub mod features;
pub mod types;

pub use error::*;
pub use features::compute_features;
pub use types::*;
