pub mod config_manager;
pub mod error;
pub mod patterns;

pub use config_manager::*;
pub use error::*;
pub use patterns::*;
