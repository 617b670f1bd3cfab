pub mod error;
pub mod incidents;
pub mod sensor;

pub use error::Error;
