pub mod clock;
pub mod config;
pub mod error;
pub mod filing;
pub mod job;
pub mod market;

pub use clock::*;
pub use config::Config;
pub use error::*;
pub use filing::*;
pub use job::*;
pub use market::*;
