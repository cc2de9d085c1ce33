pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use error::AppError;
pub use models::*;
pub use services::*;
pub use validation::*;
