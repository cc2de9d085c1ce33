pub mod database; // Backend adapters (sqlite, postgresql, mysql)
pub mod llm_service;
pub mod prompt;
pub mod query_log; // Append-only turn log
pub mod query_service;
pub mod sql_extractor;

pub use llm_service::*;
pub use prompt::*;
pub use query_log::*;
pub use query_service::*;
pub use sql_extractor::*;
