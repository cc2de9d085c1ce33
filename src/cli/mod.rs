// Interactive terminal front-end
pub mod commands;
pub mod presenter;
pub mod session;

pub use commands::{Command, Input};
pub use presenter::Presenter;
pub use session::Session;
