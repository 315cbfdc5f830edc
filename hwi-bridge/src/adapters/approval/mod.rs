pub mod console;
pub mod status;

pub use console::ConsoleApprover;
pub use status::StatusBoard;
