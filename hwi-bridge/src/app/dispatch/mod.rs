mod service;

pub use service::{CommandDispatcher, DispatchError};
