mod catalog;
mod registry;
mod runner;

pub use registry::{Chain, HwiCliRegistry};
pub use runner::{HwiCommandError, HwiCommandRunner, HwiOutput, SystemHwiCommandRunner};
