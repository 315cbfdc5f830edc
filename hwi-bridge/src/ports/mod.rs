pub mod approval;
pub mod registry;
