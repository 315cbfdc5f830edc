pub mod approval;
pub mod hwi;
