mod approver;

pub use approver::{Approver, ApproverClosed, StatusSurface};
