use crate::domain::bridge::Origin;

/// The interactive surface has gone away and can no longer answer prompts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("approver surface closed: {reason}")]
pub struct ApproverClosed {
    pub reason: String,
}

impl ApproverClosed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Human-facing yes/no prompt.
///
/// Runs on the interactive context only, one prompt at a time. A call blocks
/// until the operator answers.
pub trait Approver: Send {
    fn request_decision(&mut self, origin: &Origin) -> Result<bool, ApproverClosed>;

    /// The answer just given came too late: the request was already denied.
    fn decision_lapsed(&mut self, _origin: &Origin) {}
}

/// Best-effort display of the command currently being dispatched.
///
/// Called from request-serving tasks; concurrent dispatches may overwrite
/// each other.
pub trait StatusSurface: Send + Sync {
    fn show(&self, method: &str);

    fn clear(&self);
}
