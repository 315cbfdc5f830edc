mod gate;
mod interactive;
mod trust_store;

pub use gate::{AuthorizationGate, DecisionInbox, PendingDecision};
pub use interactive::{spawn_interactive_context, InteractiveContext};
pub use trust_store::TrustStore;
