use super::gate::DecisionInbox;
use crate::ports::approval::Approver;
use chrono::Utc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Handle to the thread that owns the [`Approver`].
pub struct InteractiveContext {
    closed: oneshot::Receiver<()>,
}

impl InteractiveContext {
    /// Resolves once the interactive surface has shut down.
    pub async fn closed(self) {
        let _ = self.closed.await;
    }
}

/// Moves `approver` onto a dedicated thread that answers decisions from
/// `inbox` one at a time, until the approver reports its surface closed or the
/// gate is dropped.
pub fn spawn_interactive_context<A>(
    approver: A,
    inbox: DecisionInbox,
) -> anyhow::Result<InteractiveContext>
where
    A: Approver + 'static,
{
    let (closed_tx, closed) = oneshot::channel();
    thread::Builder::new()
        .name("hwi-bridge-approver".to_string())
        .spawn(move || {
            let mut approver = approver;
            let mut inbox = inbox;
            answer_decisions(&mut approver, &mut inbox);
            let _ = closed_tx.send(());
        })?;
    Ok(InteractiveContext { closed })
}

fn answer_decisions<A: Approver>(approver: &mut A, inbox: &mut DecisionInbox) {
    while let Some(mut decision) = inbox.blocking_recv() {
        let origin = decision.origin().clone();
        let decision_id = decision.id();
        if decision.is_abandoned() {
            debug!(%origin, %decision_id, "skipping decision nobody is waiting for");
            continue;
        }

        decision.mark_presented();
        match approver.request_decision(&origin) {
            Ok(granted) => {
                let waited_ms = (Utc::now() - decision.requested_at()).num_milliseconds();
                if decision.resolve(granted) {
                    debug!(%origin, %decision_id, granted, waited_ms, "operator answered");
                } else {
                    warn!(%origin, %decision_id, granted, waited_ms, "verdict arrived after the request gave up");
                    approver.decision_lapsed(&origin);
                }
            }
            Err(err) => {
                warn!(%origin, %decision_id, %err, "approver closed; stopping interactive context");
                return;
            }
        }
    }
    info!("authorization gate dropped; interactive context exiting");
}
