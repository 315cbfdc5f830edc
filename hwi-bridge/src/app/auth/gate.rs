use super::trust_store::TrustStore;
use crate::domain::bridge::Origin;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

type VerdictWatch = watch::Receiver<Option<bool>>;

/// The single prompt currently awaiting an operator verdict.
#[derive(Debug)]
pub struct PendingDecision {
    id: Uuid,
    origin: Origin,
    requested_at: DateTime<Utc>,
    presented: Option<oneshot::Sender<()>>,
    reply: oneshot::Sender<bool>,
}

impl PendingDecision {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// True once the waiting request has stopped listening (timeout or
    /// client disconnect). Such decisions must not be shown.
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    /// Tells the waiting request the prompt is now in front of the operator.
    /// Its answer timeout restarts from this point.
    pub fn mark_presented(&mut self) {
        if let Some(presented) = self.presented.take() {
            let _ = presented.send(());
        }
    }

    /// Delivers the verdict. Returns `false` if nobody was waiting for it.
    pub fn resolve(self, granted: bool) -> bool {
        self.reply.send(granted).is_ok()
    }
}

/// Interactive-side end of the decision channel.
#[derive(Debug)]
pub struct DecisionInbox {
    rx: mpsc::Receiver<PendingDecision>,
}

impl DecisionInbox {
    pub async fn recv(&mut self) -> Option<PendingDecision> {
        self.rx.recv().await
    }

    /// Must be called from a thread outside the async runtime.
    pub fn blocking_recv(&mut self) -> Option<PendingDecision> {
        self.rx.blocking_recv()
    }
}

/// Synchronization point between request-serving tasks and the operator.
///
/// Granted origins pass straight through. Anything else publishes a
/// [`PendingDecision`] and waits for it. Only one decision is outstanding at a
/// time: prompts for different origins queue in arrival order, and concurrent
/// requests from the same origin share a single prompt.
#[derive(Debug)]
pub struct AuthorizationGate {
    trust: TrustStore,
    prompt_slot: tokio::sync::Mutex<()>,
    in_flight: Mutex<HashMap<Origin, VerdictWatch>>,
    decisions: mpsc::Sender<PendingDecision>,
    timeout: Option<Duration>,
}

enum Role {
    Leader(watch::Sender<Option<bool>>),
    Follower(VerdictWatch),
}

impl AuthorizationGate {
    /// Creates the gate and the inbox its decisions are delivered to.
    ///
    /// `timeout` bounds how long a request waits for the operator before it
    /// is denied; `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> (Self, DecisionInbox) {
        let (decisions, rx) = mpsc::channel(1);
        let gate = Self {
            trust: TrustStore::new(),
            prompt_slot: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(HashMap::new()),
            decisions,
            timeout,
        };
        (gate, DecisionInbox { rx })
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.trust
    }

    pub async fn authorize(&self, origin: &Origin) -> bool {
        loop {
            if self.trust.is_granted(origin) {
                return true;
            }

            match self.join_or_lead(origin) {
                Role::Follower(mut verdict) => {
                    debug!(%origin, "waiting on pending decision for the same origin");
                    match verdict.wait_for(Option::is_some).await {
                        Ok(verdict) => return *verdict == Some(true),
                        // Leader went away without a verdict; start over.
                        Err(_) => continue,
                    }
                }
                Role::Leader(verdict) => {
                    let entry = InFlight {
                        in_flight: &self.in_flight,
                        origin,
                        verdict,
                    };
                    let granted = self.decide(origin).await;
                    entry.finish(granted);
                    return granted;
                }
            }
        }
    }

    fn join_or_lead(&self, origin: &Origin) -> Role {
        let mut in_flight = self.in_flight.lock().expect("in-flight decisions poisoned");
        // An entry whose verdict is already out belongs to a finished
        // decision and must not be reused.
        match in_flight.get(origin) {
            Some(watch) if watch.borrow().is_none() => Role::Follower(watch.clone()),
            _ => {
                let (tx, rx) = watch::channel(None);
                in_flight.insert(origin.clone(), rx);
                Role::Leader(tx)
            }
        }
    }

    async fn decide(&self, origin: &Origin) -> bool {
        let _slot = self.prompt_slot.lock().await;
        if self.trust.is_granted(origin) {
            return true;
        }

        let (reply, verdict) = oneshot::channel();
        let (presented, shown) = oneshot::channel();
        let decision = PendingDecision {
            id: Uuid::new_v4(),
            origin: origin.clone(),
            requested_at: Utc::now(),
            presented: Some(presented),
            reply,
        };
        let decision_id = decision.id;
        info!(%origin, %decision_id, "awaiting operator decision");

        // Queued and shown each get the full timeout, so a decision stuck
        // behind a stale prompt is not denied before the operator sees it.
        let queued = async {
            if self.decisions.send(decision).await.is_err() {
                warn!(%origin, %decision_id, "approver is gone; denying");
                return false;
            }
            // Resolving or dropping the decision also ends this wait.
            let _ = shown.await;
            true
        };
        let granted = match self.bounded(queued).await {
            Some(true) => match self.bounded(verdict).await {
                Some(Ok(granted)) => granted,
                Some(Err(_)) => {
                    warn!(%origin, %decision_id, "decision dropped without a verdict; denying");
                    false
                }
                None => {
                    warn!(%origin, %decision_id, "operator decision timed out; denying");
                    false
                }
            },
            Some(false) => false,
            None => {
                warn!(%origin, %decision_id, "decision was never shown to the operator; denying");
                false
            }
        };

        if granted {
            self.trust.grant(origin.clone());
            info!(%origin, %decision_id, "origin granted");
        } else {
            info!(%origin, %decision_id, "origin denied");
        }
        granted
    }

    /// `None` when the configured timeout elapses first.
    async fn bounded<F: Future>(&self, future: F) -> Option<F::Output> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, future).await.ok(),
            None => Some(future.await),
        }
    }
}

/// Marks an origin as having a decision in progress. The marker is cleared
/// before followers can observe the outcome, whether that is a verdict from
/// [`InFlight::finish`] or the closed channel left by cancellation.
struct InFlight<'a> {
    in_flight: &'a Mutex<HashMap<Origin, VerdictWatch>>,
    origin: &'a Origin,
    verdict: watch::Sender<Option<bool>>,
}

impl InFlight<'_> {
    fn finish(self, granted: bool) {
        self.clear();
        self.verdict.send_replace(Some(granted));
    }

    // Only removes the entry if it is still ours; a newer leader may have
    // replaced it.
    fn clear(&self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            let own = self.verdict.subscribe();
            if in_flight
                .get(self.origin)
                .is_some_and(|watch| watch.same_channel(&own))
            {
                in_flight.remove(self.origin);
            }
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::sleep;

    fn gate(timeout: Option<Duration>) -> (Arc<AuthorizationGate>, DecisionInbox) {
        let (gate, inbox) = AuthorizationGate::new(timeout);
        (Arc::new(gate), inbox)
    }

    fn spawn_authorize(
        gate: &Arc<AuthorizationGate>,
        origin: &str,
    ) -> tokio::task::JoinHandle<bool> {
        let gate = Arc::clone(gate);
        let origin = Origin::new(origin);
        tokio::spawn(async move { gate.authorize(&origin).await })
    }

    #[tokio::test]
    async fn granted_origin_passes_without_prompt() {
        let (gate, mut inbox) = gate(None);
        gate.trust_store()
            .grant(Origin::new("https://wallet.example"));

        assert!(gate.authorize(&Origin::new("https://wallet.example")).await);
        assert!(matches!(inbox.rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn first_request_blocks_until_single_prompt_resolves() {
        let (gate, mut inbox) = gate(None);
        let pending = spawn_authorize(&gate, "https://wallet.example");

        let decision = inbox.recv().await.expect("decision published");
        assert_eq!(decision.origin().as_str(), "https://wallet.example");
        sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        assert!(decision.resolve(true));
        assert!(pending.await.unwrap());
        assert_eq!(
            gate.trust_store().get(&Origin::new("https://wallet.example")),
            Some(true)
        );

        assert!(gate.authorize(&Origin::new("https://wallet.example")).await);
        assert!(matches!(inbox.rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn denial_is_not_cached() {
        let (gate, mut inbox) = gate(None);

        for _ in 0..2 {
            let pending = spawn_authorize(&gate, "https://evil.example");
            let decision = inbox.recv().await.expect("decision published");
            decision.resolve(false);
            assert!(!pending.await.unwrap());
            assert_eq!(
                gate.trust_store().get(&Origin::new("https://evil.example")),
                None
            );
        }
    }

    #[tokio::test]
    async fn distinct_origins_are_prompted_one_at_a_time_in_order() {
        let (gate, mut inbox) = gate(None);
        let first = spawn_authorize(&gate, "https://a.example");
        let decision_a = inbox.recv().await.expect("first decision");
        let second = spawn_authorize(&gate, "https://b.example");
        sleep(Duration::from_millis(10)).await;
        let third = spawn_authorize(&gate, "https://c.example");

        sleep(Duration::from_millis(20)).await;
        assert!(matches!(inbox.rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(decision_a.origin().as_str(), "https://a.example");
        decision_a.resolve(true);

        let decision_b = inbox.recv().await.expect("second decision");
        assert_eq!(decision_b.origin().as_str(), "https://b.example");
        sleep(Duration::from_millis(20)).await;
        assert!(matches!(inbox.rx.try_recv(), Err(TryRecvError::Empty)));
        decision_b.resolve(false);

        let decision_c = inbox.recv().await.expect("third decision");
        assert_eq!(decision_c.origin().as_str(), "https://c.example");
        decision_c.resolve(true);

        assert!(first.await.unwrap());
        assert!(!second.await.unwrap());
        assert!(third.await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_requests_from_one_origin_share_the_prompt() {
        let (gate, mut inbox) = gate(None);
        let first = spawn_authorize(&gate, "https://wallet.example");
        let decision = inbox.recv().await.expect("decision published");
        let second = spawn_authorize(&gate, "https://wallet.example");
        let third = spawn_authorize(&gate, "https://wallet.example");
        sleep(Duration::from_millis(20)).await;

        decision.resolve(false);
        assert!(!first.await.unwrap());
        assert!(!second.await.unwrap());
        assert!(!third.await.unwrap());
        assert!(matches!(inbox.rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn unanswered_prompt_times_out_to_deny() {
        let (gate, mut inbox) = gate(Some(Duration::from_millis(50)));

        assert!(!gate.authorize(&Origin::new("https://slow.example")).await);
        let stale = inbox.rx.try_recv().expect("decision was published");
        assert!(stale.is_abandoned());
        assert!(!stale.resolve(true));
        assert_eq!(
            gate.trust_store().get(&Origin::new("https://slow.example")),
            None
        );
    }

    #[tokio::test]
    async fn answer_timeout_restarts_when_prompt_is_shown() {
        let (gate, mut inbox) = gate(Some(Duration::from_millis(200)));
        let pending = spawn_authorize(&gate, "https://queued.example");
        let mut decision = inbox.recv().await.expect("decision published");

        // Waits behind an earlier prompt, then is shown.
        sleep(Duration::from_millis(120)).await;
        decision.mark_presented();
        sleep(Duration::from_millis(120)).await;

        assert!(decision.resolve(true));
        assert!(pending.await.unwrap());
    }

    #[tokio::test]
    async fn shown_prompt_still_times_out() {
        let (gate, mut inbox) = gate(Some(Duration::from_millis(50)));
        let pending = spawn_authorize(&gate, "https://slow.example");
        let mut decision = inbox.recv().await.expect("decision published");
        decision.mark_presented();

        assert!(!pending.await.unwrap());
        assert!(decision.is_abandoned());
    }

    #[tokio::test]
    async fn missing_approver_denies() {
        let (gate, inbox) = gate(None);
        drop(inbox);
        assert!(!gate.authorize(&Origin::new("https://wallet.example")).await);
    }

    #[tokio::test]
    async fn finished_denial_is_not_joined_by_new_requests() {
        let (gate, mut inbox) = gate(None);
        let origin = Origin::new("https://evil.example");
        let Role::Leader(finished) = gate.join_or_lead(&origin) else {
            unreachable!("no decision in flight yet");
        };
        // Verdict published while the marker is still present.
        finished.send_replace(Some(false));

        let pending = spawn_authorize(&gate, "https://evil.example");
        let decision = tokio::time::timeout(Duration::from_secs(1), inbox.recv())
            .await
            .expect("fresh prompt instead of the finished denial")
            .expect("decision published");
        assert_eq!(decision.origin(), &origin);
        decision.resolve(true);
        assert!(pending.await.unwrap());
        drop(finished);
    }

    #[tokio::test]
    async fn marker_is_gone_once_verdict_is_visible() {
        let (gate, mut inbox) = gate(None);
        let origin = Origin::new("https://wallet.example");
        let leader = spawn_authorize(&gate, "https://wallet.example");
        let decision = inbox.recv().await.expect("decision published");
        let Role::Follower(mut verdict) = gate.join_or_lead(&origin) else {
            unreachable!("leader holds the marker");
        };

        decision.resolve(false);
        verdict.wait_for(Option::is_some).await.unwrap();
        assert!(!gate.in_flight.lock().unwrap().contains_key(&origin));
        assert!(!leader.await.unwrap());
    }

    #[tokio::test]
    async fn follower_takes_over_when_leader_is_cancelled() {
        let (gate, mut inbox) = gate(None);
        let leader = spawn_authorize(&gate, "https://wallet.example");
        let abandoned = inbox.recv().await.expect("leader decision");
        let follower = spawn_authorize(&gate, "https://wallet.example");
        sleep(Duration::from_millis(20)).await;

        leader.abort();
        let _ = leader.await;
        assert!(abandoned.is_abandoned());

        let decision = inbox.recv().await.expect("follower decision");
        assert_eq!(decision.origin().as_str(), "https://wallet.example");
        decision.resolve(true);
        assert!(follower.await.unwrap());
    }
}
