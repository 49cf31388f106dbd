//! Probe coordinator: publish, listen, race the deadline, clean up.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::gate::CompletionGate;
use super::outcome::{ProbeError, ProbeOutcome};
use super::token::ProbeToken;
use crate::broker::{
    AckMode, BrokerSession, Connector, PublishOptions, Subscription, SubscriptionId, TEXT_PLAIN,
};
use crate::config::ProbeConfig;
use crate::logging::ProbeLogger;

/// How long cleanup waits for the listener after unsubscribing.
pub const DEFAULT_LISTENER_GRACE: Duration = Duration::from_secs(2);

/// Listener progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Listening,
    Resolved,
}

/// Reads the subscription until it sees the token, the subscription
/// closes, or the gate has been resolved by someone else.
pub struct Listener {
    subscription: Subscription,
    token: ProbeToken,
    gate: Arc<CompletionGate<ProbeOutcome>>,
    log: Arc<dyn ProbeLogger>,
    state: ListenerState,
}

impl Listener {
    pub fn new(
        subscription: Subscription,
        token: ProbeToken,
        gate: Arc<CompletionGate<ProbeOutcome>>,
        log: Arc<dyn ProbeLogger>,
    ) -> Self {
        Self {
            subscription,
            token,
            gate,
            log,
            state: ListenerState::Listening,
        }
    }

    /// Run to completion and report the final state.
    ///
    /// `Listening` on return means the subscription closed before the
    /// listener resolved anything.
    pub async fn run(mut self) -> ListenerState {
        while self.state == ListenerState::Listening {
            if self.gate.is_resolved() {
                self.state = ListenerState::Resolved;
                break;
            }

            let Some(msg) = self.subscription.next_message().await else {
                debug!(subscription = %self.subscription.id(), "subscription closed");
                break;
            };
            self.state = self.on_message(msg);
        }
        self.state
    }

    fn on_message(&self, msg: crate::broker::IncomingMessage) -> ListenerState {
        if let Some(ref error) = msg.error {
            self.log.error(&format!(
                "subscription to {} failed: {}",
                self.subscription.destination(),
                error
            ));
            return ListenerState::Listening;
        }

        if msg.is_text_plain() && self.token.matches(&msg.body) {
            if !self.gate.resolve(ProbeOutcome::Matched) {
                debug!("probe message arrived after the run was resolved");
            }
            return ListenerState::Resolved;
        }

        let mismatch = ProbeOutcome::Mismatched {
            expected: self.token.to_string(),
            received: msg.body_text(),
        };
        self.log.warn(&mismatch.to_string());
        ListenerState::Listening
    }
}

/// Sleep for `deadline`, then resolve the gate as timed out unless the
/// listener got there first.
async fn run_deadline(gate: Arc<CompletionGate<ProbeOutcome>>, deadline: Duration) {
    tokio::time::sleep(deadline).await;
    if gate.resolve(ProbeOutcome::TimedOut { deadline }) {
        debug!(?deadline, "deadline reached");
    }
}

/// Runs one probe cycle against a broker.
pub struct Prober<C> {
    connector: C,
    log: Arc<dyn ProbeLogger>,
    listener_grace: Duration,
}

impl<C: Connector> Prober<C> {
    pub fn new(connector: C, log: Arc<dyn ProbeLogger>) -> Self {
        Self {
            connector,
            log,
            listener_grace: DEFAULT_LISTENER_GRACE,
        }
    }

    pub fn with_listener_grace(mut self, grace: Duration) -> Self {
        self.listener_grace = grace;
        self
    }

    /// Connect, publish a fresh token to `config.destination` and wait
    /// for it to come back.
    ///
    /// Only a failed connection is an error. Publish and subscribe
    /// failures are logged and the run ends as [`ProbeOutcome::TimedOut`].
    pub async fn run(&self, config: &ProbeConfig) -> Result<ProbeOutcome, ProbeError> {
        let address = config.broker.address();
        let destination = config.destination.as_str();

        let session = self
            .connector
            .connect(&config.broker)
            .await
            .map_err(|source| ProbeError::Connect {
                address: address.clone(),
                source,
            })?;
        self.log
            .info(&format!("connected to broker: {}", address));

        let token = ProbeToken::generate();
        debug!(token = %token, destination, "publishing probe message");

        let options = PublishOptions {
            durable: config.durable,
        };
        match session
            .publish(destination, TEXT_PLAIN, token.as_bytes(), options)
            .await
        {
            Ok(()) => self
                .log
                .info(&format!("probe message sent to queue {}", destination)),
            Err(e) => self.log.error(&format!(
                "failed to send probe message to {} on {}: {}",
                destination, address, e
            )),
        }

        // The deadline counts from the publish, not from the subscribe
        let gate = Arc::new(CompletionGate::new());
        let timer = tokio::spawn(run_deadline(Arc::clone(&gate), config.deadline));

        let (sub_id, listener) = match session.subscribe(destination, AckMode::Auto).await {
            Ok(subscription) => {
                let id = subscription.id().clone();
                let listener = Listener::new(
                    subscription,
                    token,
                    Arc::clone(&gate),
                    Arc::clone(&self.log),
                );
                (Some(id), Some(tokio::spawn(listener.run())))
            }
            Err(e) => {
                self.log.error(&format!(
                    "failed to subscribe to {} on {}: {}",
                    destination, address, e
                ));
                (None, None)
            }
        };

        let outcome = gate.wait().await.clone();
        debug!(?outcome, "probe resolved");

        self.cleanup(&session, destination, timer, sub_id, listener)
            .await;
        Ok(outcome)
    }

    /// Tear everything down. Every step runs even if an earlier one
    /// failed; failures are logged only.
    async fn cleanup(
        &self,
        session: &C::Session,
        destination: &str,
        timer: JoinHandle<()>,
        sub_id: Option<SubscriptionId>,
        listener: Option<JoinHandle<ListenerState>>,
    ) {
        timer.abort();
        let _ = timer.await;

        if let Some(id) = sub_id {
            if let Err(e) = session.unsubscribe(&id).await {
                self.log.warn(&format!(
                    "failed to unsubscribe from {}: {}",
                    destination, e
                ));
            }
        }

        // Unsubscribing closes the subscription, which ends the listener
        if let Some(mut handle) = listener {
            match tokio::time::timeout(self.listener_grace, &mut handle).await {
                Ok(Ok(state)) => debug!(?state, "listener finished"),
                Ok(Err(e)) => self.log.warn(&format!("listener task failed: {}", e)),
                Err(_) => {
                    debug!("listener still blocked after unsubscribe, aborting");
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }

        if let Err(e) = session.disconnect().await {
            self.log.warn(&format!("failed to disconnect: {}", e));
        }
    }
}
