//! Per-request confirmation lifecycle as a statum typestate machine.
//!
//! ```text
//! Received ──begin──► AwaitingDecision ──decide──► Resolved(decision)
//!                        │      ▲
//!                        └──────┘ answer rejected by policy: present again
//! ```
//!
//! Every exchange is independent. The decision is only known in `Resolved`,
//! which is the only state that can produce a response event.

use statum::{machine, state};
use tracing::{debug, info, warn};

use super::prompt::{PresentationError, Prompter};
use super::ConfirmError;
use crate::events::{ConfirmDecision, ConfirmRequestEvent, ConfirmResponseEvent};

#[state]
#[derive(Debug, Clone)]
pub enum ExchangeState {
    Received,
    AwaitingDecision,
    Resolved(ConfirmDecision),
}

#[machine]
#[derive(Debug)]
pub struct ConfirmExchange<S: ExchangeState> {
    request: ConfirmRequestEvent,
    prompts_shown: u32,
}

impl<S: ExchangeState> ConfirmExchange<S> {
    pub fn request(&self) -> &ConfirmRequestEvent {
        &self.request
    }

    /// How many times the message has been presented so far.
    pub fn prompts_shown(&self) -> u32 {
        self.prompts_shown
    }
}

impl ConfirmExchange<Received> {
    pub fn open(request: ConfirmRequestEvent) -> Self {
        info!(
            "Confirm request eid={} policy={} received",
            request.eid, request.require_confirm
        );
        Self::new(request, 0)
    }

    pub fn begin(self) -> ConfirmExchange<AwaitingDecision> {
        debug!("Confirm request eid={} awaiting decision", self.request.eid);
        self.transition()
    }
}

impl ConfirmExchange<AwaitingDecision> {
    /// Presents the message until the request's policy accepts an answer.
    ///
    /// A presentation failure ends the exchange without a decision; no
    /// default is assumed.
    pub async fn decide<P: Prompter>(
        mut self,
        prompter: &mut P,
    ) -> Result<ConfirmExchange<Resolved>, PresentationError> {
        let policy = self.request.require_confirm;
        loop {
            self.prompts_shown += 1;
            let affirmed = prompter.ask(&self.request.msg).await?;
            debug!(
                "Operator answered {} to eid={} (prompt #{})",
                affirmed, self.request.eid, self.prompts_shown
            );

            match policy.settle(affirmed) {
                Some(decision) => {
                    info!(
                        "Confirm request eid={} resolved to {} after {} prompt(s)",
                        self.request.eid, decision, self.prompts_shown
                    );
                    return Ok(self.transition_with(decision));
                }
                None => {
                    info!(
                        "Policy {} does not accept this answer, presenting eid={} again",
                        policy, self.request.eid
                    );
                }
            }
        }
    }
}

impl ConfirmExchange<Resolved> {
    pub fn decision(&self) -> Option<ConfirmDecision> {
        self.get_state_data().copied()
    }

    /// Builds the correlated response using a freshly allocated `eid`.
    pub fn respond(self, eid: u64) -> Result<ConfirmResponseEvent, ConfirmError> {
        match self.decision() {
            Some(decision) => Ok(ConfirmResponseEvent::answering(&self.request, decision, eid)),
            None => {
                warn!(
                    "Resolved exchange eid={} has no decision, this should not happen",
                    self.request.eid
                );
                Err(ConfirmError::Unresolved(self.request.eid))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ConfirmPolicy;
    use crate::testing::ScriptedPrompter;

    fn request(policy: ConfirmPolicy) -> ConfirmRequestEvent {
        ConfirmRequestEvent {
            eid: 7,
            generated_t: 1000,
            received_t: 1001,
            msg: "Proceed?".to_string(),
            require_confirm: policy,
        }
    }

    #[tokio::test]
    async fn both_resolves_on_single_decline() {
        let mut prompter = ScriptedPrompter::new([false]);
        let resolved = ConfirmExchange::open(request(ConfirmPolicy::Both))
            .begin()
            .decide(&mut prompter)
            .await
            .unwrap();

        assert_eq!(resolved.decision(), Some(ConfirmDecision::Cancel));
        assert_eq!(resolved.prompts_shown(), 1);
        assert_eq!(prompter.messages(), ["Proceed?"]);
    }

    #[tokio::test]
    async fn ok_policy_reprompts_until_affirmed() {
        let mut prompter = ScriptedPrompter::new([false, false, true]);
        let resolved = ConfirmExchange::open(request(ConfirmPolicy::Ok))
            .begin()
            .decide(&mut prompter)
            .await
            .unwrap();

        assert_eq!(resolved.decision(), Some(ConfirmDecision::Ok));
        assert_eq!(resolved.prompts_shown(), 3);
        assert_eq!(prompter.calls(), 3);
    }

    #[tokio::test]
    async fn cancel_policy_discards_affirmations() {
        let mut prompter = ScriptedPrompter::new([true, true, true, false]);
        let resolved = ConfirmExchange::open(request(ConfirmPolicy::Cancel))
            .begin()
            .decide(&mut prompter)
            .await
            .unwrap();

        assert_eq!(resolved.decision(), Some(ConfirmDecision::Cancel));
        assert_eq!(resolved.prompts_shown(), 4);
    }

    #[tokio::test]
    async fn presentation_failure_leaves_exchange_unresolved() {
        // Declines once, then the surface disappears.
        let mut prompter = ScriptedPrompter::new([false]);
        let result = ConfirmExchange::open(request(ConfirmPolicy::Ok))
            .begin()
            .decide(&mut prompter)
            .await;

        assert!(matches!(result, Err(PresentationError::Unavailable(_))));
        assert_eq!(prompter.calls(), 2);
    }

    #[tokio::test]
    async fn response_correlates_to_request() {
        let mut prompter = ScriptedPrompter::new([true]);
        let resolved = ConfirmExchange::open(request(ConfirmPolicy::Both))
            .begin()
            .decide(&mut prompter)
            .await
            .unwrap();

        let response = resolved.respond(12).unwrap();
        assert_eq!(response.eid, 12);
        assert_eq!(response.respond_to_eid, 7);
        assert_eq!(response.response, ConfirmDecision::Ok);
    }

    #[test]
    fn open_starts_with_no_prompts() {
        let exchange = ConfirmExchange::open(request(ConfirmPolicy::Ok));
        assert_eq!(exchange.prompts_shown(), 0);
        assert_eq!(exchange.request().eid, 7);
        let awaiting = exchange.begin();
        assert_eq!(awaiting.prompts_shown(), 0);
    }
}
