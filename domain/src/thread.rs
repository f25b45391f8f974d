//! Deliberation thread - the ordered record of rounds for one request
//!
//! A thread is append-only within one deliberation: rounds are numbered from
//! 0 (the independent-response phase) and increase by exactly 1. Exchanges
//! record what each member said in a round, which peers it was shown, and the
//! tokens spent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Token accounting for one provider exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One member's contribution to a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// The member that produced this content
    pub council_member_id: String,
    /// The member's answer for this round
    pub content: String,
    /// Members whose prior-round answers were shown to this member
    #[serde(default)]
    pub references_to: Vec<String>,
    /// Tokens spent producing this exchange
    #[serde(default)]
    pub token_usage: TokenUsage,
}

impl Exchange {
    pub fn new(council_member_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            council_member_id: council_member_id.into(),
            content: content.into(),
            references_to: Vec::new(),
            token_usage: TokenUsage::default(),
        }
    }

    pub fn with_references(mut self, references_to: Vec<String>) -> Self {
        self.references_to = references_to;
        self
    }

    pub fn with_token_usage(mut self, token_usage: TokenUsage) -> Self {
        self.token_usage = token_usage;
        self
    }
}

/// One iteration of the negotiation loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// 0 for the independent-response phase, then increasing by 1
    pub round_number: usize,
    /// Contributions from the members that answered this round
    pub exchanges: Vec<Exchange>,
}

impl Round {
    /// Get the exchange a member produced this round, if any
    pub fn exchange_for(&self, member_id: &str) -> Option<&Exchange> {
        self.exchanges
            .iter()
            .find(|e| e.council_member_id == member_id)
    }

    /// Ids of the members that answered this round
    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.exchanges.iter().map(|e| e.council_member_id.as_str())
    }
}

/// The full ordered record of rounds for one request
///
/// Round numbers are assigned by [`DeliberationThread::push_round`], which is
/// the only way to grow the thread; `rounds()[i].round_number == i` always
/// holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliberationThread {
    rounds: Vec<Round>,
    #[serde(default)]
    total_duration: Duration,
}

impl DeliberationThread {
    /// Create an empty thread
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a thread seeded with the Round 0 exchanges
    pub fn with_initial_round(exchanges: Vec<Exchange>) -> Self {
        let mut thread = Self::new();
        thread.push_round(exchanges);
        thread
    }

    /// Append the next round; its number is the current round count
    pub fn push_round(&mut self, exchanges: Vec<Exchange>) -> &Round {
        let round = Round {
            round_number: self.rounds.len(),
            exchanges,
        };
        self.rounds.push(round);
        self.rounds.last().unwrap()
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn last_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn set_total_duration(&mut self, total_duration: Duration) {
        self.total_duration = total_duration;
    }

    /// Last content each member produced in any round, ordered by member id
    ///
    /// Members dropped mid-negotiation keep their last answer here; final
    /// synthesis works over this view.
    pub fn latest_content_per_member(&self) -> Vec<(String, String)> {
        let mut latest: BTreeMap<&str, &str> = BTreeMap::new();
        for round in &self.rounds {
            for exchange in &round.exchanges {
                latest.insert(&exchange.council_member_id, &exchange.content);
            }
        }
        latest
            .into_iter()
            .map(|(id, content)| (id.to_string(), content.to_string()))
            .collect()
    }

    /// Last content one member produced in any round
    pub fn latest_content_for(&self, member_id: &str) -> Option<&str> {
        self.rounds
            .iter()
            .rev()
            .find_map(|r| r.exchange_for(member_id))
            .map(|e| e.content.as_str())
    }
}
