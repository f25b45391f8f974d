//! Reconsideration prompt builder
//!
//! Assembles the next-round prompt for one member: the original question,
//! the member's own previous answer, the peers' latest answers (anonymized
//! and ordered by member id so the output is deterministic), and up to a
//! handful of historical exemplars of resolved disagreements.

use council_application::ports::prompt_builder::{PromptBuilder, PromptError};
use council_domain::{Exchange, NegotiationExample};

/// Builds reconsideration prompts for negotiation rounds
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconsiderationPromptBuilder;

impl ReconsiderationPromptBuilder {
    pub fn new() -> Self {
        Self
    }

    fn preamble() -> &'static str {
        "You are one member of a council of independent experts answering the same question.\n\
         Review the other members' latest answers, reconsider your own, and restate your\n\
         complete answer. Adopt points that are better supported than yours; keep points\n\
         you can defend. Converge where honest agreement exists, but do not abandon a\n\
         well-founded position just to agree."
    }

    fn peer_label(index: usize) -> String {
        format!("Peer {}", (b'A' + (index % 26) as u8) as char)
    }
}

impl PromptBuilder for ReconsiderationPromptBuilder {
    fn build(
        &self,
        prior_exchanges: &[Exchange],
        own_previous: Option<&str>,
        examples: &[NegotiationExample],
        query: &str,
    ) -> Result<String, PromptError> {
        if query.trim().is_empty() {
            return Err(PromptError::Assembly("query is empty".to_string()));
        }

        let mut peers: Vec<&Exchange> = prior_exchanges.iter().collect();
        peers.sort_by(|a, b| a.council_member_id.cmp(&b.council_member_id));

        let mut prompt = String::from(Self::preamble());
        prompt.push_str("\n\nOriginal question:\n");
        prompt.push_str(query);
        prompt.push('\n');

        if let Some(own) = own_previous {
            prompt.push_str("\nYour previous answer:\n");
            prompt.push_str(own);
            prompt.push('\n');
        }

        if !peers.is_empty() {
            prompt.push_str("\nLatest answers from the other council members:\n");
            for (i, exchange) in peers.iter().enumerate() {
                prompt.push_str(&format!(
                    "\n--- {} ---\n{}\n",
                    Self::peer_label(i),
                    exchange.content
                ));
            }
        }

        if !examples.is_empty() {
            prompt.push_str("\nPast disagreements this council resolved:\n");
            for example in examples {
                prompt.push_str(&format!(
                    "- [{}] {} -> {} ({} rounds, final agreement {:.2})\n",
                    example.category,
                    example.disagreement,
                    example.resolution,
                    example.rounds_to_consensus,
                    example.final_similarity
                ));
            }
        }

        prompt.push_str(
            "\nRestate your complete answer now. Be explicit about what changed your mind,\n\
             if anything did.",
        );
        Ok(prompt)
    }
}
