//! Console output formatting for negotiation outcomes

use anyhow::Result;
use council_application::NegotiationOutcome;

/// Formats outcomes for the terminal
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Full human-readable report: decision, metadata, round trace
    pub fn format(outcome: &NegotiationOutcome) -> String {
        let decision = &outcome.decision;
        let metadata = &decision.metadata;
        let mut out = String::new();

        out.push_str("=== Council Decision ===\n\n");
        out.push_str(&decision.content);
        out.push_str("\n\n--- Negotiation ---\n");
        out.push_str(&format!(
            "Agreement: {:.3} (confidence: {})\n",
            decision.agreement_level, decision.confidence
        ));
        out.push_str(&format!("Strategy:  {}\n", decision.synthesis_strategy));
        out.push_str(&format!(
            "Rounds:    {} (consensus: {})\n",
            metadata.total_rounds,
            if metadata.consensus_achieved { "yes" } else { "no" }
        ));
        if let Some(reason) = metadata.fallback_reason {
            out.push_str(&format!("Fallback:  {}\n", reason));
        }
        out.push_str(&format!(
            "Members:   {}\n",
            decision.contributing_members.join(", ")
        ));

        out.push_str("\n--- Rounds ---\n");
        for round in outcome.thread.rounds() {
            let members: Vec<&str> = round.member_ids().collect();
            out.push_str(&format!(
                "Round {}: {} answer(s) [{}]\n",
                round.round_number,
                round.exchanges.len(),
                members.join(", ")
            ));
        }
        out
    }

    /// The decision alone, as pretty JSON
    pub fn format_json(outcome: &NegotiationOutcome) -> Result<String> {
        Ok(serde_json::to_string_pretty(&outcome.decision)?)
    }
}
