//! Offline fallback synthesizer
//!
//! Produces a decision from already-collected thread text when negotiation
//! does not converge. No provider calls: centrality is computed with the
//! deterministic lexical metric over each member's last recorded answer
//! (dropped members included), then the configured strategy selects or
//! merges the representative response.

use council_application::ports::fallback::{FallbackError, FallbackOutcome, FallbackSynthesizer};
use council_domain::{
    DeliberationThread, IterativeConsensusConfig, ResponseCandidate, extract_representative,
    term_frequency_cosine,
};
use tracing::debug;

/// Deterministic synthesis over thread text
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFallbackSynthesizer;

impl OfflineFallbackSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl FallbackSynthesizer for OfflineFallbackSynthesizer {
    fn synthesize(
        &self,
        thread: &DeliberationThread,
        config: &IterativeConsensusConfig,
    ) -> Result<FallbackOutcome, FallbackError> {
        let latest = thread.latest_content_per_member();
        if latest.is_empty() {
            return Err(FallbackError::EmptyThread);
        }

        let contributing_members: Vec<String> = latest.iter().map(|(id, _)| id.clone()).collect();

        if latest.len() == 1 {
            let (_, content) = &latest[0];
            return Ok(FallbackOutcome {
                content: content.clone(),
                contributing_members,
                agreement_level: 1.0,
            });
        }

        let n = latest.len();
        let mut sums = vec![0.0; n];
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let score = term_frequency_cosine(&latest[i].1, &latest[j].1);
                total += score;
                sums[i] += score;
                sums[j] += score;
            }
        }
        let agreement_level = total / (n * (n - 1) / 2) as f64;

        let candidates: Vec<ResponseCandidate> = latest
            .iter()
            .zip(&sums)
            .map(|((id, content), sum)| {
                ResponseCandidate::new(id.clone(), content.clone(), sum / (n - 1) as f64)
            })
            .collect();

        debug!(
            strategy = %config.fallback_strategy,
            members = n,
            agreement = agreement_level,
            "synthesizing fallback decision offline"
        );

        let content = extract_representative(&candidates, config.fallback_strategy)
            .ok_or(FallbackError::EmptyThread)?;

        Ok(FallbackOutcome {
            content,
            contributing_members,
            agreement_level,
        })
    }
}
