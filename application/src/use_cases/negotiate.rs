//! Negotiate use case
//!
//! Orchestrates the bounded multi-round negotiation loop: per-round prompt
//! building, parallel or sequential dispatch to the active members,
//! similarity measurement, and the stop/continue decision, ending in exactly
//! one [`ConsensusDecision`], negotiated or synthesized offline.
//!
//! All round-by-round state (active-member set, similarity history, latest
//! content) is call-scoped; nothing crosses `synthesize` invocations, so
//! concurrent deliberations for different requests never interact.

use crate::ports::escalation::{EscalationService, NoEscalation};
use crate::ports::event_sink::{EventSink, NoEventSink};
use crate::ports::example_source::{ExampleSource, NoExamples};
use crate::ports::fallback::{FallbackError, FallbackSynthesizer};
use crate::ports::prompt_builder::PromptBuilder;
use crate::ports::provider_gateway::{
    ProviderError, ProviderErrorCode, ProviderGateway, ProviderReply,
};
use crate::ports::similarity::SimilarityMeasurer;
use council_domain::{
    ConsensusDecision, CouncilMember, DeliberationThread, DomainError, Exchange, FallbackReason,
    IterativeConsensusConfig, NegotiationMode, ResponseCandidate, SimilarityHistory, UserRequest,
    analyze_trend, extract_representative, is_deadlocked,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Errors that can reach the caller of [`NegotiateUseCase::synthesize`]
///
/// Every other partial failure (member drops, analysis failures, sink and
/// escalation errors) degrades into decision metadata instead.
#[derive(Error, Debug)]
pub enum NegotiateError {
    #[error("deliberation thread is missing its initial round")]
    MissingInitialRound,

    #[error(transparent)]
    InvalidConfig(#[from] DomainError),

    #[error("fallback synthesis failed: {0}")]
    FallbackFailed(#[from] FallbackError),
}

/// Input for one deliberation
///
/// The thread arrives already holding Round 0 (the independent-response
/// phase, produced out of scope) with at least one exchange.
#[derive(Debug, Clone)]
pub struct NegotiationInput {
    pub request: UserRequest,
    pub thread: DeliberationThread,
    pub members: Vec<CouncilMember>,
    pub config: IterativeConsensusConfig,
}

impl NegotiationInput {
    pub fn new(
        request: UserRequest,
        thread: DeliberationThread,
        members: Vec<CouncilMember>,
        config: IterativeConsensusConfig,
    ) -> Self {
        Self {
            request,
            thread,
            members,
            config,
        }
    }
}

/// Result of one deliberation: the decision plus the final thread
#[derive(Debug, Clone)]
pub struct NegotiationOutcome {
    pub decision: ConsensusDecision,
    pub thread: DeliberationThread,
}

/// A call planned for one member: (member, prompt, referenced peer ids)
type PlannedCall = (CouncilMember, String, Vec<String>);

/// A settled call: (member, referenced peer ids, outcome)
type SettledCall = (
    CouncilMember,
    Vec<String>,
    Result<ProviderReply, ProviderError>,
);

/// Mean pairwise similarity of a round, plus per-member centrality
struct RoundSimilarity {
    mean: f64,
    /// Mean similarity of each member's answer to the others' answers
    centrality: BTreeMap<String, f64>,
}

/// Use case driving the negotiation loop
pub struct NegotiateUseCase {
    gateway: Arc<dyn ProviderGateway>,
    similarity: Arc<dyn SimilarityMeasurer>,
    prompts: Arc<dyn PromptBuilder>,
    fallback: Arc<dyn FallbackSynthesizer>,
    examples: Arc<dyn ExampleSource>,
    events: Arc<dyn EventSink>,
    escalation: Arc<dyn EscalationService>,
}

impl NegotiateUseCase {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        similarity: Arc<dyn SimilarityMeasurer>,
        prompts: Arc<dyn PromptBuilder>,
        fallback: Arc<dyn FallbackSynthesizer>,
    ) -> Self {
        Self {
            gateway,
            similarity,
            prompts,
            fallback,
            examples: Arc::new(NoExamples),
            events: Arc::new(NoEventSink),
            escalation: Arc::new(NoEscalation),
        }
    }

    pub fn with_example_source(mut self, examples: Arc<dyn ExampleSource>) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_escalation_service(mut self, escalation: Arc<dyn EscalationService>) -> Self {
        self.escalation = escalation;
        self
    }

    /// Run the negotiation loop to a decision
    ///
    /// Always returns a decision unless the thread has no initial round, the
    /// config is invalid, or fallback synthesis itself fails.
    pub async fn synthesize(
        &self,
        input: NegotiationInput,
    ) -> Result<NegotiationOutcome, NegotiateError> {
        let NegotiationInput {
            request,
            mut thread,
            members,
            config,
        } = input;
        config.validate()?;

        if !thread
            .rounds()
            .first()
            .is_some_and(|r| !r.exchanges.is_empty())
        {
            return Err(NegotiateError::MissingInitialRound);
        }

        let started = Instant::now();
        info!(
            request_id = %request.id,
            members = members.len(),
            max_rounds = config.max_rounds,
            mode = %config.negotiation_mode,
            "starting negotiation"
        );

        let members_by_id: BTreeMap<String, CouncilMember> = members
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect();

        // Call-scoped state: the active set starts as the configured members
        // that actually answered independently in Round 0.
        let initial = &thread.rounds()[0];
        let mut active: BTreeSet<String> = initial
            .exchanges
            .iter()
            .filter(|e| members_by_id.contains_key(&e.council_member_id))
            .map(|e| e.council_member_id.clone())
            .collect();
        let mut latest: BTreeMap<String, String> = initial
            .exchanges
            .iter()
            .map(|e| (e.council_member_id.clone(), e.content.clone()))
            .collect();
        let mut history = SimilarityHistory::new();
        let mut escalated = false;

        self.events.log_round(&request.id, initial);

        let mut round_sim = self
            .round_similarity(&active, &latest, &config, None)
            .await;
        history.push(round_sim.mean);
        debug!(round = 0, similarity = round_sim.mean, "round similarity recorded");

        if active.len() < 2 {
            return self.conclude_fallback(
                &request,
                thread,
                &config,
                FallbackReason::InsufficientActiveMembers,
                0,
                started,
            );
        }

        if round_sim.mean >= config.agreement_threshold {
            info!(similarity = round_sim.mean, "consensus reached at round 0");
            return Ok(self.conclude_consensus(
                &request, thread, &config, &active, &latest, &round_sim, 0, started,
            ));
        }

        let mut executed = 0;
        let mut insufficient = false;

        for round_no in 1..=config.max_rounds {
            let examples = match self
                .examples
                .relevant_examples(&request.query, config.example_count)
                .await
            {
                Ok(examples) => examples,
                Err(error) => {
                    debug!(error = %error, "example retrieval failed; continuing without exemplars");
                    Vec::new()
                }
            };

            // One reconsideration prompt per active member from the prior
            // round's exchanges. A build failure skips the member's call this
            // round (its latest answer stands) without dropping it.
            let prior_exchanges: Vec<Exchange> = thread
                .last_round()
                .map(|r| r.exchanges.clone())
                .unwrap_or_default();
            let mut planned: Vec<PlannedCall> = Vec::new();
            for id in &active {
                let Some(member) = members_by_id.get(id) else {
                    continue;
                };
                let peers: Vec<Exchange> = prior_exchanges
                    .iter()
                    .filter(|e| &e.council_member_id != id)
                    .cloned()
                    .collect();
                let references: Vec<String> =
                    peers.iter().map(|e| e.council_member_id.clone()).collect();
                match self.prompts.build(
                    &peers,
                    latest.get(id).map(String::as_str),
                    &examples,
                    &request.query,
                ) {
                    Ok(prompt) => planned.push((member.clone(), prompt, references)),
                    Err(error) => warn!(
                        member = %id,
                        error = %error,
                        "prompt build failed; member keeps its prior answer this round"
                    ),
                }
            }

            let settled = match config.negotiation_mode {
                NegotiationMode::Parallel => {
                    self.dispatch_parallel(planned, config.per_round_timeout).await
                }
                NegotiationMode::Sequential => self.dispatch_sequential(planned, &config).await,
            };

            let mut exchanges = Vec::new();
            for (member, references, outcome) in settled {
                match outcome {
                    Ok(reply) => {
                        debug!(
                            member = %member.id,
                            latency_ms = reply.latency.as_millis() as u64,
                            tokens = reply.token_usage.total_tokens,
                            "member replied"
                        );
                        latest.insert(member.id.clone(), reply.content.clone());
                        exchanges.push(
                            Exchange::new(member.id, reply.content)
                                .with_references(references)
                                .with_token_usage(reply.token_usage),
                        );
                    }
                    Err(error) => {
                        warn!(
                            member = %member.id,
                            code = %error.code,
                            retryable = error.retryable,
                            "member dropped from negotiation: {}",
                            error.message
                        );
                        active.remove(&member.id);
                    }
                }
            }
            // Parallel completion order is arbitrary; keep rounds canonical.
            exchanges.sort_by(|a, b| a.council_member_id.cmp(&b.council_member_id));

            let round = thread.push_round(exchanges);
            self.events.log_round(&request.id, round);
            executed = round_no;

            if active.len() < 2 {
                insufficient = true;
                break;
            }

            round_sim = self
                .round_similarity(&active, &latest, &config, history.latest())
                .await;
            history.push(round_sim.mean);
            debug!(
                round = round_no,
                similarity = round_sim.mean,
                active = active.len(),
                "round similarity recorded"
            );

            if config.early_termination_enabled
                && round_sim.mean >= config.early_termination_threshold
            {
                info!(
                    round = round_no,
                    similarity = round_sim.mean,
                    "early termination threshold reached"
                );
                return Ok(self.conclude_consensus(
                    &request, thread, &config, &active, &latest, &round_sim, round_no, started,
                ));
            }
            if round_sim.mean >= config.agreement_threshold {
                info!(
                    round = round_no,
                    similarity = round_sim.mean,
                    "agreement threshold reached"
                );
                return Ok(self.conclude_consensus(
                    &request, thread, &config, &active, &latest, &round_sim, round_no, started,
                ));
            }
            if is_deadlocked(history.as_slice()) {
                let trend = analyze_trend(history.as_slice(), config.agreement_threshold);
                debug!(
                    round = round_no,
                    risk = %trend.deadlock_risk,
                    velocity = trend.velocity,
                    recommendation = trend.recommendation,
                    "deadlock detected"
                );
                // Escalation never shortens the loop; negotiation continues
                // to max_rounds regardless.
                if config.human_escalation_enabled && !escalated {
                    escalated = true;
                    self.escalation.queue_escalation(
                        &request.id,
                        &format!(
                            "negotiation deadlocked after {} rounds ({})",
                            round_no, trend.recommendation
                        ),
                    );
                }
            }
        }

        let reason = if insufficient {
            FallbackReason::InsufficientActiveMembers
        } else if is_deadlocked(history.as_slice()) {
            FallbackReason::DeadlockDetected
        } else {
            FallbackReason::MaxRoundsReached
        };
        self.conclude_fallback(&request, thread, &config, reason, executed, started)
    }

    /// Issue every planned call concurrently; the round completes only once
    /// all calls have settled. A task that dies before settling counts as a
    /// failure for its member.
    async fn dispatch_parallel(
        &self,
        planned: Vec<PlannedCall>,
        per_round_timeout: Duration,
    ) -> Vec<SettledCall> {
        let roster: Vec<(CouncilMember, Vec<String>)> = planned
            .iter()
            .map(|(member, _, references)| (member.clone(), references.clone()))
            .collect();

        let mut join_set = JoinSet::new();
        for (member, prompt, references) in planned {
            let gateway = Arc::clone(&self.gateway);
            join_set.spawn(async move {
                let effective = member.timeout.min(per_round_timeout);
                let outcome =
                    match tokio::time::timeout(effective, gateway.send_request(&member, &prompt))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::timeout(effective)),
                    };
                (member, references, outcome)
            });
        }

        let mut settled = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(result) => settled.push(result),
                Err(error) => warn!("dispatch task join error: {}", error),
            }
        }
        for (member, references) in roster {
            if !settled.iter().any(|(m, _, _)| m.id == member.id) {
                warn!(member = %member.id, "dispatch task aborted before settling");
                settled.push((
                    member,
                    references,
                    Err(ProviderError::new(
                        ProviderErrorCode::Unknown,
                        "dispatch task aborted",
                        false,
                    )),
                ));
            }
        }
        settled
    }

    /// Call members one at a time in seeded-shuffle order; a failure does
    /// not block the members after it.
    async fn dispatch_sequential(
        &self,
        mut planned: Vec<PlannedCall>,
        config: &IterativeConsensusConfig,
    ) -> Vec<SettledCall> {
        let mut rng = match config.randomization_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        planned.shuffle(&mut rng);

        let mut settled = Vec::with_capacity(planned.len());
        for (member, prompt, references) in planned {
            let effective = member.timeout.min(config.per_round_timeout);
            let outcome = match tokio::time::timeout(
                effective,
                self.gateway.send_request(&member, &prompt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::timeout(effective)),
            };
            settled.push((member, references, outcome));
        }
        settled
    }

    /// Mean pairwise similarity over the active members' latest answers
    ///
    /// One active member is trivially in full agreement. Any pair failure
    /// freezes the round at the previous value rather than corrupting the
    /// trend with a transient error.
    async fn round_similarity(
        &self,
        active: &BTreeSet<String>,
        latest: &BTreeMap<String, String>,
        config: &IterativeConsensusConfig,
        previous: Option<f64>,
    ) -> RoundSimilarity {
        let contents: Vec<(&str, &str)> = active
            .iter()
            .filter_map(|id| latest.get(id).map(|c| (id.as_str(), c.as_str())))
            .collect();
        let n = contents.len();

        if n == 0 {
            return RoundSimilarity {
                mean: previous.unwrap_or(0.0),
                centrality: BTreeMap::new(),
            };
        }
        if n == 1 {
            let mut centrality = BTreeMap::new();
            centrality.insert(contents[0].0.to_string(), 1.0);
            return RoundSimilarity {
                mean: 1.0,
                centrality,
            };
        }

        let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                match self
                    .similarity
                    .calculate_text_similarity(
                        contents[i].1,
                        contents[j].1,
                        Some(&config.embedding_model),
                    )
                    .await
                {
                    Ok(score) => {
                        let score = score.clamp(0.0, 1.0);
                        total += score;
                        *sums.entry(contents[i].0).or_insert(0.0) += score;
                        *sums.entry(contents[j].0).or_insert(0.0) += score;
                    }
                    Err(error) => {
                        warn!(
                            error = %error,
                            "similarity computation failed; freezing round at previous value"
                        );
                        return RoundSimilarity {
                            mean: previous.unwrap_or(0.0),
                            centrality: BTreeMap::new(),
                        };
                    }
                }
            }
        }

        let pairs = (n * (n - 1) / 2) as f64;
        RoundSimilarity {
            mean: total / pairs,
            centrality: sums
                .into_iter()
                .map(|(id, sum)| (id.to_string(), sum / (n - 1) as f64))
                .collect(),
        }
    }

    /// Assemble the consensus decision from the terminal round
    #[allow(clippy::too_many_arguments)]
    fn conclude_consensus(
        &self,
        request: &UserRequest,
        mut thread: DeliberationThread,
        config: &IterativeConsensusConfig,
        active: &BTreeSet<String>,
        latest: &BTreeMap<String, String>,
        round_sim: &RoundSimilarity,
        total_rounds: usize,
        started: Instant,
    ) -> NegotiationOutcome {
        let candidates: Vec<ResponseCandidate> = active
            .iter()
            .filter_map(|id| {
                latest.get(id).map(|content| {
                    ResponseCandidate::new(
                        id.clone(),
                        content.clone(),
                        round_sim.centrality.get(id).copied().unwrap_or(0.0),
                    )
                })
            })
            .collect();
        let content =
            extract_representative(&candidates, config.fallback_strategy).unwrap_or_default();

        let decision = ConsensusDecision::consensus(
            content,
            round_sim.mean,
            config.fallback_strategy,
            active.iter().cloned().collect(),
            total_rounds,
        );
        thread.set_total_duration(started.elapsed());
        self.events.log_decision(&request.id, &decision);
        info!(
            request_id = %request.id,
            rounds = total_rounds,
            agreement = round_sim.mean,
            confidence = %decision.confidence,
            "negotiation concluded with consensus"
        );
        NegotiationOutcome { decision, thread }
    }

    /// Delegate to offline synthesis; its failure is the one fatal path
    fn conclude_fallback(
        &self,
        request: &UserRequest,
        mut thread: DeliberationThread,
        config: &IterativeConsensusConfig,
        reason: FallbackReason,
        total_rounds: usize,
        started: Instant,
    ) -> Result<NegotiationOutcome, NegotiateError> {
        warn!(
            request_id = %request.id,
            reason = %reason,
            rounds = total_rounds,
            "negotiation falling back to offline synthesis"
        );
        let outcome = self.fallback.synthesize(&thread, config)?;
        let decision = ConsensusDecision::fallback(
            outcome.content,
            outcome.agreement_level,
            config.fallback_strategy,
            outcome.contributing_members,
            total_rounds,
            reason,
        );
        thread.set_total_duration(started.elapsed());
        self.events.log_decision(&request.id, &decision);
        Ok(NegotiationOutcome { decision, thread })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::escalation::EscalationService;
    use crate::ports::example_source::ExampleSourceError;
    use crate::ports::fallback::FallbackOutcome;
    use crate::ports::prompt_builder::PromptError;
    use crate::ports::similarity::SimilarityError;
    use async_trait::async_trait;
    use council_domain::TokenUsage;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -- Mock ports ----------------------------------------------------------

    /// Gateway that answers "<member> answer r<call_index>" and fails the
    /// configured members on every call.
    struct MockGateway {
        calls: AtomicUsize,
        order: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                order: Mutex::new(Vec::new()),
                failing: HashSet::new(),
            }
        }

        fn failing(members: &[&str]) -> Self {
            let mut gateway = Self::new();
            gateway.failing = members.iter().map(|m| m.to_string()).collect();
            gateway
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn call_order(&self) -> Vec<String> {
            self.order.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderGateway for MockGateway {
        async fn send_request(
            &self,
            member: &CouncilMember,
            _prompt: &str,
        ) -> Result<ProviderReply, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(member.id.clone());
            if self.failing.contains(&member.id) {
                return Err(ProviderError::unavailable("scripted failure"));
            }
            Ok(ProviderReply::new(
                format!("{} answer r{}", member.id, call),
                TokenUsage::new(25, 40),
                Duration::from_millis(3),
            ))
        }
    }

    /// Measurer that pops one value per pair comparison and repeats the last
    /// value once the script runs out.
    struct StepMeasurer {
        values: Mutex<Vec<f64>>,
        cursor: AtomicUsize,
    }

    impl StepMeasurer {
        fn new(values: Vec<f64>) -> Self {
            assert!(!values.is_empty());
            Self {
                values: Mutex::new(values),
                cursor: AtomicUsize::new(0),
            }
        }

        /// Same value for every pair of every round
        fn constant(value: f64) -> Self {
            Self::new(vec![value])
        }
    }

    #[async_trait]
    impl SimilarityMeasurer for StepMeasurer {
        async fn calculate_text_similarity(
            &self,
            _text1: &str,
            _text2: &str,
            _model: Option<&str>,
        ) -> Result<f64, SimilarityError> {
            let values = self.values.lock().unwrap();
            let cursor = self.cursor.fetch_add(1, Ordering::SeqCst);
            Ok(values[cursor.min(values.len() - 1)])
        }
    }

    struct FailingMeasurer;

    #[async_trait]
    impl SimilarityMeasurer for FailingMeasurer {
        async fn calculate_text_similarity(
            &self,
            _text1: &str,
            _text2: &str,
            _model: Option<&str>,
        ) -> Result<f64, SimilarityError> {
            Err(SimilarityError::Upstream("embedding service down".into()))
        }
    }

    struct MockPromptBuilder;

    impl PromptBuilder for MockPromptBuilder {
        fn build(
            &self,
            _prior: &[Exchange],
            _own_previous: Option<&str>,
            _examples: &[council_domain::NegotiationExample],
            query: &str,
        ) -> Result<String, PromptError> {
            Ok(format!("reconsider: {}", query))
        }
    }

    struct FailingPromptBuilder;

    impl PromptBuilder for FailingPromptBuilder {
        fn build(
            &self,
            _prior: &[Exchange],
            _own_previous: Option<&str>,
            _examples: &[council_domain::NegotiationExample],
            _query: &str,
        ) -> Result<String, PromptError> {
            Err(PromptError::Assembly("template missing".into()))
        }
    }

    struct MockFallback;

    impl FallbackSynthesizer for MockFallback {
        fn synthesize(
            &self,
            thread: &DeliberationThread,
            _config: &IterativeConsensusConfig,
        ) -> Result<FallbackOutcome, FallbackError> {
            Ok(FallbackOutcome {
                content: "FALLBACK".to_string(),
                contributing_members: thread
                    .latest_content_per_member()
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect(),
                agreement_level: 0.5,
            })
        }
    }

    struct FailingFallback;

    impl FallbackSynthesizer for FailingFallback {
        fn synthesize(
            &self,
            _thread: &DeliberationThread,
            _config: &IterativeConsensusConfig,
        ) -> Result<FallbackOutcome, FallbackError> {
            Err(FallbackError::Synthesis("strategy exploded".into()))
        }
    }

    #[derive(Default)]
    struct RecordingEscalation {
        tickets: Mutex<Vec<(String, String)>>,
    }

    impl EscalationService for RecordingEscalation {
        fn queue_escalation(&self, request_id: &str, reason: &str) {
            self.tickets
                .lock()
                .unwrap()
                .push((request_id.to_string(), reason.to_string()));
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        rounds: Mutex<Vec<usize>>,
        decisions: Mutex<Vec<ConsensusDecision>>,
    }

    impl EventSink for RecordingSink {
        fn log_round(&self, _request_id: &str, round: &council_domain::Round) {
            self.rounds.lock().unwrap().push(round.round_number);
        }
        fn log_decision(&self, _request_id: &str, decision: &ConsensusDecision) {
            self.decisions.lock().unwrap().push(decision.clone());
        }
    }

    struct FlakyExamples;

    #[async_trait]
    impl ExampleSource for FlakyExamples {
        async fn relevant_examples(
            &self,
            _query: &str,
            _count: usize,
        ) -> Result<Vec<council_domain::NegotiationExample>, ExampleSourceError> {
            Err(ExampleSourceError::Retrieval("corpus offline".into()))
        }
    }

    // -- Helpers -------------------------------------------------------------

    fn members(n: usize) -> Vec<CouncilMember> {
        (1..=n)
            .map(|i| CouncilMember::new(format!("m{}", i), "mock", "mock-model-1"))
            .collect()
    }

    fn initial_thread(members: &[CouncilMember]) -> DeliberationThread {
        DeliberationThread::with_initial_round(
            members
                .iter()
                .map(|m| Exchange::new(m.id.clone(), format!("{} initial position", m.id)))
                .collect(),
        )
    }

    fn use_case(
        gateway: Arc<MockGateway>,
        measurer: Arc<dyn SimilarityMeasurer>,
    ) -> NegotiateUseCase {
        NegotiateUseCase::new(
            gateway,
            measurer,
            Arc::new(MockPromptBuilder),
            Arc::new(MockFallback),
        )
    }

    fn input(
        members: Vec<CouncilMember>,
        config: IterativeConsensusConfig,
    ) -> NegotiationInput {
        let thread = initial_thread(&members);
        NegotiationInput::new(
            UserRequest::new("req-1", "What storage engine should we use?"),
            thread,
            members,
            config,
        )
    }

    // -- Tests ---------------------------------------------------------------

    #[tokio::test]
    async fn consensus_at_round_zero_makes_no_provider_calls() {
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.9)));

        let outcome = uc.synthesize(input(members(3), IterativeConsensusConfig::default()))
            .await
            .unwrap();

        assert!(outcome.decision.metadata.consensus_achieved);
        assert!(!outcome.decision.metadata.fallback_used);
        assert_eq!(outcome.decision.metadata.total_rounds, 0);
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(outcome.thread.len(), 1);
    }

    #[tokio::test]
    async fn converging_council_reaches_consensus_within_budget() {
        // 3 members at 0.75, converging 0.06/round against a 0.85 threshold:
        // 3 pairs per round, so three values per round step.
        let mut values = Vec::new();
        for v in [0.75, 0.81, 0.87] {
            values.extend([v; 3]);
        }
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::new(values)));

        let config = IterativeConsensusConfig::default()
            .with_agreement_threshold(0.85)
            .with_max_rounds(5);
        let outcome = uc.synthesize(input(members(3), config)).await.unwrap();

        assert!(outcome.decision.metadata.consensus_achieved);
        assert_eq!(outcome.decision.metadata.total_rounds, 2);
        assert!(outcome.decision.metadata.total_rounds <= 5);
        assert!((outcome.decision.agreement_level - 0.87).abs() < 1e-9);
        assert_eq!(outcome.decision.confidence, council_domain::Confidence::Medium);
        // 2 negotiation rounds x 3 members
        assert_eq!(gateway.call_count(), 6);
    }

    #[tokio::test]
    async fn frozen_similarity_exhausts_rounds_and_falls_back() {
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.6)));

        let config = IterativeConsensusConfig::default().with_max_rounds(2);
        let outcome = uc.synthesize(input(members(3), config)).await.unwrap();

        assert!(!outcome.decision.metadata.consensus_achieved);
        assert!(outcome.decision.metadata.fallback_used);
        assert_eq!(outcome.decision.content, "FALLBACK");
        assert_eq!(outcome.decision.metadata.total_rounds, 2);
        // History [0.6, 0.6, 0.6] is flat: deadlock holds at exit.
        assert_eq!(
            outcome.decision.metadata.fallback_reason,
            Some(FallbackReason::DeadlockDetected)
        );
    }

    #[tokio::test]
    async fn slow_progress_without_deadlock_reports_max_rounds() {
        // Rising >0.01 per round defeats the deadlock check but stays below
        // the threshold until the budget runs out.
        let mut values = Vec::new();
        for v in [0.50, 0.55, 0.62] {
            values.extend([v; 3]);
        }
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::new(values)));

        let config = IterativeConsensusConfig::default().with_max_rounds(2);
        let outcome = uc.synthesize(input(members(3), config)).await.unwrap();

        assert!(outcome.decision.metadata.fallback_used);
        assert_eq!(
            outcome.decision.metadata.fallback_reason,
            Some(FallbackReason::MaxRoundsReached)
        );
        assert_eq!(outcome.decision.metadata.total_rounds, 2);
    }

    #[tokio::test]
    async fn early_termination_stops_before_max_rounds() {
        let mut values = vec![0.5; 3];
        values.extend([0.92; 3]);
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::new(values)));

        let config = IterativeConsensusConfig::default()
            .with_agreement_threshold(0.95)
            .with_early_termination(true, 0.9)
            .with_max_rounds(5);
        let outcome = uc.synthesize(input(members(3), config)).await.unwrap();

        assert!(outcome.decision.metadata.consensus_achieved);
        assert_eq!(outcome.decision.metadata.total_rounds, 1);
        assert!(outcome.decision.metadata.total_rounds < 5);
        assert!(outcome.decision.confidence.is_high());
    }

    #[tokio::test]
    async fn failing_member_is_dropped_but_survivors_reach_consensus() {
        // Round 0: 3 members, 3 pairs at 0.5. Round 1: m3 fails, leaving one
        // pair at 0.9.
        let values = vec![0.5, 0.5, 0.5, 0.9];
        let gateway = Arc::new(MockGateway::failing(&["m3"]));
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::new(values)));

        let outcome = uc
            .synthesize(input(members(3), IterativeConsensusConfig::default()))
            .await
            .unwrap();

        assert!(outcome.decision.metadata.consensus_achieved);
        assert_eq!(outcome.decision.metadata.total_rounds, 1);
        assert_eq!(
            outcome.decision.contributing_members,
            vec!["m1".to_string(), "m2".to_string()]
        );
    }

    #[tokio::test]
    async fn council_collapsing_below_two_members_falls_back() {
        let gateway = Arc::new(MockGateway::failing(&["m2", "m3"]));
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.4)));

        let outcome = uc
            .synthesize(input(members(3), IterativeConsensusConfig::default()))
            .await
            .unwrap();

        assert!(outcome.decision.metadata.fallback_used);
        assert_eq!(
            outcome.decision.metadata.fallback_reason,
            Some(FallbackReason::InsufficientActiveMembers)
        );
        assert_eq!(outcome.decision.metadata.total_rounds, 1);
        // Dropped members keep their last content for synthesis.
        assert_eq!(outcome.decision.contributing_members.len(), 3);
    }

    #[tokio::test]
    async fn single_member_round_zero_falls_back_immediately() {
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.9)));

        let outcome = uc
            .synthesize(input(members(1), IterativeConsensusConfig::default()))
            .await
            .unwrap();

        assert!(outcome.decision.metadata.fallback_used);
        assert_eq!(
            outcome.decision.metadata.fallback_reason,
            Some(FallbackReason::InsufficientActiveMembers)
        );
        assert_eq!(outcome.decision.metadata.total_rounds, 0);
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn round_numbers_stay_contiguous() {
        let mut values = Vec::new();
        for v in [0.50, 0.55, 0.62, 0.70] {
            values.extend([v; 3]);
        }
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::new(values)));

        let config = IterativeConsensusConfig::default().with_max_rounds(3);
        let outcome = uc.synthesize(input(members(3), config)).await.unwrap();

        for (i, round) in outcome.thread.rounds().iter().enumerate() {
            assert_eq!(round.round_number, i);
        }
        assert_eq!(outcome.thread.len(), 4);
    }

    #[tokio::test]
    async fn similarity_failure_freezes_round_and_still_decides() {
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(FailingMeasurer));

        let config = IterativeConsensusConfig::default().with_max_rounds(2);
        let outcome = uc.synthesize(input(members(3), config)).await.unwrap();

        // Round 0 freezes at 0.0, later rounds freeze at the prior value;
        // the call still produces a decision through fallback.
        assert!(outcome.decision.metadata.fallback_used);
        assert_eq!(outcome.decision.content, "FALLBACK");
        assert_eq!(outcome.decision.metadata.total_rounds, 2);
    }

    #[tokio::test]
    async fn prompt_failure_skips_calls_without_dropping_members() {
        let gateway = Arc::new(MockGateway::new());
        let uc = NegotiateUseCase::new(
            gateway.clone(),
            Arc::new(StepMeasurer::constant(0.6)),
            Arc::new(FailingPromptBuilder),
            Arc::new(MockFallback),
        );

        let config = IterativeConsensusConfig::default().with_max_rounds(2);
        let outcome = uc.synthesize(input(members(3), config)).await.unwrap();

        // No prompts could be built, so no provider calls were made, yet the
        // council stayed intact and the loop ran to fallback.
        assert_eq!(gateway.call_count(), 0);
        assert!(outcome.decision.metadata.fallback_used);
        assert_eq!(outcome.decision.contributing_members.len(), 3);
    }

    #[tokio::test]
    async fn example_source_failure_is_non_fatal() {
        let mut values = vec![0.5; 3];
        values.extend([0.9; 3]);
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::new(values)))
            .with_example_source(Arc::new(FlakyExamples));

        let outcome = uc
            .synthesize(input(members(3), IterativeConsensusConfig::default()))
            .await
            .unwrap();
        assert!(outcome.decision.metadata.consensus_achieved);
    }

    #[tokio::test]
    async fn deadlock_queues_escalation_once_and_keeps_negotiating() {
        let escalation = Arc::new(RecordingEscalation::default());
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.6)))
            .with_escalation_service(escalation.clone());

        let config = IterativeConsensusConfig::default()
            .with_max_rounds(4)
            .with_human_escalation(true);
        let outcome = uc.synthesize(input(members(3), config)).await.unwrap();

        // Deadlock confirmed from round 2 on, but the loop still ran to the
        // round budget.
        assert_eq!(outcome.decision.metadata.total_rounds, 4);
        let tickets = escalation.tickets.lock().unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].0, "req-1");
        assert!(tickets[0].1.contains("deadlocked"));
    }

    #[tokio::test]
    async fn sequential_mode_with_seed_is_reproducible() {
        let mut orders = Vec::new();
        for _ in 0..2 {
            let gateway = Arc::new(MockGateway::new());
            let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.6)));
            let config = IterativeConsensusConfig::default()
                .with_negotiation_mode(NegotiationMode::Sequential)
                .with_randomization_seed(42)
                .with_max_rounds(2);
            uc.synthesize(input(members(3), config)).await.unwrap();
            orders.push(gateway.call_order());
        }
        assert_eq!(orders[0], orders[1]);
        assert_eq!(orders[0].len(), 6);
    }

    #[tokio::test]
    async fn events_record_every_round_and_the_decision() {
        let sink = Arc::new(RecordingSink::default());
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.6)))
            .with_event_sink(sink.clone());

        let config = IterativeConsensusConfig::default().with_max_rounds(2);
        uc.synthesize(input(members(3), config)).await.unwrap();

        assert_eq!(*sink.rounds.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(sink.decisions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_initial_round_is_rejected() {
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.9)));

        let council = members(3);
        let negotiation = NegotiationInput::new(
            UserRequest::new("req-1", "q"),
            DeliberationThread::new(),
            council,
            IterativeConsensusConfig::default(),
        );
        let error = uc.synthesize(negotiation).await.unwrap_err();
        assert!(matches!(error, NegotiateError::MissingInitialRound));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let gateway = Arc::new(MockGateway::new());
        let uc = use_case(gateway.clone(), Arc::new(StepMeasurer::constant(0.9)));

        let config = IterativeConsensusConfig::default().with_agreement_threshold(1.5);
        let error = uc.synthesize(input(members(3), config)).await.unwrap_err();
        assert!(matches!(error, NegotiateError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn fallback_failure_is_fatal() {
        let gateway = Arc::new(MockGateway::new());
        let uc = NegotiateUseCase::new(
            gateway.clone(),
            Arc::new(StepMeasurer::constant(0.4)),
            Arc::new(MockPromptBuilder),
            Arc::new(FailingFallback),
        );

        let config = IterativeConsensusConfig::default().with_max_rounds(1);
        let error = uc.synthesize(input(members(3), config)).await.unwrap_err();
        assert!(matches!(error, NegotiateError::FallbackFailed(_)));
    }

    #[tokio::test]
    async fn member_timeout_counts_as_failure() {
        /// Gateway whose configured member never answers.
        struct StallingGateway {
            stalling: String,
        }

        #[async_trait]
        impl ProviderGateway for StallingGateway {
            async fn send_request(
                &self,
                member: &CouncilMember,
                _prompt: &str,
            ) -> Result<ProviderReply, ProviderError> {
                if member.id == self.stalling {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(ProviderReply::new(
                    format!("{} quick answer", member.id),
                    TokenUsage::new(5, 5),
                    Duration::from_millis(1),
                ))
            }
        }

        let gateway = Arc::new(StallingGateway {
            stalling: "m3".to_string(),
        });
        let values = vec![0.5, 0.5, 0.5, 0.9];
        let uc = NegotiateUseCase::new(
            gateway,
            Arc::new(StepMeasurer::new(values)),
            Arc::new(MockPromptBuilder),
            Arc::new(MockFallback),
        );

        let council: Vec<CouncilMember> = members(3)
            .into_iter()
            .map(|m| m.with_timeout(Duration::from_millis(50)))
            .collect();
        let thread = initial_thread(&council);
        let negotiation = NegotiationInput::new(
            UserRequest::new("req-1", "q"),
            thread,
            council,
            IterativeConsensusConfig::default(),
        );

        let outcome = uc.synthesize(negotiation).await.unwrap();
        assert!(outcome.decision.metadata.consensus_achieved);
        assert_eq!(
            outcome.decision.contributing_members,
            vec!["m1".to_string(), "m2".to_string()]
        );
    }
}
