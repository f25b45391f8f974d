//! Scenario files for offline simulation
//!
//! A scenario TOML describes a council, the Round 0 answers, and the
//! scripted replies for each negotiation round. Replaying one through the
//! real negotiation loop with the lexical measurer exercises the whole
//! stack without any provider credentials.

use anyhow::{Context, Result, bail};
use council_domain::{CouncilMember, DeliberationThread, Exchange, UserRequest};
use council_infrastructure::ScriptedGateway;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

fn default_request_id() -> String {
    "simulated".to_string()
}

fn default_provider() -> String {
    "scripted".to_string()
}

fn default_model() -> String {
    "scripted-v1".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// One scripted deliberation
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_request_id")]
    pub request_id: String,
    pub query: String,
    pub members: Vec<ScenarioMember>,
    /// Round 0: the independent answers
    pub initial: Vec<ScenarioReply>,
    /// Scripted replies for rounds 1..; a member missing from a round
    /// exhausts its script there and drops out
    #[serde(default)]
    pub rounds: Vec<ScenarioRound>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioMember {
    pub id: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioRound {
    pub replies: Vec<ScenarioReply>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioReply {
    pub member: String,
    pub content: String,
}

impl Scenario {
    /// Load and validate a scenario file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read scenario file {}", path.display()))?;
        let scenario: Scenario = toml::from_str(&content)
            .with_context(|| format!("could not parse scenario file {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            bail!("scenario has no members");
        }
        if self.initial.is_empty() {
            bail!("scenario has no initial (round 0) replies");
        }
        let ids: HashSet<&str> = self.members.iter().map(|m| m.id.as_str()).collect();
        if ids.len() != self.members.len() {
            bail!("scenario has duplicate member ids");
        }
        for reply in self.initial.iter().chain(
            self.rounds
                .iter()
                .flat_map(|round| round.replies.iter()),
        ) {
            if !ids.contains(reply.member.as_str()) {
                bail!("scenario reply references unknown member '{}'", reply.member);
            }
        }
        Ok(())
    }

    pub fn request(&self) -> UserRequest {
        UserRequest::new(&self.request_id, &self.query)
    }

    pub fn council(&self) -> Vec<CouncilMember> {
        self.members
            .iter()
            .map(|m| {
                CouncilMember::new(&m.id, &m.provider, &m.model)
                    .with_timeout(Duration::from_millis(m.timeout_ms))
            })
            .collect()
    }

    /// The thread as it stands when deliberation begins: Round 0 only
    pub fn initial_thread(&self) -> DeliberationThread {
        DeliberationThread::with_initial_round(
            self.initial
                .iter()
                .map(|r| Exchange::new(&r.member, &r.content))
                .collect(),
        )
    }

    /// Gateway scripted with each member's replies in round order
    pub fn gateway(&self) -> ScriptedGateway {
        let mut gateway = ScriptedGateway::new();
        for member in &self.members {
            let replies: Vec<String> = self
                .rounds
                .iter()
                .flat_map(|round| {
                    round
                        .replies
                        .iter()
                        .filter(|r| r.member == member.id)
                        .map(|r| r.content.clone())
                })
                .collect();
            gateway = gateway.script(&member.id, replies);
        }
        gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        request_id = "sim-1"
        query = "Which database should we use?"

        [[members]]
        id = "claude"

        [[members]]
        id = "gpt"
        provider = "scripted"
        timeout_ms = 5000

        [[initial]]
        member = "claude"
        content = "Use Postgres for relational data."

        [[initial]]
        member = "gpt"
        content = "Use MySQL for relational data."

        [[rounds]]
        replies = [
            { member = "claude", content = "Use Postgres, MySQL also works." },
            { member = "gpt", content = "Use Postgres or MySQL, both work." },
        ]
    "#;

    #[test]
    fn test_parse_sample() {
        let scenario: Scenario = toml::from_str(SAMPLE).unwrap();
        scenario.validate().unwrap();

        assert_eq!(scenario.request_id, "sim-1");
        let council = scenario.council();
        assert_eq!(council.len(), 2);
        assert_eq!(council[0].provider, "scripted");
        assert_eq!(council[1].timeout, Duration::from_millis(5000));

        let thread = scenario.initial_thread();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread.rounds()[0].exchanges.len(), 2);

        let gateway = scenario.gateway();
        assert_eq!(gateway.remaining("claude"), 1);
        assert_eq!(gateway.remaining("gpt"), 1);
    }

    #[test]
    fn test_unknown_member_is_rejected() {
        let broken = SAMPLE.replace("member = \"gpt\"", "member = \"ghost\"");
        let scenario: Scenario = toml::from_str(&broken).unwrap();
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_missing_initial_fails_to_parse() {
        // `initial` has no default: a scenario without Round 0 is malformed.
        let result: std::result::Result<Scenario, _> = toml::from_str(
            r#"
            query = "q"
            [[members]]
            id = "a"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.query, "Which database should we use?");
    }
}
