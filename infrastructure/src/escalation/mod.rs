//! Escalation queue
//!
//! Fire-and-forget handoff of deadlocked negotiations to a human review
//! pipeline. Queuing is a non-blocking unbounded send; a closed channel is
//! diagnosed and swallowed so escalation failure can never abort the
//! negotiation loop.

use council_application::ports::escalation::EscalationService;
use tokio::sync::mpsc;
use tracing::warn;

/// One queued request for human review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationTicket {
    pub request_id: String,
    pub reason: String,
    /// RFC 3339 UTC time the ticket was queued
    pub queued_at: String,
}

/// Escalation service backed by an unbounded channel
///
/// The host process owns the receiver and drains tickets into whatever
/// review pipeline it runs.
pub struct QueuedEscalationService {
    sender: mpsc::UnboundedSender<EscalationTicket>,
}

impl QueuedEscalationService {
    /// Create the service and the receiver that drains its tickets
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EscalationTicket>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EscalationService for QueuedEscalationService {
    fn queue_escalation(&self, request_id: &str, reason: &str) {
        let ticket = EscalationTicket {
            request_id: request_id.to_string(),
            reason: reason.to_string(),
            queued_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        if let Err(e) = self.sender.send(ticket) {
            warn!(request_id, "escalation queue closed; ticket dropped: {}", e);
        }
    }
}
