//! UserRequest value object

use serde::{Deserialize, Serialize};

use super::current_timestamp;

/// A user query entering deliberation (Value Object)
///
/// Immutable once constructed. The timestamp records when the request was
/// accepted, in milliseconds since epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRequest {
    /// Unique request identifier
    pub id: String,
    /// The user's question
    pub query: String,
    /// Optional session this request belongs to (session storage is external)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Milliseconds since epoch
    pub timestamp: u64,
}

impl UserRequest {
    /// Create a new request
    ///
    /// # Panics
    /// Panics if the query is empty or only whitespace
    pub fn new(id: impl Into<String>, query: impl Into<String>) -> Self {
        let query = query.into();
        assert!(!query.trim().is_empty(), "Request query cannot be empty");
        Self {
            id: id.into(),
            query,
            session_id: None,
            timestamp: current_timestamp(),
        }
    }

    /// Try to create a new request, returning None if the query is invalid
    pub fn try_new(id: impl Into<String>, query: impl Into<String>) -> Option<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            None
        } else {
            Some(Self {
                id: id.into(),
                query,
                session_id: None,
                timestamp: current_timestamp(),
            })
        }
    }

    /// Attach a session identifier
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
