//! Core domain types and the JSON wire contract for ServiceFunnel.

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use uuid::Uuid;

/// Message returned alongside the service id once every question is answered.
pub const COMPLETE_MESSAGE: &str = "All questions answered.";

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one client-side conversation (time-sortable).
///
/// Used only for log correlation; the server is stateless and never sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Service records
// ---------------------------------------------------------------------------

/// One (question, answer) step of a funnel. Both halves are trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelPair {
    pub question: String,
    pub answer: String,
}

/// The ordered question/answer path leading to a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Funnel(pub Vec<FunnelPair>);

impl Funnel {
    pub fn pairs(&self) -> &[FunnelPair] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Answers in funnel order.
    pub fn answers(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|p| p.answer.as_str())
    }
}

impl std::fmt::Display for Funnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, pair) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{} > {}", pair.question, pair.answer)?;
        }
        Ok(())
    }
}

/// One row of the service dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub category_id: String,
    pub service_id: String,
    pub funnel: Funnel,
}

// ---------------------------------------------------------------------------
// Matcher results
// ---------------------------------------------------------------------------

/// A question to put to the user and the answers they may pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub question: String,
    pub options: Vec<String>,
}

/// Outcome of advancing a funnel by one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// More questions remain.
    Question(FunnelStep),
    /// The answers identify exactly this service.
    Complete { service_id: String },
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `POST /start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(deserialize_with = "scalar_string")]
    pub category_id: String,
}

/// Body of `POST /answer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    #[serde(deserialize_with = "scalar_string")]
    pub category_id: String,
    #[serde(default)]
    pub answers: Vec<String>,
}

/// Successful response of `POST /start` and `POST /answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepReply {
    Question {
        question: String,
        options: Vec<String>,
    },
    Complete {
        message: String,
        #[serde(rename = "serviceId", deserialize_with = "scalar_string")]
        service_id: String,
    },
}

impl StepReply {
    /// The terminal reply for a completed funnel.
    pub fn complete(service_id: impl Into<String>) -> Self {
        Self::Complete {
            message: COMPLETE_MESSAGE.to_string(),
            service_id: service_id.into(),
        }
    }
}

impl From<FunnelStep> for StepReply {
    fn from(step: FunnelStep) -> Self {
        Self::Question {
            question: step.question,
            options: step.options,
        }
    }
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Accept either a JSON string or number and normalise it to a string.
///
/// Spreadsheet ids and browser form values arrive as either.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s.trim().to_string()),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Ok(u.to_string())
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Ok(format!("{f:.0}")),
                    _ => Ok(n.to_string()),
                }
            }
        }
        other => Err(D::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}
