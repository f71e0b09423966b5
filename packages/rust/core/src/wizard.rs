//! Conversation wizard: the client-side state machine that walks a user
//! through the funnel and then the contact form.
//!
//! ```text
//! Idle → AwaitingCategory → InFunnel(i) → CollectingContact(0..4) → ShowingSummary → Closed
//! ```
//!
//! Each action makes exactly one transition. Funnel actions make one backend
//! request; if it fails the wizard is left exactly as it was.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use servicefunnel_shared::{Result, ServiceFunnelError, SessionId, StepReply};
use tracing::{info, instrument, warn};

use crate::service::FunnelBackend;

// ---------------------------------------------------------------------------
// Contact fields
// ---------------------------------------------------------------------------

/// Identifies one contact detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContactKey {
    ZipCode,
    Name,
    Email,
    Address,
    PhoneNumber,
}

/// How one contact field is labelled and asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactField {
    pub key: ContactKey,
    pub label: &'static str,
    pub prompt: &'static str,
    pub placeholder: &'static str,
}

/// The contact form, asked in this order once a service is matched.
pub static CONTACT_FIELDS: [ContactField; 5] = [
    ContactField {
        key: ContactKey::ZipCode,
        label: "Zip Code",
        prompt: "What is your Zip Code?",
        placeholder: "Enter your ZIP code",
    },
    ContactField {
        key: ContactKey::Name,
        label: "Name",
        prompt: "What is your Name?",
        placeholder: "Enter your Name",
    },
    ContactField {
        key: ContactKey::Email,
        label: "Email",
        prompt: "What is your Email?",
        placeholder: "Enter your Email",
    },
    ContactField {
        key: ContactKey::Address,
        label: "Address",
        prompt: "What is your Address?",
        placeholder: "Enter your Address",
    },
    ContactField {
        key: ContactKey::PhoneNumber,
        label: "Phone Number",
        prompt: "What is your Phone Number?",
        placeholder: "Enter your Phone Number",
    },
];

/// Contact details as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub zip_code: String,
    pub name: String,
    pub email: String,
    pub address: String,
    pub phone_number: String,
}

impl ContactDetails {
    pub fn get(&self, key: ContactKey) -> &str {
        match key {
            ContactKey::ZipCode => &self.zip_code,
            ContactKey::Name => &self.name,
            ContactKey::Email => &self.email,
            ContactKey::Address => &self.address,
            ContactKey::PhoneNumber => &self.phone_number,
        }
    }

    fn set(&mut self, key: ContactKey, value: String) {
        let slot = match key {
            ContactKey::ZipCode => &mut self.zip_code,
            ContactKey::Name => &mut self.name,
            ContactKey::Email => &mut self.email,
            ContactKey::Address => &mut self.address,
            ContactKey::PhoneNumber => &mut self.phone_number,
        };
        *slot = value;
    }

    /// `(label, value)` rows in form order, for summaries.
    pub fn rows(&self) -> impl Iterator<Item = (&'static str, &str)> {
        CONTACT_FIELDS.iter().map(|f| (f.label, self.get(f.key)))
    }
}

/// What the user confirmed at the end of a conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub session_id: SessionId,
    pub category_id: String,
    pub service_id: String,
    pub details: ContactDetails,
    pub submitted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Bot,
    User,
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    fn bot(content: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Idle,
    AwaitingCategory,
    InFunnel { question_index: usize },
    CollectingContact { field_index: usize },
    ShowingSummary,
    Closed,
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingCategory => write!(f, "waiting for a category"),
            Self::InFunnel { question_index } => {
                write!(f, "on funnel question {}", question_index + 1)
            }
            Self::CollectingContact { field_index } => {
                write!(f, "asking for {}", CONTACT_FIELDS[*field_index].label)
            }
            Self::ShowingSummary => write!(f, "showing the summary"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One user's conversation.
#[derive(Debug, Clone)]
pub struct Wizard {
    session_id: SessionId,
    state: WizardState,
    category_id: String,
    answers: Vec<String>,
    options: Vec<String>,
    service_id: Option<String>,
    contact: ContactDetails,
    transcript: Vec<Message>,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            session_id: SessionId::new(),
            state: WizardState::Idle,
            category_id: String::new(),
            answers: Vec::new(),
            options: Vec::new(),
            service_id: None,
            contact: ContactDetails::default(),
            transcript: Vec::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    /// Answers given so far, in order.
    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Options offered for the current funnel question.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    pub fn contact(&self) -> &ContactDetails {
        &self.contact
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// The contact field currently being asked for.
    pub fn current_field(&self) -> Option<&'static ContactField> {
        match self.state {
            WizardState::CollectingContact { field_index } => CONTACT_FIELDS.get(field_index),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> ServiceFunnelError {
        ServiceFunnelError::InvalidTransition {
            action,
            state: self.state.to_string(),
        }
    }

    /// `Idle → AwaitingCategory`.
    pub fn open(&mut self) -> Result<()> {
        if self.state != WizardState::Idle {
            return Err(self.invalid("open the conversation"));
        }
        self.state = WizardState::AwaitingCategory;
        Ok(())
    }

    /// Fetch the first question for `category_id` and restart the conversation on it.
    #[instrument(skip_all, fields(session = %self.session_id, category_id = %category_id))]
    pub async fn start<B: FunnelBackend>(&mut self, backend: &B, category_id: &str) -> Result<()> {
        let category_id = category_id.trim();
        if category_id.is_empty() {
            return Err(ServiceFunnelError::validation("enter a category ID"));
        }

        let step = match backend.start(category_id).await {
            Ok(step) => step,
            Err(e) => {
                warn!(error = %e, "failed to start conversation");
                return Err(e);
            }
        };

        *self = Self {
            state: WizardState::InFunnel { question_index: 0 },
            category_id: category_id.to_string(),
            options: step.options,
            transcript: vec![Message::bot(step.question)],
            ..Self::new()
        };
        info!(session = %self.session_id, "conversation started");
        Ok(())
    }

    /// Answer the current funnel question with one of the offered options.
    #[instrument(skip_all, fields(session = %self.session_id, %option))]
    pub async fn choose<B: FunnelBackend>(&mut self, backend: &B, option: &str) -> Result<()> {
        let WizardState::InFunnel { question_index } = self.state else {
            return Err(self.invalid("choose an option"));
        };
        if !self.options.iter().any(|o| o == option) {
            return Err(ServiceFunnelError::validation(format!(
                "'{option}' is not one of the offered options"
            )));
        }

        let mut answers = self.answers.clone();
        answers.push(option.to_string());

        let reply = match backend.answer(&self.category_id, &answers).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "failed to send answer");
                return Err(e);
            }
        };

        self.answers = answers;
        self.transcript.push(Message::user(option));

        match reply {
            StepReply::Question { question, options } => {
                self.transcript.push(Message::bot(question));
                self.options = options;
                self.state = WizardState::InFunnel {
                    question_index: question_index + 1,
                };
            }
            StepReply::Complete { service_id, .. } => {
                info!(%service_id, "service matched, collecting contact details");
                self.service_id = Some(service_id);
                self.options.clear();
                self.transcript.push(Message::bot(CONTACT_FIELDS[0].prompt));
                self.state = WizardState::CollectingContact { field_index: 0 };
            }
        }
        Ok(())
    }

    /// Store the value for the current contact field and move to the next.
    pub fn submit_field(&mut self, value: &str) -> Result<()> {
        let WizardState::CollectingContact { field_index } = self.state else {
            return Err(self.invalid("submit a contact field"));
        };
        let field = CONTACT_FIELDS[field_index];

        let value = value.trim().to_string();
        self.transcript.push(Message::user(value.clone()));
        self.contact.set(field.key, value);

        self.state = match CONTACT_FIELDS.get(field_index + 1) {
            Some(next) => {
                self.transcript.push(Message::bot(next.prompt));
                WizardState::CollectingContact {
                    field_index: field_index + 1,
                }
            }
            None => WizardState::ShowingSummary,
        };
        Ok(())
    }

    /// Confirm the summary and close the conversation.
    pub fn confirm(&mut self) -> Result<ContactSubmission> {
        if self.state != WizardState::ShowingSummary {
            return Err(self.invalid("confirm the summary"));
        }
        let service_id = self
            .service_id
            .clone()
            .ok_or_else(|| self.invalid("confirm without a matched service"))?;

        let submission = ContactSubmission {
            session_id: self.session_id,
            category_id: self.category_id.clone(),
            service_id: service_id.clone(),
            details: self.contact.clone(),
            submitted_at: Utc::now(),
        };
        info!(
            session = %self.session_id,
            %service_id,
            details = %serde_json::to_string(&submission.details).unwrap_or_default(),
            "contact details submitted"
        );

        self.transcript.push(Message::bot(format!(
            "Thank you for providing the information. Your Service ID is {service_id}."
        )));
        self.state = WizardState::Closed;
        Ok(submission)
    }
}
