//! Contact leads captured by the inline form.
//!
//! Leads are handed to a [`LeadSink`]. The only sink shipped here records the
//! lead in the log; a durable store plugs in behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors that can occur while accepting a lead.
#[derive(Debug, Error)]
pub enum LeadError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Lead sink error: {0}")]
    Sink(String),
}

/// A submitted contact form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactLead {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The question that led to the form being offered.
    #[serde(
        default,
        alias = "query_context",
        alias = "user_query",
        alias = "question",
        skip_serializing_if = "Option::is_none"
    )]
    pub query_context: Option<String>,
}

impl ContactLead {
    /// Checks the fields the widget marks as required.
    pub fn validate(&self) -> Result<(), LeadError> {
        if self.name.trim().is_empty() {
            return Err(LeadError::Validation("name is required".into()));
        }
        let email = self.email.trim();
        if email.is_empty() {
            return Err(LeadError::Validation("email is required".into()));
        }
        if !email.contains('@') {
            return Err(LeadError::Validation(format!("invalid email: {email}")));
        }
        Ok(())
    }
}

/// Destination for accepted leads.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn submit(
        &self,
        lead: &ContactLead,
        received_at: DateTime<Utc>,
    ) -> Result<(), LeadError>;
}

/// Sink that records every lead through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLeadSink;

#[async_trait]
impl LeadSink for LogLeadSink {
    async fn submit(
        &self,
        lead: &ContactLead,
        received_at: DateTime<Utc>,
    ) -> Result<(), LeadError> {
        info!(
            name = %lead.name,
            email = %lead.email,
            phone = lead.phone.as_deref().unwrap_or(""),
            company = lead.company.as_deref().unwrap_or(""),
            message = lead.message.as_deref().unwrap_or(""),
            query_context = lead.query_context.as_deref().unwrap_or(""),
            received_at = %received_at.to_rfc3339(),
            "contact form submission"
        );
        Ok(())
    }
}
