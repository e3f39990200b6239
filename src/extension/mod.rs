//! In-process message handling for the browser extension: analysis requests
//! from content scripts, phishing reports and sender whitelisting.

pub mod adapter;
pub mod preferences;

pub use adapter::{adapter_for, MessageView, Provider, ProviderAdapter};
pub use preferences::{MemoryStore, PreferenceStore, Preferences};

use crate::heuristics::{self, AnalysisOutcome, EmailRecord, HeuristicEngine, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExtensionMessage {
    Analyze {
        email: EmailRecord,
        source: Provider,
    },
    Report {
        email: EmailRecord,
        #[serde(default, rename = "tabUrl")]
        tab_url: Option<String>,
    },
    Whitelist {
        sender: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Local,
    Backend,
}

/// Engine outcome as returned to a content script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalAnalysis {
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
    pub source: AnalysisSource,
    pub severity: Severity,
}

/// What gets logged for a user report. The body is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RouterResponse {
    Analysis(LocalAnalysis),
    Ack { success: bool },
    Error { error: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Privacy consent required. Show opt-in modal before reporting.")]
    ConsentRequired,
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Preference store error: {0}")]
    Store(String),
}

fn store_error(e: anyhow::Error) -> RouterError {
    RouterError::Store(format!("{:#}", e))
}

pub struct MessageRouter<S: PreferenceStore> {
    engine: &'static HeuristicEngine,
    store: S,
}

impl<S: PreferenceStore> MessageRouter<S> {
    pub fn new(store: S) -> Self {
        Self {
            engine: heuristics::engine(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Parses a raw JSON message and dispatches it. Failures come back as
    /// `{"error": ...}` rather than as an `Err`.
    pub fn handle_json(&mut self, raw: &str) -> RouterResponse {
        match serde_json::from_str::<ExtensionMessage>(raw) {
            Ok(message) => self.handle(message),
            Err(e) => RouterResponse::Error {
                error: RouterError::InvalidMessage(e.to_string()).to_string(),
            },
        }
    }

    pub fn handle(&mut self, message: ExtensionMessage) -> RouterResponse {
        let result = match message {
            ExtensionMessage::Analyze { email, source } => {
                log::debug!("Analyze request from {:?} content script", source);
                self.analyze(&email).map(RouterResponse::Analysis)
            }
            ExtensionMessage::Report { email, tab_url } => self
                .report(&email, tab_url)
                .map(|_| RouterResponse::Ack { success: true }),
            ExtensionMessage::Whitelist { sender } => self
                .whitelist(&sender)
                .map(|_| RouterResponse::Ack { success: true }),
        };

        result.unwrap_or_else(|e| {
            log::warn!("Extension message failed: {}", e);
            RouterResponse::Error {
                error: e.to_string(),
            }
        })
    }

    /// Analysis always runs locally; the cloud preference is consulted only to
    /// note that no backend path exists.
    pub fn analyze(&self, email: &EmailRecord) -> Result<LocalAnalysis, RouterError> {
        let preferences = self.store.load().map_err(store_error)?;
        if preferences.cloud_analysis_enabled {
            log::debug!("Cloud analysis enabled but unavailable, using local heuristics");
        }

        let outcome = self.engine.evaluate(email);
        let severity = outcome.severity();
        Ok(LocalAnalysis {
            outcome,
            source: AnalysisSource::Local,
            severity,
        })
    }

    /// Runs the provider adapter over a scraped view, then analyzes the result.
    /// `Ok(None)` means the view held no usable sender.
    pub fn analyze_view(
        &self,
        provider: Provider,
        view: &MessageView,
    ) -> Result<Option<LocalAnalysis>, RouterError> {
        let adapter = adapter_for(provider).ok_or_else(|| {
            RouterError::InvalidMessage(format!("No adapter for provider {:?}", provider))
        })?;
        match adapter.extract(view) {
            Some(email) => self.analyze(&email).map(Some),
            None => Ok(None),
        }
    }

    /// Records a user report. Refused outright without privacy consent, in which
    /// case nothing is logged and the report count is untouched.
    pub fn report(
        &mut self,
        email: &EmailRecord,
        tab_url: Option<String>,
    ) -> Result<ReportRecord, RouterError> {
        let mut preferences = self.store.load().map_err(store_error)?;
        if !preferences.privacy_consent {
            return Err(RouterError::ConsentRequired);
        }

        let report = ReportRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            from: email.from.clone(),
            subject: email.subject.clone(),
            tab_url,
        };
        match serde_json::to_string(&report) {
            Ok(json) => log::info!("Report: {}", json),
            Err(e) => log::warn!("Failed to serialize report {}: {}", report.id, e),
        }

        preferences.report_count += 1;
        self.store.save(&preferences).map_err(store_error)?;
        Ok(report)
    }

    /// Adds `sender` to the whitelist. Returns false if it was already there.
    pub fn whitelist(&mut self, sender: &str) -> Result<bool, RouterError> {
        let mut preferences = self.store.load().map_err(store_error)?;
        if preferences.is_whitelisted(sender) {
            return Ok(false);
        }
        preferences.whitelisted_senders.push(sender.to_string());
        self.store.save(&preferences).map_err(store_error)?;
        Ok(true)
    }
}
