use crate::heuristics::EmailRecord;
use crate::server::error::ApiError;
use serde::Deserialize;

pub const MISSING_FIELDS: &str = "Missing required fields: from, subject";

/// Empty strings count as missing.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub from: Option<String>,
    pub display_name: Option<String>,
    pub subject: Option<String>,
    pub links: Option<Vec<String>>,
    pub body: Option<String>,
}

impl AnalyzeRequest {
    pub fn into_record(self) -> Result<EmailRecord, ApiError> {
        let (Some(from), Some(subject)) = (required(self.from), required(self.subject)) else {
            return Err(ApiError::Validation(MISSING_FIELDS.to_string()));
        };

        Ok(EmailRecord {
            from,
            display_name: self.display_name,
            subject,
            links: self.links.unwrap_or_default(),
            body: self.body,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub from: Option<String>,
    pub subject: Option<String>,
    pub reason: Option<String>,
}

impl ReportRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        if present(&self.from) && present(&self.subject) {
            Ok(())
        } else {
            Err(ApiError::Validation(MISSING_FIELDS.to_string()))
        }
    }
}
