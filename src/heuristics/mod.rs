pub mod display_name;
pub mod url_risk;
pub mod urgency;

use display_name::DisplayNameMatcher;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use urgency::UrgencyMatcher;
use url_risk::UrlRiskChecker;

/// Identifies the ruleset that produced an outcome.
pub const MODEL_NAME: &str = "heuristics-v1";

pub const SUSPICION_THRESHOLD: u32 = 35;
pub const MAX_SCORE: u32 = 100;

pub const DISPLAY_NAME_WEIGHT: u32 = 25;
pub const LINK_WEIGHT: u32 = 15;
pub const SUBJECT_KEYWORD_WEIGHT: u32 = 10;
pub const BODY_KEYWORD_WEIGHT: u32 = 5;

/// Structured email fields handed to the engine by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub subject: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl EmailRecord {
    pub fn new(from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            display_name: None,
            subject: subject.into(),
            links: Vec::new(),
            body: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_links<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.links = links.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A single reason produced by a checker together with the weight of its context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub reason: String,
    pub weight: u32,
}

impl Finding {
    pub fn new(reason: String, weight: u32) -> Self {
        Self { reason, weight }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub suspicious: bool,
    pub score: u32,
    pub reasons: Vec<String>,
    pub model: String,
}

impl AnalysisOutcome {
    pub fn severity(&self) -> Severity {
        Severity::from_score(self.score)
    }
}

/// Presentation tier of a score. Never feeds back into scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 65 => Severity::Critical,
            s if s >= SUSPICION_THRESHOLD => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Running total for one `evaluate` call. Each `charge` is one triggering context
/// (the display name, one link, the subject, the body): every reason is kept but
/// the context's weight is added only once.
#[derive(Debug, Default)]
struct Tally {
    score: u32,
    reasons: Vec<String>,
}

impl Tally {
    fn charge(&mut self, findings: Vec<Finding>) -> bool {
        let Some(weight) = findings.iter().map(|f| f.weight).max() else {
            return false;
        };
        self.score = self.score.saturating_add(weight);
        self.reasons.extend(findings.into_iter().map(|finding| finding.reason));
        true
    }

    fn finish(self) -> AnalysisOutcome {
        let score = self.score.min(MAX_SCORE);
        AnalysisOutcome {
            suspicious: score >= SUSPICION_THRESHOLD,
            score,
            reasons: self.reasons,
            model: MODEL_NAME.to_string(),
        }
    }
}

/// Runs the three checkers over an [`EmailRecord`] and folds their findings into
/// one [`AnalysisOutcome`]. Holds only compiled patterns, so one instance can be
/// shared freely between threads.
pub struct HeuristicEngine {
    display_name: DisplayNameMatcher,
    url_checker: UrlRiskChecker,
    urgency: UrgencyMatcher,
}

impl Default for HeuristicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicEngine {
    pub fn new() -> Self {
        Self {
            display_name: DisplayNameMatcher::new(),
            url_checker: UrlRiskChecker::new(),
            urgency: UrgencyMatcher::new(),
        }
    }

    pub fn urgency_matcher(&self) -> &UrgencyMatcher {
        &self.urgency
    }

    pub fn evaluate(&self, email: &EmailRecord) -> AnalysisOutcome {
        let mut tally = Tally::default();

        if let Some(finding) = self
            .display_name
            .check(email.display_name.as_deref(), &email.from)
        {
            tally.charge(vec![finding]);
        }

        for link in &email.links {
            if tally.charge(self.url_checker.check(link)) {
                log::debug!("Link charged as risky: {}", link);
            }
        }

        tally.charge(self.urgency.scan(&email.subject, SUBJECT_KEYWORD_WEIGHT));

        if let Some(body) = email.body.as_deref().filter(|b| !b.is_empty()) {
            tally.charge(self.urgency.scan(body, BODY_KEYWORD_WEIGHT));
        }

        let outcome = tally.finish();
        log::debug!(
            "Heuristic score {} ({} reasons) for sender {}",
            outcome.score,
            outcome.reasons.len(),
            email.from
        );
        outcome
    }
}

/// Process-wide engine built on first use.
pub fn engine() -> &'static HeuristicEngine {
    static ENGINE: OnceLock<HeuristicEngine> = OnceLock::new();
    ENGINE.get_or_init(HeuristicEngine::new)
}

/// Scores `email` with the shared engine.
pub fn evaluate(email: &EmailRecord) -> AnalysisOutcome {
    engine().evaluate(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_consistent(outcome: &AnalysisOutcome) {
        assert!(outcome.score <= MAX_SCORE);
        assert_eq!(outcome.suspicious, outcome.score >= SUSPICION_THRESHOLD);
        assert_eq!(outcome.model, MODEL_NAME);
    }

    #[test]
    fn test_legitimate_email_scores_zero() {
        let email = EmailRecord::new("john.doe@company.com", "Meeting notes from today")
            .with_display_name("John Doe")
            .with_links(["https://github.com/company/project"]);

        let outcome = evaluate(&email);

        assert!(!outcome.suspicious);
        assert_eq!(outcome.score, 0);
        assert!(outcome.reasons.is_empty());
        assert_consistent(&outcome);
    }

    #[test]
    fn test_brand_impersonation_with_ip_link() {
        let email = EmailRecord::new("phisher@evil.com", "Verify your account immediately")
            .with_display_name("Amazon Support")
            .with_links(["https://192.168.1.1/verify"]);

        let outcome = evaluate(&email);

        assert!(outcome.suspicious);
        assert_eq!(outcome.score, 50);
        assert_eq!(
            outcome.reasons,
            vec![
                "Display name \"Amazon Support\" doesn't match sender address \"phisher@evil.com\""
                    .to_string(),
                "URL uses IP address: https://192.168.1.1/verify".to_string(),
                "Account verification request".to_string(),
            ]
        );
        assert_consistent(&outcome);
    }

    #[test]
    fn test_multi_finding_link_is_charged_once() {
        let url = "https://evil.com@legitimate.com/path%2Fencoded";
        let email = EmailRecord::new("news@legitimate.com", "Weekly digest").with_links([url]);

        let outcome = evaluate(&email);

        assert_eq!(outcome.score, LINK_WEIGHT);
        assert!(!outcome.suspicious);
        assert_eq!(outcome.reasons.len(), 2);
        assert!(outcome.reasons[0].contains("@ symbol"));
        assert!(outcome.reasons[1].contains("encoded characters"));
    }

    #[test]
    fn test_subject_with_several_triggers_is_charged_once() {
        let email = EmailRecord::new(
            "alerts@bank.com",
            "Urgent action required: verify your account",
        );

        let outcome = evaluate(&email);

        assert_eq!(outcome.score, SUBJECT_KEYWORD_WEIGHT);
        assert_eq!(
            outcome.reasons,
            vec![
                "Account verification request".to_string(),
                "Urgency trigger detected".to_string(),
            ]
        );
    }

    #[test]
    fn test_invalid_link_is_one_charge_and_one_reason() {
        let email = EmailRecord::new("a@b.com", "Hello").with_links(["not a valid url!"]);

        let outcome = evaluate(&email);

        assert_eq!(outcome.score, LINK_WEIGHT);
        assert_eq!(
            outcome.reasons,
            vec!["Invalid URL format: not a valid url!".to_string()]
        );
    }

    #[test]
    fn test_each_risky_link_is_charged() {
        let email = EmailRecord::new("a@b.com", "Hello").with_links([
            "https://10.0.0.1/login",
            "https://example.com/fine",
            "::::",
        ]);

        let outcome = evaluate(&email);

        assert_eq!(outcome.score, 2 * LINK_WEIGHT);
        assert_eq!(outcome.reasons.len(), 2);
    }

    #[test]
    fn test_body_is_scanned_separately_from_subject() {
        let email = EmailRecord::new("it@company.com", "Please reset your password")
            .with_body("Your account has been locked after suspicious activity.");

        let outcome = evaluate(&email);

        assert_eq!(outcome.score, SUBJECT_KEYWORD_WEIGHT + BODY_KEYWORD_WEIGHT);
        assert_eq!(
            outcome.reasons,
            vec![
                "Password confirmation request".to_string(),
                "Account suspension threat".to_string(),
                "Security threat claim".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_body_contributes_nothing() {
        let email = EmailRecord::new("it@company.com", "Lunch").with_body("");
        assert_eq!(evaluate(&email).score, 0);
    }

    #[test]
    fn test_score_is_clamped() {
        let links: Vec<String> = (0..10).map(|i| format!("https://10.0.0.{i}/x")).collect();
        let email = EmailRecord::new("x@evil.com", "Act now to update payment")
            .with_display_name("PayPal Billing")
            .with_links(links)
            .with_body("Confirm your password");

        let outcome = evaluate(&email);

        assert_eq!(outcome.score, MAX_SCORE);
        assert!(outcome.suspicious);
        // 1 display name + 10 links + 2 subject + 1 body
        assert_eq!(outcome.reasons.len(), 14);
    }

    #[test]
    fn test_threshold_boundary() {
        // 25 + 10 = 35 lands exactly on the threshold
        let email = EmailRecord::new("x@evil.com", "Action required")
            .with_display_name("Microsoft");

        let outcome = evaluate(&email);

        assert_eq!(outcome.score, SUSPICION_THRESHOLD);
        assert!(outcome.suspicious);
    }

    #[test]
    fn test_display_name_casing_does_not_change_score() {
        let upper = EmailRecord::new("phisher@evil.com", "Hi").with_display_name("AMAZON SUPPORT");
        let lower = EmailRecord::new("phisher@evil.com", "Hi").with_display_name("amazon support");

        assert_eq!(evaluate(&upper).score, evaluate(&lower).score);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let email = EmailRecord::new("phisher@evil.com", "Your account suspended")
            .with_display_name("Bank")
            .with_links(["http://1.2.3.4/%41", "bogus"])
            .with_body("click here immediately");

        assert_eq!(evaluate(&email), evaluate(&email));
    }

    #[test]
    fn test_empty_required_fields_do_not_panic() {
        let email = EmailRecord::new("", "").with_display_name("Someone");
        let outcome = evaluate(&email);
        assert_eq!(outcome.score, 0);
        assert!(outcome.reasons.is_empty());
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::from_score(0), Severity::Info);
        assert_eq!(Severity::from_score(34), Severity::Info);
        assert_eq!(Severity::from_score(35), Severity::Warning);
        assert_eq!(Severity::from_score(64), Severity::Warning);
        assert_eq!(Severity::from_score(65), Severity::Critical);
        assert_eq!(Severity::from_score(100), Severity::Critical);
    }

    #[test]
    fn test_record_json_uses_camel_case() {
        let record: EmailRecord = serde_json::from_str(
            r#"{"from":"a@b.com","displayName":"A","subject":"S"}"#,
        )
        .unwrap();
        assert_eq!(record.display_name.as_deref(), Some("A"));
        assert!(record.links.is_empty());
        assert!(record.body.is_none());
    }
}
