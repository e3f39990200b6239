use super::{Finding, LINK_WEIGHT};
use regex::Regex;
use url::Url;

const MAX_PATH_LENGTH: usize = 100;

/// Inspects a single link. Every finding carries [`LINK_WEIGHT`]; the engine
/// charges it once per link no matter how many checks fire.
pub struct UrlRiskChecker {
    ip_host_regex: Regex,
    encoded_byte_regex: Regex,
}

impl Default for UrlRiskChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlRiskChecker {
    pub fn new() -> Self {
        Self {
            ip_host_regex: Regex::new(r"^https?://[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+")
                .expect("IP host pattern is valid"),
            encoded_byte_regex: Regex::new(r"%[0-9A-Fa-f]{2}")
                .expect("percent-encoding pattern is valid"),
        }
    }

    pub fn check(&self, url: &str) -> Vec<Finding> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::debug!("Link failed to parse ({}): {}", e, url);
                return vec![self.finding(format!("Invalid URL format: {}", url))];
            }
        };

        let mut findings = Vec::new();

        // userinfo@host hides the real destination
        if parsed.as_str().contains('@') {
            findings.push(self.finding(format!("URL contains @ symbol: {}", url)));
        }

        if self.ip_host_regex.is_match(url) {
            findings.push(self.finding(format!("URL uses IP address: {}", url)));
        }

        let path = parsed.path();
        if path.chars().count() > MAX_PATH_LENGTH {
            findings.push(self.finding(format!("URL has unusually long path: {}", url)));
        }

        if self.encoded_byte_regex.is_match(path) {
            findings.push(self.finding(format!("URL contains encoded characters: {}", url)));
        }

        findings
    }

    fn finding(&self, reason: String) -> Finding {
        Finding::new(reason, LINK_WEIGHT)
    }
}
