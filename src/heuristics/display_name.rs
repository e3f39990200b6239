use super::{Finding, DISPLAY_NAME_WEIGHT};

/// Flags a display name whose first word does not appear anywhere in the sender
/// address. Deliberately loose: "Amazon" vs "support@amazon.com" passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayNameMatcher;

impl DisplayNameMatcher {
    pub fn new() -> Self {
        DisplayNameMatcher
    }

    pub fn check(&self, display_name: Option<&str>, from: &str) -> Option<Finding> {
        let display_name = display_name?;
        if from.is_empty() {
            return None;
        }

        let display_lower = display_name.to_lowercase();
        // Whitespace-only names carry no opinion
        let token = display_lower.split_whitespace().next()?;

        if from.to_lowercase().contains(token) {
            return None;
        }

        Some(Finding::new(
            format!(
                "Display name \"{}\" doesn't match sender address \"{}\"",
                display_name, from
            ),
            DISPLAY_NAME_WEIGHT,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_is_flagged() {
        let finding = DisplayNameMatcher::new()
            .check(Some("John Doe"), "hacker@phishing.com")
            .unwrap();

        assert_eq!(finding.weight, DISPLAY_NAME_WEIGHT);
        assert_eq!(
            finding.reason,
            "Display name \"John Doe\" doesn't match sender address \"hacker@phishing.com\""
        );
    }

    #[test]
    fn test_matching_first_token_passes() {
        let matcher = DisplayNameMatcher::new();
        assert!(matcher
            .check(Some("John Doe"), "john.doe@company.com")
            .is_none());
        assert!(matcher.check(Some("Amazon"), "support@amazon.com").is_none());
    }

    #[test]
    fn test_case_insensitive() {
        let matcher = DisplayNameMatcher::new();
        assert!(matcher.check(Some("JOHN DOE"), "john@company.com").is_none());
        assert!(matcher.check(Some("john doe"), "JOHN@COMPANY.COM").is_none());
        assert_eq!(
            matcher
                .check(Some("AMAZON SUPPORT"), "phisher@evil.com")
                .map(|f| f.weight),
            matcher
                .check(Some("amazon support"), "phisher@evil.com")
                .map(|f| f.weight)
        );
    }

    #[test]
    fn test_no_opinion_without_inputs() {
        let matcher = DisplayNameMatcher::new();
        assert!(matcher.check(None, "john@company.com").is_none());
        assert!(matcher.check(Some(""), "john@company.com").is_none());
        assert!(matcher.check(Some("   "), "john@company.com").is_none());
        assert!(matcher.check(Some("John"), "").is_none());
    }

    #[test]
    fn test_leading_whitespace_is_skipped() {
        let finding = DisplayNameMatcher::new().check(Some("  PayPal Service"), "x@evil.com");
        assert!(finding.is_some());
    }
}
