use super::Finding;
use regex::Regex;

/// Ordered keyword rules: (pattern, label). Patterns are lowercase and matched
/// against ASCII-lowercased text, so only ASCII letters fold. `.` stays within a line.
const URGENCY_RULES: &[(&str, &str)] = &[
    (
        r"verify.*account|confirm.*account",
        "Account verification request",
    ),
    (
        r"confirm.*password|reset.*password",
        "Password confirmation request",
    ),
    (r"urgent.*action|action.*required", "Urgency trigger detected"),
    (r"click.*immediately|act.*now", "Immediate action pressure"),
    (r"account.*suspend|account.*locked", "Account suspension threat"),
    (
        r"unauthorized.*access|suspicious.*activity",
        "Security threat claim",
    ),
    (r"update.*payment|confirm.*payment", "Payment update request"),
];

struct UrgencyPattern {
    regex: Regex,
    label: &'static str,
}

pub struct UrgencyMatcher {
    patterns: Vec<UrgencyPattern>,
}

impl Default for UrgencyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UrgencyMatcher {
    pub fn new() -> Self {
        let patterns = URGENCY_RULES
            .iter()
            .map(|(pattern, label)| UrgencyPattern {
                regex: Regex::new(pattern).expect("urgency pattern is valid"),
                label,
            })
            .collect();

        Self { patterns }
    }

    /// One finding per matching rule, in rule order, each carrying `weight`.
    pub fn scan(&self, text: &str, weight: u32) -> Vec<Finding> {
        let text = text.to_ascii_lowercase();
        self.patterns
            .iter()
            .filter(|pattern| pattern.regex.is_match(&text))
            .map(|pattern| Finding::new(pattern.label.to_string(), weight))
            .collect()
    }

    /// `(pattern, label)` pairs in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &'static str)> + '_ {
        self.patterns
            .iter()
            .map(|pattern| (pattern.regex.as_str(), pattern.label))
    }
}
