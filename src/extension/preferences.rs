use serde::{Deserialize, Serialize};

/// User preferences the extension keeps in browser sync storage. Missing keys
/// take their defaults, so stored values are never overwritten on install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub cloud_analysis_enabled: bool,
    pub whitelisted_senders: Vec<String>,
    pub blocked_senders: Vec<String>,
    pub report_count: u64,
    pub privacy_consent: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            cloud_analysis_enabled: false,
            whitelisted_senders: Vec::new(),
            blocked_senders: Vec::new(),
            report_count: 0,
            privacy_consent: false,
        }
    }
}

impl Preferences {
    /// Builds preferences from whatever is already stored, filling in defaults
    /// for absent keys only.
    pub fn from_stored(stored: serde_json::Value) -> anyhow::Result<Self> {
        if stored.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(stored)?)
    }

    pub fn is_whitelisted(&self, sender: &str) -> bool {
        self.whitelisted_senders
            .iter()
            .any(|s| s.eq_ignore_ascii_case(sender))
    }
}

/// Storage seam for [`Preferences`]. The router never touches globals; it is
/// handed one of these.
pub trait PreferenceStore: Send {
    fn load(&self) -> anyhow::Result<Preferences>;
    fn save(&mut self, preferences: &Preferences) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    preferences: Preferences,
}

impl MemoryStore {
    pub fn new(preferences: Preferences) -> Self {
        Self { preferences }
    }
}

impl PreferenceStore for MemoryStore {
    fn load(&self) -> anyhow::Result<Preferences> {
        Ok(self.preferences.clone())
    }

    fn save(&mut self, preferences: &Preferences) -> anyhow::Result<()> {
        self.preferences = preferences.clone();
        Ok(())
    }
}
