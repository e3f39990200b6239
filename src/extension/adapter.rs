use crate::heuristics::EmailRecord;
use crate::message::parse_mailbox;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gmail,
    Outlook,
    Yahoo,
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gmail" => Ok(Provider::Gmail),
            "outlook" => Ok(Provider::Outlook),
            "yahoo" => Ok(Provider::Yahoo),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Text already scraped from a webmail page by the content script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageView {
    pub sender_text: String,
    pub subject_text: String,
    pub body_text: Option<String>,
    pub hrefs: Vec<String>,
}

/// Turns a provider's [`MessageView`] into an [`EmailRecord`]. Returns `None`
/// when no sender address can be recovered.
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;
    fn extract(&self, view: &MessageView) -> Option<EmailRecord>;
}

pub fn adapter_for(provider: Provider) -> Option<Box<dyn ProviderAdapter>> {
    match provider {
        Provider::Gmail => Some(Box::new(GmailAdapter)),
        Provider::Outlook => Some(Box::new(OutlookAdapter)),
        Provider::Yahoo => None,
    }
}

fn http_links(hrefs: &[String]) -> Vec<String> {
    hrefs
        .iter()
        .filter(|href| href.starts_with("http"))
        .cloned()
        .collect()
}

fn build_record(
    display_name: Option<String>,
    from: String,
    view: &MessageView,
    body: Option<String>,
) -> Option<EmailRecord> {
    if from.is_empty() {
        log::warn!("Could not extract sender email from message view");
        return None;
    }
    let mut record =
        EmailRecord::new(from, view.subject_text.trim()).with_links(http_links(&view.hrefs));
    record.display_name = display_name.filter(|name| !name.is_empty());
    record.body = body;
    Some(record)
}

/// Gmail renders the sender as `Name <address>`. The body is never forwarded.
pub struct GmailAdapter;

impl ProviderAdapter for GmailAdapter {
    fn provider(&self) -> Provider {
        Provider::Gmail
    }

    fn extract(&self, view: &MessageView) -> Option<EmailRecord> {
        let (display_name, from) = parse_mailbox(&view.sender_text);
        build_record(display_name, from, view, None)
    }
}

/// Outlook renders the sender as `Name (address)` or a bare address, and the
/// body text is forwarded for keyword analysis.
pub struct OutlookAdapter;

impl OutlookAdapter {
    fn split_sender(text: &str) -> (Option<String>, String) {
        let text = text.trim();
        if let (Some(start), true) = (text.rfind('('), text.ends_with(')')) {
            let address = text[start + 1..text.len() - 1].trim();
            if address.contains('@') {
                let name = text[..start].trim();
                return ((!name.is_empty()).then(|| name.to_string()), address.to_string());
            }
        }
        match text.rsplit_once(char::is_whitespace) {
            Some((name, address)) if address.contains('@') => {
                (Some(name.trim().to_string()), address.to_string())
            }
            _ => (None, text.to_string()),
        }
    }
}

impl ProviderAdapter for OutlookAdapter {
    fn provider(&self) -> Provider {
        Provider::Outlook
    }

    fn extract(&self, view: &MessageView) -> Option<EmailRecord> {
        let (display_name, from) = Self::split_sender(&view.sender_text);
        let body = view.body_text.clone().filter(|b| !b.trim().is_empty());
        build_record(display_name, from, view, body)
    }
}
