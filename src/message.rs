//! Reads a raw RFC 822 message into an [`EmailRecord`] for offline analysis.

use crate::heuristics::EmailRecord;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message has no From header")]
    MissingFrom,
    #[error("From header does not contain an address: {0}")]
    EmptySender(String),
}

struct MessagePatterns {
    encoded_word: Regex,
    adjacent_words: Regex,
    href: Regex,
    bare_url: Regex,
    html_entity: Regex,
    boundary: Regex,
}

fn patterns() -> &'static MessagePatterns {
    static PATTERNS: OnceLock<MessagePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| MessagePatterns {
        encoded_word: Regex::new(r"=\?([^?]+)\?([BbQq])\?([^?]*)\?=")
            .expect("encoded-word pattern is valid"),
        adjacent_words: Regex::new(r"\?=\s+=\?").expect("adjacent-word pattern is valid"),
        href: Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("href pattern is valid"),
        bare_url: Regex::new(r#"https?://[^\s"'<>]+"#).expect("url pattern is valid"),
        html_entity: Regex::new(r"&(?:#([0-9]+)|#[xX]([0-9a-fA-F]+)|([a-zA-Z]+));")
            .expect("entity pattern is valid"),
        boundary: Regex::new(r#"(?i)boundary\s*=\s*"?([^";\s]+)"?"#)
            .expect("boundary pattern is valid"),
    })
}

/// Splits a mailbox such as `"Jane Doe" <jane@example.com>` into display name and
/// address. Text without angle brackets is taken as a bare address.
pub fn parse_mailbox(value: &str) -> (Option<String>, String) {
    let value = value.trim();
    if let (Some(start), Some(end)) = (value.rfind('<'), value.rfind('>')) {
        if start < end {
            let address = value[start + 1..end].trim().to_string();
            let name = value[..start].trim().trim_matches('"').trim();
            let name = (!name.is_empty()).then(|| name.to_string());
            return (name, address);
        }
    }
    (None, value.to_string())
}

/// Decodes RFC 2047 encoded words. Charsets other than UTF-8 are decoded lossily.
pub fn decode_mime_header(value: &str) -> String {
    let patterns = patterns();
    let joined = patterns.adjacent_words.replace_all(value, "?==?");
    patterns
        .encoded_word
        .replace_all(&joined, |caps: &Captures| {
            let payload = &caps[3];
            let bytes = match &caps[2] {
                "B" | "b" => match STANDARD.decode(payload) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        log::debug!("Undecodable base64 word {:?}: {}", payload, e);
                        return caps[0].to_string();
                    }
                },
                _ => decode_quoted_printable(&payload.replace('_', " ")),
            };
            String::from_utf8_lossy(&bytes).into_owned()
        })
        .into_owned()
}

/// Quoted-printable body/word decoding; malformed escapes are kept verbatim.
pub fn decode_quoted_printable(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'=' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        // soft line break
        if bytes[i + 1..].starts_with(b"\r\n") {
            i += 3;
            continue;
        }
        if bytes[i + 1..].starts_with(b"\n") {
            i += 2;
            continue;
        }
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match hex {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}

/// Decodes numeric and the common named HTML entities. Unknown entities are
/// left as written.
pub fn decode_html_entities(text: &str) -> String {
    patterns()
        .html_entity
        .replace_all(text, |caps: &Captures| {
            let decoded = if let Some(decimal) = caps.get(1) {
                decimal.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
            } else {
                match caps.get(3).map(|m| m.as_str()) {
                    Some("amp") => Some('&'),
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |ch| ch.to_string())
        })
        .into_owned()
}

/// `href` targets first, then bare URLs in the text (minus trailing sentence
/// punctuation), de-duplicated in first-seen order. Only http(s) links are kept.
pub fn extract_links(body: &str) -> Vec<String> {
    let patterns = patterns();
    let mut links: Vec<String> = Vec::new();

    let hrefs = patterns
        .href
        .captures_iter(body)
        .filter_map(|cap| cap.get(1).map(|m| decode_html_entities(m.as_str().trim())));
    let bare = patterns
        .bare_url
        .find_iter(body)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']))
        .map(decode_html_entities);

    for link in hrefs.chain(bare) {
        let lower = link.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            continue;
        }
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

/// Splits a header block from its body. Header names are lower-cased, folded
/// continuation lines are joined with a single space and the first occurrence
/// of a header wins, continuations of ignored duplicates included.
fn split_headers(raw: &str) -> (HashMap<String, String>, String) {
    let mut headers: HashMap<String, String> = HashMap::new();
    let mut last_header_key: Option<String> = None;
    let mut body = String::new();
    let mut in_headers = true;

    for line in raw.lines() {
        if !in_headers {
            body.push_str(line);
            body.push('\n');
            continue;
        }

        if line.trim().is_empty() {
            in_headers = false;
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(value) = last_header_key.as_ref().and_then(|k| headers.get_mut(k)) {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase();
            if headers.contains_key(&key) {
                last_header_key = None;
            } else {
                headers.insert(key.clone(), value.trim().to_string());
                last_header_key = Some(key);
            }
        }
    }

    (headers, body)
}

/// Parts between `--boundary` delimiter lines. The preamble and anything after
/// the closing delimiter are dropped.
fn split_multipart(body: &str, boundary: &str) -> Vec<String> {
    let delimiter = format!("--{}", boundary);
    let closing = format!("{}--", delimiter);
    let mut parts = Vec::new();
    let mut current: Option<String> = None;

    for line in body.lines() {
        let trimmed = line.trim_end();
        if trimmed == closing {
            parts.extend(current.take());
            break;
        }
        if trimmed == delimiter {
            parts.extend(current.replace(String::new()));
            continue;
        }
        if let Some(part) = current.as_mut() {
            part.push_str(line);
            part.push('\n');
        }
    }
    parts.extend(current);
    parts
}

/// Undoes the transfer encoding of a body, descending into multipart parts so
/// each one is decoded according to its own headers.
fn decode_body(headers: &HashMap<String, String>, body: String) -> String {
    let content_type = headers.get("content-type").map(String::as_str).unwrap_or("");
    if content_type.trim_start().to_ascii_lowercase().starts_with("multipart/") {
        if let Some(boundary) = patterns().boundary.captures(content_type) {
            return split_multipart(&body, &boundary[1])
                .iter()
                .map(|part| {
                    let (part_headers, part_body) = split_headers(part);
                    decode_body(&part_headers, part_body)
                })
                .collect::<Vec<_>>()
                .join("\n");
        }
    }

    let encoding = headers
        .get("content-transfer-encoding")
        .map(|e| e.trim().to_lowercase());
    match encoding.as_deref() {
        Some("quoted-printable") => {
            String::from_utf8_lossy(&decode_quoted_printable(&body)).into_owned()
        }
        Some("base64") => {
            let compact: String = body.split_whitespace().collect();
            match STANDARD.decode(compact) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    log::warn!("Body declared base64 but failed to decode: {}", e);
                    body
                }
            }
        }
        _ => body,
    }
}

/// Parses headers and body of a raw message into an [`EmailRecord`].
pub fn parse_message(raw: &str) -> Result<EmailRecord, MessageError> {
    let (headers, body) = split_headers(raw);

    let from_header = headers.get("from").ok_or(MessageError::MissingFrom)?;
    let (display_name, from) = parse_mailbox(&decode_mime_header(from_header));
    if from.is_empty() {
        return Err(MessageError::EmptySender(from_header.clone()));
    }

    let subject = headers
        .get("subject")
        .map(|s| decode_mime_header(s))
        .unwrap_or_default();

    let body = decode_body(&headers, body);
    let links = extract_links(&body);
    let body = body.trim();

    let mut record = EmailRecord::new(from, subject).with_links(links);
    record.display_name = display_name;
    if !body.is_empty() {
        record.body = Some(body.to_string());
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mailbox() {
        assert_eq!(
            parse_mailbox("\"Amazon Support\" <phisher@evil.com>"),
            (Some("Amazon Support".to_string()), "phisher@evil.com".to_string())
        );
        assert_eq!(
            parse_mailbox("John Doe <john@company.com>"),
            (Some("John Doe".to_string()), "john@company.com".to_string())
        );
        assert_eq!(
            parse_mailbox("<noreply@company.com>"),
            (None, "noreply@company.com".to_string())
        );
        assert_eq!(
            parse_mailbox("  bare@company.com "),
            (None, "bare@company.com".to_string())
        );
    }

    #[test]
    fn test_decode_mime_header() {
        assert_eq!(
            decode_mime_header("=?UTF-8?B?VmVyaWZ5IHlvdXIgYWNjb3VudA==?="),
            "Verify your account"
        );
        assert_eq!(
            decode_mime_header("=?iso-8859-1?Q?Action_required?= now"),
            "Action required now"
        );
        assert_eq!(
            decode_mime_header("=?UTF-8?B?VmVyaWZ5?= =?UTF-8?B?IGFjY291bnQ=?="),
            "Verify account"
        );
        assert_eq!(decode_mime_header("Plain subject"), "Plain subject");
    }

    #[test]
    fn test_decode_quoted_printable() {
        assert_eq!(
            decode_quoted_printable("href=3D\"https://a.com/x\"=\nmore"),
            b"href=\"https://a.com/x\"more".to_vec()
        );
        assert_eq!(decode_quoted_printable("50% off =ZZ"), b"50% off =ZZ".to_vec());
        assert_eq!(decode_quoted_printable("trailing ="), b"trailing =".to_vec());
    }

    #[test]
    fn test_extract_links() {
        let body = r#"<a href="https://192.168.1.1/verify">Verify</a>
            Or visit https://example.com/help. Also <a href='mailto:x@y.com'>mail</a>
            and again https://192.168.1.1/verify"#;

        assert_eq!(
            extract_links(body),
            vec![
                "https://192.168.1.1/verify".to_string(),
                "https://example.com/help".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_message() {
        let raw = "From: Amazon Support <phisher@evil.com>\r\n\
                   Subject: Verify your\r\n\
                   \taccount immediately\r\n\
                   Content-Type: text/html\r\n\
                   \r\n\
                   <p>Your account is locked.</p>\r\n\
                   <a href=\"https://192.168.1.1/verify\">Fix it</a>\r\n";

        let record = parse_message(raw).unwrap();

        assert_eq!(record.from, "phisher@evil.com");
        assert_eq!(record.display_name.as_deref(), Some("Amazon Support"));
        assert_eq!(record.subject, "Verify your account immediately");
        assert_eq!(record.links, vec!["https://192.168.1.1/verify".to_string()]);
        assert!(record.body.unwrap().contains("locked"));
    }

    #[test]
    fn test_parse_quoted_printable_body() {
        let raw = "From: a@b.com\nSubject: Hi\nContent-Transfer-Encoding: quoted-printable\n\n\
                   <a href=3D\"https://example.com/a%2Fb\">x</a>\n";

        let record = parse_message(raw).unwrap();
        assert_eq!(record.links, vec!["https://example.com/a%2Fb".to_string()]);
    }

    #[test]
    fn test_parse_message_errors() {
        assert_eq!(
            parse_message("Subject: no sender\n\nbody"),
            Err(MessageError::MissingFrom)
        );
        assert!(matches!(
            parse_message("From: \"Nobody\" <>\n\n"),
            Err(MessageError::EmptySender(_))
        ));
    }

    #[test]
    fn test_duplicate_from_keeps_first_sender() {
        let raw = "From: Amazon <support@amazon.com>\n\
                   From: other\n \
                   <phisher@evil.com>\n\
                   Subject: Hello\n\n\
                   body\n";

        let record = parse_message(raw).unwrap();
        assert_eq!(record.from, "support@amazon.com");
        assert_eq!(record.display_name.as_deref(), Some("Amazon"));
    }

    #[test]
    fn test_href_entities_are_decoded() {
        let body = r#"<a href="https://example.com/login?a=1&amp;b=2">x</a>"#;
        assert_eq!(
            extract_links(body),
            vec!["https://example.com/login?a=1&b=2".to_string()]
        );
        assert_eq!(decode_html_entities("&#65;&#x42;&lt;&nbsp;"), "AB<&nbsp;");
    }

    #[test]
    fn test_multipart_parts_are_decoded_individually() {
        let raw = "From: a@b.com\n\
                   Subject: Hi\n\
                   Content-Type: multipart/alternative;\n \
                   boundary=\"XYZ\"\n\n\
                   preamble text\n\
                   --XYZ\n\
                   Content-Type: text/plain\n\
                   Content-Transfer-Encoding: base64\n\n\
                   VmVyaWZ5IHlvdXIgYWNjb3VudA==\n\
                   --XYZ\n\
                   Content-Type: text/html\n\
                   Content-Transfer-Encoding: quoted-printable\n\n\
                   <a href=3D\"https://example.com/x\">go</a>\n\
                   --XYZ--\n\
                   epilogue\n";

        let record = parse_message(raw).unwrap();
        let body = record.body.unwrap();
        assert!(body.contains("Verify your account"));
        assert!(!body.contains("preamble"));
        assert!(!body.contains("epilogue"));
        assert_eq!(record.links, vec!["https://example.com/x".to_string()]);
    }

    #[test]
    fn test_headers_only_message_has_no_body() {
        let record = parse_message("From: a@b.com\nSubject: Hello\n").unwrap();
        assert!(record.body.is_none());
        assert!(record.links.is_empty());
    }
}
