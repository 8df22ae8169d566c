//! PII redaction (spec §4.J)
//!
//! Rewrites emails and phone-like sequences found in log fields and
//! error stacks, recursing through nested structures via the shared
//! value-tree walker (spec §9).

use crate::value_tree::walk_strings;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\+?\d[\d\-\s]{7,}\d").unwrap());

/// Redact one email address: `x***@y***.tld`, preserving the TLD.
/// Single-label domains (no dot before the TLD) become `x***@***.tld`.
fn redact_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };
    let local_mask = mask_keep_first(local);

    let domain_parts: Vec<&str> = domain.rsplitn(2, '.').collect();
    if domain_parts.len() != 2 {
        return format!("{}@{}", local_mask, domain);
    }
    let tld = domain_parts[0];
    let rest = domain_parts[1];
    if rest.contains('.') || rest.is_empty() {
        format!("{}@***.{}", local_mask, tld)
    } else {
        format!("{}@{}***.{}", local_mask, &rest[..1.min(rest.len())], tld)
    }
}

fn mask_keep_first(s: &str) -> String {
    if s.is_empty() {
        return "***".to_string();
    }
    let first: String = s.chars().take(1).collect();
    format!("{}***", first)
}

/// Redact one phone-like digit sequence: keep first/last 4 digits,
/// mask the middle.
fn redact_phone(sequence: &str) -> String {
    let digits: Vec<char> = sequence.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 8 {
        return sequence.to_string();
    }
    let prefix: String = digits[..4].iter().collect();
    let suffix: String = digits[digits.len() - 4..].iter().collect();
    format!("{}***{}", prefix, suffix)
}

/// Redact all emails and phone-like sequences in a free-text string.
pub fn redact_text(input: &str) -> String {
    let after_email = EMAIL_RE.replace_all(input, |caps: &regex::Captures| redact_email(&caps[0]));
    PHONE_RE
        .replace_all(&after_email, |caps: &regex::Captures| redact_phone(&caps[0]))
        .to_string()
}

/// Recursively redact every string leaf in a JSON value (event data,
/// nested error contexts).
pub fn redact_value(value: &Value) -> Value {
    walk_strings(value, &mut |s| redact_text(s))
}
