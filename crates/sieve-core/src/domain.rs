//! Domain normalization
//!
//! Turns one line of list text into a canonical domain. Accepted inputs:
//!
//! - plain domains (`example.com`, `www.Example.COM.`)
//! - hosts-file rows (`0.0.0.0 example.com`, `::1 example.com # note`)
//! - adblock host rules (`||example.com^`, `||example.com^$third-party`, `*.example.com`)
//! - URLs (`https://www.example.com/path?q=1`)
//!
//! Anything that does not reduce to `label(.label)+` over `[a-z0-9-]` is rejected.

use std::borrow::Borrow;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Domain
// =============================================================================

/// A canonical, lowercase domain name such as `example.com`.
///
/// Only obtainable through [`normalize`] (or [`Domain::parse`]), so every value
/// satisfies the domain-shape check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Normalize arbitrary list text into a domain.
    #[inline]
    pub fn parse(line: &str) -> Option<Self> {
        normalize(line)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets `HashSet<Domain>` be looked up by `&str` suffixes.
impl Borrow<str> for Domain {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Domain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        normalize(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("not a domain: {raw:?}")))
    }
}

// =============================================================================
// Normalization
// =============================================================================

/// Normalize one list line into a [`Domain`], or `None` if it is not one.
///
/// Pure and total: never panics, never allocates more than one string.
pub fn normalize(line: &str) -> Option<Domain> {
    let lowered = line.trim().to_ascii_lowercase();
    let mut s = lowered.as_str();

    if is_comment_line(s) {
        return None;
    }

    s = strip_inline_comment(s);

    s = select_host_token(s)?;

    s = strip_adblock_syntax(s);

    s = strip_scheme(s);
    s = strip_www(s);

    if let Some(end) = s.find(['/', '?', '#']) {
        s = &s[..end];
    }

    s = s.trim_matches('.');
    // `||.www.example.com^` only exposes `www.` after the dot trim
    s = strip_www(s);

    if !is_valid_domain(s) || s.parse::<IpAddr>().is_ok() {
        return None;
    }

    Some(Domain(s.to_string()))
}

/// Check the `label(.label)+` shape over `[a-z0-9-]`.
pub fn is_valid_domain(s: &str) -> bool {
    if s.is_empty() || !s.contains('.') {
        return false;
    }

    if !s
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return false;
    }

    s.split('.').all(|label| !label.is_empty())
}

/// Strip any number of leading `www.` labels.
#[inline]
pub fn strip_www(mut host: &str) -> &str {
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    host
}

fn is_comment_line(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.starts_with('!') || line.starts_with("//")
}

/// Cut at the first whitespace that introduces `#`, `!` or `//`.
fn strip_inline_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, window) in bytes.windows(2).enumerate() {
        if !window[0].is_ascii_whitespace() {
            continue;
        }
        let rest = &bytes[i + 1..];
        if rest.starts_with(b"#") || rest.starts_with(b"!") || rest.starts_with(b"//") {
            return line[..i].trim_end();
        }
    }
    line
}

/// Hosts rows keep the last token, everything else keeps the first.
fn select_host_token(line: &str) -> Option<&str> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;

    match parts.last() {
        Some(last) if first.parse::<IpAddr>().is_ok() => Some(last),
        _ => Some(first),
    }
}

fn strip_adblock_syntax(mut s: &str) -> &str {
    if let Some(rest) = s.strip_prefix("||") {
        s = rest;
    }
    if let Some(end) = s.find(['^', '$']) {
        s = &s[..end];
    }
    s.trim_matches('*')
}

fn strip_scheme(s: &str) -> &str {
    s.strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(s)
}
