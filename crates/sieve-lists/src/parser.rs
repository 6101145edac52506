use std::collections::HashSet;

use sieve_core::domain::{normalize, Domain};

/// Line counters for one parsed list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub blank_or_comment: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub accepted: usize,
}

/// Ordered, deduplicated domains from one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedList {
    pub domains: Vec<Domain>,
    pub stats: ParseStats,
}

impl ParsedList {
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Parse newline-separated list text (`\n` or `\r\n`).
pub fn parse_domain_list(text: &str) -> ParsedList {
    parse_domain_lines(text.lines())
}

/// Parse already-split lines. Invalid lines are counted and skipped.
pub fn parse_domain_lines<I, S>(lines: I) -> ParsedList
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut domains = Vec::new();
    let mut seen: HashSet<Domain> = HashSet::new();
    let mut stats = ParseStats::default();

    for raw_line in lines {
        let line = raw_line.as_ref().trim();
        stats.lines += 1;

        if is_comment_line(line) {
            stats.blank_or_comment += 1;
            continue;
        }

        let Some(domain) = normalize(line) else {
            log::trace!("skipping list line {line:?}");
            stats.rejected += 1;
            continue;
        };

        if seen.insert(domain.clone()) {
            domains.push(domain);
            stats.accepted += 1;
        } else {
            stats.duplicates += 1;
        }
    }

    ParsedList { domains, stats }
}

fn is_comment_line(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('!')
        || line.starts_with('[')
        || line.starts_with('#')
        || line.starts_with("//")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &ParsedList) -> Vec<&str> {
        list.domains.iter().map(Domain::as_str).collect()
    }

    #[test]
    fn parses_hosts_file() {
        let text = "# noai hosts\r\n0.0.0.0 perplexity.ai\r\n0.0.0.0 www.deepai.org # chat\r\n\r\n0.0.0.0 perplexity.ai\r\n";
        let list = parse_domain_list(text);
        assert_eq!(names(&list), ["perplexity.ai", "deepai.org"]);
        assert_eq!(
            list.stats,
            ParseStats {
                lines: 5,
                blank_or_comment: 2,
                rejected: 0,
                duplicates: 1,
                accepted: 2,
            }
        );
    }

    #[test]
    fn parses_mixed_formats_in_order() {
        let text = "[Adblock Plus 2.0]\n||openai.com^\nhttps://www.scite.ai/about\nnot a domain\nOpenAI.com";
        let list = parse_domain_list(text);
        assert_eq!(names(&list), ["openai.com", "scite.ai"]);
        assert_eq!(list.stats.rejected, 1);
        assert_eq!(list.stats.duplicates, 1);
    }

    #[test]
    fn parses_stored_string_arrays() {
        let stored = vec!["Example.com".to_string(), "".to_string(), "example.com".to_string()];
        let list = parse_domain_lines(&stored);
        assert_eq!(names(&list), ["example.com"]);
    }

    #[test]
    fn empty_text_yields_empty_list() {
        assert!(parse_domain_list("").is_empty());
        assert!(parse_domain_list("# only\n! comments").is_empty());
    }
}
