//! Per-rule matching and destination templating.
//!
//! A visited pattern is a regular expression over the absolute current
//! URL, matched case-insensitively and anchored at both ends. `(.*)`
//! groups in the visited pattern feed, in order, the `(.*)` placeholders
//! of the target pattern. A visited pattern may carry one query
//! parameter (`/shop/?ref=partner`); it then matches when that parameter
//! comes last, after any others, and that parameter is not forwarded.

use regex::Regex;
use url::Url;

use super::request::ensure_trailing_slash;
use super::visits::{url_hash, VisitTracker};
use crate::models::{RedirectRule, RuleSkip};

const CAPTURE_PLACEHOLDER: &str = "(.*)";

/// Infrastructure paths that are never redirected
const EXCLUDED_FRAGMENTS: &[&str] = &["jm-ajax", "wp-content", "wc-ajax"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    NoMatch,
    Redirect(String),
    Skip(RuleSkip),
}

/// Request facts a rule is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    /// Absolute URL, trailing slash on the path, query included unless
    /// the rule ignores it
    pub current_url: &'a str,
    pub query_string: &'a str,
    pub visitor_country: &'a str,
    pub first_visit_only: bool,
}

#[derive(Debug, Clone)]
pub struct RuleMatcher {
    /// Site base URL without trailing slash
    home: String,
}

impl RuleMatcher {
    pub fn new(site_url: &Url) -> Self {
        Self {
            home: site_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a relative pattern against the site URL
    pub fn resolve(&self, pattern: &str) -> String {
        let pattern = pattern.trim();
        if is_relative(pattern) {
            format!("{}{}", self.home, pattern)
        } else {
            pattern.to_string()
        }
    }

    /// Resolved pattern with a trailing slash on its path, the form used
    /// for comparisons against the current URL
    pub fn normalize(&self, pattern: &str) -> String {
        ensure_trailing_slash(&self.resolve(pattern))
    }

    pub fn evaluate(
        &self,
        rule: &RedirectRule,
        input: &RuleInput<'_>,
        visits: &dyn VisitTracker,
    ) -> RuleOutcome {
        // Destinations are built from the resolved target as written; the
        // slashed form only feeds the loop guards
        let target = self.resolve(&rule.target_url_pattern);
        let target_key = ensure_trailing_slash(&target);
        // Matches are always anchored; a trailing `$` would land after the
        // appended slash and never match
        let visited = self.normalize(rule.visited_url_pattern.trim().trim_end_matches('$'));

        if target_key == visited || target_key == input.current_url {
            return RuleOutcome::Skip(RuleSkip::SamePage);
        }

        if !rule.applies_to(input.visitor_country) {
            return RuleOutcome::NoMatch;
        }

        if input.first_visit_only && visits.has_visited(&url_hash(input.current_url)) {
            return RuleOutcome::Skip(RuleSkip::AlreadyVisited);
        }

        let (pattern, query_string) = match split_visited(&visited, input.query_string) {
            Ok(parts) => parts,
            Err(err) => return RuleOutcome::Skip(RuleSkip::InvalidPattern(err.to_string())),
        };

        if EXCLUDED_FRAGMENTS
            .iter()
            .any(|fragment| input.current_url.contains(fragment))
        {
            return RuleOutcome::NoMatch;
        }

        let matcher = match Regex::new(&format!("(?i)^{}$", pattern)) {
            Ok(re) => re,
            Err(err) => return RuleOutcome::Skip(RuleSkip::InvalidPattern(err.to_string())),
        };

        let Some(captures) = matcher.captures(input.current_url) else {
            return RuleOutcome::NoMatch;
        };

        let groups: Vec<&str> = captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str()).unwrap_or(""))
            .collect();

        let mut destination = substitute_captures(&target, &groups);

        if rule.pass_query_string && !query_string.is_empty() {
            destination = append_query(&destination, &query_string);
        }

        if ensure_trailing_slash(&destination) == input.current_url {
            return RuleOutcome::Skip(RuleSkip::SamePage);
        }

        RuleOutcome::Redirect(destination)
    }
}

/// `/path` without a scheme separator
fn is_relative(url: &str) -> bool {
    !url.contains("://") && url.starts_with('/')
}

/// Turn the visited URL into a match pattern.
///
/// `path?param` becomes `path[?&].*param`, and `param` (plus a following
/// `&`) is removed from the live query string. Only the first query
/// parameter of the pattern is honoured.
fn split_visited(visited: &str, query_string: &str) -> Result<(String, String), regex::Error> {
    let mut parts = visited.split('?');
    let path = parts.next().unwrap_or_default();

    match parts.next() {
        Some(param) => {
            let strip = Regex::new(&format!("(?i){}&?", param))?;
            let remaining = strip.replace_all(query_string, "").into_owned();
            Ok((format!("{}[\\?|&].*{}", path, param), remaining))
        }
        None => Ok((path.to_string(), query_string.to_string())),
    }
}

/// Add `query` to `url`, ahead of any fragment
fn append_query(url: &str, query: &str) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };

    let divider = if base.contains('?') { '&' } else { '?' };
    let mut result = format!("{}{}{}", base, divider, query);
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }
    result
}

/// Replace each `(.*)` in `target`, left to right, with the matching
/// capture; placeholders beyond the last capture become empty. A
/// pattern without capture groups leaves the target untouched.
fn substitute_captures(target: &str, groups: &[&str]) -> String {
    if groups.is_empty() || !target.contains(CAPTURE_PLACEHOLDER) {
        return target.to_string();
    }

    let mut result = String::with_capacity(target.len());
    let mut rest = target;
    let mut index = 0;
    while let Some(pos) = rest.find(CAPTURE_PLACEHOLDER) {
        result.push_str(&rest[..pos]);
        result.push_str(groups.get(index).copied().unwrap_or(""));
        index += 1;
        rest = &rest[pos + CAPTURE_PLACEHOLDER.len()..];
    }
    result.push_str(rest);
    result
}
