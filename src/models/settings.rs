use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("malformed settings record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported redirect status code {0}, expected 301 or 302")]
    UnsupportedStatus(u16),
    #[error("rule {index} has neither a visited nor a target URL")]
    EmptyRule { index: usize },
    #[error("rule {index} has an invalid country code '{code}'")]
    InvalidCountry { index: usize, code: String },
}

/// Whether a rule fires for visitors from, or not from, its country set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchCondition {
    #[default]
    #[serde(alias = "From")]
    From,
    #[serde(alias = "NotFrom", alias = "notFrom")]
    NotFrom,
}

/// HTTP status used for issued redirects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u16", into = "u16")]
pub enum RedirectStatus {
    MovedPermanently,
    #[default]
    Found,
}

impl RedirectStatus {
    pub fn as_u16(self) -> u16 {
        match self {
            RedirectStatus::MovedPermanently => 301,
            RedirectStatus::Found => 302,
        }
    }
}

impl TryFrom<u16> for RedirectStatus {
    type Error = SettingsError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            301 => Ok(RedirectStatus::MovedPermanently),
            302 => Ok(RedirectStatus::Found),
            other => Err(SettingsError::UnsupportedStatus(other)),
        }
    }
}

impl From<RedirectStatus> for u16 {
    fn from(status: RedirectStatus) -> Self {
        status.as_u16()
    }
}

impl fmt::Display for RedirectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A single redirect rule. Rules are evaluated in the order they are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    /// URL the rule triggers on; relative (`/path`) or absolute, optionally
    /// with `(.*)` captures and a single query parameter
    #[serde(rename = "visitedURLPattern")]
    pub visited_url_pattern: String,

    /// Destination; `(.*)` placeholders receive the visited captures in order
    #[serde(rename = "targetURLPattern")]
    pub target_url_pattern: String,

    /// ISO-3166-1 alpha-2 codes
    pub countries: BTreeSet<String>,

    #[serde(rename = "matchCondition", default)]
    pub match_condition: MatchCondition,

    #[serde(rename = "passQueryString", default)]
    pub pass_query_string: bool,

    #[serde(rename = "ignoreQueryStringOnMatch", default)]
    pub ignore_query_string_on_match: bool,
}

impl RedirectRule {
    pub fn new(
        visited: impl Into<String>,
        target: impl Into<String>,
        countries: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            visited_url_pattern: visited.into(),
            target_url_pattern: target.into(),
            countries: countries
                .into_iter()
                .map(|c| c.into().trim().to_ascii_uppercase())
                .collect(),
            match_condition: MatchCondition::From,
            pass_query_string: false,
            ignore_query_string_on_match: false,
        }
    }

    pub fn not_from(mut self) -> Self {
        self.match_condition = MatchCondition::NotFrom;
        self
    }

    pub fn pass_query_string(mut self, pass: bool) -> Self {
        self.pass_query_string = pass;
        self
    }

    pub fn ignore_query_string_on_match(mut self, ignore: bool) -> Self {
        self.ignore_query_string_on_match = ignore;
        self
    }

    /// Country test, negated for `NotFrom`
    pub fn applies_to(&self, country: &str) -> bool {
        let listed = self.countries.contains(country);
        match self.match_condition {
            MatchCondition::From => listed,
            MatchCondition::NotFrom => !listed,
        }
    }
}

/// Site-wide switches plus the ordered rule list.
///
/// Serialized as a flat JSON object keyed by field name. Every key is
/// required on import; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub redirect_enabled: bool,
    pub development_mode: bool,
    pub debug_logging_enabled: bool,
    pub skip_for_bots: bool,
    pub skip_if_override_param_present: bool,
    pub first_visit_only: bool,
    pub redirect_status_code: RedirectStatus,
    pub rules: Vec<RedirectRule>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            redirect_enabled: false,
            development_mode: false,
            debug_logging_enabled: false,
            skip_for_bots: false,
            skip_if_override_param_present: false,
            first_visit_only: false,
            redirect_status_code: RedirectStatus::Found,
            rules: Vec::new(),
        }
    }
}

impl GlobalSettings {
    /// Parse and validate an exported settings document
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let mut settings: GlobalSettings = serde_json::from_str(json)?;
        settings.normalize();
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json_pretty(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Upper-case and trim country codes
    pub fn normalize(&mut self) {
        for rule in &mut self.rules {
            rule.countries = rule
                .countries
                .iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.visited_url_pattern.trim().is_empty()
                && rule.target_url_pattern.trim().is_empty()
            {
                return Err(SettingsError::EmptyRule { index });
            }

            if let Some(code) = rule
                .countries
                .iter()
                .find(|c| c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_alphabetic()))
            {
                return Err(SettingsError::InvalidCountry {
                    index,
                    code: code.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "redirectEnabled": true,
        "developmentMode": false,
        "debugLoggingEnabled": true,
        "skipForBots": true,
        "skipIfOverrideParamPresent": false,
        "firstVisitOnly": false,
        "redirectStatusCode": 301,
        "rules": [
            {
                "visitedURLPattern": "/",
                "targetURLPattern": "https://us.example.com/",
                "countries": ["us", "CA"],
                "matchCondition": "not_from",
                "passQueryString": true,
                "ignoreQueryStringOnMatch": false
            }
        ],
        "legacyField": "ignored"
    }"#;

    #[test]
    fn test_import_full_document() {
        let settings = GlobalSettings::from_json(FULL).unwrap();
        assert!(settings.redirect_enabled);
        assert_eq!(settings.redirect_status_code, RedirectStatus::MovedPermanently);
        assert_eq!(settings.rules.len(), 1);

        let rule = &settings.rules[0];
        assert_eq!(rule.match_condition, MatchCondition::NotFrom);
        assert!(rule.countries.contains("US"));
        assert!(rule.countries.contains("CA"));
        assert!(rule.pass_query_string);
    }

    #[test]
    fn test_import_rejects_missing_key() {
        let json = r#"{ "redirectEnabled": true, "rules": [] }"#;
        assert!(matches!(
            GlobalSettings::from_json(json),
            Err(SettingsError::Malformed(_))
        ));
    }

    #[test]
    fn test_import_rejects_bad_status() {
        let json = FULL.replace("\"redirectStatusCode\": 301", "\"redirectStatusCode\": 307");
        assert!(GlobalSettings::from_json(&json).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_rule() {
        let mut settings = GlobalSettings::default();
        settings.rules.push(RedirectRule::new("", " ", ["US"]));
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::EmptyRule { index: 0 })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_country() {
        let mut settings = GlobalSettings::default();
        settings.rules.push(RedirectRule::new("/", "/us/", ["USA"]));
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidCountry { index: 0, .. })
        ));
    }

    #[test]
    fn test_export_preserves_rule_order() {
        let mut settings = GlobalSettings::default();
        settings.rules.push(RedirectRule::new("/a/", "/b/", ["FR"]));
        settings.rules.push(RedirectRule::new("/c/", "/d/", ["DE"]));

        let json = settings.to_json_pretty().unwrap();
        let restored = GlobalSettings::from_json(&json).unwrap();
        assert_eq!(restored.rules[0].visited_url_pattern, "/a/");
        assert_eq!(restored.rules[1].visited_url_pattern, "/c/");
        assert_eq!(restored.redirect_status_code.as_u16(), 302);
    }

    #[test]
    fn test_not_from_negates_membership() {
        let rule = RedirectRule::new("/", "/x/", ["US"]).not_from();
        assert!(!rule.applies_to("US"));
        assert!(rule.applies_to("FR"));
    }
}
