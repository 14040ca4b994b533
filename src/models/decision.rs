//! Outcome of evaluating one request against the redirect settings

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::settings::RedirectStatus;
use crate::geo::GeoLookupError;

/// Why the engine stopped before looking at any rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InternalRequest,
    RedirectDisabled,
    NoRules,
    DevelopmentMode,
    OverrideParameter,
    BotDetected,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::InternalRequest => "internal request",
            SkipReason::RedirectDisabled => "redirect disabled",
            SkipReason::NoRules => "no redirect rules configured",
            SkipReason::DevelopmentMode => "development mode restricts redirects to admins",
            SkipReason::OverrideParameter => "override parameter present",
            SkipReason::BotDetected => "bot detected",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single rule was passed over without redirecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSkip {
    SamePage,
    AlreadyVisited,
    InvalidPattern(String),
}

impl fmt::Display for RuleSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSkip::SamePage => f.write_str("same-page redirect avoided"),
            RuleSkip::AlreadyVisited => f.write_str("already visited"),
            RuleSkip::InvalidPattern(err) => write!(f, "invalid rule pattern: {}", err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedirectError {
    #[error("invalid visitor ip")]
    InvalidVisitorIp,
    #[error("country lookup failed")]
    CountryLookup(#[source] GeoLookupError),
}

/// Coarse classification of a decision, used for structured logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCategory {
    Redirect,
    NoMatch,
    ConfigurationSkip,
    LookupFailure,
    ValidationFailure,
}

impl DecisionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionCategory::Redirect => "redirect",
            DecisionCategory::NoMatch => "no_match",
            DecisionCategory::ConfigurationSkip => "configuration_skip",
            DecisionCategory::LookupFailure => "lookup_failure",
            DecisionCategory::ValidationFailure => "validation_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    Redirected {
        status: RedirectStatus,
        destination: String,
    },
    NoMatch,
    Skipped {
        reason: SkipReason,
    },
    Error {
        reason: RedirectError,
    },
}

impl RedirectDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(self, RedirectDecision::Redirected { .. })
    }

    pub fn destination(&self) -> Option<&str> {
        match self {
            RedirectDecision::Redirected { destination, .. } => Some(destination),
            _ => None,
        }
    }

    pub fn category(&self) -> DecisionCategory {
        match self {
            RedirectDecision::Redirected { .. } => DecisionCategory::Redirect,
            RedirectDecision::NoMatch => DecisionCategory::NoMatch,
            RedirectDecision::Skipped { .. } => DecisionCategory::ConfigurationSkip,
            RedirectDecision::Error {
                reason: RedirectError::InvalidVisitorIp,
            } => DecisionCategory::ValidationFailure,
            RedirectDecision::Error {
                reason: RedirectError::CountryLookup(_),
            } => DecisionCategory::LookupFailure,
        }
    }
}
