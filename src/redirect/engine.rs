//! Request-time redirect decision.
//!
//! Global switches are checked first, then the visitor's country is
//! resolved once and rules are tried in stored order. The first rule that
//! yields a destination wins. Rules that would redirect to the page being
//! visited are passed over, not treated as fatal. Every failure degrades to
//! serving the original page.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::debug_log::DebugLog;
use super::matcher::{RuleInput, RuleMatcher, RuleOutcome};
use super::request::{RedirectRequest, OVERRIDE_PARAM};
use super::visits::{url_hash, VisitTracker};
use crate::geo::{extract_visitor_ip, GeoLookup};
use crate::models::{GlobalSettings, RedirectDecision, RedirectError, RuleSkip, SkipReason};

pub struct RedirectEngine {
    geo: Arc<dyn GeoLookup>,
    matcher: RuleMatcher,
    debug_log: Option<Arc<DebugLog>>,
}

/// Decision plus what goes into the debug log line
#[derive(Debug, Clone)]
pub struct Assessment {
    pub decision: RedirectDecision,
    pub visitor_ip: String,
    pub message: String,
}

impl Assessment {
    fn new(decision: RedirectDecision, visitor_ip: &str, message: impl Into<String>) -> Self {
        Self {
            decision,
            visitor_ip: visitor_ip.to_string(),
            message: message.into(),
        }
    }

    fn skipped(reason: SkipReason, visitor_ip: &str) -> Self {
        Self::new(
            RedirectDecision::Skipped { reason },
            visitor_ip,
            format!("Redirection skipped: {}", reason),
        )
    }

    fn error(reason: RedirectError, visitor_ip: &str) -> Self {
        let message = format!("Redirection terminated: {}", reason);
        Self::new(RedirectDecision::Error { reason }, visitor_ip, message)
    }
}

impl RedirectEngine {
    pub fn new(geo: Arc<dyn GeoLookup>, site_url: &Url) -> Self {
        Self {
            geo,
            matcher: RuleMatcher::new(site_url),
            debug_log: None,
        }
    }

    /// Write decision lines here whenever the settings enable debug logging
    pub fn with_debug_log(mut self, debug_log: Arc<DebugLog>) -> Self {
        self.debug_log = Some(debug_log);
        self
    }

    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    /// Decide what to do with `request` without touching the debug log.
    ///
    /// On `Redirected` with first-visit-only enabled, a marker for the
    /// matched URL has been recorded in `visits`.
    pub fn assess(
        &self,
        request: &RedirectRequest,
        settings: &GlobalSettings,
        visits: &mut dyn VisitTracker,
    ) -> Assessment {
        let assessment = self.decide(request, settings, visits);

        debug!(
            category = assessment.decision.category().as_str(),
            visitor_ip = %assessment.visitor_ip,
            path = %request.path,
            message = %assessment.message,
            "redirect decision"
        );

        assessment
    }

    /// `assess`, then write the debug log line on the calling thread.
    /// Async callers use `assess` followed by `record`.
    pub fn evaluate(
        &self,
        request: &RedirectRequest,
        settings: &GlobalSettings,
        visits: &mut dyn VisitTracker,
    ) -> RedirectDecision {
        let assessment = self.assess(request, settings, visits);

        if let Some(log) = self.log_for(settings) {
            if let Err(e) = log.append(Utc::now(), &assessment.visitor_ip, &assessment.message) {
                warn!(path = %log.path().display(), error = %e, "failed to append to debug log");
            }
        }

        assessment.decision
    }

    /// Append the debug log line for `assessment` from the blocking pool
    pub async fn record(&self, settings: &GlobalSettings, assessment: &Assessment) {
        let Some(log) = self.log_for(settings) else {
            return;
        };

        if let Err(e) = log
            .append_async(
                Utc::now(),
                assessment.visitor_ip.clone(),
                assessment.message.clone(),
            )
            .await
        {
            warn!(path = %log.path().display(), error = %e, "failed to append to debug log");
        }
    }

    fn log_for(&self, settings: &GlobalSettings) -> Option<&Arc<DebugLog>> {
        if !settings.debug_logging_enabled {
            return None;
        }
        self.debug_log.as_ref()
    }

    fn decide(
        &self,
        request: &RedirectRequest,
        settings: &GlobalSettings,
        visits: &mut dyn VisitTracker,
    ) -> Assessment {
        let visitor_ip = extract_visitor_ip(&request.headers, request.remote_addr).unwrap_or_default();

        if request.kind.is_internal() {
            return Assessment::skipped(SkipReason::InternalRequest, &visitor_ip);
        }
        if !settings.redirect_enabled {
            return Assessment::skipped(SkipReason::RedirectDisabled, &visitor_ip);
        }
        if settings.rules.is_empty() {
            return Assessment::skipped(SkipReason::NoRules, &visitor_ip);
        }
        if settings.development_mode && !request.is_admin {
            return Assessment::skipped(SkipReason::DevelopmentMode, &visitor_ip);
        }

        if visitor_ip.is_empty() {
            return Assessment::error(RedirectError::InvalidVisitorIp, &visitor_ip);
        }

        if settings.skip_if_override_param_present && request.has_query_param(OVERRIDE_PARAM) {
            return Assessment::skipped(SkipReason::OverrideParameter, &visitor_ip);
        }

        if settings.skip_for_bots && request.is_bot() {
            return Assessment::skipped(SkipReason::BotDetected, &visitor_ip);
        }

        let country = match self.geo.lookup(&visitor_ip) {
            Ok(country) => country,
            Err(e) => {
                debug!(visitor_ip = %visitor_ip, error = %e, "country lookup failed");
                return Assessment::error(RedirectError::CountryLookup(e), &visitor_ip);
            }
        };

        let mut last_skip: Option<RuleSkip> = None;

        for (index, rule) in settings.rules.iter().enumerate() {
            let current_url = request.current_url(!rule.ignore_query_string_on_match);
            let input = RuleInput {
                current_url: &current_url,
                query_string: request.query_string(),
                visitor_country: &country,
                first_visit_only: settings.first_visit_only,
            };

            match self.matcher.evaluate(rule, &input, &*visits) {
                RuleOutcome::Redirect(destination) => {
                    if settings.first_visit_only {
                        visits.mark_visited(&url_hash(&current_url));
                    }

                    let message = format!(
                        "Redirection succeeded: to {} from {} (rule {}, country {})",
                        destination,
                        current_url,
                        index + 1,
                        country
                    );
                    return Assessment::new(
                        RedirectDecision::Redirected {
                            status: settings.redirect_status_code,
                            destination,
                        },
                        &visitor_ip,
                        message,
                    );
                }
                RuleOutcome::Skip(skip) => {
                    debug!(rule = index + 1, reason = %skip, "rule skipped");
                    last_skip = Some(skip);
                }
                RuleOutcome::NoMatch => {}
            }
        }

        let message = match last_skip {
            Some(skip) => format!("Redirection terminated: {}", skip),
            None => format!("No matching rule for country {}", country),
        };
        Assessment::new(RedirectDecision::NoMatch, &visitor_ip, message)
    }
}
