pub mod debug_log;
pub mod engine;
pub mod matcher;
pub mod middleware;
pub mod request;
pub mod routes;
pub mod visits;

pub use debug_log::DebugLog;
pub use engine::{Assessment, RedirectEngine};
pub use matcher::{RuleInput, RuleMatcher, RuleOutcome};
pub use middleware::{geo_redirect, RedirectState};
pub use request::{RedirectRequest, RequestClassifier, RequestKind};
pub use routes::{create_site_router, with_geo_redirect};
pub use visits::{CookieVisitTracker, VisitSigner, VisitTracker};
