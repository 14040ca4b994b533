pub mod decision;
pub mod settings;

pub use decision::{DecisionCategory, RedirectDecision, RedirectError, RuleSkip, SkipReason};
pub use settings::{GlobalSettings, MatchCondition, RedirectRule, RedirectStatus, SettingsError};
