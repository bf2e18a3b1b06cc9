//! Pre-LLM rules engine for obvious bulk and automated mail.
//!
//! Runs inside the classification stage, before the model is called:
//! - noreply/no-reply senders → OTHER
//! - Marketing/newsletter domains → OTHER
//! - mailer-daemon / postmaster bounces → OTHER
//! - "Unsubscribe" subjects or footers → OTHER
//!
//! If the rules engine returns a result, the LLM call is skipped entirely.

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{AnalysisResult, Category, EmailInput};

/// Which field a rule matches against.
#[derive(Debug, Clone, Copy)]
pub enum RuleField {
    Sender,
    Subject,
    Body,
}

/// A single spam rule with a compiled regex.
#[derive(Debug, Clone)]
pub struct SpamRule {
    /// Human-readable pattern description.
    pub pattern: String,
    pub regex: Regex,
    pub field: RuleField,
    /// Why this rule triggers.
    pub reason: String,
}

/// Pre-LLM rules engine.
pub struct RulesEngine {
    spam_rules: Vec<SpamRule>,
    /// Senders that always reach the classifier (bypass spam rules).
    always_classify: Vec<Regex>,
}

fn builtin(pattern: &str, regex: &str, field: RuleField, reason: &str) -> SpamRule {
    SpamRule {
        pattern: pattern.into(),
        regex: Regex::new(regex).expect("built-in rule pattern is valid"),
        field,
        reason: reason.into(),
    }
}

impl RulesEngine {
    /// Create a rules engine with the default spam patterns.
    pub fn default_rules() -> Self {
        let spam_rules = vec![
            builtin(
                "noreply@*",
                r"(?i)^no[\-_.]?reply@",
                RuleField::Sender,
                "noreply sender",
            ),
            builtin(
                "*@marketing.*",
                r"(?i)@(marketing|newsletter|promo|campaign)\b",
                RuleField::Sender,
                "marketing/newsletter sender",
            ),
            builtin(
                "mailer-daemon",
                r"(?i)^(mailer[\-_]?daemon|postmaster)@",
                RuleField::Sender,
                "automated mail system",
            ),
            builtin(
                "unsubscribe in subject",
                r"(?i)\bunsubscribe\b",
                RuleField::Subject,
                "newsletter/marketing (unsubscribe in subject)",
            ),
            builtin(
                "unsubscribe footer",
                r"(?i)(click here to unsubscribe|unsubscribe from (this|these|our) (list|mailing|emails?|newsletters?)|manage your subscription|update your (email|mailing) preferences)",
                RuleField::Body,
                "bulk/marketing email (unsubscribe footer)",
            ),
        ];

        Self {
            spam_rules,
            always_classify: Vec::new(),
        }
    }

    /// Add a sender pattern that bypasses the spam rules.
    pub fn add_always_classify(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.always_classify.push(Regex::new(pattern)?);
        Ok(())
    }

    /// Default rules plus an allowlist of sender patterns.
    pub fn with_always_classify(patterns: &[String]) -> Result<Self, regex::Error> {
        let mut engine = Self::default_rules();
        for pattern in patterns {
            engine.add_always_classify(pattern)?;
        }
        Ok(engine)
    }

    /// Evaluate an email against all rules.
    ///
    /// Returns `Some` (category OTHER) when a spam rule matches, `None` to
    /// fall through to the model.
    pub fn evaluate(&self, email: &EmailInput) -> Option<AnalysisResult> {
        if self
            .always_classify
            .iter()
            .any(|r| r.is_match(&email.sender))
        {
            debug!(sender = %email.sender, "Sender bypasses spam rules");
            return None;
        }

        let rule = self.spam_rules.iter().find(|rule| {
            let value = match rule.field {
                RuleField::Sender => &email.sender,
                RuleField::Subject => &email.subject,
                RuleField::Body => &email.body,
            };
            rule.regex.is_match(value)
        })?;

        debug!(
            sender = %email.sender,
            rule = %rule.pattern,
            reason = %rule.reason,
            "Email matched spam rule"
        );
        Some(AnalysisResult {
            category: Category::Other,
            summary: "N/A".to_string(),
            reasoning: format!("rules: {}", rule.reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_email(sender: &str, subject: &str, body: &str) -> EmailInput {
        EmailInput {
            message_id: "test-1".into(),
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    #[test]
    fn flags_noreply() {
        let engine = RulesEngine::default_rules();
        let email = make_email("noreply@portal.edu", "Your account", "Welcome!");
        let result = engine.evaluate(&email).unwrap();
        assert_eq!(result.category, Category::Other);
        assert!(result.reasoning.contains("noreply"));
    }

    #[test]
    fn flags_no_dash_reply() {
        let engine = RulesEngine::default_rules();
        let email = make_email("no-reply@service.io", "Update", "Info");
        assert!(engine.evaluate(&email).is_some());
    }

    #[test]
    fn flags_marketing_domain() {
        let engine = RulesEngine::default_rules();
        let email = make_email("promo@newsletter.books.com", "Sale!", "50% off textbooks");
        assert!(engine.evaluate(&email).is_some());
    }

    #[test]
    fn flags_bounce() {
        let engine = RulesEngine::default_rules();
        let email = make_email("MAILER-DAEMON@uni.edu", "Undeliverable", "Delivery failed");
        assert!(engine.evaluate(&email).is_some());
    }

    #[test]
    fn flags_unsubscribe_footer() {
        let engine = RulesEngine::default_rules();
        let email = make_email(
            "updates@conference.org",
            "Call for papers",
            "Submit now!\n\nClick here to unsubscribe from these emails.",
        );
        assert!(engine.evaluate(&email).is_some());
    }

    #[test]
    fn passes_through_student_email() {
        let engine = RulesEngine::default_rules();
        let email = make_email(
            "student@uni.edu",
            "Leave of absence",
            "How do I apply for a leave of absence next semester?",
        );
        assert!(engine.evaluate(&email).is_none());
    }

    #[test]
    fn always_classify_bypasses_rules() {
        let mut engine = RulesEngine::default_rules();
        engine.add_always_classify(r"(?i)noreply@registrar\.uni\.edu").unwrap();

        let email = make_email("noreply@registrar.uni.edu", "Grades", "Grades posted");
        assert!(engine.evaluate(&email).is_none());
    }

    #[test]
    fn with_always_classify_rejects_bad_pattern() {
        assert!(RulesEngine::with_always_classify(&["(unclosed".to_string()]).is_err());
    }

    #[test]
    fn with_always_classify_keeps_default_rules() {
        let engine =
            RulesEngine::with_always_classify(&[r"(?i)@registrar\.uni\.edu$".to_string()])
                .unwrap();
        let allowed = make_email("noreply@registrar.uni.edu", "Grades", "Grades posted");
        assert!(engine.evaluate(&allowed).is_none());
        let other = make_email("noreply@portal.edu", "Account", "Welcome");
        assert!(engine.evaluate(&other).is_some());
    }

    #[test]
    fn passes_through_meal_plan_opt_out() {
        let engine = RulesEngine::default_rules();
        let email = make_email(
            "student@uni.edu",
            "Meal plan",
            "How do I opt out of the dormitory meal plan?",
        );
        assert!(engine.evaluate(&email).is_none());
    }

    #[test]
    fn passes_through_portal_email_preferences() {
        let engine = RulesEngine::default_rules();
        let email = make_email(
            "student@uni.edu",
            "Portal problem",
            "I cannot change my email preferences on the student portal.",
        );
        assert!(engine.evaluate(&email).is_none());
    }

    #[test]
    fn flags_update_preferences_footer() {
        let engine = RulesEngine::default_rules();
        let email = make_email(
            "events@campus-deals.com",
            "Weekly deals",
            "Great offers inside.\n\nTo stop receiving these, update your email preferences.",
        );
        assert!(engine.evaluate(&email).is_some());
    }
}
