//! Input and output guardrails for conversational agents.
//!
//! Scopes decide what an agent may *do*; guardrails decide what it may be
//! *asked*. A [`Guardrails`] value screens text for prompt injection,
//! blocked patterns and keywords, off-topic requests and custom rules, and
//! reacts to a violation according to its [`ViolationPolicy`].
//!
//! Guardrails can be attached to an [`Agent`](crate::Agent) and applied to
//! the current agent with [`check_input`].
//!
//! # Example
//!
//! ```rust
//! use agentsudo_core::guardrails::{check_input, Guardrails, InputCheck, ViolationPolicy};
//! use agentsudo_core::Agent;
//!
//! let rails = Guardrails::new()
//!     .allowed_topics(["divorce", "custody", "alimony"])
//!     .on_violation(ViolationPolicy::Redirect)
//!     .redirect_message("I can only help with family law questions.");
//!
//! let agent = Agent::builder("FamilyLawBot").guardrails(rails).build();
//! let _session = agent.enter_session();
//!
//! assert_eq!(check_input("How is alimony calculated?").unwrap(), InputCheck::Passed);
//! assert_eq!(
//!     check_input("Write me a poem about the ocean please").unwrap(),
//!     InputCheck::Violated {
//!         redirect: Some("I can only help with family law questions.".to_string())
//!     }
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::agent::current;

/// Default reply for [`ViolationPolicy::Redirect`].
pub const DEFAULT_REDIRECT_MESSAGE: &str = "I can only help with topics related to my expertise.";

/// Inputs shorter than this pass the topic check as follow-ups ("yes", "ok").
const SHORT_INPUT_CHARS: usize = 20;

const PREVIEW_CHARS: usize = 100;

lazy_static! {
    /// Common prompt injection phrasings, always checked.
    static ref INJECTION_PATTERNS: Vec<Regex> = [
        r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+(instructions?|prompts?|rules?)",
        r"(?i)disregard\s+(all\s+)?(previous|prior|above|your)",
        r"(?i)forget\s+(everything|all|your)(\s+you)?(\s+were)?(\s+told)?",
        r"(?i)pretend\s+(you\s+are|to\s+be|you're)",
        r"(?i)act\s+as\s+(if|though)?\s*(you\s+are|a|an)",
        r"(?i)you\s+are\s+now\s+(a|an|in)",
        r"(?i)new\s+(instructions?|rules?|persona)",
        r"(?i)system\s*:\s*",
        r"(?i)\[system\]",
        r"(?i)override\s+(your|the|all)\s+(instructions?|rules?|restrictions?)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid injection regex"))
    .collect();
}

/// A custom text check. Return false to reject.
pub type Validator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Raised by [`ViolationPolicy::Raise`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct GuardrailViolation {
    pub reason: String,
}

/// How a guardrail violation is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViolationPolicy {
    /// Log at error level and return [`GuardrailViolation`] (default).
    #[default]
    Raise,
    /// Log at warn level and let the text through.
    Log,
    /// Log at info level and answer with the redirect message instead.
    Redirect,
}

/// Result of screening input that did not raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCheck {
    /// No rule was broken.
    Passed,
    /// A rule was broken; `redirect` holds the reply to give instead, if any.
    Violated { redirect: Option<String> },
}

impl InputCheck {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Text screening rules.
#[derive(Clone)]
pub struct Guardrails {
    allowed_topics: Vec<String>,
    blocked_patterns: Vec<Regex>,
    blocked_keywords: Vec<String>,
    input_validator: Option<Validator>,
    output_validator: Option<Validator>,
    on_violation: ViolationPolicy,
    redirect_message: String,
}

impl Guardrails {
    /// Only the built-in injection checks, raising on violation.
    pub fn new() -> Self {
        Self {
            allowed_topics: Vec::new(),
            blocked_patterns: Vec::new(),
            blocked_keywords: Vec::new(),
            input_validator: None,
            output_validator: None,
            on_violation: ViolationPolicy::default(),
            redirect_message: DEFAULT_REDIRECT_MESSAGE.to_string(),
        }
    }

    /// Require input to mention one of these topics (case-insensitive).
    pub fn allowed_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_topics
            .extend(topics.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    /// Reject input matching any of these regular expressions.
    pub fn blocked_patterns<I, S>(mut self, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.blocked_patterns.push(Regex::new(pattern.as_ref())?);
        }
        Ok(self)
    }

    /// Reject input containing any of these words (case-insensitive).
    pub fn blocked_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blocked_keywords
            .extend(keywords.into_iter().map(|k| k.as_ref().to_lowercase()));
        self
    }

    pub fn input_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.input_validator = Some(Arc::new(validator));
        self
    }

    pub fn output_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.output_validator = Some(Arc::new(validator));
        self
    }

    pub fn on_violation(mut self, policy: ViolationPolicy) -> Self {
        self.on_violation = policy;
        self
    }

    pub fn redirect_message(mut self, message: impl Into<String>) -> Self {
        self.redirect_message = message.into();
        self
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.on_violation
    }

    /// Screen input. `Err` carries the reason for the first rule broken.
    ///
    /// Rules run in order: injection patterns, blocked patterns, blocked
    /// keywords, allowed topics, custom validator.
    pub fn validate_input(&self, input: &str) -> Result<(), String> {
        if let Some(pattern) = INJECTION_PATTERNS.iter().find(|p| p.is_match(input)) {
            return Err(format!("Potential prompt injection detected: {}", pattern.as_str()));
        }

        if let Some(pattern) = self.blocked_patterns.iter().find(|p| p.is_match(input)) {
            return Err(format!("Input matches blocked pattern: {}", pattern.as_str()));
        }

        let lowered = input.to_lowercase();
        if let Some(keyword) = self.blocked_keywords.iter().find(|k| lowered.contains(k.as_str())) {
            return Err(format!("Input contains blocked keyword: {}", keyword));
        }

        if !self.allowed_topics.is_empty() {
            let on_topic = self.allowed_topics.iter().any(|t| lowered.contains(t.as_str()));
            let follow_up = input.trim().chars().count() < SHORT_INPUT_CHARS;
            if !on_topic && !follow_up {
                return Err(format!(
                    "Input not related to allowed topics: {:?}",
                    self.allowed_topics
                ));
            }
        }

        if let Some(validator) = &self.input_validator {
            if !validator(input) {
                return Err("Input rejected by custom validator".to_string());
            }
        }

        Ok(())
    }

    /// Screen output with the custom output validator, if any.
    pub fn validate_output(&self, output: &str) -> Result<(), String> {
        match &self.output_validator {
            Some(validator) if !validator(output) => {
                Err("Output rejected by custom validator".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Apply the violation policy.
    ///
    /// `Ok(None)` lets the text through, `Ok(Some(message))` replaces the
    /// response with the redirect message.
    pub fn handle_violation(
        &self,
        reason: &str,
        text: &str,
    ) -> Result<Option<String>, GuardrailViolation> {
        let agent_name = current()
            .map(|agent| agent.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let preview = preview(text);

        match self.on_violation {
            ViolationPolicy::Log => {
                tracing::warn!(
                    target: "agentsudo::guardrails",
                    event = "guardrail_violation",
                    agent_name = %agent_name,
                    reason,
                    input_preview = %preview,
                    "guardrail_violation"
                );
                Ok(None)
            }
            ViolationPolicy::Redirect => {
                tracing::info!(
                    target: "agentsudo::guardrails",
                    event = "guardrail_violation",
                    agent_name = %agent_name,
                    reason,
                    input_preview = %preview,
                    "guardrail_violation"
                );
                Ok(Some(self.redirect_message.clone()))
            }
            ViolationPolicy::Raise => {
                tracing::error!(
                    target: "agentsudo::guardrails",
                    event = "guardrail_violation",
                    agent_name = %agent_name,
                    reason,
                    input_preview = %preview,
                    "guardrail_violation"
                );
                Err(GuardrailViolation {
                    reason: reason.to_string(),
                })
            }
        }
    }

    /// Screen `input`, run `respond` on it, then screen the response.
    ///
    /// A redirect short-circuits with the redirect message; under
    /// [`ViolationPolicy::Log`] everything runs as if nothing happened.
    pub fn apply<F>(&self, input: &str, respond: F) -> Result<String, GuardrailViolation>
    where
        F: FnOnce(&str) -> String,
    {
        if let Err(reason) = self.validate_input(input) {
            if let Some(redirect) = self.handle_violation(&reason, input)? {
                return Ok(redirect);
            }
        }

        let output = respond(input);

        if let Err(reason) = self.validate_output(&output) {
            if let Some(redirect) = self.handle_violation(&reason, &output)? {
                return Ok(redirect);
            }
        }
        Ok(output)
    }

    /// Screen input and apply the policy in one step.
    pub fn check(&self, input: &str) -> Result<InputCheck, GuardrailViolation> {
        match self.validate_input(input) {
            Ok(()) => Ok(InputCheck::Passed),
            Err(reason) => Ok(InputCheck::Violated {
                redirect: self.handle_violation(&reason, input)?,
            }),
        }
    }
}

impl Default for Guardrails {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Guardrails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guardrails")
            .field("allowed_topics", &self.allowed_topics)
            .field(
                "blocked_patterns",
                &self.blocked_patterns.iter().map(Regex::as_str).collect::<Vec<_>>(),
            )
            .field("blocked_keywords", &self.blocked_keywords)
            .field("input_validator", &self.input_validator.is_some())
            .field("output_validator", &self.output_validator.is_some())
            .field("on_violation", &self.on_violation)
            .finish()
    }
}

/// Screen input with the current agent's guardrails.
///
/// Passes when there is no current agent or it has no guardrails.
pub fn check_input(input: &str) -> Result<InputCheck, GuardrailViolation> {
    match current() {
        Some(agent) => match agent.guardrails() {
            Some(rails) => rails.check(input),
            None => Ok(InputCheck::Passed),
        },
        None => Ok(InputCheck::Passed),
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
