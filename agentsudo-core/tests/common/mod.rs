//! Common test utilities shared across test files.
//!
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use std::sync::Arc;

use agentsudo_core::Agent;

// ===== Agents =====

/// The read-only analyst used throughout the scenarios.
pub fn analyst() -> Arc<Agent> {
    Agent::new("Analyst", ["read:db"])
}

/// A support agent that can read orders and issue refunds.
pub fn support_bot() -> Arc<Agent> {
    Agent::builder("SupportBot")
        .scopes(["read:orders", "write:refunds"])
        .role("support")
        .build()
}

pub fn current_name() -> Option<String> {
    agentsudo_core::current().map(|agent| agent.name().to_string())
}
