//! Handler extractors for the request's agent.

use std::ops::Deref;
use std::sync::Arc;

use agentsudo_core::Agent;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ServerError;

/// The agent whose session the request runs in.
///
/// Rejects with 401 when the request has no agent.
#[derive(Debug, Clone)]
pub struct CurrentAgent(pub Arc<Agent>);

impl Deref for CurrentAgent {
    type Target = Agent;

    fn deref(&self) -> &Agent {
        &self.0
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentAgent
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        agent_from_parts(parts)
            .map(CurrentAgent)
            .ok_or_else(|| ServerError::Unauthorized("No agent context".to_string()))
    }
}

/// Like [`CurrentAgent`] but never rejects.
#[derive(Debug, Clone)]
pub struct MaybeAgent(pub Option<Arc<Agent>>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAgent(agent_from_parts(parts)))
    }
}

// The session layer stores the agent in the extensions; a session opened
// by the application itself is only visible through the ambient lookup.
fn agent_from_parts(parts: &Parts) -> Option<Arc<Agent>> {
    parts
        .extensions
        .get::<CurrentAgent>()
        .map(|agent| Arc::clone(&agent.0))
        .or_else(agentsudo_core::current)
}
