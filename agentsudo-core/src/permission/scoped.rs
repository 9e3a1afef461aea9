//! Scope checks at construction time.
//!
//! A type implementing [`ScopedModel`] declares the scope an agent needs in
//! order to build a value of it. [`ScopedModel::validate`] runs the same
//! session, expiry and scope checks as a blocking [`Guard`](super::Guard);
//! there is no audit or callback mode on this path.
//!
//! [`Scoped<T>`] runs the check as part of deserialization, so a request
//! body parsed into `Scoped<RefundParams>` fails unless the current agent
//! may issue refunds.
//!
//! ```rust
//! use agentsudo_core::{Agent, Scoped, ScopedModel};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct RefundParams {
//!     order_id: String,
//!     amount: u32,
//! }
//!
//! impl ScopedModel for RefundParams {
//!     const REQUIRED_SCOPE: Option<&'static str> = Some("write:refunds");
//! }
//!
//! let json = r#"{"order_id": "A-17", "amount": 25}"#;
//!
//! let bot = Agent::new("SupportBot", ["write:refunds"]);
//! let _session = bot.enter_session();
//! let params: Scoped<RefundParams> = serde_json::from_str(json).unwrap();
//! assert_eq!(params.order_id, "A-17");
//! ```

use std::ops::Deref;

use serde::{Deserialize, Deserializer};

use super::error::PermissionDenied;
use super::guard::active_agent;
use crate::events::{DecisionEvent, DecisionKind};
use crate::telemetry;

/// A type whose construction requires a scope.
pub trait ScopedModel: Sized {
    /// Scope the current agent must hold. `None` disables the check.
    const REQUIRED_SCOPE: Option<&'static str>;

    /// Name used in audit records and error messages.
    fn model_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Check the current agent and hand the value back if it may hold it.
    fn validate(self) -> Result<Self, PermissionDenied> {
        check_model::<Self>()?;
        Ok(self)
    }
}

fn check_model<M: ScopedModel>() -> Result<(), PermissionDenied> {
    let Some(scope) = M::REQUIRED_SCOPE else {
        return Ok(());
    };
    let model = M::model_name();
    let agent = active_agent(model)?;

    if agent.has_scope(scope) {
        telemetry::emit(
            None,
            DecisionEvent::new(&agent, scope, model, DecisionKind::ModelAccessGranted),
        );
        return Ok(());
    }

    telemetry::emit(
        None,
        DecisionEvent::new(&agent, scope, model, DecisionKind::ModelAccessDenied),
    );
    Err(PermissionDenied::ScopeDenied {
        agent: agent.name().to_string(),
        scope: scope.to_string(),
        granted: agent.scopes(),
        target: Some(model.to_string()),
    })
}

/// A deserialized value that passed its [`ScopedModel`] check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoped<T>(T);

impl<T> Scoped<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Scoped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for Scoped<T>
where
    T: ScopedModel + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = T::deserialize(deserializer)?;
        value.validate().map(Scoped).map_err(serde::de::Error::custom)
    }
}
