//! Scope checks for guarded operations.
//!
//! # Overview
//!
//! - **[`Guard`]**: wraps operations with a required scope and a [`DenialPolicy`]
//! - **[`DenialPolicy`]**: what to do when the scope is missing (Block, AuditLog or Callback)
//! - **[`ScopedModel`]** / **[`Scoped`]**: the same check at construction time
//! - **[`scope_matches`]**: glob matching of granted patterns against a required scope
//! - **[`PermissionDenied`]**: why a call was refused
//!
//! # Decision order
//!
//! Every guarded call goes through the same steps:
//!
//! 1. No current agent: [`PermissionDenied::NoActiveSession`]
//! 2. Session past its expiry: [`PermissionDenied::SessionExpired`]
//! 3. Scope granted: the operation runs
//! 4. Otherwise the denial policy decides
//!
//! Steps 1 and 2 do not depend on the policy.
//!
//! # Scope patterns
//!
//! | Granted | Required | Matches |
//! |---------|----------|---------|
//! | `read:orders` | `read:orders` | yes |
//! | `read:*` | `read:orders` | yes |
//! | `read:*` | `write:orders` | no |
//! | `read:orders*` | `read:orders_archive` | yes |
//! | `*` | anything | yes |
//!
//! # Example
//!
//! ```rust
//! use agentsudo_core::permission::{DenialPolicy, Guard};
//! use agentsudo_core::Agent;
//!
//! let delete_user = Guard::new("delete:users")
//!     .named("delete_user")
//!     .on_deny(DenialPolicy::AuditLog);
//!
//! let intern = Agent::new("Intern", ["read:users"]);
//! let _session = intern.enter_session();
//!
//! // Logged as an audit violation, but allowed to run
//! assert_eq!(delete_user.invoke(|| "deleted").unwrap(), "deleted");
//! ```

mod error;
mod guard;
mod matcher;
mod scoped;

pub use error::PermissionDenied;
pub use guard::{ApprovalCallback, CallContext, Decision, DenialPolicy, Guard, DEFAULT_OPERATION};
pub use matcher::{pattern_matches, scope_matches};
pub use scoped::{Scoped, ScopedModel};
