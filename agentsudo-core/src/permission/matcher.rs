//! Scope matching.
//!
//! A granted scope is a shell-style glob pattern; a required scope is the
//! plain string being tested against it. `write:*` grants `write:refunds`,
//! `read:orders*` grants `read:orders_archive`, and `*` grants everything.

use std::collections::HashSet;

use glob::{MatchOptions, Pattern};

/// Options used for every scope comparison.
///
/// Scopes are not paths, so `*` crosses `/` and leading dots carry no
/// special meaning. Matching is case-sensitive.
const SCOPE_MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Check whether any granted pattern satisfies the required scope.
///
/// An exact string match always wins, even when `required` itself contains
/// glob metacharacters. Otherwise each granted scope is compiled as a glob
/// pattern and tested against `required`. The result does not depend on
/// iteration order.
///
/// # Example
///
/// ```rust
/// use std::collections::HashSet;
/// use agentsudo_core::permission::scope_matches;
///
/// let granted: HashSet<String> = ["read:*".to_string()].into_iter().collect();
/// assert!(scope_matches(&granted, "read:orders"));
/// assert!(!scope_matches(&granted, "write:orders"));
/// ```
pub fn scope_matches(granted: &HashSet<String>, required: &str) -> bool {
    if granted.contains(required) {
        return true;
    }

    granted
        .iter()
        .any(|pattern| pattern_matches(pattern, required))
}

/// Test a single granted pattern against a required scope.
///
/// Patterns that fail to compile (an unclosed `[`, for instance) only
/// match by exact equality.
pub fn pattern_matches(pattern: &str, required: &str) -> bool {
    if pattern == required {
        return true;
    }

    match Pattern::new(&collapse_stars(pattern)) {
        Ok(compiled) => compiled.matches_with(required, SCOPE_MATCH_OPTIONS),
        Err(_) => false,
    }
}

/// Reduce runs of `*` to a single `*`.
///
/// A run of stars means the same thing as one star for scope matching,
/// but the glob crate reserves `**` for recursive path components and
/// rejects it anywhere else.
fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut previous_star = false;
    for c in pattern.chars() {
        if c == '*' {
            if previous_star {
                continue;
            }
            previous_star = true;
        } else {
            previous_star = false;
        }
        out.push(c);
    }
    out
}
