//! Ambient agent sessions.
//!
//! A session makes an agent the "current agent" for a dynamic extent.
//! Guarded operations find their agent through [`current`] instead of
//! taking it as a parameter.
//!
//! The binding lives on a per-thread stack:
//!
//! - [`SessionGuard`] (synchronous) pushes the agent when entered and pops
//!   it on drop. The guard is `!Send`, so it cannot be carried across an
//!   await point into another thread.
//! - [`scope`] (asynchronous) pushes the agent around every poll of the
//!   wrapped future, so the binding follows the task wherever the runtime
//!   polls it and never leaks to other tasks on the same worker thread.
//!
//! Nested sessions restore the outer agent when the inner one ends.
//!
//! A [`SessionGuard`] must not be held across an `.await` inside [`scope`].
//! The per-poll frame of `scope` truncates the stack back to its own depth
//! when each poll returns, so a guard entered inside the future loses its
//! binding at the first suspension. Use a nested [`scope`] instead.
//!
//! Every session open on an agent, on any thread, shares the agent's
//! expiry. The expiry is reset to `now + ttl` when a session starts and
//! cleared when the last open session ends.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::Agent;

thread_local! {
    static CURRENT: RefCell<Vec<Arc<Agent>>> = const { RefCell::new(Vec::new()) };
}

/// The agent visible to the calling execution context, if any.
pub fn current() -> Option<Arc<Agent>> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

/// Run `future` with `agent` as the current agent.
///
/// The session starts when the returned future is first polled and ends
/// when it completes or is dropped.
///
/// Inside `future`, switch agents with a nested `scope`, not a
/// [`SessionGuard`] kept alive across an `.await`.
pub async fn scope<F: Future>(agent: Arc<Agent>, future: F) -> F::Output {
    let _activation = Activation::begin(Arc::clone(&agent));
    Bound {
        agent,
        future: Box::pin(future),
    }
    .await
}

/// A session bound to one agent, not yet entered.
///
/// Created by [`Agent::start_session`].
#[must_use = "a session does nothing until entered"]
pub struct Session {
    agent: Arc<Agent>,
}

impl Session {
    pub(super) fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }

    /// The agent this session is bound to.
    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// Start the session on the current thread.
    ///
    /// Sets the agent's expiry, publishes it as the current agent and logs
    /// `session_start`. Dropping the guard undoes all of it.
    pub fn enter(self) -> SessionGuard {
        let activation = Activation::begin(Arc::clone(&self.agent));
        let frame = Frame::push(self.agent);
        SessionGuard {
            frame,
            activation,
            _not_send: PhantomData,
        }
    }

    /// Run a future inside this session. See [`scope`].
    pub async fn run<F: Future>(self, future: F) -> F::Output {
        scope(self.agent, future).await
    }
}

/// An entered synchronous session. Ends the session when dropped.
#[must_use = "the session ends as soon as the guard is dropped"]
pub struct SessionGuard {
    // Field order matters: the frame is popped before the session is closed.
    frame: Frame,
    activation: Activation,
    _not_send: PhantomData<*const ()>,
}

impl SessionGuard {
    /// The agent this session is bound to.
    pub fn agent(&self) -> &Arc<Agent> {
        &self.activation.agent
    }

    /// End the session now. Equivalent to dropping the guard.
    pub fn end(self) {
        drop(self);
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("agent", &self.activation.agent.name())
            .field("depth", &self.frame.depth)
            .finish()
    }
}

/// Session lifetime: expiry bookkeeping and start/end events.
struct Activation {
    agent: Arc<Agent>,
}

impl Activation {
    fn begin(agent: Arc<Agent>) -> Self {
        agent.begin_session();
        tracing::info!(
            target: "agentsudo::session",
            event = "session_start",
            agent_name = %agent.name(),
            expires_in_seconds = agent.session_ttl().as_secs(),
            "session_start"
        );
        Self { agent }
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        self.agent.end_session();
        tracing::info!(
            target: "agentsudo::session",
            event = "session_end",
            agent_name = %self.agent.name(),
            "session_end"
        );
    }
}

/// One entry on the thread's agent stack.
struct Frame {
    depth: usize,
}

impl Frame {
    fn push(agent: Arc<Agent>) -> Self {
        let depth = CURRENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(agent);
            stack.len() - 1
        });
        Self { depth }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        // Truncating (rather than popping) also discards frames that were
        // leaked above this one, so the stack can never hold a stale agent.
        let _ = CURRENT.try_with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

/// Future adapter that binds an agent around each poll.
///
/// Frames pushed by the inner future during a poll are discarded when the
/// poll returns.
struct Bound<F> {
    agent: Arc<Agent>,
    future: Pin<Box<F>>,
}

impl<F: Future> Future for Bound<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _frame = Frame::push(Arc::clone(&this.agent));
        this.future.as_mut().poll(cx)
    }
}
