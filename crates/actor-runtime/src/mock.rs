//! # Mock Actors & Testing Guide
//!
//! `MockActor<H>` hands out a real [`ActorRef<H>`](crate::ActorRef) whose mailbox is
//! served by a scripted task instead of the handler. Code under test talks to it exactly
//! as it would talk to the production actor, while the test decides every reply.
//!
//! ## When to use Mocks vs Real Actors
//!
//! | Feature | MockActor | Real Actor |
//! |---------|-----------|------------|
//! | **Speed** | Instant (no handler) | Fast (handler + state) |
//! | **Determinism** | Scripted replies | Depends on state |
//! | **State** | None (expectations) | Real state management |
//! | **Use Case** | Testing code *around* the actor | Testing the handler itself or full system |
//! | **Error Injection** | Easy (`drop_reply`, `stop`) | Hard (requires specific state) |
//!
//! ## Testing Strategies
//!
//! <details>
//! <summary><b>Pattern 0: Client Logic Test (Pure Mock)</b></summary>
//!
//! **When to use**: Testing orchestration logic in a client wrapper without running the
//! real handler.
//!
//! ```rust
//! use actor_runtime::mock::MockActor;
//! use actor_runtime::FnHandler;
//! use std::time::Duration;
//!
//! type Echo = FnHandler<(), String, String, fn((), String) -> ((), Option<String>)>;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 1. Setup Mock
//!     let mut mock = MockActor::<Echo>::new();
//!     mock.expect_ask().return_reply("pong".to_string());
//!
//!     // 2. Exercise the reference
//!     let reply = mock
//!         .actor_ref()
//!         .ask("ping".to_string(), Duration::from_secs(1))
//!         .await
//!         .unwrap();
//!
//!     // 3. Check
//!     assert_eq!(reply, "pong");
//!     assert_eq!(mock.received(), vec!["ping".to_string()]);
//!     mock.verify();
//! }
//! ```
//! </details>
//!
//! <details>
//! <summary><b>Pattern 1: Single Actor Test (Fast, Isolated)</b></summary>
//!
//! Spawn the real handler with `Actor::new(..)` and `()` as context. See the unit tests in
//! the `actor` module.
//! </details>
//!
//! <details>
//! <summary><b>Pattern 2: Actor with Mocked Dependencies (Sweet Spot)</b></summary>
//!
//! Run the real actor under test and inject `MockActor` references into its `Context`.
//! See `tests/ledger_actor_test.rs` in the runtime-sample crate.
//! </details>
//!
//! <details>
//! <summary><b>Pattern 3: Full System Integration Test (Comprehensive)</b></summary>
//!
//! Build everything through [`ActorSystem`](crate::ActorSystem). See
//! `tests/integration_test.rs`.
//! </details>

use crate::handler::Handler;
use crate::message::{Envelope, Mail};
use crate::reference::{ActorId, ActorRef};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What the mock does with the next message it receives.
enum Expectation<H: Handler> {
    /// Reply to an `ask` with this value.
    Reply(H::Reply),
    /// Accept a `send`; there is nothing to reply to.
    Accept,
    /// Drop the reply channel, as an unresponsive actor would.
    DropReply,
}

struct Script<H: Handler> {
    expectations: VecDeque<Expectation<H>>,
    received: Vec<H::Message>,
    unexpected: Vec<String>,
    stopped: bool,
}

/// A scripted stand-in for an actor.
///
/// # Example
/// ```ignore
/// let mut mock = MockActor::<LedgerHandler>::new();
/// mock.expect_ask().return_reply(LedgerReply::Balance(100));
/// mock.expect_send();
///
/// let reference = mock.actor_ref();
/// // Use reference in tests...
/// mock.verify(); // Ensures all expectations were met
/// ```
pub struct MockActor<H: Handler> {
    reference: ActorRef<H>,
    script: Arc<Mutex<Script<H>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<H: Handler> Default for MockActor<H>
where
    H::Message: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handler> MockActor<H>
where
    H::Message: Clone,
{
    /// Creates a new mock with no expectations.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<Mail<H>>(100);
        let script = Arc::new(Mutex::new(Script {
            expectations: VecDeque::new(),
            received: Vec::new(),
            unexpected: Vec::new(),
            stopped: false,
        }));
        let script_clone = script.clone();

        // Spawn background task to serve the mailbox
        let handle = tokio::spawn(async move {
            while let Some(mail) = receiver.recv().await {
                let mut script = script_clone.lock().unwrap();
                let Envelope { payload, reply_to } = match mail {
                    Mail::Stop => {
                        script.stopped = true;
                        break;
                    }
                    Mail::Deliver(envelope) => envelope,
                };
                let expectation = script.expectations.pop_front();
                script.received.push(payload.clone());

                match (reply_to, expectation) {
                    (Some(reply_to), Some(Expectation::Reply(reply))) => {
                        let _ = reply_to.send(reply);
                    }
                    (Some(_), Some(Expectation::DropReply))
                    | (None, Some(Expectation::Accept)) => {}
                    (reply_to, expectation) => {
                        let described = match expectation {
                            None => "nothing",
                            Some(Expectation::Reply(_)) => "an ask",
                            Some(Expectation::Accept) => "a send",
                            Some(Expectation::DropReply) => "an ask (dropped reply)",
                        };
                        let kind = if reply_to.is_some() { "ask" } else { "send" };
                        script
                            .unexpected
                            .push(format!("{kind} of {payload:?} while expecting {described}"));
                    }
                }
            }
        });

        Self {
            reference: ActorRef::new(ActorId::next(), sender),
            script,
            _handle: handle,
        }
    }

    /// Returns the reference for use in tests.
    pub fn actor_ref(&self) -> ActorRef<H> {
        self.reference.clone()
    }

    /// Expects an `ask`.
    pub fn expect_ask(&mut self) -> AskExpectationBuilder<H> {
        AskExpectationBuilder {
            script: self.script.clone(),
        }
    }

    /// Expects a fire-and-forget `send`.
    pub fn expect_send(&mut self) {
        self.script
            .lock()
            .unwrap()
            .expectations
            .push_back(Expectation::Accept);
    }

    /// Every message delivered so far, in arrival order.
    pub fn received(&self) -> Vec<H::Message> {
        self.script.lock().unwrap().received.clone()
    }

    /// Whether a stop request reached the mock.
    pub fn was_stopped(&self) -> bool {
        self.script.lock().unwrap().stopped
    }

    /// Verifies that all expectations were met and nothing unexpected arrived.
    pub fn verify(&self) {
        let script = self.script.lock().unwrap();
        if !script.unexpected.is_empty() {
            panic!("Unexpected messages: {:?}", script.unexpected);
        }
        if !script.expectations.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining",
                script.expectations.len()
            );
        }
    }
}

/// Builder for `ask` expectations.
pub struct AskExpectationBuilder<H: Handler> {
    script: Arc<Mutex<Script<H>>>,
}

impl<H: Handler> AskExpectationBuilder<H> {
    /// Sets the expectation to reply with `reply`.
    pub fn return_reply(self, reply: H::Reply) {
        let mut script = self.script.lock().unwrap();
        script.expectations.push_back(Expectation::Reply(reply));
    }

    /// Sets the expectation to answer without a reply, so the caller sees
    /// [`ActorError::AskTimedOut`](crate::ActorError::AskTimedOut).
    pub fn drop_reply(self) {
        let mut script = self.script.lock().unwrap();
        script.expectations.push_back(Expectation::DropReply);
    }
}
