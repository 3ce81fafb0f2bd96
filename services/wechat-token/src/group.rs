//! Run group: supervised concurrent actors with joint shutdown.
//!
//! Each actor is a long-running future plus an interrupt. [`Group::run`]
//! starts every actor, waits for the first one to return, interrupts all
//! of them exactly once and then waits for the rest before returning the
//! first actor's result.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::shutdown::Signal;

/// Terminal outcome of an actor, and therefore of the group.
#[derive(Error, Debug)]
pub enum GroupError {
    /// The signal watcher observed a termination signal
    #[error("received signal {0}")]
    Signal(Signal),

    /// An actor failed
    #[error("{actor}: {source}")]
    Actor {
        /// Name the actor was registered under
        actor: &'static str,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// An actor panicked
    #[error("actor {actor} panicked")]
    Panicked {
        /// Name the actor was registered under
        actor: &'static str,
    },

    /// The runtime dropped an actor task
    #[error("actor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl GroupError {
    /// Wrap an actor's failure.
    pub fn actor(actor: &'static str, err: impl Into<anyhow::Error>) -> Self {
        Self::Actor {
            actor,
            source: err.into(),
        }
    }
}

type Interrupt = Box<dyn FnOnce(Option<&GroupError>) + Send>;

struct Actor {
    name: &'static str,
    run: BoxFuture<'static, Result<(), GroupError>>,
    interrupt: Interrupt,
}

/// A set of actors that live and die together.
#[derive(Default)]
pub struct Group {
    actors: Vec<Actor>,
}

impl Group {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor.
    ///
    /// `run` must return once `interrupt` has been called. `interrupt`
    /// receives the group's outcome and may race with `run` returning.
    pub fn add<R, I>(&mut self, name: &'static str, run: R, interrupt: I)
    where
        R: Future<Output = Result<(), GroupError>> + Send + 'static,
        I: FnOnce(Option<&GroupError>) + Send + 'static,
    {
        self.actors.push(Actor {
            name,
            run: Box::pin(run),
            interrupt: Box::new(interrupt),
        });
    }

    /// Number of registered actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether no actor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Run all actors until the first returns.
    ///
    /// Returns `Ok(())` immediately for an empty group.
    ///
    /// # Errors
    ///
    /// Returns the error of the first actor to finish, if it failed.
    pub async fn run(self) -> Result<(), GroupError> {
        if self.actors.is_empty() {
            return Ok(());
        }

        let mut tasks = JoinSet::new();
        let mut names = Vec::with_capacity(self.actors.len());
        let mut interrupts = Vec::with_capacity(self.actors.len());

        for (idx, actor) in self.actors.into_iter().enumerate() {
            let Actor {
                name,
                run,
                interrupt,
            } = actor;
            names.push(name);
            interrupts.push(interrupt);
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(run)
                    .catch_unwind()
                    .await
                    .unwrap_or(Err(GroupError::Panicked { actor: name }));
                (idx, outcome)
            });
        }

        let first = match tasks.join_next().await {
            Some(Ok((idx, outcome))) => {
                info!(actor = names[idx], ok = outcome.is_ok(), "Actor returned, interrupting group");
                outcome
            }
            Some(Err(e)) => Err(GroupError::Join(e)),
            None => Ok(()),
        };

        let cause = first.as_ref().err();
        for interrupt in interrupts {
            interrupt(cause);
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, Ok(()))) => debug!(actor = names[idx], "Actor stopped"),
                Ok((idx, Err(e))) => debug!(actor = names[idx], error = %e, "Actor stopped with error"),
                Err(e) => warn!(error = %e, "Actor task failed during shutdown"),
            }
        }

        first
    }
}
