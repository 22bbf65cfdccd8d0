//! Concurrent resolution of collected tasks.
//!
//! Every task becomes one unit of work. Units run concurrently on the calling
//! task, not in parallel on other threads: they borrow their targets from the
//! caller's struct and are polled together by one `FuturesUnordered`, so
//! synchronous provider work is serialized. Units share a single [`Scope`] and
//! each one walks the same states:
//!
//! ```text
//! Pending -> Opening -> Fetching -> Decoding -> Done
//! ```
//!
//! Any state can fail instead. A unit only starts if its scope is still live
//! when the units are created. The first failure cancels the scope so units
//! still blocked on a provider give up early, while operations that complete
//! without blocking finish normally. All units are awaited before
//! [`resolve`] returns.

use crate::collect::Task;
use crate::variable::{Opener, Value, Variable};
use crate::{Result, SecretStructError};
use futures::TryFutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation scope shared by the units of one call.
///
/// Only ever cancelled, never reset.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    pub fn new(token: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { token, deadline }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fails if the scope was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(SecretStructError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(SecretStructError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Runs a blocking provider operation unless the scope ends first.
    ///
    /// An operation that is ready as soon as it is polled always wins over
    /// cancellation.
    pub async fn run<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            result = operation => result,
            _ = self.token.cancelled() => Err(SecretStructError::Cancelled),
            _ = expired(self.deadline) => Err(SecretStructError::DeadlineExceeded),
        }
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Converts a snapshot value into the text written to a field.
pub fn into_text(value: Option<Value>) -> Result<String> {
    match value {
        None => Err(SecretStructError::InvalidLatestValue),
        Some(Value::Text(text)) => Ok(text),
        Some(Value::Bytes(bytes)) => {
            String::from_utf8(bytes).map_err(|_| SecretStructError::TypeMismatch {
                type_name: "non-UTF-8 bytes".to_string(),
            })
        }
        Some(other) => Err(SecretStructError::TypeMismatch {
            type_name: other.type_name().to_string(),
        }),
    }
}

/// Resolves a single task: open, fetch once, write, close.
///
/// The variable is closed on every path once it was opened. A close failure
/// is appended to the unit's result and never replaces an earlier error.
#[tracing::instrument(skip_all, fields(field = task.name))]
pub async fn resolve_task(scope: &Scope, opener: &dyn Opener, task: Task<'_>) -> Result<()> {
    tracing::debug!("opening variable");
    let locator = task.locator.as_str();
    let mut variable = scope
        .run(async {
            opener
                .open(locator)
                .await
                .map_err(|source| SecretStructError::Open {
                    locator: locator.to_string(),
                    source,
                })
        })
        .await?;

    let result = fetch(scope, variable.as_mut(), task).await;
    let closed = variable.close().await.map_err(SecretStructError::Close);
    if let Err(err) = &closed {
        tracing::debug!(error = %err, "closing variable failed");
    }
    SecretStructError::append(result, closed)
}

async fn fetch(scope: &Scope, variable: &mut dyn Variable, task: Task<'_>) -> Result<()> {
    tracing::debug!("fetching latest value");
    let snapshot = scope
        .run(async { variable.latest().await.map_err(SecretStructError::Fetch) })
        .await?;

    tracing::debug!("decoding value");
    let text = into_text(snapshot.value)?;
    task.set(text);
    Ok(())
}

/// Resolves all tasks concurrently.
///
/// Returns the only failure, or [`SecretStructError::Multiple`] with the
/// first failure (in completion order) first. Every failure is wrapped with
/// the name of its field.
pub async fn resolve(scope: &Scope, opener: &dyn Opener, tasks: Vec<Task<'_>>) -> Result<()> {
    let mut units: FuturesUnordered<_> = tasks
        .into_iter()
        .map(|task| {
            let name = task.name;
            let started = scope.check();
            async move {
                started?;
                resolve_task(scope, opener, task).await
            }
            .map_err(move |err: SecretStructError| err.in_field(name))
        })
        .collect();

    let mut errors = Vec::new();
    while let Some(result) = units.next().await {
        if let Err(err) = result {
            if errors.is_empty() {
                tracing::debug!(error = %err, "cancelling remaining fields");
                scope.cancel();
            }
            errors.push(err);
        }
    }

    match SecretStructError::from_errors(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
