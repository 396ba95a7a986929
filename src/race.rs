//! Racing readiness against a log tail.
//!
//! `create --tail` style commands want two things at once: wait until the
//! new resource reports Ready, and show the logs of its pods meanwhile.
//! [`run`] drives both under one cancellation source so that whichever side
//! decides the outcome also stops the other one.

use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;

/// Why the race did not end with a ready resource.
#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    /// Readiness was not observed in time.
    #[error("timeout after {0:?}")]
    DeadlineExceeded(Duration),
    /// Parent token was cancelled (e.g. Ctrl-C).
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Wait(anyhow::Error),
    #[error("failed to tail logs: {0:#}")]
    Tail(anyhow::Error),
}

impl RaceError {
    /// Callers print their own message for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RaceError::DeadlineExceeded(_))
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(t) if !t.is_zero() => tokio::time::sleep(t).await,
        _ => futures::future::pending().await,
    }
}

/// Runs `wait` and `tail` concurrently until `wait` decides.
///
/// Both closures receive a child token of `parent` and must return soon
/// after it is cancelled. A zero or absent `timeout` waits forever.
/// Before returning the token is cancelled and every participant that is
/// still running is driven to completion, so nothing keeps writing after
/// the race is over.
///
/// An error from `tail` fails the race; a tail that simply ends (the log
/// stream closed) leaves the race waiting for readiness.
#[tracing::instrument(skip(parent, wait, tail))]
pub async fn run<W, WF, T, TF>(
    parent: &CancellationToken,
    timeout: Option<Duration>,
    wait: W,
    tail: T,
) -> Result<(), RaceError>
where
    W: FnOnce(CancellationToken) -> WF,
    WF: Future<Output = anyhow::Result<()>>,
    T: FnOnce(CancellationToken) -> TF,
    TF: Future<Output = anyhow::Result<()>>,
{
    let cancel = parent.child_token();
    let wait_fut = wait(cancel.clone());
    let tail_fut = tail(cancel.clone());
    let deadline_exceeded = deadline(timeout);
    tokio::pin!(wait_fut, tail_fut, deadline_exceeded);

    let mut wait_done = false;
    let mut tail_done = false;
    let outcome = loop {
        tokio::select! {
            biased;
            _ = parent.cancelled() => break Err(RaceError::Cancelled),
            _ = &mut deadline_exceeded => {
                break Err(RaceError::DeadlineExceeded(timeout.unwrap_or_default()))
            }
            res = &mut wait_fut, if !wait_done => {
                wait_done = true;
                break res.map_err(RaceError::Wait);
            }
            res = &mut tail_fut, if !tail_done => {
                tail_done = true;
                match res {
                    Ok(()) => tracing::debug!("log tail finished before the resource became ready"),
                    Err(err) => break Err(RaceError::Tail(err)),
                }
            }
        }
    };

    cancel.cancel();
    if !wait_done {
        if let Err(err) = wait_fut.await {
            tracing::debug!("wait stopped: {:#}", err);
        }
    }
    if !tail_done {
        if let Err(err) = tail_fut.await {
            tracing::debug!("tail stopped: {:#}", err);
        }
    }
    outcome
}
