//! Tailing logs of the pods that back a riff resource

use crate::errors::{classify_kube, ErrorClass};
use anyhow::Context as _;
use futures::{
    io::AsyncBufReadExt,
    stream::{FuturesUnordered, StreamExt, TryStreamExt},
};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use kube::api::{Api, LogParams, ResourceExt};
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::HashSet;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

/// Containers (init containers first) that have started and so have logs
fn started_containers(pod: &Pod) -> Vec<String> {
    let status = match pod.status.as_ref() {
        Some(status) => status,
        None => return Vec::new(),
    };
    let has_started = |cs: &&ContainerStatus| {
        cs.state
            .as_ref()
            .map_or(false, |state| state.running.is_some() || state.terminated.is_some())
    };
    status
        .init_container_statuses
        .iter()
        .flatten()
        .chain(status.container_statuses.iter().flatten())
        .filter(has_started)
        .map(|cs| cs.name.clone())
        .collect()
}

fn prefix_line(pod: &str, container: &str, line: &str) -> String {
    format!("[{}/{}] {}\n", pod, container, line)
}

async fn stream_container<W: AsyncWrite + Unpin>(
    pods: &Api<Pod>,
    pod: String,
    container: String,
    out: &Mutex<W>,
) -> anyhow::Result<()> {
    let lp = LogParams {
        container: Some(container.clone()),
        follow: true,
        ..Default::default()
    };
    let lines = pods
        .log_stream(&pod, &lp)
        .await
        .with_context(|| format!("failed to stream logs of {}/{}", pod, container))?
        .lines();
    tokio::pin!(lines);
    while let Some(line) = lines.try_next().await? {
        let mut out = out.lock().await;
        out.write_all(prefix_line(&pod, &container, &line).as_bytes())
            .await?;
        out.flush().await?;
    }
    tracing::debug!(pod = pod.as_str(), container = container.as_str(), "log stream ended");
    Ok(())
}

/// Whether the backoff wrapping the pod watch will get past `err`.
///
/// A refused list or watch stays refused, everything else (dropped
/// connections, expired resource versions, apiserver hiccups) is retried.
fn is_transient(err: &watcher::Error) -> bool {
    match err {
        watcher::Error::InitialListFailed(err) | watcher::Error::WatchStartFailed(err) => {
            classify_kube(err) != ErrorClass::Forbidden
        }
        _ => true,
    }
}

/// Streams logs of every container of pods matching `selector` into `out`
/// until `cancel` fires.
///
/// Each container is followed once; pods that show up later are picked up
/// by the watch. A failing container stream is logged and skipped. Pod watch
/// errors are retried unless the apiserver refuses access, and a watch that
/// closes ends the tail with an error.
#[tracing::instrument(skip(client, out, cancel))]
pub async fn tail<W>(
    client: &kube::Client,
    ns: &str,
    selector: &str,
    out: W,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let out = Mutex::new(out);
    let pods = Api::<Pod>::namespaced(client.clone(), ns);
    let watch = watcher(pods.clone(), watcher::Config::default().labels(selector))
        .default_backoff()
        .applied_objects();
    tokio::pin!(watch);

    let mut followed = HashSet::new();
    let mut streams = FuturesUnordered::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(streams = streams.len(), "tail cancelled");
                return Ok(());
            }
            pod = watch.next() => match pod {
                Some(Ok(pod)) => {
                    let name = pod.name_any();
                    for container in started_containers(&pod) {
                        if followed.insert((name.clone(), container.clone())) {
                            tracing::info!(pod = name.as_str(), container = container.as_str(), "following logs");
                            streams.push(stream_container(&pods, name.clone(), container, &out));
                        }
                    }
                }
                Some(Err(err)) if is_transient(&err) => {
                    tracing::warn!("pod watch error, retrying: {:#}", err);
                }
                Some(Err(err)) => return Err(err).context("pod watch failed"),
                None => anyhow::bail!("pod watch closed"),
            },
            Some(res) = streams.next(), if !streams.is_empty() => {
                if let Err(err) = res {
                    tracing::warn!("{:#}", err);
                }
            }
        }
    }
}
