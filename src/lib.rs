//! Client library behind the `riff` command line tool.
//!
//! Most of it is thin plumbing over the Kubernetes API; the interesting
//! parts are [`race`], which waits for readiness while tailing logs, and
//! [`doctor`], which checks an installation and the caller's access to it.
pub mod applier;
pub mod crds;
pub mod delete;
pub mod doctor;
pub mod errors;
pub mod health;
pub mod logs;
pub mod race;
pub mod resources;
pub mod wait;

#[cfg(test)]
mod testing;

use anyhow::Context as _;

/// Connects to the cluster from kubeconfig or in-cluster environment.
pub async fn connect() -> anyhow::Result<kube::Client> {
    let client = kube::Client::try_default()
        .await
        .context("failed to connect to kubernetes; is kubeconfig set up?")?;
    tracing::debug!(namespace = client.default_namespace(), "connected to cluster");
    Ok(client)
}
