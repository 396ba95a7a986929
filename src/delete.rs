use crate::{
    errors::NotFoundExt,
    resources::{self, RiffKind},
};
use anyhow::Context as _;
use kube::{
    api::{DeleteParams, DynamicObject, WatchEvent, WatchParams},
    Api, ResourceExt,
};
use std::time::Duration;
use tokio_stream::StreamExt;

const GONE_POLL_ATTEMPTS: usize = 60;

/// Deletes the resource and waits until it is really gone, i.e. all
/// finalizers have run. Deleting a missing resource is an error.
#[tracing::instrument(skip(k))]
pub async fn delete(k: &kube::Client, kind: RiffKind, ns: &str, name: &str) -> anyhow::Result<()> {
    let api = resources::api(k, kind, Some(ns));
    let original_object = api
        .get(name)
        .await
        .with_context(|| format!("{} {} not found", kind, name))?;

    let delete_res = api
        .delete(name, &DeleteParams::background())
        .await
        .context("failed to delete")?;
    if delete_res.is_right() {
        return Ok(());
    }
    if let Err(err) = do_watch(&api, name).await {
        tracing::error!("Watch errored: {:#}", err);
    }

    // either object is finalized, or watch ended early
    for _ in 0..GONE_POLL_ATTEMPTS {
        let current = api.get(name).await.found()?;
        let gone = match current {
            Some(obj) => obj.uid() != original_object.uid(),
            None => true,
        };
        if gone {
            tracing::info!("resource deleted");
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    anyhow::bail!("timeout waiting for {} {} to be deleted", kind, name);
}

async fn do_watch(api: &Api<DynamicObject>, name: &str) -> anyhow::Result<()> {
    let params = WatchParams::default()
        .fields(&format!("metadata.name={}", name))
        .timeout(60);
    let watch = api.watch(&params, "0").await?;
    tokio::pin!(watch);
    while let Some(item) = watch.next().await {
        match item? {
            WatchEvent::Deleted(_) => break,
            WatchEvent::Modified(obj) if obj.finalizers().is_empty() => break,
            _ => (),
        }
    }
    Ok(())
}
