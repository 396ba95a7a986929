use crate::{
    health::{Health, ReadySummary},
    resources::{self, RiffKind},
};
use anyhow::Context as _;
use futures::stream::StreamExt;
use kube::{api::DynamicObject, Api};
use kube_runtime::{watcher, watcher::Event, WatchStreamExt};
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;

pub enum CallbackResponse<T> {
    /// Finish waiting
    Break(T),
    /// Continue waiting
    Continue,
}

/// What the watch observed about the awaited object
pub enum Observed<'a, K> {
    Present(&'a K),
    Deleted(&'a K),
}

pub trait Callback<K> {
    type Break;
    fn exec(&mut self, value: Observed<'_, K>) -> anyhow::Result<CallbackResponse<Self::Break>>;
}

pub struct CallbackFn<F>(F);

impl<K, Break, F> Callback<K> for CallbackFn<F>
where
    F: FnMut(Observed<'_, K>) -> anyhow::Result<CallbackResponse<Break>>,
{
    type Break = Break;
    fn exec(&mut self, value: Observed<'_, K>) -> anyhow::Result<CallbackResponse<Break>> {
        (self.0)(value)
    }
}

pub fn callback_fn<K, Break, F>(func: F) -> CallbackFn<F>
where
    F: FnMut(Observed<'_, K>) -> anyhow::Result<CallbackResponse<Break>>,
{
    CallbackFn(func)
}

/// Watches object `name` until `callback` breaks or `cancel` fires.
///
/// The current state is fetched first, so an object that already satisfies
/// the callback returns without opening a watch.
pub async fn wait<K, C>(
    api: Api<K>,
    callback: &mut C,
    name: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<C::Break>
where
    K: kube::Resource + Clone + Debug + serde::de::DeserializeOwned + Send + 'static,
    C: Callback<K>,
{
    let state = api
        .get(name)
        .await
        .with_context(|| format!("failed to get {}", name))?;
    if let CallbackResponse::Break(b) = callback.exec(Observed::Present(&state))? {
        return Ok(b);
    }

    let cfg = watcher::Config::default().fields(&format!("metadata.name={}", name));
    let watch = watcher(api, cfg).default_backoff();
    tokio::pin!(watch);
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("cancelled while waiting for {}", name),
            item = watch.next() => item,
        };
        let response = match item {
            Some(Ok(Event::Apply(obj))) | Some(Ok(Event::InitApply(obj))) => {
                callback.exec(Observed::Present(&obj))?
            }
            Some(Ok(Event::Delete(obj))) => callback.exec(Observed::Deleted(&obj))?,
            Some(Ok(Event::Init)) | Some(Ok(Event::InitDone)) => CallbackResponse::Continue,
            Some(Err(err)) => {
                tracing::warn!("watch error: {:#}", err);
                CallbackResponse::Continue
            }
            None => anyhow::bail!("watch for {} closed", name),
        };
        if let CallbackResponse::Break(b) = response {
            return Ok(b);
        }
    }
}

/// Decides whether waiting for readiness is over
pub fn readiness(observed: Observed<'_, DynamicObject>) -> anyhow::Result<CallbackResponse<()>> {
    match observed {
        Observed::Deleted(obj) => {
            anyhow::bail!("{} was deleted before becoming ready", describe(obj))
        }
        Observed::Present(obj) => match obj.health() {
            ReadySummary::Ready => Ok(CallbackResponse::Break(())),
            ReadySummary::Pending => Ok(CallbackResponse::Continue),
            ReadySummary::Failed { reason, message } => anyhow::bail!(
                "{} failed to become ready: {}: {}",
                describe(obj),
                reason.unwrap_or_default(),
                message.unwrap_or_default()
            ),
        },
    }
}

fn describe(obj: &DynamicObject) -> String {
    let kind = obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("object");
    format!("{} {}", kind, kube::api::ResourceExt::name_any(obj))
}

/// Waits until the Ready condition of the resource becomes True.
#[tracing::instrument(skip(client, cancel))]
pub async fn wait_ready(
    client: &kube::Client,
    kind: RiffKind,
    ns: &str,
    name: &str,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let api = resources::api(client, kind, Some(ns));
    let mut callback = callback_fn(readiness);
    wait(api, &mut callback, name, &cancel).await?;
    tracing::info!("resource is ready");
    Ok(())
}
