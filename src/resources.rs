//! Kinds of riff resources and how to reach them through the dynamic API.

use crate::health::Health;
use anyhow::Context as _;
use comfy_table::{presets::NOTHING, Attribute, Cell, Table};
use kube::api::{Api, ApiResource, DynamicObject, ListParams, ResourceExt};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub const VERSION: &str = "v1alpha1";

/// Every custom resource kind riff manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum RiffKind {
    Application,
    Function,
    Handler,
    Stream,
    Processor,
    Provider,
    Deployer,
    Configurer,
}

impl RiffKind {
    pub fn group(self) -> &'static str {
        match self {
            RiffKind::Application | RiffKind::Function => "build.projectriff.io",
            RiffKind::Handler => "request.projectriff.io",
            RiffKind::Stream | RiffKind::Processor | RiffKind::Provider => {
                "streaming.projectriff.io"
            }
            RiffKind::Deployer => "core.projectriff.io",
            RiffKind::Configurer => "knative.projectriff.io",
        }
    }

    /// Kind as it appears in manifests, e.g. `Function`
    pub fn kind(self) -> &'static str {
        match self {
            RiffKind::Application => "Application",
            RiffKind::Function => "Function",
            RiffKind::Handler => "Handler",
            RiffKind::Stream => "Stream",
            RiffKind::Processor => "Processor",
            RiffKind::Provider => "Provider",
            RiffKind::Deployer => "Deployer",
            RiffKind::Configurer => "Configurer",
        }
    }

    pub fn plural(self) -> String {
        format!("{}s", self)
    }

    /// Name of the CRD declaring this kind
    pub fn crd_name(self) -> String {
        format!("{}.{}", self.plural(), self.group())
    }

    pub fn api_resource(self) -> ApiResource {
        ApiResource {
            group: self.group().to_string(),
            version: VERSION.to_string(),
            api_version: format!("{}/{}", self.group(), VERSION),
            kind: self.kind().to_string(),
            plural: self.plural(),
        }
    }

    /// Label put on every pod created on behalf of the resource
    pub fn pod_selector(self, name: &str) -> String {
        format!("{}/{}={}", self.group(), self, name)
    }

    pub fn all() -> impl Iterator<Item = RiffKind> {
        RiffKind::iter()
    }
}

/// Returns api for the given kind, either namespaced or cluster-wide
pub fn api(client: &kube::Client, kind: RiffKind, ns: Option<&str>) -> Api<DynamicObject> {
    let ar = kind.api_resource();
    match ns {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &ar),
        None => Api::all_with(client.clone(), &ar),
    }
}

/// Lists resources of `kind`; `ns == None` means all namespaces
#[tracing::instrument(skip(client))]
pub async fn list(
    client: &kube::Client,
    kind: RiffKind,
    ns: Option<&str>,
) -> anyhow::Result<Vec<DynamicObject>> {
    let list = api(client, kind, ns)
        .list(&ListParams::default())
        .await
        .with_context(|| format!("failed to list {}", kind.plural()))?;
    tracing::debug!(count = list.items.len(), "listed resources");
    Ok(list.items)
}

/// Table of resources with their readiness
pub fn table(items: &[DynamicObject], show_namespace: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(NOTHING);
    let mut header = Vec::new();
    if show_namespace {
        header.push(Cell::new("NAMESPACE").add_attribute(Attribute::Bold));
    }
    for title in ["NAME", "READY", "REASON"] {
        header.push(Cell::new(title).add_attribute(Attribute::Bold));
    }
    table.set_header(header);

    for item in items {
        let health = item.health();
        let mut row = Vec::new();
        if show_namespace {
            row.push(Cell::new(item.namespace().unwrap_or_default()));
        }
        row.push(Cell::new(item.name_any()));
        row.push(Cell::new(health.as_column()));
        row.push(Cell::new(health.reason()));
        table.add_row(row);
    }
    table
}
