use crate::{
    errors::{classify_kube, ErrorClass},
    resources::{self, RiffKind},
};
use anyhow::Context;
use kube::api::{DynamicObject, Patch, PatchParams, PostParams, ResourceExt};

/// Defines how exactly resources should be applied
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Return an error if resource with the same name already exists
    Create,
    /// Apply resource as a server-side apply patch
    Apply { field_manager: String },
}

/// Utility for creating riff resources in cluster
pub struct Applier {
    client: kube::Client,
    default_namespace: String,
    strategy: Strategy,
}

/// Parses a single-document manifest and checks that it describes `kind`.
pub fn parse_manifest(kind: RiffKind, manifest: &str) -> anyhow::Result<DynamicObject> {
    let obj: DynamicObject =
        serde_yaml::from_str(manifest).context("manifest is not a valid resource")?;
    let types = obj.types.as_ref().context("manifest misses apiVersion and kind")?;
    let expected = kind.api_resource();
    if types.kind != expected.kind || types.api_version != expected.api_version {
        anyhow::bail!(
            "manifest describes {} {}, expected {} {}",
            types.api_version,
            types.kind,
            expected.api_version,
            expected.kind
        );
    }
    if obj.metadata.name.is_none() {
        anyhow::bail!("manifest must set metadata.name");
    }
    Ok(obj)
}

/// YAML shown for dry runs
pub fn render(obj: &DynamicObject) -> anyhow::Result<String> {
    serde_yaml::to_string(obj).context("failed to serialize resource")
}

/// Explains the rejections users can act on
fn rejected(err: kube::Error, action: &str, kind: RiffKind, name: &str, ns: &str) -> anyhow::Error {
    let msg = match classify_kube(&err) {
        ErrorClass::AlreadyExists => format!("{} {} already exists in namespace {}", kind, name, ns),
        ErrorClass::Conflict => format!(
            "{} {} has fields owned by another field manager",
            kind, name
        ),
        _ => format!("failed to {} {} {}", action, kind, name),
    };
    anyhow::Error::new(err).context(msg)
}

impl Applier {
    /// Creates a new applier, connected to cluster
    pub fn new(client: kube::Client, default_namespace: &str, strategy: Strategy) -> Self {
        Applier {
            client,
            default_namespace: default_namespace.to_string(),
            strategy,
        }
    }

    /// Applies a resource, defaulting its namespace
    #[tracing::instrument(skip(self, resource), fields(name = resource.name_any().as_str()))]
    pub async fn apply(
        &self,
        kind: RiffKind,
        mut resource: DynamicObject,
    ) -> anyhow::Result<DynamicObject> {
        let ns = resource
            .metadata
            .namespace
            .get_or_insert_with(|| self.default_namespace.clone())
            .clone();
        let api = resources::api(&self.client, kind, Some(&ns));

        let name = resource.name_any();
        let created = match &self.strategy {
            Strategy::Create => api
                .create(&PostParams::default(), &resource)
                .await
                .map_err(|err| rejected(err, "create", kind, &name, &ns))?,
            Strategy::Apply { field_manager } => api
                .patch(&name, &PatchParams::apply(field_manager), &Patch::Apply(&resource))
                .await
                .map_err(|err| rejected(err, "apply", kind, &name, &ns))?,
        };
        tracing::info!(namespace = ns.as_str(), strategy = ?self.strategy, "applied resource");
        Ok(created)
    }
}
