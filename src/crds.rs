use crate::errors::NotFoundExt;
use anyhow::Context;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::Api;

/// Checks whether the CRD named `name` (e.g. `functions.build.projectriff.io`)
/// is installed. Absence is reported as `Ok(false)`, not as an error.
pub async fn exists(k: &kube::Client, name: &str) -> anyhow::Result<bool> {
    let crds_api = Api::<CustomResourceDefinition>::all(k.clone());
    let crd = crds_api
        .get(name)
        .await
        .found()
        .with_context(|| format!("failed to fetch CRD {}", name))?;
    tracing::debug!(crd = name, found = crd.is_some(), "looked up CRD");
    Ok(crd.is_some())
}
