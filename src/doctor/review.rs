//! Asking the apiserver what the current user may do

use super::{access::Verb, ServerResource};
use anyhow::Context as _;
use async_trait::async_trait;
use k8s_openapi::api::{
    authorization::v1::{ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec},
    core::v1::Namespace,
};
use kube::api::{Api, ListParams, PostParams, ResourceExt};

/// Answer to a single access review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewResponse {
    pub allowed: bool,
    pub denied: bool,
}

/// Cluster queries the doctor relies on
#[async_trait]
pub trait AccessReviewer {
    async fn list_namespaces(&self) -> anyhow::Result<Vec<String>>;

    async fn crd_exists(&self, name: &str) -> anyhow::Result<bool>;

    async fn review(&self, resource: &ServerResource, verb: Verb) -> anyhow::Result<ReviewResponse>;
}

/// Reviewer backed by the real cluster
pub struct KubeReviewer {
    client: kube::Client,
}

impl KubeReviewer {
    pub fn new(client: kube::Client) -> Self {
        KubeReviewer { client }
    }
}

fn make_review(resource: &ServerResource, verb: Verb) -> SelfSubjectAccessReview {
    let namespace = if resource.namespace.is_empty() {
        None
    } else {
        Some(resource.namespace.clone())
    };
    SelfSubjectAccessReview {
        spec: SelfSubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                namespace,
                group: Some(resource.group.clone()),
                resource: Some(resource.resource.clone()),
                verb: Some(verb.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[async_trait]
impl AccessReviewer for KubeReviewer {
    async fn list_namespaces(&self) -> anyhow::Result<Vec<String>> {
        let api = Api::<Namespace>::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .context("failed to list namespaces")?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn crd_exists(&self, name: &str) -> anyhow::Result<bool> {
        crate::crds::exists(&self.client, name).await
    }

    /// An absent `denied` in the answer is reported as `false`; see
    /// [`AccessStatus::from_review`](super::AccessStatus::from_review) for
    /// what that means for RBAC refusals.
    async fn review(&self, resource: &ServerResource, verb: Verb) -> anyhow::Result<ReviewResponse> {
        let api = Api::<SelfSubjectAccessReview>::all(self.client.clone());
        let review = api
            .create(&PostParams::default(), &make_review(resource, verb))
            .await
            .with_context(|| format!("failed to review access to {} {}", verb, resource.resource))?;
        let status = review
            .status
            .context("apiserver answered with an empty review status")?;
        tracing::trace!(resource = resource.resource.as_str(), verb = %verb, status = ?status, "access review");
        Ok(ReviewResponse {
            allowed: status.allowed,
            denied: status.denied.unwrap_or(false),
        })
    }
}
