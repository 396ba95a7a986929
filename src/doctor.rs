//! Checking that riff is installed and usable by the current user.
//!
//! The doctor first makes sure the namespaces of the platform exist, then
//! issues one self access review per verb for every resource riff touches
//! and folds the answers into a read and a write status per resource.
mod access;
mod report;
mod review;

pub use self::access::{AccessStatus, Verb};
pub use self::report::RenderOptions;
pub use self::review::{AccessReviewer, KubeReviewer, ReviewResponse};

use crate::resources::RiffKind;

/// Namespaces a working installation must have
pub const REQUIRED_NAMESPACES: [&str; 4] =
    ["istio-system", "knative-build", "knative-serving", "riff-system"];

/// Resource kind whose access is checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResource {
    /// Empty means all namespaces
    pub namespace: String,
    /// API group as sent to the apiserver
    pub group: String,
    /// API group as printed
    pub display_group: String,
    pub resource: String,
    /// Defined by a CRD, which has to exist before access is checked
    pub custom: bool,
}

impl ServerResource {
    pub fn core(namespace: &str, resource: &str) -> Self {
        ServerResource {
            namespace: namespace.to_string(),
            group: String::new(),
            display_group: "core".to_string(),
            resource: resource.to_string(),
            custom: false,
        }
    }

    pub fn custom(namespace: &str, group: &str, resource: &str) -> Self {
        ServerResource {
            namespace: namespace.to_string(),
            group: group.to_string(),
            display_group: group.to_string(),
            resource: resource.to_string(),
            custom: true,
        }
    }

    pub fn crd_name(&self) -> String {
        format!("{}.{}", self.resource, self.group)
    }
}

/// Resources riff reads and writes in `namespace`
pub fn default_checks(namespace: &str) -> Vec<ServerResource> {
    let mut checks = vec![
        ServerResource::core(namespace, "configmaps"),
        ServerResource::core(namespace, "secrets"),
        ServerResource::core(namespace, "pods"),
    ];
    checks.extend(
        RiffKind::all().map(|kind| ServerResource::custom(namespace, kind.group(), &kind.plural())),
    );
    checks
}

/// One row of the access report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub resource: ServerResource,
    pub read: AccessStatus,
    pub write: AccessStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessSummary {
    pub statuses: Vec<Status>,
}

impl AccessSummary {
    pub fn is_healthy(&self) -> bool {
        self.statuses
            .iter()
            .all(|s| s.read == AccessStatus::Allowed && s.write == AccessStatus::Allowed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceSummary {
    /// Required namespace and whether it exists
    pub namespaces: Vec<(String, bool)>,
}

impl NamespaceSummary {
    pub fn is_healthy(&self) -> bool {
        self.namespaces.iter().all(|(_, present)| *present)
    }
}

/// Existence of the CRDs behind custom resources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrdSummary {
    pub crds: Vec<(String, bool)>,
}

impl CrdSummary {
    pub fn is_healthy(&self) -> bool {
        self.crds.iter().all(|(_, present)| *present)
    }
}

/// Marks which of the `required` namespaces exist.
#[tracing::instrument(skip(reviewer))]
pub async fn check_namespaces<R: AccessReviewer + ?Sized>(
    reviewer: &R,
    required: &[&str],
) -> anyhow::Result<NamespaceSummary> {
    let existing = reviewer.list_namespaces().await?;
    let namespaces = required
        .iter()
        .map(|ns| (ns.to_string(), existing.iter().any(|e| e == ns)))
        .collect();
    Ok(NamespaceSummary { namespaces })
}

async fn check_resource<R: AccessReviewer + ?Sized>(
    reviewer: &R,
    resource: &ServerResource,
) -> anyhow::Result<Status> {
    let mut status = Status {
        resource: resource.clone(),
        read: AccessStatus::Undefined,
        write: AccessStatus::Undefined,
    };
    if resource.custom && !reviewer.crd_exists(&resource.crd_name()).await? {
        tracing::debug!(crd = resource.crd_name().as_str(), "custom resource is not installed");
        status.read = AccessStatus::Missing;
        status.write = AccessStatus::Missing;
        return Ok(status);
    }
    for verb in Verb::all() {
        let answer = reviewer.review(resource, verb).await?;
        let access = AccessStatus::from_review(answer.allowed, answer.denied)?;
        if verb.is_read() {
            status.read = status.read.combine(access);
        } else {
            status.write = status.write.combine(access);
        }
    }
    Ok(status)
}

/// Computes read and write access for every resource, in input order.
/// Any failed review aborts the whole computation.
#[tracing::instrument(skip(reviewer, checks), fields(resources = checks.len()))]
pub async fn compute_access_summary<R: AccessReviewer + ?Sized>(
    reviewer: &R,
    checks: &[ServerResource],
) -> anyhow::Result<AccessSummary> {
    let mut statuses = Vec::with_capacity(checks.len());
    for resource in checks {
        statuses.push(check_resource(reviewer, resource).await?);
    }
    Ok(AccessSummary { statuses })
}

/// Checks which CRDs behind the custom resources in `checks` are installed.
pub async fn compute_crd_summary<R: AccessReviewer + ?Sized>(
    reviewer: &R,
    checks: &[ServerResource],
) -> anyhow::Result<CrdSummary> {
    let mut crds = Vec::new();
    for resource in checks.iter().filter(|r| r.custom) {
        let name = resource.crd_name();
        let present = reviewer.crd_exists(&name).await?;
        crds.push((name, present));
    }
    Ok(CrdSummary { crds })
}

/// Result of a doctor run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// Some required namespace is missing; access was not checked
    MissingNamespaces(NamespaceSummary),
    Access {
        namespaces: NamespaceSummary,
        access: AccessSummary,
    },
}

impl Diagnosis {
    pub fn is_healthy(&self) -> bool {
        match self {
            Diagnosis::MissingNamespaces(_) => false,
            Diagnosis::Access { namespaces, access } => {
                namespaces.is_healthy() && access.is_healthy()
            }
        }
    }
}

/// Namespace pre-check followed by the access checks.
pub async fn diagnose<R: AccessReviewer + ?Sized>(
    reviewer: &R,
    required: &[&str],
    checks: &[ServerResource],
) -> anyhow::Result<Diagnosis> {
    let namespaces = check_namespaces(reviewer, required).await?;
    if !namespaces.is_healthy() {
        tracing::info!("required namespaces are missing, skipping access checks");
        return Ok(Diagnosis::MissingNamespaces(namespaces));
    }
    let access = compute_access_summary(reviewer, checks).await?;
    Ok(Diagnosis::Access { namespaces, access })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, sync::Mutex};

    /// In-memory cluster: namespaces, installed CRDs and per-(resource, verb)
    /// answers. Unknown combinations are allowed.
    #[derive(Default)]
    struct FakeReviewer {
        namespaces: Vec<String>,
        crds: Vec<String>,
        answers: HashMap<(String, Verb), ReviewResponse>,
        reviews: Mutex<Vec<(String, Verb)>>,
        fail_reviews: bool,
    }

    const ALLOW: ReviewResponse = ReviewResponse {
        allowed: true,
        denied: false,
    };
    const DENY: ReviewResponse = ReviewResponse {
        allowed: false,
        denied: true,
    };

    impl FakeReviewer {
        fn answer(mut self, resource: &str, verbs: &[Verb], response: ReviewResponse) -> Self {
            for verb in verbs {
                self.answers.insert((resource.to_string(), *verb), response);
            }
            self
        }

        fn review_count(&self) -> usize {
            self.reviews.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl AccessReviewer for FakeReviewer {
        async fn list_namespaces(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.namespaces.clone())
        }

        async fn crd_exists(&self, name: &str) -> anyhow::Result<bool> {
            Ok(self.crds.iter().any(|c| c == name))
        }

        async fn review(
            &self,
            resource: &ServerResource,
            verb: Verb,
        ) -> anyhow::Result<ReviewResponse> {
            if self.fail_reviews {
                anyhow::bail!("connection refused");
            }
            self.reviews
                .lock()
                .unwrap()
                .push((resource.resource.clone(), verb));
            Ok(*self
                .answers
                .get(&(resource.resource.clone(), verb))
                .unwrap_or(&ALLOW))
        }
    }

    fn functions() -> ServerResource {
        ServerResource::custom("default", "build.projectriff.io", "functions")
    }

    #[tokio::test]
    async fn all_allowed_is_healthy() {
        let reviewer = FakeReviewer {
            crds: vec!["functions.build.projectriff.io".to_string()],
            ..Default::default()
        };
        let checks = vec![ServerResource::core("default", "configmaps"), functions()];
        let summary = compute_access_summary(&reviewer, &checks).await.unwrap();
        assert!(summary.is_healthy());
        assert_eq!(summary.statuses.len(), 2);
        assert_eq!(summary.statuses[0].resource.resource, "configmaps");
        assert_eq!(reviewer.review_count(), 2 * 7);
    }

    #[tokio::test]
    async fn denied_resource_is_unhealthy() {
        let reviewer = FakeReviewer {
            crds: vec!["functions.build.projectriff.io".to_string()],
            ..Default::default()
        }
        .answer("functions", &Verb::all().collect::<Vec<_>>(), DENY);
        let checks = vec![ServerResource::core("default", "configmaps"), functions()];
        let summary = compute_access_summary(&reviewer, &checks).await.unwrap();
        assert_eq!(summary.statuses[0].read, AccessStatus::Allowed);
        assert_eq!(summary.statuses[0].write, AccessStatus::Allowed);
        assert_eq!(summary.statuses[1].read, AccessStatus::Denied);
        assert_eq!(summary.statuses[1].write, AccessStatus::Denied);
        assert!(!summary.is_healthy());
    }

    #[tokio::test]
    async fn buckets_are_independent() {
        let reviewer = FakeReviewer::default()
            .answer("secrets", &[Verb::Create, Verb::Delete], DENY)
            .answer("pods", &[Verb::Watch], DENY);
        let checks = vec![
            ServerResource::core("default", "secrets"),
            ServerResource::core("default", "pods"),
        ];
        let summary = compute_access_summary(&reviewer, &checks).await.unwrap();
        assert_eq!(summary.statuses[0].read, AccessStatus::Allowed);
        assert_eq!(summary.statuses[0].write, AccessStatus::Mixed);
        assert_eq!(summary.statuses[1].read, AccessStatus::Mixed);
        assert_eq!(summary.statuses[1].write, AccessStatus::Allowed);
        assert!(!summary.is_healthy());
    }

    #[tokio::test]
    async fn missing_crd_skips_reviews() {
        let reviewer = FakeReviewer::default();
        let summary = compute_access_summary(&reviewer, &[functions()])
            .await
            .unwrap();
        assert_eq!(summary.statuses[0].read, AccessStatus::Missing);
        assert_eq!(summary.statuses[0].write, AccessStatus::Missing);
        assert_eq!(reviewer.review_count(), 0);
        assert!(!summary.is_healthy());
    }

    #[tokio::test]
    async fn ambiguous_review_aborts() {
        let reviewer = FakeReviewer::default().answer(
            "pods",
            &[Verb::List],
            ReviewResponse {
                allowed: false,
                denied: false,
            },
        );
        let checks = vec![ServerResource::core("default", "pods")];
        let err = compute_access_summary(&reviewer, &checks).await.unwrap_err();
        assert!(err.to_string().contains("ambiguous access review"));
    }

    #[tokio::test]
    async fn review_errors_propagate() {
        let reviewer = FakeReviewer {
            fail_reviews: true,
            ..Default::default()
        };
        let checks = vec![ServerResource::core("default", "pods")];
        let err = compute_access_summary(&reviewer, &checks).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }

    #[tokio::test]
    async fn missing_namespace_short_circuits() {
        let reviewer = FakeReviewer {
            namespaces: vec!["a".to_string(), "b".to_string(), "default".to_string()],
            ..Default::default()
        };
        let diagnosis = diagnose(&reviewer, &["a", "b", "c"], &default_checks("default"))
            .await
            .unwrap();
        assert!(!diagnosis.is_healthy());
        match diagnosis {
            Diagnosis::MissingNamespaces(summary) => assert_eq!(
                summary.namespaces,
                vec![
                    ("a".to_string(), true),
                    ("b".to_string(), true),
                    ("c".to_string(), false)
                ]
            ),
            other => panic!("unexpected diagnosis {:?}", other),
        }
        assert_eq!(reviewer.review_count(), 0);
    }

    #[tokio::test]
    async fn healthy_installation() {
        let checks = default_checks("default");
        let reviewer = FakeReviewer {
            namespaces: REQUIRED_NAMESPACES.iter().map(|s| s.to_string()).collect(),
            crds: checks.iter().filter(|c| c.custom).map(|c| c.crd_name()).collect(),
            ..Default::default()
        };
        let diagnosis = diagnose(&reviewer, &REQUIRED_NAMESPACES, &checks)
            .await
            .unwrap();
        assert!(diagnosis.is_healthy());
    }

    #[tokio::test]
    async fn crd_summary_lists_custom_resources_only() {
        let reviewer = FakeReviewer {
            crds: vec!["functions.build.projectriff.io".to_string()],
            ..Default::default()
        };
        let summary = compute_crd_summary(&reviewer, &default_checks("default"))
            .await
            .unwrap();
        assert_eq!(summary.crds.len(), RiffKind::all().count());
        assert!(summary
            .crds
            .contains(&("functions.build.projectriff.io".to_string(), true)));
        assert!(!summary.is_healthy());
    }
}
