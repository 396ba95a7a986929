//! Access statuses and the rule for merging them

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Verbs checked for every resource, in the order reviews are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Delete,
    Patch,
    Watch,
}

impl Verb {
    pub fn all() -> impl Iterator<Item = Verb> {
        Verb::iter()
    }

    /// Read verbs only observe state; everything else is a write
    pub fn is_read(self) -> bool {
        matches!(self, Verb::Get | Verb::List | Verb::Watch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum AccessStatus {
    #[default]
    Undefined,
    Allowed,
    Denied,
    /// Some verbs allowed, some denied
    Mixed,
    /// The custom resource is not installed
    Missing,
}

impl AccessStatus {
    /// Maps one access review answer to a status.
    ///
    /// Only an explicit answer counts. RBAC usually refuses a verb with
    /// `allowed=false` and no `denied` flag at all (only an authorizer that
    /// denies outright sets it), so against such clusters a refused verb
    /// surfaces here as an ambiguous review error rather than `Denied`.
    pub fn from_review(allowed: bool, denied: bool) -> anyhow::Result<Self> {
        match (allowed, denied) {
            (true, false) => Ok(AccessStatus::Allowed),
            (false, true) => Ok(AccessStatus::Denied),
            (allowed, denied) => anyhow::bail!(
                "ambiguous access review: allowed={}, denied={}",
                allowed,
                denied
            ),
        }
    }

    /// Folds the status of one more verb into `self`.
    pub fn combine(self, other: AccessStatus) -> AccessStatus {
        match (self, other) {
            (AccessStatus::Undefined, other) => other,
            (current, other) if current != other => AccessStatus::Mixed,
            (current, _) => current,
        }
    }
}
