//! Measuring readiness of riff resources

use kube::api::DynamicObject;
use serde::Deserialize;

pub trait HealthSummary {
    fn healthy(&self) -> bool;
}

pub trait Health {
    type Summary: HealthSummary;
    fn health(&self) -> Self::Summary;
}

/// One entry of `.status.conditions`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadySummary {
    /// Ready condition is True
    Ready,
    /// Ready condition is False, reconciliation failed
    Failed {
        reason: Option<String>,
        message: Option<String>,
    },
    /// Condition missing or Unknown
    Pending,
}

impl ReadySummary {
    pub fn reason(&self) -> &str {
        match self {
            ReadySummary::Failed { reason, .. } => reason.as_deref().unwrap_or(""),
            _ => "",
        }
    }

    /// Value for the READY column
    pub fn as_column(&self) -> &'static str {
        match self {
            ReadySummary::Ready => "True",
            ReadySummary::Failed { .. } => "False",
            ReadySummary::Pending => "Unknown",
        }
    }
}

impl HealthSummary for ReadySummary {
    fn healthy(&self) -> bool {
        *self == ReadySummary::Ready
    }
}

fn conditions(obj: &DynamicObject) -> Vec<Condition> {
    obj.data
        .get("status")
        .and_then(|status| status.get("conditions"))
        .and_then(|conds| serde_json::from_value::<Vec<Condition>>(conds.clone()).ok())
        .unwrap_or_default()
}

impl Health for DynamicObject {
    type Summary = ReadySummary;
    fn health(&self) -> ReadySummary {
        let ready = conditions(self).into_iter().find(|c| c.type_ == "Ready");
        match ready {
            Some(cond) if cond.status == "True" => ReadySummary::Ready,
            Some(cond) if cond.status == "False" => ReadySummary::Failed {
                reason: cond.reason,
                message: cond.message,
            },
            _ => ReadySummary::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(status: serde_json::Value) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "build.projectriff.io/v1alpha1",
            "kind": "Function",
            "metadata": { "name": "square", "namespace": "default" },
            "status": status,
        }))
        .unwrap()
    }

    #[test]
    fn ready_true() {
        let obj = object(json!({
            "conditions": [
                { "type": "ImageResolved", "status": "True" },
                { "type": "Ready", "status": "True" },
            ]
        }));
        assert_eq!(obj.health(), ReadySummary::Ready);
        assert!(obj.health().healthy());
    }

    #[test]
    fn ready_false_carries_reason() {
        let obj = object(json!({
            "conditions": [
                { "type": "Ready", "status": "False", "reason": "BuildFailed", "message": "exit 1" },
            ]
        }));
        let health = obj.health();
        assert_eq!(health.reason(), "BuildFailed");
        assert_eq!(health.as_column(), "False");
        assert!(!health.healthy());
    }

    #[test]
    fn no_status_is_pending() {
        let obj = object(json!({}));
        assert_eq!(obj.health(), ReadySummary::Pending);
        let obj = object(json!({ "conditions": [{ "type": "Ready", "status": "Unknown" }] }));
        assert_eq!(obj.health(), ReadySummary::Pending);
    }
}
