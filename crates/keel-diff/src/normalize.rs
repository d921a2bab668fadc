//! Spec normalization before comparison.
//!
//! Live resources carry fields the cluster populates itself; comparing
//! them against declared manifests would report permanent phantom drift.
//! [`normalize`] strips those fields so comparison sees only what an
//! author can declare.

use serde_json::Value;

/// Top-level fields populated by the cluster, never declared.
const SERVER_FIELDS: &[&str] = &["status"];

/// Metadata fields populated by the cluster.
const SERVER_METADATA_FIELDS: &[&str] = &[
    "resourceVersion",
    "uid",
    "generation",
    "creationTimestamp",
    "managedFields",
];

/// Returns a copy of `spec` with server-populated fields removed.
#[must_use]
pub fn normalize(spec: &Value) -> Value {
    let mut normalized = spec.clone();
    if let Value::Object(map) = &mut normalized {
        for field in SERVER_FIELDS {
            map.remove(*field);
        }
        if let Some(Value::Object(metadata)) = map.get_mut("metadata") {
            for field in SERVER_METADATA_FIELDS {
                metadata.remove(*field);
            }
            if metadata.is_empty() {
                map.remove("metadata");
            }
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_status() {
        let spec = json!({
            "replicas": 3,
            "status": {"readyReplicas": 1}
        });
        assert_eq!(normalize(&spec), json!({"replicas": 3}));
    }

    #[test]
    fn strips_server_metadata_fields() {
        let spec = json!({
            "metadata": {
                "labels": {"app": "web"},
                "resourceVersion": "12345",
                "uid": "abc-def",
                "generation": 7,
                "creationTimestamp": "2026-01-01T00:00:00Z",
                "managedFields": []
            },
            "replicas": 3
        });
        assert_eq!(
            normalize(&spec),
            json!({
                "metadata": {"labels": {"app": "web"}},
                "replicas": 3
            })
        );
    }

    #[test]
    fn removes_metadata_when_only_server_fields_remain() {
        let spec = json!({
            "metadata": {"resourceVersion": "1"},
            "replicas": 3
        });
        assert_eq!(normalize(&spec), json!({"replicas": 3}));
    }

    #[test]
    fn leaves_declared_fields_alone() {
        let spec = json!({"replicas": 3, "image": "web:v1"});
        assert_eq!(normalize(&spec), spec);
    }

    #[test]
    fn non_object_specs_pass_through() {
        assert_eq!(normalize(&json!(null)), json!(null));
        assert_eq!(normalize(&json!([1, 2])), json!([1, 2]));
    }
}
