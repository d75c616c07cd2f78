//! Search-backend provisioning artifacts
//!
//! Creating an "index" on Elasticsearch/OpenSearch provisions three coupled
//! artifacts, in order:
//!
//! 1. a lifecycle policy `ilm-data-5gb-<idx>`: rollover at 5 GB primary
//!    shard, delete after 90 days (ILM on Elasticsearch, ISM on OpenSearch)
//! 2. a settings component template `ilm-settings-<idx>` binding the policy
//! 3. a mapping component template `mapping-<idx>` carrying shards/replicas
//!    and the field-type projection, then the final index template composing
//!    both at priority 500 with a wildcard pattern
//!
//! Drop reverses the order. "Does the policy exist?" is the canonical
//! idempotency probe for `create_table` on these backends. This module only
//! builds names, paths, and JSON bodies; the connector does the I/O.

use crate::dialect::Dialect;
use dbmark_core::{DataType, Error, Result, TableSpec};
use serde_json::{json, Value as Json};

/// Rollover threshold for the primary shard
const ROLLOVER_SIZE: &str = "5gb";

/// Age at which rolled-over indices are deleted
const DELETE_AFTER: &str = "90d";

/// Composed index template priority
const TEMPLATE_PRIORITY: u32 = 500;

/// Lifecycle policy name for an index
pub fn policy_name(index: &str) -> String {
    format!("ilm-data-5gb-{index}")
}

/// Settings component template name
pub fn settings_component_name(index: &str) -> String {
    format!("ilm-settings-{index}")
}

/// Mapping component template name
pub fn mapping_component_name(index: &str) -> String {
    format!("mapping-{index}")
}

/// REST path of the lifecycle policy
pub fn policy_path(dialect: Dialect, index: &str) -> String {
    match dialect {
        Dialect::OpenSearch => format!("/_plugins/_ism/policies/{}", policy_name(index)),
        _ => format!("/_ilm/policy/{}", policy_name(index)),
    }
}

/// REST path of a component template
pub fn component_template_path(name: &str) -> String {
    format!("/_component_template/{name}")
}

/// REST path of the composed index template
pub fn index_template_path(index: &str) -> String {
    format!("/_index_template/{index}")
}

/// Lifecycle policy body (ILM or ISM depending on dialect)
pub fn policy_body(dialect: Dialect) -> Json {
    match dialect {
        Dialect::OpenSearch => json!({
            "policy": {
                "description": "rollover at 5gb, delete after 90d",
                "default_state": "hot",
                "states": [
                    {
                        "name": "hot",
                        "actions": [
                            { "rollover": { "min_primary_shard_size": ROLLOVER_SIZE } }
                        ],
                        "transitions": [
                            {
                                "state_name": "delete",
                                "conditions": { "min_index_age": DELETE_AFTER }
                            }
                        ]
                    },
                    {
                        "name": "delete",
                        "actions": [ { "delete": {} } ],
                        "transitions": []
                    }
                ]
            }
        }),
        _ => json!({
            "policy": {
                "phases": {
                    "hot": {
                        "actions": {
                            "rollover": { "max_primary_shard_size": ROLLOVER_SIZE }
                        }
                    },
                    "delete": {
                        "min_age": DELETE_AFTER,
                        "actions": { "delete": {} }
                    }
                }
            }
        }),
    }
}

/// Settings component template body binding the policy
pub fn settings_component_body(dialect: Dialect, index: &str) -> Json {
    let settings = match dialect {
        Dialect::OpenSearch => json!({
            "plugins.index_state_management.rollover_alias": index,
        }),
        _ => json!({
            "index.lifecycle.name": policy_name(index),
            "index.lifecycle.rollover_alias": index,
        }),
    };
    json!({ "template": { "settings": settings } })
}

/// Field-type projection for the mapping template
fn field_mapping(dialect: Dialect, dtype: DataType) -> Result<Json> {
    let mapped = match dtype {
        DataType::Uuid | DataType::String => json!({ "type": "keyword" }),
        DataType::DateTime | DataType::DateTimeNs => json!({ "type": "date_nanos" }),
        DataType::Boolean => json!({ "type": "boolean" }),
        DataType::Id | DataType::Int | DataType::BigInt => json!({ "type": "long" }),
        DataType::Json => json!({ "type": "object", "enabled": true }),
        DataType::Vector(dim) => match dialect {
            Dialect::OpenSearch => json!({ "type": "knn_vector", "dimension": dim }),
            _ => json!({
                "type": "dense_vector",
                "dims": dim,
                "index": true,
                "similarity": "l2_norm"
            }),
        },
        DataType::Blob => {
            return Err(Error::Migration(format!(
                "blob columns cannot be mapped on {dialect}"
            )))
        }
    };
    Ok(mapped)
}

/// Mapping component template body: shards/replicas plus field projection.
/// Subtable columns map as dotted nested properties.
pub fn mapping_component_body(dialect: Dialect, spec: &TableSpec) -> Result<Json> {
    let mut properties = serde_json::Map::new();
    for col in &spec.columns {
        properties.insert(col.name.clone(), field_mapping(dialect, col.dtype)?);
    }
    for sub in &spec.subtables {
        let mut nested = serde_json::Map::new();
        for col in &sub.columns {
            nested.insert(col.name.clone(), field_mapping(dialect, col.dtype)?);
        }
        properties.insert(
            sub.name.clone(),
            json!({ "type": "object", "properties": Json::Object(nested) }),
        );
    }
    Ok(json!({
        "template": {
            "settings": {
                "number_of_shards": spec.resilience.shards,
                "number_of_replicas": spec.resilience.replicas
            },
            "mappings": { "properties": Json::Object(properties) }
        }
    }))
}

/// Composed index template body
pub fn index_template_body(index: &str) -> Json {
    json!({
        "index_patterns": [format!("{index}*")],
        "data_stream": {},
        "composed_of": [settings_component_name(index), mapping_component_name(index)],
        "priority": TEMPLATE_PRIORITY
    })
}

/// Create order: policy, settings component, mapping component, template
pub fn create_paths(dialect: Dialect, index: &str) -> Vec<String> {
    vec![
        policy_path(dialect, index),
        component_template_path(&settings_component_name(index)),
        component_template_path(&mapping_component_name(index)),
        index_template_path(index),
    ]
}

/// Drop order: data stream, index template, settings component, policy
pub fn drop_paths(dialect: Dialect, index: &str) -> Vec<String> {
    vec![
        format!("/_data_stream/{index}"),
        index_template_path(index),
        component_template_path(&mapping_component_name(index)),
        component_template_path(&settings_component_name(index)),
        policy_path(dialect, index),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmark_core::{ColumnDef, Resilience};

    fn spec() -> TableSpec {
        let mut s = TableSpec::new(
            "perf_index",
            vec![
                ColumnDef::indexed("id", DataType::BigInt),
                ColumnDef::indexed("uuid", DataType::Uuid),
                ColumnDef::indexed("start_time", DataType::DateTime),
                ColumnDef::new("flag", DataType::Boolean),
                ColumnDef::indexed("embedding", DataType::Vector(384)),
            ],
        );
        s.resilience = Resilience {
            shards: 3,
            replicas: 1,
        };
        s
    }

    #[test]
    fn artifact_names() {
        assert_eq!(policy_name("idx"), "ilm-data-5gb-idx");
        assert_eq!(settings_component_name("idx"), "ilm-settings-idx");
        assert_eq!(mapping_component_name("idx"), "mapping-idx");
    }

    #[test]
    fn policy_paths_differ_per_engine() {
        assert_eq!(
            policy_path(Dialect::Elasticsearch, "idx"),
            "/_ilm/policy/ilm-data-5gb-idx"
        );
        assert_eq!(
            policy_path(Dialect::OpenSearch, "idx"),
            "/_plugins/_ism/policies/ilm-data-5gb-idx"
        );
    }

    #[test]
    fn ilm_policy_shape() {
        let body = policy_body(Dialect::Elasticsearch);
        assert_eq!(
            body["policy"]["phases"]["hot"]["actions"]["rollover"]["max_primary_shard_size"],
            json!("5gb")
        );
        assert_eq!(body["policy"]["phases"]["delete"]["min_age"], json!("90d"));
    }

    #[test]
    fn ism_policy_shape() {
        let body = policy_body(Dialect::OpenSearch);
        assert_eq!(body["policy"]["default_state"], json!("hot"));
        assert_eq!(
            body["policy"]["states"][0]["actions"][0]["rollover"]["min_primary_shard_size"],
            json!("5gb")
        );
    }

    #[test]
    fn mapping_projection() {
        let body = mapping_component_body(Dialect::Elasticsearch, &spec()).unwrap();
        let props = &body["template"]["mappings"]["properties"];
        assert_eq!(props["id"]["type"], json!("long"));
        assert_eq!(props["uuid"]["type"], json!("keyword"));
        assert_eq!(props["start_time"]["type"], json!("date_nanos"));
        assert_eq!(props["flag"]["type"], json!("boolean"));
        assert_eq!(props["embedding"]["type"], json!("dense_vector"));
        assert_eq!(props["embedding"]["dims"], json!(384));
        assert_eq!(body["template"]["settings"]["number_of_shards"], json!(3));
        assert_eq!(body["template"]["settings"]["number_of_replicas"], json!(1));
    }

    #[test]
    fn opensearch_vectors_use_knn_vector() {
        let body = mapping_component_body(Dialect::OpenSearch, &spec()).unwrap();
        let props = &body["template"]["mappings"]["properties"];
        assert_eq!(props["embedding"]["type"], json!("knn_vector"));
        assert_eq!(props["embedding"]["dimension"], json!(384));
    }

    #[test]
    fn template_composition() {
        let body = index_template_body("perf_index");
        assert_eq!(body["index_patterns"], json!(["perf_index*"]));
        assert_eq!(
            body["composed_of"],
            json!(["ilm-settings-perf_index", "mapping-perf_index"])
        );
        assert_eq!(body["priority"], json!(500));
    }

    #[test]
    fn create_and_drop_orders_mirror() {
        let create = create_paths(Dialect::Elasticsearch, "idx");
        assert_eq!(create[0], "/_ilm/policy/ilm-data-5gb-idx");
        assert_eq!(create[3], "/_index_template/idx");
        let drop = drop_paths(Dialect::Elasticsearch, "idx");
        assert_eq!(drop[0], "/_data_stream/idx");
        assert_eq!(drop.last().unwrap(), "/_ilm/policy/ilm-data-5gb-idx");
    }

    #[test]
    fn subtables_nest_as_object_properties() {
        let mut s = spec();
        s.subtables.push(TableSpec::new(
            "origin",
            vec![ColumnDef::new("host", DataType::String)],
        ));
        let body = mapping_component_body(Dialect::Elasticsearch, &s).unwrap();
        let props = &body["template"]["mappings"]["properties"];
        assert_eq!(props["origin"]["properties"]["host"]["type"], json!("keyword"));
    }
}
