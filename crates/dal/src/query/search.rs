//! Search-engine request emission for lowered queries
//!
//! Lowers the same [`SelectCtrl`] the SQL path takes into an
//! Elasticsearch/OpenSearch request body: filters into `bool.filter`,
//! negations into `bool.must_not`, projections into `fields` with
//! `_source: false`, orders into `sort` (or a kNN block for `nearest`), and
//! `COUNT(0)` into `_count` routing. A provably-empty predicate returns
//! [`SearchRequest::Empty`] and never touches the network.

use crate::catalog;
use crate::dialect::Dialect;
use crate::query::conditions::{self, CmpOp, Cond, LikeKind, Lowered};
use crate::query::terms::OrderTerm;
use dbmark_core::{Error, Result, SelectCtrl};
use serde_json::{json, Value as Json};

/// Default k for kNN requests with no explicit page limit
const DEFAULT_KNN_K: i64 = 10;

/// A lowered search request
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRequest {
    /// Predicate proven empty; respond with empty rows, no round-trip
    Empty,
    /// Route to `_count` with this body
    Count {
        /// Request body (query only)
        body: Json,
    },
    /// Route to `_search` with this body
    Search {
        /// Request body
        body: Json,
    },
}

/// Build the request for a registered index
pub fn build_search(dialect: Dialect, index: &str, ctrl: &SelectCtrl) -> Result<SearchRequest> {
    let fields = catalog::fields(index)?;
    conditions::check_fields(&fields, ctrl)?;
    let lowered = match conditions::lower_where(&fields, ctrl)? {
        Lowered::Empty => return Ok(SearchRequest::Empty),
        Lowered::Conds(conds) => conds,
    };
    let order = conditions::lower_order(&fields, ctrl)?;

    let query = bool_query(&lowered);

    if ctrl.is_count() {
        let mut body = serde_json::Map::new();
        if let Some(q) = query {
            body.insert("query".into(), q);
        }
        return Ok(SearchRequest::Count { body: Json::Object(body) });
    }

    let mut body = serde_json::Map::new();
    let knn = order.iter().find_map(|o| match o {
        OrderTerm::Nearest { field, vector, .. } => Some((field.clone(), vector.clone())),
        _ => None,
    });

    if let Some((field, vector)) = knn {
        let k = if ctrl.page.limit > 0 {
            ctrl.page.limit
        } else {
            DEFAULT_KNN_K
        };
        match dialect {
            Dialect::OpenSearch => {
                // OpenSearch models kNN as a query clause; pre-filters ride
                // inside it.
                let mut knn_field = serde_json::Map::new();
                knn_field.insert("vector".into(), json!(vector));
                knn_field.insert("k".into(), json!(k));
                if let Some(q) = query {
                    knn_field.insert("filter".into(), q);
                }
                body.insert(
                    "query".into(),
                    json!({ "knn": { field.as_str(): Json::Object(knn_field) } }),
                );
            }
            _ => {
                let mut knn_obj = serde_json::Map::new();
                knn_obj.insert("field".into(), json!(field));
                knn_obj.insert("query_vector".into(), json!(vector));
                knn_obj.insert("k".into(), json!(k));
                knn_obj.insert("num_candidates".into(), json!(k.saturating_mul(10)));
                if let Some(q) = query {
                    knn_obj.insert("filter".into(), q);
                }
                body.insert("knn".into(), Json::Object(knn_obj));
            }
        }
    } else {
        if let Some(q) = query {
            body.insert("query".into(), q);
        }
        let sort: Vec<Json> = order
            .iter()
            .map(|o| match o {
                OrderTerm::Asc(f) => json!({ f.as_str(): { "order": "asc", "missing": "_first" } }),
                OrderTerm::Desc(f) => json!({ f.as_str(): { "order": "desc", "missing": "_last" } }),
                OrderTerm::Nearest { .. } => unreachable!("handled above"),
            })
            .collect();
        if !sort.is_empty() {
            body.insert("sort".into(), Json::Array(sort));
        }
        if ctrl.page.limit > 0 {
            body.insert("size".into(), json!(ctrl.page.limit));
        }
        if ctrl.page.offset > 0 {
            body.insert("from".into(), json!(ctrl.page.offset));
        }
    }

    if !ctrl.fields.is_empty() {
        body.insert("fields".into(), json!(ctrl.fields));
        body.insert("_source".into(), json!(false));
    }

    Ok(SearchRequest::Search { body: Json::Object(body) })
}

/// Build an `_update_by_query` body: the control's WHERE as the query, the
/// SET list as a scripted assignment.
///
/// Returns `Ok(None)` on an empty intersection; nothing would match.
pub fn build_update_by_query(
    index: &str,
    set: &[(String, dbmark_core::Value)],
    ctrl: &SelectCtrl,
) -> Result<Option<Json>> {
    if set.is_empty() {
        return Err(Error::Predicate("update with an empty SET list".into()));
    }
    let fields = catalog::fields(index)?;
    let lowered = match conditions::lower_where(&fields, ctrl)? {
        Lowered::Empty => return Ok(None),
        Lowered::Conds(conds) => conds,
    };
    let mut source = String::new();
    let mut params = serde_json::Map::new();
    for (field, value) in set {
        source.push_str(&format!("ctx._source.{field} = params.{field};"));
        params.insert(field.clone(), value.to_json());
    }
    let mut body = serde_json::Map::new();
    if let Some(q) = bool_query(&lowered) {
        body.insert("query".into(), q);
    }
    body.insert(
        "script".into(),
        json!({ "source": source, "params": Json::Object(params), "lang": "painless" }),
    );
    Ok(Some(Json::Object(body)))
}

/// Render conditions as a `bool` query; `None` when there are none
fn bool_query(conds: &[Cond]) -> Option<Json> {
    if conds.is_empty() {
        return None;
    }
    let mut filter = Vec::new();
    let mut must_not = Vec::new();
    for cond in conds {
        match cond {
            Cond::Cmp { field, op, value } => match op {
                CmpOp::Eq => filter.push(json!({ "term": { field.as_str(): value.to_json() } })),
                CmpOp::Ne => must_not.push(json!({ "term": { field.as_str(): value.to_json() } })),
                CmpOp::Lt => filter.push(json!({ "range": { field.as_str(): { "lt": value.to_json() } } })),
                CmpOp::Le => filter.push(json!({ "range": { field.as_str(): { "lte": value.to_json() } } })),
                CmpOp::Gt => filter.push(json!({ "range": { field.as_str(): { "gt": value.to_json() } } })),
                CmpOp::Ge => filter.push(json!({ "range": { field.as_str(): { "gte": value.to_json() } } })),
            },
            Cond::In { field, values } => {
                let vals: Vec<Json> = values.iter().map(|v| v.to_json()).collect();
                filter.push(json!({ "terms": { field.as_str(): vals } }));
            }
            Cond::Like { field, kind, needle } => {
                let escaped = escape_regex(needle);
                let pattern = match kind {
                    LikeKind::Contains => format!(".*{escaped}.*"),
                    LikeKind::Prefix => format!("{escaped}.*"),
                    LikeKind::Suffix => format!(".*{escaped}"),
                };
                filter.push(json!({ "regexp": { field.as_str(): pattern } }));
            }
            Cond::IsNull { field } => must_not.push(json!({ "exists": { "field": field.as_str() } })),
            Cond::NotNull { field } => filter.push(json!({ "exists": { "field": field.as_str() } })),
        }
    }
    let mut b = serde_json::Map::new();
    if !filter.is_empty() {
        b.insert("filter".into(), Json::Array(filter));
    }
    if !must_not.is_empty() {
        b.insert("must_not".into(), Json::Array(must_not));
    }
    Some(json!({ "bool": Json::Object(b) }))
}

fn escape_regex(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(
            c,
            '.' | '?' | '+' | '*' | '|' | '{' | '}' | '[' | ']' | '(' | ')' | '"' | '\\' | '#'
                | '@' | '&' | '<' | '>' | '~'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmark_core::{ColumnDef, DataType, SelectCtrl, TableSpec};

    fn register() {
        let spec = TableSpec::new(
            "search_emit_test",
            vec![
                ColumnDef::indexed("id", DataType::BigInt),
                ColumnDef::indexed("uuid", DataType::Uuid),
                ColumnDef::indexed("start_time", DataType::DateTime),
                ColumnDef::new("message", DataType::String),
                ColumnDef::indexed("embedding", DataType::Vector(3)),
            ],
        );
        catalog::register(&spec);
    }

    fn body_of(req: SearchRequest) -> Json {
        match req {
            SearchRequest::Search { body } => body,
            other => panic!("expected search request, got {other:?}"),
        }
    }

    #[test]
    fn filters_and_must_not() {
        register();
        let ctrl = SelectCtrl::new()
            .filter("id", vec!["gt(100)"])
            .filter("message", vec!["ne(noise)"]);
        let body = body_of(build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl).unwrap());
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{ "range": { "id": { "gt": 100 } } }])
        );
        assert_eq!(
            body["query"]["bool"]["must_not"],
            json!([{ "term": { "message": "noise" } }])
        );
    }

    #[test]
    fn fields_disable_source() {
        register();
        let ctrl = SelectCtrl::new().with_fields(["id", "uuid"]);
        let body = body_of(build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl).unwrap());
        assert_eq!(body["fields"], json!(["id", "uuid"]));
        assert_eq!(body["_source"], json!(false));
    }

    #[test]
    fn sort_with_missing_placement() {
        register();
        let ctrl = SelectCtrl::new().with_order(["asc(id)", "desc(start_time)"]);
        let body = body_of(build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl).unwrap());
        assert_eq!(
            body["sort"],
            json!([
                { "id": { "order": "asc", "missing": "_first" } },
                { "start_time": { "order": "desc", "missing": "_last" } }
            ])
        );
    }

    #[test]
    fn knn_block_replaces_sort() {
        register();
        let ctrl = SelectCtrl::new()
            .with_fields(["id", "embedding"])
            .with_order(["nearest(embedding;L2;[0.1,0.2,0.3])"]);
        let body = body_of(build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl).unwrap());
        assert_eq!(body["knn"]["field"], json!("embedding"));
        assert_eq!(body["knn"]["query_vector"], json!([0.1f32, 0.2f32, 0.3f32]));
        assert!(body.get("sort").is_none(), "sort must be absent: {body}");
        assert!(body.get("query").is_none());
    }

    #[test]
    fn opensearch_knn_is_a_query_clause() {
        register();
        let ctrl = SelectCtrl::new()
            .with_order(["nearest(embedding;L2;[0.1,0.2,0.3])"])
            .with_limit(5);
        let body = body_of(build_search(Dialect::OpenSearch, "search_emit_test", &ctrl).unwrap());
        assert_eq!(body["query"]["knn"]["embedding"]["k"], json!(5));
        assert!(body.get("knn").is_none());
    }

    #[test]
    fn count_routing() {
        register();
        let ctrl = SelectCtrl::new()
            .with_fields(["COUNT(0)"])
            .filter("id", vec!["gt(5)"]);
        match build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl).unwrap() {
            SearchRequest::Count { body } => {
                assert!(body.get("query").is_some());
                assert!(body.get("fields").is_none());
            }
            other => panic!("expected count routing, got {other:?}"),
        }
    }

    #[test]
    fn empty_intersection_shortcuts() {
        register();
        let mut ctrl = SelectCtrl::new().filter("id", vec!["gt(129)", "le(121)"]);
        ctrl.optimize_conditions = true;
        assert_eq!(
            build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl).unwrap(),
            SearchRequest::Empty
        );
    }

    #[test]
    fn null_checks_use_exists() {
        register();
        let ctrl = SelectCtrl::new()
            .filter("uuid", vec!["isnull()"])
            .filter("message", vec!["notnull()"]);
        let body = body_of(build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl).unwrap());
        assert_eq!(
            body["query"]["bool"]["must_not"],
            json!([{ "exists": { "field": "uuid" } }])
        );
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{ "exists": { "field": "message" } }])
        );
    }

    #[test]
    fn like_lowers_to_anchored_regexp() {
        register();
        let ctrl = SelectCtrl::new().filter("message", vec!["like(disk.full)"]);
        let body = body_of(build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl).unwrap());
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{ "regexp": { "message": ".*disk\\.full.*" } }])
        );
    }

    #[test]
    fn dimension_mismatch_surfaces() {
        register();
        let ctrl = SelectCtrl::new().with_order(["nearest(embedding;L2;[0.1,0.2])"]);
        assert!(matches!(
            build_search(Dialect::Elasticsearch, "search_emit_test", &ctrl),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
