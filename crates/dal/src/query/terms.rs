//! Lexical parsing of predicate and order terms
//!
//! WHERE values and ORDER entries arrive as strings shaped `fn(arg)`. This
//! module splits them into structured terms; typing the argument is the
//! condition layer's job.

use dbmark_core::{Error, Result};

/// Comparison function of one predicate term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermFn {
    /// Bare value
    Eq,
    /// `ne(v)`
    Ne,
    /// `lt(v)`
    Lt,
    /// `le(v)`
    Le,
    /// `gt(v)`
    Gt,
    /// `ge(v)`
    Ge,
    /// `like(s)`: contains
    Like,
    /// `hlike(s)`: starts with
    HLike,
    /// `tlike(s)`: ends with
    TLike,
    /// `isnull()`
    IsNull,
    /// `notnull()`
    NotNull,
}

/// One parsed predicate term
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    /// Comparison function
    pub func: TermFn,
    /// Raw argument text; empty for the null checks
    pub arg: String,
}

/// Parse one predicate value.
///
/// A value is treated as a function call only when it matches
/// `<known-fn>(…)` exactly; everything else is a bare equality value, so
/// data containing parentheses still round-trips.
pub fn parse_term(raw: &str) -> Term {
    if let Some((name, arg)) = split_call(raw) {
        let func = match name {
            "ne" => Some(TermFn::Ne),
            "lt" => Some(TermFn::Lt),
            "le" => Some(TermFn::Le),
            "gt" => Some(TermFn::Gt),
            "ge" => Some(TermFn::Ge),
            "like" => Some(TermFn::Like),
            "hlike" => Some(TermFn::HLike),
            "tlike" => Some(TermFn::TLike),
            "isnull" => Some(TermFn::IsNull),
            "notnull" => Some(TermFn::NotNull),
            _ => None,
        };
        if let Some(func) = func {
            return Term {
                func,
                arg: arg.to_string(),
            };
        }
    }
    Term {
        func: TermFn::Eq,
        arg: raw.to_string(),
    }
}

/// One parsed order entry
#[derive(Debug, Clone, PartialEq)]
pub enum OrderTerm {
    /// `asc(col)`
    Asc(String),
    /// `desc(col)`
    Desc(String),
    /// `nearest(col;L2;[v0,v1,...])`: vector kNN
    Nearest {
        /// Vector field to search
        field: String,
        /// Distance metric; only `L2` is recognized
        metric: String,
        /// Parsed query vector
        vector: Vec<f32>,
    },
}

impl OrderTerm {
    /// The column this term orders by
    pub fn field(&self) -> &str {
        match self {
            OrderTerm::Asc(f) | OrderTerm::Desc(f) => f,
            OrderTerm::Nearest { field, .. } => field,
        }
    }
}

/// Parse one order entry.
///
/// # Errors
///
/// `Predicate` for anything outside the `asc | desc | nearest` grammar.
pub fn parse_order(raw: &str) -> Result<OrderTerm> {
    let (name, arg) =
        split_call(raw).ok_or_else(|| Error::Predicate(format!("malformed order term '{raw}'")))?;
    match name {
        "asc" => Ok(OrderTerm::Asc(arg.to_string())),
        "desc" => Ok(OrderTerm::Desc(arg.to_string())),
        "nearest" => parse_nearest(raw, arg),
        other => Err(Error::Predicate(format!(
            "unknown order function '{other}' in '{raw}'"
        ))),
    }
}

fn parse_nearest(raw: &str, arg: &str) -> Result<OrderTerm> {
    let mut parts = arg.splitn(3, ';');
    let field = parts
        .next()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| Error::Predicate(format!("nearest() without a field in '{raw}'")))?;
    let metric = parts
        .next()
        .ok_or_else(|| Error::Predicate(format!("nearest() without a metric in '{raw}'")))?;
    if metric != "L2" {
        return Err(Error::Predicate(format!(
            "unsupported distance metric '{metric}' in '{raw}'"
        )));
    }
    let vector_text = parts
        .next()
        .ok_or_else(|| Error::Predicate(format!("nearest() without a vector in '{raw}'")))?;
    let inner = vector_text
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| Error::Predicate(format!("vector in '{raw}' is not bracketed")))?;
    let vector = inner
        .split(',')
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .map_err(|_| Error::Predicate(format!("bad vector component '{v}' in '{raw}'")))
        })
        .collect::<Result<Vec<f32>>>()?;
    if vector.is_empty() {
        return Err(Error::Predicate(format!("empty query vector in '{raw}'")));
    }
    Ok(OrderTerm::Nearest {
        field: field.to_string(),
        metric: metric.to_string(),
        vector,
    })
}

/// Split `name(arg)` into its parts; `None` when the shape doesn't match
fn split_call(raw: &str) -> Option<(&str, &str)> {
    let open = raw.find('(')?;
    let name = &raw[..open];
    if !raw.ends_with(')') || name.is_empty() {
        return None;
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, &raw[open + 1..raw.len() - 1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_value_is_equality() {
        let t = parse_term("126");
        assert_eq!(t, Term { func: TermFn::Eq, arg: "126".into() });
    }

    #[test]
    fn function_terms() {
        assert_eq!(parse_term("gt(123)").func, TermFn::Gt);
        assert_eq!(parse_term("gt(123)").arg, "123");
        assert_eq!(parse_term("hlike(abc)").func, TermFn::HLike);
        assert_eq!(parse_term("isnull()").func, TermFn::IsNull);
        assert_eq!(parse_term("isnull()").arg, "");
    }

    #[test]
    fn unknown_function_is_bare_equality() {
        let t = parse_term("concat(a,b)");
        assert_eq!(t.func, TermFn::Eq);
        assert_eq!(t.arg, "concat(a,b)");
    }

    #[test]
    fn time_literal_with_parens_stays_bare() {
        let t = parse_term("Mon Jan  2 15:04:05 2006");
        assert_eq!(t.func, TermFn::Eq);
    }

    #[test]
    fn order_asc_desc() {
        assert_eq!(parse_order("asc(id)").unwrap(), OrderTerm::Asc("id".into()));
        assert_eq!(
            parse_order("desc(start_time)").unwrap(),
            OrderTerm::Desc("start_time".into())
        );
        assert!(parse_order("id").is_err());
        assert!(parse_order("rand(id)").is_err());
    }

    #[test]
    fn order_nearest() {
        let t = parse_order("nearest(embedding;L2;[0.1,0.2,0.3])").unwrap();
        match t {
            OrderTerm::Nearest { field, metric, vector } => {
                assert_eq!(field, "embedding");
                assert_eq!(metric, "L2");
                assert_eq!(vector, vec![0.1, 0.2, 0.3]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nearest_rejects_bad_metric_and_vector() {
        assert!(parse_order("nearest(embedding;cosine;[0.1])").is_err());
        assert!(parse_order("nearest(embedding;L2;0.1,0.2)").is_err());
        assert!(parse_order("nearest(embedding;L2;[a,b])").is_err());
        assert!(parse_order("nearest(embedding;L2;[])").is_err());
    }
}
