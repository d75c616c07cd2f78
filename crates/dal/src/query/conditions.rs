//! Typed predicate lowering and the interval optimizer
//!
//! Terms from [`super::terms`] are typed against the table catalog and
//! lowered to a small condition tree the per-backend emitters render. For
//! ordered domains (integers, times, enum-strings) the optimizer folds
//! range terms into one `[min, max)` interval, trims the equality set
//! against it, and reports a provably-empty result as
//! [`Lowered::Empty`] so the backend is never contacted.

use crate::catalog::{FieldKind, TableFields};
use crate::query::terms::{parse_order, parse_term, OrderTerm, Term, TermFn};
use chrono::{DateTime, TimeZone, Utc};
use dbmark_core::{Error, Result, SelectCtrl, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Single-value comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Substring-match flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    /// `like(s)`
    Contains,
    /// `hlike(s)`
    Prefix,
    /// `tlike(s)`
    Suffix,
}

/// One lowered condition
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    /// Compare a field against one value
    Cmp {
        /// Field name
        field: String,
        /// Operator
        op: CmpOp,
        /// Typed comparison value
        value: Value,
    },
    /// Field is any of the values (an equality set)
    In {
        /// Field name
        field: String,
        /// Allowed values; never empty
        values: Vec<Value>,
    },
    /// Substring match
    Like {
        /// Field name
        field: String,
        /// Match flavor
        kind: LikeKind,
        /// Literal needle (unescaped)
        needle: String,
    },
    /// Field is NULL / missing
    IsNull {
        /// Field name
        field: String,
    },
    /// Field is present
    NotNull {
        /// Field name
        field: String,
    },
}

/// Result of lowering a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub enum Lowered {
    /// The predicate provably matches nothing; short-circuit to empty rows
    Empty,
    /// AND-conjoined conditions (possibly none)
    Conds(Vec<Cond>),
}

/// Ordered-domain abstraction shared by integer, time, and enum lowering
trait OrderedDomain {
    fn parse(&self, field: &str, arg: &str) -> Result<i64>;
    fn emit(&self, key: i64) -> Value;
}

struct IntDomain;

impl OrderedDomain for IntDomain {
    fn parse(&self, field: &str, arg: &str) -> Result<i64> {
        arg.trim().parse::<i64>().map_err(|_| {
            Error::Predicate(format!("field '{field}': '{arg}' is not an integer"))
        })
    }
    fn emit(&self, key: i64) -> Value {
        Value::I64(key)
    }
}

struct TimeDomain;

impl OrderedDomain for TimeDomain {
    fn parse(&self, field: &str, arg: &str) -> Result<i64> {
        let t = parse_time_literal(arg)
            .map_err(|e| Error::Predicate(format!("field '{field}': {e}")))?;
        Ok(t.timestamp_nanos_opt().unwrap_or(i64::MAX))
    }
    fn emit(&self, key: i64) -> Value {
        Value::DateTime(Utc.timestamp_nanos(key))
    }
}

struct EnumDomain(Arc<HashMap<String, i64>>);

impl OrderedDomain for EnumDomain {
    fn parse(&self, field: &str, arg: &str) -> Result<i64> {
        self.0.get(arg.trim()).copied().ok_or_else(|| {
            Error::Predicate(format!("field '{field}': '{arg}' is not a known enum value"))
        })
    }
    fn emit(&self, key: i64) -> Value {
        Value::I64(key)
    }
}

/// Lower a full WHERE clause against a table's field kinds
pub fn lower_where(fields: &TableFields, ctrl: &SelectCtrl) -> Result<Lowered> {
    let mut conds = Vec::new();
    for (field, raw_terms) in &ctrl.where_ {
        let kind = fields.kind(field)?;
        let terms: Vec<Term> = raw_terms.iter().map(|t| parse_term(t)).collect();
        let lowered = match kind {
            FieldKind::Integer => {
                lower_ordered(field, &terms, &IntDomain, ctrl.optimize_conditions)?
            }
            FieldKind::Time => {
                lower_ordered(field, &terms, &TimeDomain, ctrl.optimize_conditions)?
            }
            FieldKind::Enum(map) => lower_ordered(
                field,
                &terms,
                &EnumDomain(map.clone()),
                ctrl.optimize_conditions,
            )?,
            FieldKind::Uuid => lower_uuid(field, &terms)?,
            FieldKind::Str { max_len } => lower_string(field, &terms, *max_len)?,
            FieldKind::Bool => lower_bool(field, &terms)?,
            FieldKind::Vector { .. } => {
                return Err(Error::Predicate(format!(
                    "field '{field}' is a vector; only nearest() ordering applies"
                )))
            }
        };
        match lowered {
            Lowered::Empty => return Ok(Lowered::Empty),
            Lowered::Conds(c) => conds.extend(c),
        }
    }
    Ok(Lowered::Conds(conds))
}

/// Lower and validate ORDER entries.
///
/// `nearest(…)` must be the only entry when present, and its vector must
/// match the mapping dimension.
pub fn lower_order(fields: &TableFields, ctrl: &SelectCtrl) -> Result<Vec<OrderTerm>> {
    let mut terms = Vec::with_capacity(ctrl.order.len());
    for raw in &ctrl.order {
        let term = parse_order(raw)?;
        if !fields.contains(term.field()) {
            return Err(Error::UnknownField(term.field().to_string()));
        }
        if let OrderTerm::Nearest { field, vector, .. } = &term {
            match fields.vector_dim(field) {
                Some(dim) if dim == vector.len() => {}
                Some(dim) => {
                    return Err(Error::DimensionMismatch {
                        expected: dim,
                        got: vector.len(),
                    })
                }
                None => {
                    return Err(Error::Predicate(format!(
                        "field '{field}' is not a vector; nearest() does not apply"
                    )))
                }
            }
        }
        terms.push(term);
    }
    if terms.len() > 1 && terms.iter().any(|t| matches!(t, OrderTerm::Nearest { .. })) {
        return Err(Error::Predicate(
            "nearest() cannot be combined with other order terms".into(),
        ));
    }
    Ok(terms)
}

/// Validate the projection list against the catalog
pub fn check_fields(fields: &TableFields, ctrl: &SelectCtrl) -> Result<()> {
    for f in &ctrl.fields {
        if f == "*" || ctrl.is_count() {
            continue;
        }
        if !fields.contains(f) {
            return Err(Error::UnknownField(f.clone()));
        }
    }
    Ok(())
}

fn lower_ordered(
    field: &str,
    terms: &[Term],
    domain: &dyn OrderedDomain,
    optimize: bool,
) -> Result<Lowered> {
    if !optimize {
        let mut eqs = Vec::new();
        let mut conds = Vec::new();
        for t in terms {
            match t.func {
                TermFn::Eq => eqs.push(domain.emit(domain.parse(field, &t.arg)?)),
                TermFn::IsNull => conds.push(Cond::IsNull { field: field.into() }),
                TermFn::NotNull => conds.push(Cond::NotNull { field: field.into() }),
                TermFn::Like | TermFn::HLike | TermFn::TLike => {
                    return Err(Error::Predicate(format!(
                        "field '{field}': like-family predicates need a string column"
                    )))
                }
                func => {
                    let op = cmp_of(func);
                    conds.push(Cond::Cmp {
                        field: field.into(),
                        op,
                        value: domain.emit(domain.parse(field, &t.arg)?),
                    });
                }
            }
        }
        if !eqs.is_empty() {
            conds.push(equality_set(field, eqs));
        }
        return Ok(Lowered::Conds(conds));
    }

    // Optimizing path: fold ranges into one half-open interval, trim the
    // equality set against it, and detect empty intersections.
    let mut eqs: Vec<i64> = Vec::new();
    let mut nes: Vec<i64> = Vec::new();
    let mut lo: Option<i64> = None; // inclusive
    let mut hi: Option<i64> = None; // exclusive
    let mut conds = Vec::new();
    for t in terms {
        match t.func {
            TermFn::Eq => eqs.push(domain.parse(field, &t.arg)?),
            TermFn::Ne => nes.push(domain.parse(field, &t.arg)?),
            TermFn::Lt => {
                let v = domain.parse(field, &t.arg)?;
                hi = Some(hi.map_or(v, |h| h.min(v)));
            }
            TermFn::Le => {
                let v = domain.parse(field, &t.arg)?.saturating_add(1);
                hi = Some(hi.map_or(v, |h| h.min(v)));
            }
            TermFn::Gt => {
                let v = domain.parse(field, &t.arg)?.saturating_add(1);
                lo = Some(lo.map_or(v, |l| l.max(v)));
            }
            TermFn::Ge => {
                let v = domain.parse(field, &t.arg)?;
                lo = Some(lo.map_or(v, |l| l.max(v)));
            }
            TermFn::IsNull => conds.push(Cond::IsNull { field: field.into() }),
            TermFn::NotNull => conds.push(Cond::NotNull { field: field.into() }),
            TermFn::Like | TermFn::HLike | TermFn::TLike => {
                return Err(Error::Predicate(format!(
                    "field '{field}': like-family predicates need a string column"
                )))
            }
        }
    }
    if let (Some(l), Some(h)) = (lo, hi) {
        if l >= h {
            return Ok(Lowered::Empty);
        }
    }
    if eqs.is_empty() {
        // A bounded interval can still be hollowed out by ne() terms. The
        // boundaries shrink past excluded values; when they meet, the whole
        // interval was excluded.
        if let (Some(mut l), Some(mut h)) = (lo, hi) {
            while l < h && nes.contains(&l) {
                l += 1;
            }
            while l < h && nes.contains(&(h - 1)) {
                h -= 1;
            }
            if l >= h {
                return Ok(Lowered::Empty);
            }
            lo = Some(l);
            hi = Some(h);
        }
    }
    if !eqs.is_empty() {
        eqs.sort_unstable();
        eqs.dedup();
        eqs.retain(|v| {
            lo.map_or(true, |l| *v >= l)
                && hi.map_or(true, |h| *v < h)
                && !nes.contains(v)
        });
        if eqs.is_empty() {
            return Ok(Lowered::Empty);
        }
        // The trimmed equality set subsumes the interval; no range clause.
        conds.push(equality_set(field, eqs.into_iter().map(|v| domain.emit(v)).collect()));
        return Ok(Lowered::Conds(conds));
    }
    if let Some(l) = lo {
        conds.push(Cond::Cmp {
            field: field.into(),
            op: CmpOp::Ge,
            value: domain.emit(l),
        });
    }
    if let Some(h) = hi {
        conds.push(Cond::Cmp {
            field: field.into(),
            op: CmpOp::Lt,
            value: domain.emit(h),
        });
    }
    for v in nes {
        conds.push(Cond::Cmp {
            field: field.into(),
            op: CmpOp::Ne,
            value: domain.emit(v),
        });
    }
    Ok(Lowered::Conds(conds))
}

fn equality_set(field: &str, mut values: Vec<Value>) -> Cond {
    if values.len() == 1 {
        Cond::Cmp {
            field: field.into(),
            op: CmpOp::Eq,
            value: values.pop().expect("single equality value"),
        }
    } else {
        Cond::In {
            field: field.into(),
            values,
        }
    }
}

fn lower_uuid(field: &str, terms: &[Term]) -> Result<Lowered> {
    let mut eqs = Vec::new();
    let mut conds = Vec::new();
    for t in terms {
        match t.func {
            TermFn::Eq | TermFn::Ne => {
                let u = Uuid::parse_str(t.arg.trim()).map_err(|_| {
                    Error::Predicate(format!("field '{field}': '{}' is not a UUID", t.arg))
                })?;
                if t.func == TermFn::Eq {
                    eqs.push(Value::Uuid(u));
                } else {
                    conds.push(Cond::Cmp {
                        field: field.into(),
                        op: CmpOp::Ne,
                        value: Value::Uuid(u),
                    });
                }
            }
            TermFn::IsNull => conds.push(Cond::IsNull { field: field.into() }),
            TermFn::NotNull => conds.push(Cond::NotNull { field: field.into() }),
            _ => {
                return Err(Error::Predicate(format!(
                    "field '{field}': UUID columns accept equality and null checks only"
                )))
            }
        }
    }
    if !eqs.is_empty() {
        conds.push(equality_set(field, eqs));
    }
    Ok(Lowered::Conds(conds))
}

fn lower_string(field: &str, terms: &[Term], max_len: usize) -> Result<Lowered> {
    let mut eqs = Vec::new();
    let mut conds = Vec::new();
    for t in terms {
        if t.arg.len() > max_len {
            return Err(Error::ValueTooLong {
                field: field.to_string(),
                max: max_len,
            });
        }
        match t.func {
            TermFn::Eq => eqs.push(Value::String(t.arg.clone())),
            TermFn::Ne => conds.push(Cond::Cmp {
                field: field.into(),
                op: CmpOp::Ne,
                value: Value::String(t.arg.clone()),
            }),
            TermFn::Lt | TermFn::Le | TermFn::Gt | TermFn::Ge => conds.push(Cond::Cmp {
                field: field.into(),
                op: cmp_of(t.func),
                value: Value::String(t.arg.clone()),
            }),
            TermFn::Like => conds.push(like(field, LikeKind::Contains, &t.arg)),
            TermFn::HLike => conds.push(like(field, LikeKind::Prefix, &t.arg)),
            TermFn::TLike => conds.push(like(field, LikeKind::Suffix, &t.arg)),
            TermFn::IsNull => conds.push(Cond::IsNull { field: field.into() }),
            TermFn::NotNull => conds.push(Cond::NotNull { field: field.into() }),
        }
    }
    if !eqs.is_empty() {
        conds.push(equality_set(field, eqs));
    }
    Ok(Lowered::Conds(conds))
}

fn lower_bool(field: &str, terms: &[Term]) -> Result<Lowered> {
    let mut conds = Vec::new();
    for t in terms {
        let value = match t.arg.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(Error::Predicate(format!(
                    "field '{field}': '{other}' is not a boolean"
                )))
            }
        };
        let op = match t.func {
            TermFn::Eq => CmpOp::Eq,
            TermFn::Ne => CmpOp::Ne,
            _ => {
                return Err(Error::Predicate(format!(
                    "field '{field}': boolean columns accept equality only"
                )))
            }
        };
        conds.push(Cond::Cmp {
            field: field.into(),
            op,
            value: Value::Bool(value),
        });
    }
    Ok(Lowered::Conds(conds))
}

fn like(field: &str, kind: LikeKind, needle: &str) -> Cond {
    Cond::Like {
        field: field.into(),
        kind,
        needle: needle.to_string(),
    }
}

fn cmp_of(func: TermFn) -> CmpOp {
    match func {
        TermFn::Eq => CmpOp::Eq,
        TermFn::Ne => CmpOp::Ne,
        TermFn::Lt => CmpOp::Lt,
        TermFn::Le => CmpOp::Le,
        TermFn::Gt => CmpOp::Gt,
        TermFn::Ge => CmpOp::Ge,
        _ => unreachable!("like/null terms have no comparison operator"),
    }
}

/// Parse one time literal.
///
/// Accepted forms: RFC3339, RFC1123/RFC2822, RFC850, ANSI-C asctime, a
/// decimal integer (seconds since epoch), or a decimal integer suffixed
/// `ns` (nanoseconds since epoch).
pub fn parse_time_literal(raw: &str) -> Result<DateTime<Utc>> {
    let t = raw.trim();
    if let Some(digits) = t.strip_suffix("ns") {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            let n: i64 = digits
                .parse()
                .map_err(|_| Error::Predicate(format!("nanosecond literal '{t}' overflows")))?;
            return Ok(Utc.timestamp_nanos(n));
        }
    }
    if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) {
        let secs: i64 = t
            .parse()
            .map_err(|_| Error::Predicate(format!("epoch literal '{t}' overflows")))?;
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| Error::Predicate(format!("epoch literal '{t}' out of range")));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(t) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(t) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(t, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(t, "%a %b %e %H:%M:%S %Y") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(Error::Predicate(format!("unrecognized time literal '{t}'")))
}
