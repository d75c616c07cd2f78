//! Parameter placeholder normalization
//!
//! Scenario code writes SQL with `$N` placeholders. Before execution the
//! gateway rewrites them to the dialect's convention: left alone for
//! PostgreSQL, `?` for MySQL/SQLite/Cassandra (positional, so `$N` must
//! appear in ascending order, which generated SQL always does), `@pN` for
//! SQL Server.
//!
//! The rewrite is purely lexical but quote-aware: `$N` inside a string
//! literal is left untouched.

use crate::dialect::{Dialect, Placeholder};

/// Rewrite `$N` placeholders in `sql` to the dialect's convention
pub fn rewrite_placeholders(dialect: Dialect, sql: &str) -> String {
    match dialect.placeholder() {
        Placeholder::Dollar => sql.to_string(),
        Placeholder::Question => rewrite(sql, |_n, out| out.push('?')),
        Placeholder::AtP => rewrite(sql, |n, out| {
            out.push_str("@p");
            out.push_str(&n.to_string());
        }),
    }
}

/// Replace `$N` placeholders with inline dialect literals.
///
/// For transports with no bound-parameter support (the ClickHouse HTTP
/// interface) and for the opt-in interpolated insert mode.
///
/// # Errors
///
/// `Predicate` when a placeholder ordinal has no matching parameter;
/// `Capability` when a value cannot be rendered inline on the dialect.
pub fn interpolate_placeholders(
    dialect: Dialect,
    sql: &str,
    params: &[dbmark_core::Value],
) -> dbmark_core::Result<String> {
    let mut error = None;
    let out = rewrite(sql, |n, out| {
        match params.get((n as usize).wrapping_sub(1)) {
            Some(value) => match dialect.quote_literal(value) {
                Ok(lit) => out.push_str(&lit),
                Err(e) => error = Some(e),
            },
            None => {
                error = Some(dbmark_core::Error::Predicate(format!(
                    "placeholder ${n} has no bound parameter"
                )))
            }
        }
    });
    match error {
        Some(e) => Err(e),
        None => Ok(out),
    }
}

fn rewrite(sql: &str, mut emit: impl FnMut(u32, &mut String)) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
            continue;
        }
        if c == '$' && !in_string {
            let mut digits = String::new();
            while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                digits.push(*d);
                chars.next();
            }
            if digits.is_empty() {
                out.push('$');
            } else {
                // Generated SQL never emits $0 or out-of-range ordinals;
                // malformed input just passes through unparsed digits.
                let n: u32 = digits.parse().unwrap_or(0);
                emit(n, &mut out);
            }
            continue;
        }
        out.push(c);
    }
    out
}
