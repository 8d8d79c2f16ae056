//! Statement construction.
//!
//! Everything here is pure: a table name, column maps, and clause options go
//! in, a SQL string plus a positional parameter list come out. Placeholder
//! numbering is strictly sequential across SET, WHERE, LIMIT, and OFFSET in
//! the order the clauses are emitted; the Nth emitted placeholder corresponds
//! to the Nth appended value. Clause-building code must preserve that
//! correspondence.
//!
//! Values are always placeholder-bound. Identifiers (table names, column
//! names, RETURNING/projection entries) are interpolated into the statement
//! text and therefore validated against a strict token grammar first;
//! anything that fails is rejected with a validation error before a
//! statement exists.

use crate::db::params::Param;
use crate::db::types::JsonMap;
use crate::error::{DbError, DbResult};

/// Options for `select_many`.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Equality filter; empty means "no WHERE clause" (match all rows).
    pub where_eq: JsonMap,
    /// ORDER BY clause body, e.g. "created_at DESC, id".
    pub order_by: Option<String>,
    /// Maximum rows to return; must be positive when set.
    pub limit: Option<u32>,
    /// Rows to skip.
    pub offset: Option<u32>,
    /// Column projection; `None` selects all columns.
    pub columns: Option<Vec<String>>,
}

impl SelectOptions {
    pub fn with_where(mut self, where_eq: JsonMap) -> Self {
        self.where_eq = where_eq;
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }
}

/// A built statement: SQL text plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
}

// =============================================================================
// Identifier validation
// =============================================================================

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Validate a table or column identifier.
pub fn check_ident(s: &str) -> DbResult<()> {
    if is_ident(s) {
        Ok(())
    } else {
        Err(DbError::validation(format!(
            "Invalid identifier '{}': must match [A-Za-z_][A-Za-z0-9_]*",
            s
        )))
    }
}

/// Validate a projection entry: a plain identifier or a bare `*`.
fn check_projection(s: &str) -> DbResult<()> {
    if s == "*" { Ok(()) } else { check_ident(s) }
}

/// Validate an ORDER BY body: comma-separated `ident [ASC|DESC]` terms.
pub fn check_order_by(s: &str) -> DbResult<()> {
    if s.trim().is_empty() {
        return Err(DbError::validation("ORDER BY clause cannot be empty"));
    }
    for term in s.split(',') {
        let mut parts = term.split_whitespace();
        match parts.next() {
            Some(column) => check_ident(column)?,
            None => return Err(DbError::validation("Empty ORDER BY term")),
        }
        if let Some(direction) = parts.next() {
            if !direction.eq_ignore_ascii_case("asc") && !direction.eq_ignore_ascii_case("desc") {
                return Err(DbError::validation(format!(
                    "Invalid ORDER BY direction '{}': expected ASC or DESC",
                    direction
                )));
            }
        }
        if parts.next().is_some() {
            return Err(DbError::validation(format!(
                "Invalid ORDER BY term '{}'",
                term.trim()
            )));
        }
    }
    Ok(())
}

fn checked_projection(columns: &[String]) -> DbResult<String> {
    for column in columns {
        check_projection(column)?;
    }
    Ok(columns.join(", "))
}

/// RETURNING list; an empty slice projects all columns.
fn returning_clause(returning: &[String]) -> DbResult<String> {
    if returning.is_empty() {
        Ok(" RETURNING *".to_string())
    } else {
        Ok(format!(" RETURNING {}", checked_projection(returning)?))
    }
}

/// Append `WHERE k1 = $n AND k2 = $n+1 ...` with parameters in map iteration
/// order. Empty map appends nothing.
fn push_where(sql: &mut String, params: &mut Vec<Param>, where_eq: &JsonMap) -> DbResult<()> {
    if where_eq.is_empty() {
        return Ok(());
    }
    sql.push_str(" WHERE ");
    for (i, (column, value)) in where_eq.iter().enumerate() {
        check_ident(column)?;
        if i > 0 {
            sql.push_str(" AND ");
        }
        params.push(Param::from(value));
        sql.push_str(&format!("{} = ${}", column, params.len()));
    }
    Ok(())
}

// =============================================================================
// Statement builders
// =============================================================================

/// Build `SELECT <columns> FROM <table> [WHERE ...] [ORDER BY ...]
/// [LIMIT $n] [OFFSET $n]`.
pub(crate) fn build_select(table: &str, opts: &SelectOptions) -> DbResult<Statement> {
    check_ident(table)?;
    let projection = match &opts.columns {
        Some(columns) if !columns.is_empty() => checked_projection(columns)?,
        _ => "*".to_string(),
    };

    let mut sql = format!("SELECT {} FROM {}", projection, table);
    let mut params = Vec::new();
    push_where(&mut sql, &mut params, &opts.where_eq)?;

    if let Some(order_by) = &opts.order_by {
        check_order_by(order_by)?;
        sql.push_str(&format!(" ORDER BY {}", order_by));
    }
    if let Some(limit) = opts.limit {
        if limit == 0 {
            return Err(DbError::validation("LIMIT must be positive"));
        }
        params.push(Param::Int(limit as i64));
        sql.push_str(&format!(" LIMIT ${}", params.len()));
    } else if opts.offset.is_some() {
        // A bare OFFSET is not portable (SQLite requires LIMIT before it),
        // so an effectively unbounded limit keeps the clause pair well-formed
        params.push(Param::Int(i64::MAX));
        sql.push_str(&format!(" LIMIT ${}", params.len()));
    }
    if let Some(offset) = opts.offset {
        params.push(Param::Int(offset as i64));
        sql.push_str(&format!(" OFFSET ${}", params.len()));
    }

    Ok(Statement { sql, params })
}

/// Build `INSERT INTO <table> (<keys>) VALUES ($1, ..., $n) RETURNING ...`.
/// Column order is the iteration order of `data`.
pub(crate) fn build_insert(table: &str, data: &JsonMap, returning: &[String]) -> DbResult<Statement> {
    check_ident(table)?;
    if data.is_empty() {
        return Err(DbError::validation("INSERT requires a non-empty data mapping"));
    }

    let mut columns = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len());
    for (column, value) in data {
        check_ident(column)?;
        params.push(Param::from(value));
        columns.push(column.as_str());
        placeholders.push(format!("${}", params.len()));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}){}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        returning_clause(returning)?,
    );
    Ok(Statement { sql, params })
}

/// Build one multi-row INSERT with sequential placeholders across all rows.
/// Every row must carry the identical ordered key set; a mismatch would
/// silently mis-bind parameters, so it is rejected up front.
pub(crate) fn build_insert_many(
    table: &str,
    rows: &[JsonMap],
    returning: &[String],
) -> DbResult<Statement> {
    check_ident(table)?;
    let first = rows
        .first()
        .ok_or_else(|| DbError::validation("INSERT requires at least one row"))?;
    if first.is_empty() {
        return Err(DbError::validation("INSERT requires a non-empty data mapping"));
    }
    for column in first.keys() {
        check_ident(column)?;
    }
    for (i, row) in rows.iter().enumerate().skip(1) {
        if !row.keys().eq(first.keys()) {
            return Err(DbError::validation(format!(
                "INSERT row {} does not share the column set of row 0",
                i
            )));
        }
    }

    let columns: Vec<&str> = first.keys().map(String::as_str).collect();
    let mut params = Vec::with_capacity(rows.len() * columns.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let mut placeholders = Vec::with_capacity(columns.len());
        for value in row.values() {
            params.push(Param::from(value));
            placeholders.push(format!("${}", params.len()));
        }
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}{}",
        table,
        columns.join(", "),
        tuples.join(", "),
        returning_clause(returning)?,
    );
    Ok(Statement { sql, params })
}

/// Build `UPDATE <table> SET k1 = $1, ... [WHERE ...] RETURNING ...`.
/// An empty `where_eq` updates every row.
pub(crate) fn build_update(
    table: &str,
    data: &JsonMap,
    where_eq: &JsonMap,
    returning: &[String],
) -> DbResult<Statement> {
    check_ident(table)?;
    if data.is_empty() {
        return Err(DbError::validation("UPDATE requires a non-empty data mapping"));
    }

    let mut sql = format!("UPDATE {} SET ", table);
    let mut params = Vec::with_capacity(data.len() + where_eq.len());
    for (i, (column, value)) in data.iter().enumerate() {
        check_ident(column)?;
        if i > 0 {
            sql.push_str(", ");
        }
        params.push(Param::from(value));
        sql.push_str(&format!("{} = ${}", column, params.len()));
    }
    push_where(&mut sql, &mut params, where_eq)?;
    sql.push_str(&returning_clause(returning)?);
    Ok(Statement { sql, params })
}

/// Build `DELETE FROM <table> WHERE ... RETURNING ...`. An empty filter is
/// rejected as an unsafe delete before any statement exists.
pub(crate) fn build_delete(
    table: &str,
    where_eq: &JsonMap,
    returning: &[String],
) -> DbResult<Statement> {
    check_ident(table)?;
    if where_eq.is_empty() {
        return Err(DbError::validation(
            "Unsafe delete: WHERE mapping must not be empty",
        ));
    }
    let mut sql = format!("DELETE FROM {}", table);
    let mut params = Vec::with_capacity(where_eq.len());
    push_where(&mut sql, &mut params, where_eq)?;
    sql.push_str(&returning_clause(returning)?);
    Ok(Statement { sql, params })
}
