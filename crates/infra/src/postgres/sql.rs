//! SQL text builders. Identifiers are always quoted; values are always bound.

use keystone_core::{RepositoryError, RepositoryResult, SortClause, SortDirection};

/// Page size used when a predicate has to be evaluated in-process.
pub(crate) const SCAN_BATCH: i64 = 500;

pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list(key_column: &str, columns: &[&str]) -> String {
    std::iter::once(key_column)
        .chain(columns.iter().copied())
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn select_by_key(table: &str, key_column: &str, columns: &[&str]) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = $1",
        column_list(key_column, columns),
        quote_ident(table),
        quote_ident(key_column)
    )
}

pub(crate) fn select_all(table: &str, key_column: &str, columns: &[&str]) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {} ASC",
        column_list(key_column, columns),
        quote_ident(table),
        quote_ident(key_column)
    )
}

/// `LIMIT $1 OFFSET $2`; a NULL limit returns every remaining row.
pub(crate) fn select_page(table: &str, key_column: &str, columns: &[&str], order_by: &str) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {} LIMIT $1 OFFSET $2",
        column_list(key_column, columns),
        quote_ident(table),
        order_by
    )
}

pub(crate) fn count(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_ident(table))
}

pub(crate) fn insert(table: &str, key_column: &str, columns: &[&str]) -> String {
    let placeholders = (1..=columns.len() + 1)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        column_list(key_column, columns),
        placeholders
    )
}

pub(crate) fn update(table: &str, key_column: &str, columns: &[&str]) -> String {
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{} = ${}", quote_ident(column), i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE {} = $1",
        quote_ident(table),
        assignments,
        quote_ident(key_column)
    )
}

pub(crate) fn delete(table: &str, key_column: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = $1",
        quote_ident(table),
        quote_ident(key_column)
    )
}

pub(crate) fn next_key() -> &'static str {
    "SELECT nextval($1::regclass)"
}

/// `ORDER BY` body for a request's sort clauses, always ending with the key
/// column so paging is deterministic. Unknown fields are rejected.
pub(crate) fn order_by(sort: &[SortClause], key_column: &str, columns: &[&str]) -> RepositoryResult<String> {
    let mut parts = Vec::with_capacity(sort.len() + 1);
    for clause in sort {
        if clause.field != key_column && !columns.contains(&clause.field.as_str()) {
            return Err(RepositoryError::unsupported(format!(
                "cannot sort by unknown field '{}'",
                clause.field
            )));
        }
        let direction = match clause.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        parts.push(format!("{} {}", quote_ident(&clause.field), direction));
    }
    if !sort.iter().any(|clause| clause.field == key_column) {
        parts.push(format!("{} ASC", quote_ident(key_column)));
    }
    Ok(parts.join(", "))
}
