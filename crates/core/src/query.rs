//! Paging request/result envelope.
//!
//! The core passes requests through to the repository untouched; it only
//! renders them to text for diagnostics. Filter evaluation belongs to the
//! storage backend.

use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortClause {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// `"<field> asc"` / `"<field> desc"`.
    pub fn to_expression(&self) -> String {
        format!("{} {}", self.field, self.direction.as_str())
    }
}

/// A node of a filter tree.
///
/// Leaf nodes carry `field`/`operator`/`value`; composite nodes combine their
/// `filters` with `logic` (`"and"` / `"or"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub logic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterNode>,
}

impl FilterNode {
    pub fn leaf(field: impl Into<String>, operator: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            field: Some(field.into()),
            operator: Some(operator.into()),
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn group(logic: impl Into<String>, filters: Vec<FilterNode>) -> Self {
        Self {
            logic: Some(logic.into()),
            filters,
            ..Self::default()
        }
    }

    /// Every descendant node, depth-first. The node itself is not included.
    pub fn flatten(&self) -> Vec<&FilterNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&FilterNode> = self.filters.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.filters.iter().rev());
        }
        out
    }

    fn render_into(&self, out: &mut String) {
        let value = match &self.value {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let _ = write!(
            out,
            ";;field:{},value:{},operator:{},logic:{};;",
            self.field.as_deref().unwrap_or_default(),
            value,
            self.operator.as_deref().unwrap_or_default(),
            self.logic.as_deref().unwrap_or_default(),
        );
    }
}

/// Paging, sorting, and filtering parameters for a multi-item query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRequest {
    /// Maximum number of items; `None` returns everything after `skip`.
    #[serde(default)]
    pub take: Option<usize>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub sort: Vec<SortClause>,
    #[serde(default)]
    pub filter: Option<FilterNode>,
}

impl DataRequest {
    pub fn page(skip: usize, take: usize) -> Self {
        Self {
            take: Some(take),
            skip,
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, clause: SortClause) -> Self {
        self.sort.push(clause);
        self
    }

    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Diagnostic text for log lines.
    ///
    /// `take:<n|all>,skip:<n>[,sort::<expr>,...][,filter::<node>...]` with the
    /// filter root followed by every descendant depth-first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.take {
            Some(n) => {
                let _ = write!(out, "take:{n}");
            }
            None => out.push_str("take:all"),
        }
        let _ = write!(out, ",skip:{}", self.skip);

        if !self.sort.is_empty() {
            out.push_str(",sort::");
            let exprs: Vec<String> = self.sort.iter().map(SortClause::to_expression).collect();
            out.push_str(&exprs.join(","));
        }

        if let Some(filter) = &self.filter {
            out.push_str(",filter::");
            filter.render_into(&mut out);
            for node in filter.flatten() {
                node.render_into(&mut out);
            }
        }

        out
    }
}

/// One page of items plus the total count before paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataResult<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> DataResult<T> {
    pub fn new(items: Vec<T>, total: usize) -> Self {
        Self { items, total }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> DataResult<U> {
        DataResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

impl<T> Default for DataResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_plain_page() {
        assert_eq!(DataRequest::page(20, 10).render(), "take:10,skip:20");
        assert_eq!(DataRequest::default().render(), "take:all,skip:0");
    }

    #[test]
    fn render_sort_and_filter_tree() {
        let request = DataRequest::page(0, 5)
            .with_sort(SortClause::asc("name"))
            .with_sort(SortClause::desc("price_cents"))
            .with_filter(FilterNode::group(
                "and",
                vec![
                    FilterNode::leaf("name", "contains", json!("bolt")),
                    FilterNode::leaf("price_cents", "gt", json!(100)),
                ],
            ));

        assert_eq!(
            request.render(),
            "take:5,skip:0,sort::name asc,price_cents desc,filter::\
             ;;field:,value:,operator:,logic:and;;\
             ;;field:name,value:bolt,operator:contains,logic:;;\
             ;;field:price_cents,value:100,operator:gt,logic:;;"
        );
    }

    #[test]
    fn flatten_is_depth_first() {
        let tree = FilterNode::group(
            "or",
            vec![
                FilterNode::group("and", vec![FilterNode::leaf("a", "eq", json!(1))]),
                FilterNode::leaf("b", "eq", json!(2)),
            ],
        );

        let fields: Vec<_> = tree
            .flatten()
            .into_iter()
            .map(|n| n.field.clone().unwrap_or_else(|| "<group>".to_string()))
            .collect();
        assert_eq!(fields, vec!["<group>", "a", "b"]);
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: DataRequest =
            serde_json::from_value(json!({ "take": 3, "sort": [{ "field": "sku", "direction": "desc" }] })).unwrap();
        assert_eq!(request.take, Some(3));
        assert_eq!(request.skip, 0);
        assert_eq!(request.sort[0].direction, SortDirection::Descending);
        assert!(request.filter.is_none());
    }
}
