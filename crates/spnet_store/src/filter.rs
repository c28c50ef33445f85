//! Record filters.
//!
//! A filter is a conjunction of `(path, condition)` clauses. Paths are
//! dotted; when a path crosses an array, every element is consulted, so
//! `"recommendations.author" == p` matches any record holding a
//! recommendation by `p`.

use spnet_value::{Document, Value, ID_FIELD};

/// A condition on the values found at one path.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Some value at the path equals the operand (or is an array holding it).
    Eq(Value),
    /// No value at the path equals the operand.
    Ne(Value),
    /// Some value at the path equals one of the operands.
    In(Vec<Value>),
    /// The path resolves (`true`) or does not resolve (`false`).
    Exists(bool),
    /// Some array at the path has an element document matching the filter.
    ElemMatch(Filter),
}

impl Condition {
    fn holds(&self, values: &[&Value]) -> bool {
        match self {
            Condition::Eq(target) => {
                values.iter().any(|v| v.matches(target)) || (values.is_empty() && target.is_null())
            }
            Condition::Ne(target) => !Condition::Eq(target.clone()).holds(values),
            Condition::In(targets) => targets
                .iter()
                .any(|t| Condition::Eq(t.clone()).holds(values)),
            Condition::Exists(expected) => values.is_empty() != *expected,
            Condition::ElemMatch(filter) => values.iter().any(|v| match v {
                Value::Array(items) => items.iter().any(|item| filter.matches_value(item)),
                _ => false,
            }),
        }
    }

    /// Evaluates the condition against one array element taken as a whole.
    fn holds_for_element(&self, element: &Value) -> bool {
        match self {
            Condition::Eq(target) => element == target,
            Condition::Ne(target) => element != target,
            Condition::In(targets) => targets.contains(element),
            Condition::Exists(expected) => *expected,
            Condition::ElemMatch(filter) => filter.matches_value(element),
        }
    }
}

/// A conjunction of path conditions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the primary key.
    #[must_use]
    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::new().eq(ID_FIELD, id)
    }

    /// Adds a clause.
    #[must_use]
    pub fn and(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push((path.into(), condition));
        self
    }

    /// Adds an equality clause.
    #[must_use]
    pub fn eq(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(path, Condition::Eq(value.into()))
    }

    /// Adds an inequality clause.
    #[must_use]
    pub fn ne(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(path, Condition::Ne(value.into()))
    }

    /// Adds a membership clause.
    #[must_use]
    pub fn is_in(self, path: impl Into<String>, values: Vec<Value>) -> Self {
        self.and(path, Condition::In(values))
    }

    /// Adds an existence clause.
    #[must_use]
    pub fn exists(self, path: impl Into<String>, expected: bool) -> Self {
        self.and(path, Condition::Exists(expected))
    }

    /// Adds an element-match clause on an array field.
    #[must_use]
    pub fn elem_match(self, path: impl Into<String>, element: Filter) -> Self {
        self.and(path, Condition::ElemMatch(element))
    }

    /// The clauses in insertion order.
    #[must_use]
    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    /// Whether the filter has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The primary key this filter pins down, if it has a plain `_id`
    /// equality clause.
    #[must_use]
    pub fn id_lookup(&self) -> Option<&Value> {
        self.clauses.iter().find_map(|(path, cond)| match cond {
            Condition::Eq(value) if path == ID_FIELD && value.as_array().is_none() => Some(value),
            _ => None,
        })
    }

    /// Whether every clause holds for the document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses
            .iter()
            .all(|(path, cond)| cond.holds(&values_at(doc, path)))
    }

    fn matches_value(&self, value: &Value) -> bool {
        match value {
            Value::Map(doc) => self.matches(doc),
            _ => false,
        }
    }

    /// Whether any clause addresses `array_field` or a field beneath it.
    #[must_use]
    pub fn addresses(&self, array_field: &str) -> bool {
        self.clauses
            .iter()
            .any(|(path, _)| element_subpath(path, array_field).is_some())
    }

    /// Evaluates only the clauses that address `array_field` against one
    /// of its elements.
    #[must_use]
    pub fn element_matches(&self, array_field: &str, element: &Value) -> bool {
        self.clauses.iter().all(|(path, cond)| {
            match element_subpath(path, array_field) {
                None => true,
                Some("") => cond.holds_for_element(element),
                Some(rest) => {
                    let mut found = Vec::new();
                    collect(element, &split(rest), &mut found);
                    cond.holds(&found)
                }
            }
        })
    }

    /// Index of the first element of `array_field` satisfying every clause
    /// that addresses it. This is what a positional (`$`) update targets.
    #[must_use]
    pub fn positional_index(&self, doc: &Document, array_field: &str) -> Option<usize> {
        if !self.addresses(array_field) {
            return None;
        }
        doc.get_path(array_field)?
            .as_array()?
            .iter()
            .position(|element| self.element_matches(array_field, element))
    }
}

/// For `path` inside `array_field`, the remainder after the array name
/// (`""` when the path is the array itself).
fn element_subpath<'a>(path: &'a str, array_field: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(array_field)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('.')
    }
}

fn split(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Every value reachable at `path`, fanning out across arrays.
pub(crate) fn values_at<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments = split(path);
    let mut out = Vec::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = doc.get(first) {
            collect(value, rest, &mut out);
        }
    }
    out
}

fn collect<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Map(map) => {
            if let Some(next) = map.get(segment) {
                collect(next, rest, out);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = segment.parse::<usize>() {
                if let Some(item) = items.get(index) {
                    collect(item, rest, out);
                }
            }
            for item in items {
                if let Value::Map(map) = item {
                    if let Some(next) = map.get(segment) {
                        collect(next, rest, out);
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spnet_value::doc;

    fn paper() -> Document {
        doc! {
            "_id" => 7,
            "title" => "X",
            "authors" => vec!["p1", "p2"],
            "recommendations" => vec![
                Value::from(doc! { "author" => "p1", "text" => "good" }),
                Value::from(doc! { "author" => "p3", "text" => "meh" }),
            ],
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&paper()));
    }

    #[test]
    fn eq_on_scalar_and_array_membership() {
        assert!(Filter::new().eq("title", "X").matches(&paper()));
        assert!(Filter::new().eq("authors", "p2").matches(&paper()));
        assert!(!Filter::new().eq("authors", "p9").matches(&paper()));
    }

    #[test]
    fn eq_fans_out_across_array_of_documents() {
        assert!(Filter::new()
            .eq("recommendations.author", "p3")
            .matches(&paper()));
        assert!(!Filter::new()
            .eq("recommendations.author", "p2")
            .matches(&paper()));
    }

    #[test]
    fn ne_and_exists() {
        assert!(Filter::new().ne("recommendations.author", "p2").matches(&paper()));
        assert!(!Filter::new().ne("recommendations.author", "p1").matches(&paper()));
        assert!(Filter::new().exists("arxiv", false).matches(&paper()));
        assert!(Filter::new().exists("title", true).matches(&paper()));
    }

    #[test]
    fn in_matches_any_operand() {
        let f = Filter::new().is_in("authors", vec![Value::from("zz"), Value::from("p1")]);
        assert!(f.matches(&paper()));
    }

    #[test]
    fn elem_match_requires_one_element_satisfying_all() {
        let hit = Filter::new().elem_match(
            "recommendations",
            Filter::new().eq("author", "p1").eq("text", "good"),
        );
        let miss = Filter::new().elem_match(
            "recommendations",
            Filter::new().eq("author", "p1").eq("text", "meh"),
        );
        assert!(hit.matches(&paper()));
        assert!(!miss.matches(&paper()));
    }

    #[test]
    fn positional_index_finds_matching_element() {
        let f = Filter::by_id(7).eq("recommendations.author", "p3");
        assert_eq!(f.positional_index(&paper(), "recommendations"), Some(1));

        let f = Filter::by_id(7).elem_match("recommendations", Filter::new().eq("author", "p1"));
        assert_eq!(f.positional_index(&paper(), "recommendations"), Some(0));

        assert_eq!(Filter::by_id(7).positional_index(&paper(), "recommendations"), None);
    }

    #[test]
    fn id_lookup_only_for_plain_equality() {
        assert_eq!(Filter::by_id(7).id_lookup(), Some(&Value::from(7)));
        assert_eq!(Filter::new().ne(ID_FIELD, 7).id_lookup(), None);
    }

    #[test]
    fn element_subpath_does_not_match_prefix_names() {
        assert_eq!(element_subpath("postsx.id", "posts"), None);
        assert_eq!(element_subpath("posts.id", "posts"), Some("id"));
        assert_eq!(element_subpath("posts", "posts"), Some(""));
    }
}
