//! Query options, index specifications and write results.

use serde::{Deserialize, Serialize};
use spnet_value::Document;
use std::cmp::Ordering;

/// Restricts returned documents to some top-level fields (plus `_id`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<String>,
}

impl Projection {
    /// Projection keeping the given fields. Dotted fields keep their
    /// top-level segment.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The listed fields.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Applies the projection to a document.
    #[must_use]
    pub fn apply(&self, doc: &Document) -> Document {
        doc.project(self.fields.as_slice())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first; records missing the field come first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Options for [`DocumentStore::find`](crate::DocumentStore::find).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Fields to return.
    pub projection: Option<Projection>,
    /// Sort keys, most significant first. Without them records come back
    /// in insertion order.
    pub sort: Vec<(String, SortOrder)>,
    /// Number of matching records to skip.
    pub skip: usize,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Options returning every match in insertion order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the projection.
    #[must_use]
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Adds a sort key.
    #[must_use]
    pub fn sort(mut self, path: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((path.into(), order));
        self
    }

    /// Sets the skip count.
    #[must_use]
    pub const fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the result limit.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (path, order) in &self.sort {
            let ord = a.get_path(path).cmp(&b.get_path(path));
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Sorts, pages and projects matched documents.
    pub(crate) fn finish(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if !self.sort.is_empty() {
            docs.sort_by(|a, b| self.compare(a, b));
        }
        let limit = self.limit.unwrap_or(usize::MAX);
        docs.into_iter()
            .skip(self.skip)
            .take(limit)
            .map(|doc| match &self.projection {
                Some(projection) => projection.apply(&doc),
                None => doc,
            })
            .collect()
    }
}

/// An index on one dotted path.
///
/// Only unique indexes affect behaviour: they reject writes that would
/// give two records the same value at the path. Array values are indexed
/// element by element, so a unique index on `"posts.id"` also rejects one
/// record holding the same post id twice. Records without the path are
/// not indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed path.
    pub path: String,
    /// Whether values must be unique.
    pub unique: bool,
}

impl IndexSpec {
    /// A unique index on `path`.
    #[must_use]
    pub fn unique(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            unique: true,
        }
    }

    /// A non-unique index on `path`.
    #[must_use]
    pub fn non_unique(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            unique: false,
        }
    }
}

/// Outcome of [`DocumentStore::update_one`](crate::DocumentStore::update_one).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Number of records the filter matched (0 or 1).
    pub matched: u64,
    /// Number of records changed (0 or 1).
    pub modified: u64,
}

impl UpdateResult {
    /// Whether the filter matched a record.
    #[must_use]
    pub const fn matched(&self) -> bool {
        self.matched > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spnet_value::{doc, Value};

    #[test]
    fn finish_sorts_skips_and_limits() {
        let docs = vec![
            doc! { "_id" => 1, "year" => 2010 },
            doc! { "_id" => 2 },
            doc! { "_id" => 3, "year" => 2012 },
            doc! { "_id" => 4, "year" => 2011 },
        ];
        let out = FindOptions::new()
            .sort("year", SortOrder::Descending)
            .skip(1)
            .limit(2)
            .finish(docs);
        let ids: Vec<_> = out.iter().filter_map(|d| d.id().cloned()).collect();
        assert_eq!(ids, vec![Value::from(4), Value::from(1)]);
    }

    #[test]
    fn missing_sort_key_sorts_first_ascending() {
        let docs = vec![doc! { "_id" => 1, "year" => 2010 }, doc! { "_id" => 2 }];
        let out = FindOptions::new().sort("year", SortOrder::Ascending).finish(docs);
        assert_eq!(out[0].id(), Some(&Value::from(2)));
    }

    #[test]
    fn projection_is_applied() {
        let docs = vec![doc! { "_id" => 1, "posts" => vec!["p"], "title" => "X" }];
        let out = FindOptions::new()
            .projection(Projection::new(["posts.id"]))
            .finish(docs);
        assert_eq!(out[0], doc! { "_id" => 1, "posts" => vec!["p"] });
    }
}
