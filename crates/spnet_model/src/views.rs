//! Typed read-only views over platform entities.
//!
//! A view borrows an [`Entity`] and exposes its declared fields with
//! their expected types. Fields holding a value of another type read as
//! `None`, as do absent ones.

use spnet_core::{Entity, Key};
use spnet_value::Value;

fn text<'a>(entity: &'a Entity, field: &str) -> Option<&'a str> {
    entity.get(field).and_then(Value::as_text)
}

fn integer(entity: &Entity, field: &str) -> Option<i64> {
    entity.get(field).and_then(Value::as_integer)
}

fn flag(entity: &Entity, field: &str) -> Option<bool> {
    entity.get(field).and_then(Value::as_bool)
}

fn texts<'a>(entity: &'a Entity, field: &str) -> Vec<&'a str> {
    entity
        .get(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_text).collect())
        .unwrap_or_default()
}

fn keys(entity: &Entity, field: &str) -> Vec<Key> {
    entity
        .get(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Key::from_value).collect())
        .unwrap_or_default()
}

fn key(entity: &Entity, field: &str) -> Option<Key> {
    entity.get(field).and_then(Key::from_value)
}

macro_rules! view {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $field:ident: $getter:ident($stored:literal) -> $ty:ty;)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<'a>(&'a Entity);

        impl<'a> $name<'a> {
            /// Views `entity`.
            #[must_use]
            pub fn new(entity: &'a Entity) -> Self {
                Self(entity)
            }

            /// The viewed entity.
            #[must_use]
            pub fn entity(&self) -> &'a Entity {
                self.0
            }

            $(
                $(#[$fmeta])*
                #[must_use]
                pub fn $field(&self) -> $ty {
                    $getter(self.0, $stored)
                }
            )*
        }
    };
}

view!(
    /// A paper.
    PaperView {
        /// Title.
        title: text("title") -> Option<&'a str>;
        /// Author names as printed, before they are linked to people.
        author_names: texts("authorNames") -> Vec<&'a str>;
        /// Publication year.
        year: integer("year") -> Option<i64>;
        /// Keys of the linked authors.
        authors: keys("authors") -> Vec<Key>;
        /// Keys of cited papers.
        references: keys("references") -> Vec<Key>;
    }
);

view!(
    /// A person.
    PersonView {
        /// Display name.
        name: text("name") -> Option<&'a str>;
        /// Keys of the people this person follows.
        subscriptions: keys("subscriptions") -> Vec<Key>;
    }
);

view!(
    /// A topic.
    TopicView {
        /// Free-text description.
        description: text("description") -> Option<&'a str>;
    }
);

view!(
    /// A question raised about a paper.
    IssueView {
        /// Title.
        title: text("title") -> Option<&'a str>;
        /// Category such as "error" or "question".
        category: text("category") -> Option<&'a str>;
        /// Body text.
        text: text("text") -> Option<&'a str>;
        /// Key of the paper in question.
        paper: key("paper") -> Option<Key>;
        /// Key of the person who raised it.
        author: key("author") -> Option<Key>;
    }
);

view!(
    /// Bibliographic metadata from arXiv, PubMed or a DOI resolver.
    BibliographicView {
        /// Title.
        title: text("title") -> Option<&'a str>;
        /// Author names.
        author_names: texts("authorNames") -> Vec<&'a str>;
        /// Abstract.
        summary: text("summary") -> Option<&'a str>;
        /// Publication timestamp as given by the source.
        published: text("published") -> Option<&'a str>;
        /// Landing page.
        url: text("url") -> Option<&'a str>;
    }
);

view!(
    /// A social-network profile.
    GplusView {
        /// Profile name.
        display_name: text("displayName") -> Option<&'a str>;
        /// Avatar URL.
        image: text("image") -> Option<&'a str>;
        /// Profile URL.
        url: text("url") -> Option<&'a str>;
    }
);

view!(
    /// A person's recommendation of a paper.
    RecommendationView {
        /// Recommendation text.
        text: text("text") -> Option<&'a str>;
        /// Publication timestamp.
        published: text("published") -> Option<&'a str>;
        /// Version tag of the source post.
        etag: text("etag") -> Option<&'a str>;
        /// Key of the recommending person.
        author: key("author") -> Option<Key>;
        /// Names of the topics it was tagged with.
        sigs: texts("sigs") -> Vec<&'a str>;
        /// Keys of people it was forwarded to.
        forwards: keys("forwards") -> Vec<Key>;
    }
);

view!(
    /// A social-network post about a paper.
    PostView {
        /// Post text.
        text: text("text") -> Option<&'a str>;
        /// Publication timestamp.
        published: text("published") -> Option<&'a str>;
        /// Version tag of the source post.
        etag: text("etag") -> Option<&'a str>;
        /// Key of the author.
        author: key("author") -> Option<Key>;
        /// Names of the topics it was tagged with.
        sigs: texts("sigs") -> Vec<&'a str>;
    }
);

view!(
    /// A reply to a post or recommendation.
    ReplyView {
        /// Reply text.
        text: text("text") -> Option<&'a str>;
        /// Version tag of the source comment.
        etag: text("etag") -> Option<&'a str>;
        /// Last edit timestamp.
        updated: text("updated") -> Option<&'a str>;
        /// Network id of the post replied to.
        reply_to: text("replyTo") -> Option<&'a str>;
        /// `"post"` or `"rec"`, after what was replied to.
        source_type: text("sourcetype") -> Option<&'a str>;
        /// Key of the author.
        author: key("author") -> Option<Key>;
    }
);

view!(
    /// One person's interest in a paper.
    InterestView {
        /// Key of the interested person.
        author: key("author") -> Option<Key>;
        /// Names of the topics the paper interests them for.
        topics: texts("topics") -> Vec<&'a str>;
    }
);

view!(
    /// An e-mail address.
    EmailView {
        /// The address.
        address: text("address") -> Option<&'a str>;
        /// Whether it is the person's current address.
        current: flag("current") -> Option<bool>;
    }
);

view!(
    /// A vote on an issue.
    IssueVoteView {
        /// Key of the voter.
        person: key("person") -> Option<Key>;
        /// Vote value.
        vote: integer("vote") -> Option<i64>;
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{self, Kinds};
    use spnet_value::{doc, ObjectId};

    #[test]
    fn paper_view_reads_declared_fields() {
        let registry = kinds::registry().unwrap();
        let kinds = Kinds::resolve(&registry).unwrap();
        let store = std::sync::Arc::new(spnet_store::InMemoryStore::new());
        let mapper = spnet_core::Mapper::open(store, registry).unwrap();
        let author = ObjectId::new();
        let paper = mapper
            .wrap(
                kinds.paper,
                doc! {
                    "_id" => ObjectId::new(),
                    "title" => "boring article",
                    "authorNames" => vec!["Fred", "Jojo"],
                    "year" => 2013,
                    "authors" => vec![Value::Id(author)],
                },
                None,
            )
            .unwrap();
        let view = PaperView::new(&paper);
        assert_eq!(view.title(), Some("boring article"));
        assert_eq!(view.author_names(), vec!["Fred", "Jojo"]);
        assert_eq!(view.year(), Some(2013));
        assert_eq!(view.authors(), vec![Key::Id(author)]);
        assert!(view.references().is_empty());

        let rec = mapper
            .wrap(
                kinds.recommendation,
                doc! { "author" => author, "text" => "must read", "sigs" => vec!["cosmology"] },
                paper.entity_ref().cloned(),
            )
            .unwrap();
        let view = RecommendationView::new(&rec);
        assert_eq!(view.author(), Some(Key::Id(author)));
        assert_eq!(view.sigs(), vec!["cosmology"]);
        assert_eq!(view.etag(), None);
        assert_eq!(view.entity().parent(), paper.entity_ref());
    }
}
