//! The platform facade: a mapper over the platform registry plus the
//! ingestion helpers built on it.

use crate::kinds::{self, Kinds};
use spnet_core::{
    CoreError, CoreResult, Entity, EntityRef, ExternalSource, InsertPolicy, Key, KindId, Lookup,
    Mapper, MapperConfig, NewEntity,
};
use spnet_store::{DocumentStore, FileStore, InMemoryStore};
use spnet_value::{doc, Document, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Paper arrays merged across duplicate records, with the field keying
/// their elements.
const MERGED_ARRAYS: [(&str, &str); 3] = [
    ("recommendations", "author"),
    ("posts", "id"),
    ("replies", "id"),
];

/// A post, recommendation or reply as delivered by the social network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingPost {
    /// Post id assigned by the network.
    pub id: String,
    /// Key of the (already stored) author.
    pub author: Option<Key>,
    /// Post text.
    pub text: String,
    /// Version tag; an unchanged tag means nothing to update.
    pub etag: String,
    /// Publication timestamp.
    pub published: Option<String>,
    /// Last edit timestamp.
    pub updated: Option<String>,
    /// Names of the topics the post was tagged with.
    pub sigs: Vec<String>,
}

impl IncomingPost {
    fn fields(&self) -> Document {
        let mut data = doc! {
            "text" => self.text.as_str(),
            "etag" => self.etag.as_str(),
        };
        if let Some(published) = &self.published {
            data.insert("published", published.as_str());
        }
        if let Some(updated) = &self.updated {
            data.insert("updated", updated.as_str());
        }
        data
    }

    fn sigs(&self) -> Value {
        Value::Array(self.sigs.iter().map(Value::from).collect())
    }
}

/// What [`Platform::merge_duplicate_papers`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Papers that absorbed their duplicates.
    pub kept: Vec<Key>,
    /// Duplicates merged away and deleted.
    pub deleted: Vec<Key>,
}

/// The paper-discussion platform over one document store.
#[derive(Debug)]
pub struct Platform {
    mapper: Mapper,
    kinds: Kinds,
}

impl Platform {
    /// Opens the platform over `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the natural-key indexes cannot be declared.
    pub fn with_store(store: Arc<dyn DocumentStore>) -> CoreResult<Self> {
        Self::with_store_and_config(store, MapperConfig::default())
    }

    /// Opens the platform over `store` with a custom mapper configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the natural-key indexes cannot be declared.
    pub fn with_store_and_config(
        store: Arc<dyn DocumentStore>,
        config: MapperConfig,
    ) -> CoreResult<Self> {
        let registry = kinds::registry()?;
        let kinds = Kinds::resolve(&registry)?;
        let mapper = Mapper::open_with_config(store, registry, config)?;
        Ok(Self { mapper, kinds })
    }

    /// Opens a platform persisted in the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or replayed.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::with_store(Arc::new(FileStore::open(path)?))
    }

    /// Opens a platform that lives only in memory.
    ///
    /// # Errors
    ///
    /// See [`Platform::with_store`].
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    /// The underlying mapper.
    #[must_use]
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// Ids of the platform kinds.
    #[must_use]
    pub fn kinds(&self) -> &Kinds {
        &self.kinds
    }

    /// The paper carrying arXiv id `id`, created from `source` on first
    /// reference.
    ///
    /// # Errors
    ///
    /// Returns `ExternalSource` when the paper is new and the source fails.
    pub fn paper_by_arxiv(&self, id: &str, source: &dyn ExternalSource) -> CoreResult<Entity> {
        self.parent_of_external(self.kinds.arxiv, id, source)
    }

    /// The paper carrying PubMed id `id`. See [`Platform::paper_by_arxiv`].
    ///
    /// # Errors
    ///
    /// Returns `ExternalSource` when the paper is new and the source fails.
    pub fn paper_by_pubmed(&self, id: &str, source: &dyn ExternalSource) -> CoreResult<Entity> {
        self.parent_of_external(self.kinds.pubmed, id, source)
    }

    /// The paper carrying DOI `id`. See [`Platform::paper_by_arxiv`].
    ///
    /// # Errors
    ///
    /// Returns `ExternalSource` when the paper is new and the source fails.
    pub fn paper_by_doi(&self, id: &str, source: &dyn ExternalSource) -> CoreResult<Entity> {
        self.parent_of_external(self.kinds.doi, id, source)
    }

    /// The person behind social profile `id`, created from `source` on
    /// first reference.
    ///
    /// # Errors
    ///
    /// Returns `ExternalSource` when the person is new and the source fails.
    pub fn person_by_gplus(&self, id: &str, source: &dyn ExternalSource) -> CoreResult<Entity> {
        self.parent_of_external(self.kinds.gplus, id, source)
    }

    fn parent_of_external(
        &self,
        kind: KindId,
        id: &str,
        source: &dyn ExternalSource,
    ) -> CoreResult<Entity> {
        let child = self.mapper.get_or_create(kind, id, None, source)?;
        let parent = child.record_ref();
        let parent_kind = self
            .mapper
            .registry()
            .kind(kind)?
            .parent()
            .ok_or_else(|| CoreError::invalid_operation("external kinds are nested"))?;
        self.mapper.fetch(parent_kind, parent.key.clone())
    }

    /// The topic called `name`, created if new.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn topic(&self, name: &str) -> CoreResult<Entity> {
        self.mapper.construct(
            self.kinds.topic,
            NewEntity::new(Document::new()).key(name),
            InsertPolicy::FindOrInsert,
        )
    }

    /// Stores a post about `paper`.
    ///
    /// A post already stored with the same etag is returned as is; a
    /// changed etag refreshes its text and timestamps.
    ///
    /// # Errors
    ///
    /// - `Validation` when the post has no author
    /// - `DuplicateKey` when the post id is already stored under another paper
    pub fn record_post(&self, paper: &Entity, post: &IncomingPost) -> CoreResult<Entity> {
        let lookup = Lookup::Key(Key::from(post.id.as_str()));
        let data = doc! { "id" => post.id.as_str(), "sigs" => post.sigs() };
        self.refresh_or_insert(self.kinds.post, lookup, paper.record_ref(), post, data)
    }

    /// Stores `post` as its author's recommendation of `paper`. Each
    /// person recommends a paper at most once; a later post with a new
    /// etag refreshes the recommendation.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the post has no author.
    pub fn recommend(&self, paper: &Entity, post: &IncomingPost) -> CoreResult<Entity> {
        let author = post
            .author
            .clone()
            .ok_or_else(|| CoreError::validation(kinds::names::RECOMMENDATION, "author"))?;
        let lookup = Lookup::Element {
            parent: paper.record_ref().key.clone(),
            key: author,
        };
        let data = doc! { "id" => post.id.as_str(), "sigs" => post.sigs() };
        self.refresh_or_insert(self.kinds.recommendation, lookup, paper.record_ref(), post, data)
    }

    /// Stores a reply to `source`, a post or recommendation, on the same
    /// paper. The reply remembers the network id it answers and which of
    /// the two it was; a changed etag refreshes a stored reply.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` when `source` is neither a post nor a recommendation
    /// - `Validation` when `source` carries no network id or the reply no author
    pub fn record_reply(&self, source: &Entity, reply: &IncomingPost) -> CoreResult<Entity> {
        let source_type = if source.kind() == self.kinds.post {
            "post"
        } else if source.kind() == self.kinds.recommendation {
            "rec"
        } else {
            return Err(CoreError::invalid_operation(
                "only posts and recommendations take replies",
            ));
        };
        let reply_to = source
            .get("id")
            .cloned()
            .ok_or_else(|| CoreError::validation(kinds::names::REPLY, "replyTo"))?;
        let lookup = Lookup::Key(Key::from(reply.id.as_str()));
        let data = doc! {
            "id" => reply.id.as_str(),
            "replyTo" => reply_to,
            "sourcetype" => source_type,
        };
        self.refresh_or_insert(self.kinds.reply, lookup, source.record_ref(), reply, data)
    }

    fn refresh_or_insert(
        &self,
        kind: KindId,
        lookup: Lookup,
        parent: &EntityRef,
        post: &IncomingPost,
        mut data: Document,
    ) -> CoreResult<Entity> {
        match self.mapper.fetch(kind, lookup) {
            Ok(mut stored) => {
                if stored.get("etag").and_then(Value::as_text) != Some(post.etag.as_str()) {
                    debug!(id = %post.id, etag = %post.etag, "refreshing changed post");
                    self.mapper.update(&mut stored, post.fields())?;
                }
                Ok(stored)
            }
            Err(err) if err.is_not_found() => {
                let author = post
                    .author
                    .clone()
                    .ok_or_else(|| CoreError::validation("post", "author"))?;
                for (field, value) in post.fields() {
                    data.insert(field, value);
                }
                data.insert("author", author.to_value());
                self.mapper.insert(kind, NewEntity::new(data).parent(parent.clone()))
            }
            Err(err) => Err(err),
        }
    }

    /// Marks `paper` as interesting to `person` for `topic`. Returns the
    /// person's interest in the paper with every topic chosen so far.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when `person` has no key.
    pub fn add_interest(
        &self,
        paper: &Entity,
        person: &Entity,
        topic: &Entity,
    ) -> CoreResult<Entity> {
        let author = person
            .key()
            .cloned()
            .ok_or_else(|| CoreError::validation(kinds::names::INTEREST, "author"))?;
        let name = topic.key_value();
        let lookup = Lookup::element(paper.record_ref().key.clone(), author.clone());
        match self.mapper.fetch(self.kinds.interest, lookup) {
            Ok(mut interest) => {
                let known = interest
                    .get("topics")
                    .and_then(Value::as_array)
                    .is_some_and(|topics| topics.contains(&name));
                if !known {
                    self.mapper.array_append(&mut interest, "topics", name)?;
                }
                Ok(interest)
            }
            Err(err) if err.is_not_found() => self.mapper.insert(
                self.kinds.interest,
                NewEntity::new(doc! { "topics" => vec![name] })
                    .key(author)
                    .parent(paper.record_ref().clone()),
            ),
            Err(err) => Err(err),
        }
    }

    /// Merges papers sharing an arXiv, PubMed or DOI id.
    ///
    /// For each shared id the oldest paper is kept. It takes over the
    /// recommendations, posts and replies of the others, where the most
    /// recently updated copy wins on a shared key, and each person's
    /// interest topics are united. The other papers are then deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if a paper cannot be read, written or deleted.
    pub fn merge_duplicate_papers(&self) -> CoreResult<MergeReport> {
        let mut report = MergeReport::default();
        for kind in [self.kinds.arxiv, self.kinds.pubmed, self.kinds.doi] {
            for (id, holders) in self.mapper.duplicates(kind)? {
                let mut papers = holders
                    .into_iter()
                    .map(|holder| self.mapper.fetch(self.kinds.paper, holder.key))
                    .collect::<CoreResult<Vec<_>>>()?;
                if papers.len() < 2 {
                    continue;
                }
                let mut kept = papers.remove(0);
                let merged = merge_papers(&kept, &papers);
                // the duplicates still hold the unique post and reply ids
                // the merged write moves over, so they go first
                for paper in papers {
                    let key = paper.key().cloned();
                    self.mapper.delete(paper)?;
                    report.deleted.extend(key);
                }
                self.mapper.update(&mut kept, merged)?;
                info!(%id, paper = %kept.record_ref().key, "merged duplicate papers");
                report.kept.extend(kept.key().cloned());
            }
        }
        Ok(report)
    }

    /// Makes `person` follow `target`. Returns `false` if it already did.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when `person` is no longer stored.
    pub fn subscribe(&self, person: &mut Entity, target: &Entity) -> CoreResult<bool> {
        let key = target.key_value();
        let already = person
            .get("subscriptions")
            .and_then(Value::as_array)
            .is_some_and(|subs| subs.contains(&key));
        if already {
            return Ok(false);
        }
        self.mapper.array_append(person, "subscriptions", key)?;
        Ok(true)
    }

    /// Makes `person` stop following `target`.
    ///
    /// # Errors
    ///
    /// Returns `ValueNotInArray` when `person` did not follow `target`.
    pub fn unsubscribe(&self, person: &mut Entity, target: &Entity) -> CoreResult<()> {
        self.mapper
            .array_del(person, "subscriptions", target.key_value())
    }

    /// Papers listing `person` among their authors.
    ///
    /// # Errors
    ///
    /// Returns an error if a link cannot be resolved.
    pub fn papers_of(&self, person: &mut Entity) -> CoreResult<Vec<Entity>> {
        Ok(self
            .mapper
            .resolve(person, "papers")?
            .entities()
            .cloned()
            .collect())
    }
}

fn elements(paper: &Entity, field: &str) -> Vec<Document> {
    paper
        .get(field)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_map).cloned().collect())
        .unwrap_or_default()
}

fn into_array(elements: Vec<Document>) -> Value {
    Value::Array(elements.into_iter().map(Value::Map).collect())
}

fn updated(element: &Document) -> Option<&str> {
    element.get("updated").and_then(Value::as_text)
}

/// Adds the `incoming` elements whose key `kept` lacks, and replaces
/// those `incoming` holds a newer version of.
fn merge_by_key(kept: &mut Vec<Document>, incoming: Vec<Document>, key_field: &str) -> bool {
    let mut changed = false;
    for element in incoming {
        let Some(key) = element.get(key_field).cloned() else {
            continue;
        };
        match kept.iter_mut().find(|e| e.get(key_field) == Some(&key)) {
            Some(existing) => {
                if updated(&element) > updated(existing) {
                    *existing = element;
                    changed = true;
                }
            }
            None => {
                kept.push(element);
                changed = true;
            }
        }
    }
    changed
}

/// Unites the topics of interests by the same author.
fn merge_interests(kept: &mut Vec<Document>, incoming: Vec<Document>) -> bool {
    let mut changed = false;
    for element in incoming {
        let Some(author) = element.get("author").cloned() else {
            continue;
        };
        let Some(existing) = kept.iter_mut().find(|e| e.get("author") == Some(&author)) else {
            kept.push(element);
            changed = true;
            continue;
        };
        let topics = |doc: &Document| {
            doc.get("topics")
                .and_then(Value::as_array)
                .map(<[Value]>::to_vec)
                .unwrap_or_default()
        };
        let mut union = topics(existing);
        let before = union.len();
        for topic in topics(&element) {
            if !union.contains(&topic) {
                union.push(topic);
            }
        }
        if union.len() > before {
            existing.insert("topics", Value::Array(union));
            changed = true;
        }
    }
    changed
}

/// The array fields of `kept` that change once `others` are merged in.
fn merge_papers(kept: &Entity, others: &[Entity]) -> Document {
    let mut changes = Document::new();
    for (field, key_field) in MERGED_ARRAYS {
        let mut merged = elements(kept, field);
        let mut changed = false;
        for other in others {
            changed |= merge_by_key(&mut merged, elements(other, field), key_field);
        }
        if changed {
            changes.insert(field, into_array(merged));
        }
    }
    let mut interests = elements(kept, "interests");
    let mut changed = false;
    for other in others {
        changed |= merge_interests(&mut interests, elements(other, "interests"));
    }
    if changed {
        changes.insert("interests", into_array(interests));
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use spnet_core::{ExternalError, FnSource};

    fn arxiv() -> impl ExternalSource {
        FnSource::new("arxiv", |key: &Key| {
            Ok(doc! { "title" => format!("paper {key}"), "authorNames" => vec!["Fred"] })
        })
    }

    #[test]
    fn paper_by_arxiv_seeds_the_paper() {
        let platform = Platform::open_in_memory().unwrap();
        let paper = platform.paper_by_arxiv("1302.1234", &arxiv()).unwrap();
        assert_eq!(paper.get("title"), Some(&Value::from("paper 1302.1234")));
        assert_eq!(
            paper.child("arxiv").and_then(Entity::key),
            Some(&Key::from("1302.1234"))
        );
        let again = platform.paper_by_arxiv("1302.1234", &arxiv()).unwrap();
        assert_eq!(paper, again);
    }

    #[test]
    fn failing_source_creates_nothing() {
        let platform = Platform::open_in_memory().unwrap();
        let down = FnSource::new("doi", |_: &Key| {
            Err(ExternalError::unavailable("doi", "503"))
        });
        assert!(platform.paper_by_doi("10.1/x", &down).is_err());
        let none = platform
            .mapper()
            .find(
                platform.kinds().paper,
                &spnet_store::Filter::new(),
                &spnet_store::FindOptions::new(),
            )
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn topics_are_found_or_inserted() {
        let platform = Platform::open_in_memory().unwrap();
        let first = platform.topic("cosmology").unwrap();
        let second = platform.topic("cosmology").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.key(), Some(&Key::from("cosmology")));
    }

    fn post(id: &str, author: &Entity, updated: &str) -> IncomingPost {
        IncomingPost {
            id: id.to_string(),
            author: author.key().cloned(),
            text: format!("{id} of {updated}"),
            etag: updated.to_string(),
            updated: Some(updated.to_string()),
            ..IncomingPost::default()
        }
    }

    #[test]
    fn duplicate_papers_merge_into_the_oldest() {
        let store = Arc::new(InMemoryStore::new());
        let config = MapperConfig::default().ensure_indexes(false);
        let platform = Platform::with_store_and_config(store, config).unwrap();
        let kinds = *platform.kinds();
        let mapper = platform.mapper();
        let copy = |title: &str| {
            let arxiv = mapper
                .insert(kinds.arxiv, NewEntity::new(doc! { "id" => "1302.1234", "title" => title }))
                .unwrap();
            mapper.fetch(kinds.paper, arxiv.record_ref().key.clone()).unwrap()
        };
        let first = copy("first");
        let second = copy("second");
        let person = |name: &str| {
            mapper
                .insert(kinds.person, NewEntity::new(doc! { "name" => name }))
                .unwrap()
        };
        let fred = person("fred");
        let jojo = person("jojo");
        let cosmology = platform.topic("cosmology").unwrap();
        let physics = platform.topic("physics").unwrap();

        platform.recommend(&first, &post("r1", &fred, "2013-01-01")).unwrap();
        platform.recommend(&second, &post("r2", &fred, "2013-02-01")).unwrap();
        platform.recommend(&second, &post("r3", &jojo, "2013-01-15")).unwrap();
        let on_second = platform.record_post(&second, &post("p2", &jojo, "2013-01-20")).unwrap();
        platform.record_reply(&on_second, &post("c1", &fred, "2013-01-21")).unwrap();
        platform.add_interest(&first, &fred, &cosmology).unwrap();
        platform.add_interest(&second, &fred, &physics).unwrap();
        platform.add_interest(&second, &jojo, &physics).unwrap();

        let first_key = first.key().cloned().unwrap();
        let second_key = second.key().cloned().unwrap();
        let report = platform.merge_duplicate_papers().unwrap();
        assert_eq!(report.kept, vec![first_key.clone()]);
        assert_eq!(report.deleted, vec![second_key.clone()]);
        assert!(mapper.fetch(kinds.paper, second_key).unwrap_err().is_not_found());

        let merged = mapper.fetch(kinds.paper, first_key.clone()).unwrap();
        let recs = merged.children("recommendations");
        assert_eq!(recs.len(), 2);
        let by_fred = recs.iter().find(|rec| rec.key() == fred.key()).unwrap();
        assert_eq!(by_fred.get("text"), Some(&Value::from("r2 of 2013-02-01")));
        assert_eq!(merged.children("posts").len(), 1);
        assert_eq!(merged.children("interests").len(), 2);

        let reply = mapper.fetch(kinds.reply, "c1").unwrap();
        assert_eq!(reply.parent(), first.entity_ref());
        let interest = mapper
            .fetch(kinds.interest, Lookup::element(first_key, fred.key().cloned().unwrap()))
            .unwrap();
        assert_eq!(
            interest.get("topics"),
            Some(&Value::from(vec!["cosmology", "physics"]))
        );

        assert_eq!(platform.merge_duplicate_papers().unwrap(), MergeReport::default());
    }

    #[test]
    fn subscribe_is_idempotent() {
        let platform = Platform::open_in_memory().unwrap();
        let person = platform.kinds().person;
        let mut fred = platform
            .mapper()
            .insert(person, NewEntity::new(doc! { "name" => "fred" }))
            .unwrap();
        let jojo = platform
            .mapper()
            .insert(person, NewEntity::new(doc! { "name" => "jojo" }))
            .unwrap();

        assert!(platform.subscribe(&mut fred, &jojo).unwrap());
        assert!(!platform.subscribe(&mut fred, &jojo).unwrap());
        assert_eq!(
            fred.get("subscriptions"),
            Some(&Value::Array(vec![jojo.key_value()]))
        );

        platform.unsubscribe(&mut fred, &jojo).unwrap();
        assert!(platform.unsubscribe(&mut fred, &jojo).is_err());
    }
}
