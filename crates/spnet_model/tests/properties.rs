//! Properties of the mapping layer exercised through the platform kinds.

use proptest::prelude::*;
use spnet_core::{CoreError, Key, Lookup, NewEntity};
use spnet_testkit::prelude::*;
use spnet_value::{doc, Value, ID_FIELD};

fn recommendation(author: &Key, text: &str) -> NewEntity {
    NewEntity::new(doc! { "author" => author, "text" => text })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn inserted_papers_read_back_unchanged(data in paper_data_strategy()) {
        let platform = TestPlatform::memory();
        let paper = platform
            .mapper()
            .insert(platform.kinds().paper, NewEntity::new(data.clone()))
            .unwrap();
        let key = paper.key().cloned().unwrap();

        let fetched = platform.mapper().fetch(platform.kinds().paper, key.clone()).unwrap();
        let mut expected = data;
        expected.insert(ID_FIELD, key.to_value());
        prop_assert_eq!(fetched.raw(), &expected);
    }
}

#[test]
fn array_element_keys_are_unique_per_parent() {
    let platform = TestPlatform::memory();
    let kinds = *platform.kinds();
    let first = platform.paper("first");
    let second = platform.paper("second");
    let fred = platform.person("fred");
    let author = fred.key().cloned().unwrap();

    platform
        .mapper()
        .insert(
            kinds.recommendation,
            recommendation(&author, "great").parent(first.record_ref().clone()),
        )
        .unwrap();
    let err = platform
        .mapper()
        .insert(
            kinds.recommendation,
            recommendation(&author, "still great").parent(first.record_ref().clone()),
        )
        .unwrap_err();
    assert!(err.is_duplicate_key(), "{err}");

    platform
        .mapper()
        .insert(
            kinds.recommendation,
            recommendation(&author, "also great").parent(second.record_ref().clone()),
        )
        .unwrap();

    let stored = platform
        .mapper()
        .fetch(kinds.recommendation, Lookup::element(first.record_ref().key.clone(), author))
        .unwrap();
    assert_eq!(stored.get("text"), Some(&Value::from("great")));
}

#[test]
fn unique_array_element_keys_are_unique_everywhere() {
    let platform = TestPlatform::memory();
    let kinds = *platform.kinds();
    let first = platform.paper("first");
    let second = platform.paper("second");
    let fred = platform.person("fred");

    let post = |paper: &spnet_core::Entity| {
        NewEntity::new(doc! { "id" => "g+123", "author" => fred.key_value(), "text" => "hi" })
            .parent(paper.record_ref().clone())
    };
    platform.mapper().insert(kinds.post, post(&first)).unwrap();
    let err = platform.mapper().insert(kinds.post, post(&second)).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateKey { .. }), "{err}");

    let err = platform.mapper().insert(kinds.post, post(&first)).unwrap_err();
    assert!(err.is_duplicate_key(), "{err}");
}

#[test]
fn resolving_a_link_twice_reads_the_store_once() {
    let platform = TestPlatform::memory();
    let kinds = *platform.kinds();
    let paper = platform.paper("X");
    let fred = platform.person("fred");
    let author = fred.key().cloned().unwrap();
    platform
        .mapper()
        .insert(kinds.recommendation, recommendation(&author, "t").parent(paper.record_ref().clone()))
        .unwrap();

    let mut rec = platform
        .mapper()
        .fetch(kinds.recommendation, Lookup::element(paper.record_ref().key.clone(), author))
        .unwrap();
    let before = platform.stats().reads();
    let first = platform.mapper().resolve(&mut rec, "author").unwrap().one().cloned();
    let second = platform.mapper().resolve(&mut rec, "author").unwrap().one().cloned();
    assert_eq!(platform.stats().reads(), before + 1);
    assert_eq!(first.as_ref(), Some(&fred));
    assert_eq!(first, second);
}

#[test]
fn get_or_create_asks_the_source_once() {
    let platform = TestPlatform::memory();
    let stub = StubSource::titled("Y");
    let first = platform
        .mapper()
        .get_or_create(platform.kinds().arxiv, "1302.1234", None, &stub)
        .unwrap();
    let second = platform
        .mapper()
        .get_or_create(platform.kinds().arxiv, "1302.1234", None, &stub)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.key(), Some(&Key::from("1302.1234")));
    assert_eq!(stub.calls(), 1);
}

#[test]
fn failed_get_or_create_leaves_nothing_behind() {
    let platform = TestPlatform::memory();
    let source = FailingSource::new(spnet_core::ExternalErrorKind::Unavailable);
    let err = platform.paper_by_pubmed("23456789", &source).unwrap_err();
    assert!(matches!(err, CoreError::ExternalSource(_)));
    assert_eq!(source.calls(), 1);

    let stub = StubSource::titled("recovered");
    let paper = platform.paper_by_pubmed("23456789", &stub).unwrap();
    assert_eq!(paper.get("title"), Some(&Value::from("recovered")));
}

#[test]
fn array_del_of_an_absent_value_changes_nothing() {
    let platform = TestPlatform::memory();
    let kinds = *platform.kinds();
    let mut paper = platform.paper("X");
    let fred = platform.person("fred");
    platform
        .mapper()
        .array_append(&mut paper, "authors", fred.key_value())
        .unwrap();
    let writes = platform.stats().writes();

    let stranger = platform.person("stranger");
    let err = platform
        .mapper()
        .array_del(&mut paper, "authors", stranger.key_value())
        .unwrap_err();
    assert!(matches!(err, CoreError::ValueNotInArray { .. }), "{err}");
    assert_eq!(platform.stats().writes(), writes);

    let stored = platform
        .mapper()
        .fetch(kinds.paper, paper.key().cloned().unwrap())
        .unwrap();
    assert_eq!(stored.get("authors"), Some(&Value::Array(vec![fred.key_value()])));
}

#[test]
fn array_del_removes_every_occurrence() {
    let platform = TestPlatform::memory();
    let kinds = *platform.kinds();
    let mut paper = platform.paper("X");
    let fred = platform.person("fred").key_value();
    let jojo = platform.person("jojo").key_value();
    for author in [&fred, &jojo, &fred] {
        platform
            .mapper()
            .array_append(&mut paper, "authors", author.clone())
            .unwrap();
    }
    platform.mapper().array_del(&mut paper, "authors", fred).unwrap();

    let stored = platform
        .mapper()
        .fetch(kinds.paper, paper.key().cloned().unwrap())
        .unwrap();
    assert_eq!(stored.get("authors"), Some(&Value::Array(vec![jojo])));
}
