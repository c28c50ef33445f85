//! Platforms persisted through the file store.

use spnet_core::{Lookup, NewEntity};
use spnet_testkit::prelude::*;
use spnet_value::{doc, Value};

#[test]
fn entities_and_indexes_survive_reopen() {
    init_tracing();
    let platform = TestPlatform::file();
    let stub = StubSource::titled("Persistent");
    let paper = platform.paper_by_arxiv("1302.0001", &stub).unwrap();
    let fred = platform.person("fred");
    let kinds = *platform.kinds();
    platform
        .mapper()
        .insert(
            kinds.recommendation,
            NewEntity::new(doc! { "author" => fred.key_value(), "text" => "keep" })
                .parent(paper.record_ref().clone()),
        )
        .unwrap();
    platform
        .mapper()
        .insert(
            kinds.post,
            NewEntity::new(doc! { "id" => "g+1", "author" => fred.key_value() })
                .parent(paper.record_ref().clone()),
        )
        .unwrap();

    let platform = platform.reopen();

    let again = platform.paper_by_arxiv("1302.0001", &stub).unwrap();
    assert_eq!(again, paper);
    assert_eq!(stub.calls(), 1);

    let rec = platform
        .mapper()
        .fetch(
            kinds.recommendation,
            Lookup::element(paper.record_ref().key.clone(), fred.key().cloned().unwrap()),
        )
        .unwrap();
    assert_eq!(rec.get("text"), Some(&Value::from("keep")));

    let other = platform.paper("other");
    let err = platform
        .mapper()
        .insert(
            kinds.post,
            NewEntity::new(doc! { "id" => "g+1", "author" => fred.key_value() })
                .parent(other.record_ref().clone()),
        )
        .unwrap_err();
    assert!(err.is_duplicate_key(), "{err}");
}

#[test]
fn file_platform_helper_exposes_its_directory() {
    with_file_platform(|platform, path| {
        platform.topic("cosmology").unwrap();
        assert!(path.is_dir());
    });
}
