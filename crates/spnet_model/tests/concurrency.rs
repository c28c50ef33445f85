//! Concurrent use of one platform from several threads.

use spnet_core::{CoreError, Lookup, NewEntity};
use spnet_store::{Filter, FindOptions};
use spnet_testkit::prelude::*;
use spnet_value::doc;
use std::thread;
use std::time::Duration;

#[test]
fn racing_get_or_create_yields_one_paper() {
    init_tracing();
    let platform = TestPlatform::memory();
    let stub = StubSource::titled("Raced").with_delay(Duration::from_millis(20));

    let papers: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| platform.paper_by_arxiv("1302.9999", &stub)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect()
    });

    assert!(papers.windows(2).all(|pair| pair[0] == pair[1]));
    assert!((1..=8).contains(&stub.calls()));
    let stored = platform
        .mapper()
        .find(
            platform.kinds().paper,
            &Filter::new().eq("arxiv.id", "1302.9999"),
            &FindOptions::new(),
        )
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[test]
fn racing_recommendations_by_different_people_all_land() {
    let platform = TestPlatform::memory();
    let paper = platform.paper("Popular");
    let people: Vec<_> = (0..6).map(|i| platform.person(&format!("p{i}"))).collect();

    thread::scope(|scope| {
        for person in &people {
            let platform = &platform;
            let paper = &paper;
            scope.spawn(move || {
                platform
                    .mapper()
                    .insert(
                        platform.kinds().recommendation,
                        NewEntity::new(doc! { "author" => person.key_value(), "text" => "yes" })
                            .parent(paper.record_ref().clone()),
                    )
                    .unwrap();
            });
        }
    });

    let recs = platform
        .mapper()
        .find(
            platform.kinds().recommendation,
            &Filter::by_id(paper.key_value()),
            &FindOptions::new(),
        )
        .unwrap();
    assert_eq!(recs.len(), people.len());
}

#[test]
fn stale_element_list_writes_conflict() {
    let platform = TestPlatform::memory();
    let kinds = *platform.kinds();
    let paper = platform.paper("X");
    let fred = platform.person("fred");
    let jojo = platform.person("jojo");
    platform
        .mapper()
        .insert(
            kinds.recommendation,
            NewEntity::new(doc! { "author" => fred.key_value(), "text" => "t" })
                .parent(paper.record_ref().clone()),
        )
        .unwrap();

    let lookup = Lookup::element(paper.record_ref().key.clone(), fred.key().cloned().unwrap());
    let mut mine = platform.mapper().fetch(kinds.recommendation, lookup.clone()).unwrap();
    let mut theirs = platform.mapper().fetch(kinds.recommendation, lookup.clone()).unwrap();

    platform
        .mapper()
        .array_append(&mut theirs, "forwards", jojo.key_value())
        .unwrap();
    let err = platform
        .mapper()
        .array_append(&mut mine, "forwards", jojo.key_value())
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict { .. }), "{err}");

    let mut fresh = platform.mapper().fetch(kinds.recommendation, lookup).unwrap();
    platform
        .mapper()
        .array_del(&mut fresh, "forwards", jojo.key_value())
        .unwrap();
}
