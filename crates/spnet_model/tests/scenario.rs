//! End-to-end flows over the platform kinds.

use spnet_core::{CoreError, Entity, Key, Lookup, NewEntity, Resolved};
use spnet_model::views::{InterestView, PaperView, PostView, RecommendationView, ReplyView};
use spnet_model::IncomingPost;
use spnet_store::{Filter, FindOptions};
use spnet_testkit::prelude::*;
use spnet_value::{doc, Value};

#[test]
fn paper_recommendation_and_external_lifecycle() {
    init_tracing();
    let platform = TestPlatform::memory();
    let kinds = *platform.kinds();
    let mapper = platform.mapper();

    let paper = mapper
        .insert(kinds.paper, NewEntity::new(doc! { "title" => "X" }))
        .unwrap();
    let p1 = paper.key().cloned().unwrap();

    mapper
        .insert(
            kinds.recommendation,
            NewEntity::new(doc! { "author" => "A1", "text" => "t" })
                .parent(paper.record_ref().clone()),
        )
        .unwrap();
    let mut rec = mapper
        .fetch(kinds.recommendation, Lookup::element(p1.clone(), "A1"))
        .unwrap();
    assert_eq!(rec.get("text"), Some(&Value::from("t")));

    mapper.array_append(&mut rec, "sigs", "topic1").unwrap();
    mapper.array_del(&mut rec, "sigs", "topic1").unwrap();
    let rec = mapper
        .fetch(kinds.recommendation, Lookup::element(p1.clone(), "A1"))
        .unwrap();
    assert_eq!(rec.get("sigs"), Some(&Value::Array(Vec::new())));

    let err = mapper
        .fetch(kinds.recommendation, Lookup::element(p1, "A2"))
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");

    let stub = StubSource::titled("Y");
    let first = mapper.get_or_create(kinds.arxiv, "arxiv:9999", None, &stub).unwrap();
    let second = mapper.get_or_create(kinds.arxiv, "arxiv:9999", None, &stub).unwrap();
    assert_eq!(stub.calls(), 1);
    assert_eq!(first.parent(), second.parent());

    let created = mapper
        .fetch(kinds.paper, first.record_ref().key.clone())
        .unwrap();
    assert_ne!(created, paper);
    assert_eq!(PaperView::new(&created).title(), Some("Y"));
    assert_eq!(PaperView::new(&created).author_names(), vec!["Fred Smith"]);
}

#[test]
fn posts_refresh_only_when_the_etag_changes() {
    let platform = TestPlatform::memory();
    let stub = StubSource::titled("Dark energy");
    let paper = platform.paper_by_arxiv("1302.1234", &stub).unwrap();
    let fred = platform.person("fred");

    let mut incoming = IncomingPost {
        id: "z12abc".to_string(),
        author: fred.key().cloned(),
        text: "old data".to_string(),
        etag: "v1".to_string(),
        published: Some("2013-02-05T17:23:09Z".to_string()),
        updated: None,
        sigs: vec!["cosmology".to_string()],
    };
    let post = platform.record_post(&paper, &incoming).unwrap();
    assert_eq!(PostView::new(&post).text(), Some("old data"));

    incoming.text = "ignored".to_string();
    let writes = platform.stats().writes();
    let same = platform.record_post(&paper, &incoming).unwrap();
    assert_eq!(PostView::new(&same).text(), Some("old data"));
    assert_eq!(platform.stats().writes(), writes);

    incoming.text = "new and improved".to_string();
    incoming.etag = "v2".to_string();
    let refreshed = platform.record_post(&paper, &incoming).unwrap();
    assert_eq!(PostView::new(&refreshed).etag(), Some("v2"));

    let stored = platform
        .mapper()
        .fetch(platform.kinds().post, "z12abc")
        .unwrap();
    assert_eq!(PostView::new(&stored).text(), Some("new and improved"));
    assert_eq!(PostView::new(&stored).sigs(), vec!["cosmology"]);
}

#[test]
fn recommendations_link_back_to_people_and_topics() {
    let platform = TestPlatform::memory();
    let kinds = *platform.kinds();
    let paper = platform.paper("Inflation");
    let mut fred = platform.person("fred");
    let cosmology = platform.topic("cosmology").unwrap();

    let incoming = IncomingPost {
        id: "z1".to_string(),
        author: fred.key().cloned(),
        text: "#recommend".to_string(),
        etag: "e1".to_string(),
        sigs: vec!["cosmology".to_string()],
        ..IncomingPost::default()
    };
    let mut rec = platform.recommend(&paper, &incoming).unwrap();
    assert_eq!(RecommendationView::new(&rec).author(), fred.key().cloned());

    let sigs = platform.mapper().resolve(&mut rec, "sigs").unwrap();
    assert_eq!(sigs.entities().collect::<Vec<_>>(), vec![&cosmology]);
    let parent = platform.mapper().resolve(&mut rec, "parent").unwrap();
    assert_eq!(parent.one().and_then(|p| p.key()), paper.key());

    let recs = platform.mapper().resolve(&mut fred, "recommendations").unwrap();
    assert_eq!(recs.entities().count(), 1);

    let again = platform.recommend(&paper, &incoming).unwrap();
    assert_eq!(again, rec);
    let all = platform
        .mapper()
        .find(kinds.recommendation, &Filter::new(), &FindOptions::new())
        .unwrap();
    assert_eq!(all.len(), 1);
}

fn incoming(id: &str, author: &Entity, text: &str, etag: &str) -> IncomingPost {
    IncomingPost {
        id: id.to_string(),
        author: author.key().cloned(),
        text: text.to_string(),
        etag: etag.to_string(),
        ..IncomingPost::default()
    }
}

#[test]
fn replies_remember_what_they_answer() {
    let platform = TestPlatform::memory();
    let paper = platform.paper("Inflation");
    let fred = platform.person("fred");
    let jojo = platform.person("jojo");

    let post = platform
        .record_post(&paper, &incoming("z1", &fred, "have a look", "e1"))
        .unwrap();
    let rec = platform
        .recommend(&paper, &incoming("z2", &jojo, "#recommend", "e2"))
        .unwrap();

    let reply = platform
        .record_reply(&post, &incoming("c1", &jojo, "agreed", "v1"))
        .unwrap();
    assert_eq!(ReplyView::new(&reply).reply_to(), Some("z1"));
    assert_eq!(ReplyView::new(&reply).source_type(), Some("post"));
    assert_eq!(ReplyView::new(&reply).author(), jojo.key().cloned());
    assert_eq!(reply.parent(), paper.entity_ref());

    let on_rec = platform
        .record_reply(&rec, &incoming("c2", &fred, "why?", "v1"))
        .unwrap();
    assert_eq!(ReplyView::new(&on_rec).reply_to(), Some("z2"));
    assert_eq!(ReplyView::new(&on_rec).source_type(), Some("rec"));

    let writes = platform.stats().writes();
    platform
        .record_reply(&post, &incoming("c1", &jojo, "ignored", "v1"))
        .unwrap();
    assert_eq!(platform.stats().writes(), writes);

    let mut edited = incoming("c1", &jojo, "agreed, mostly", "v2");
    edited.updated = Some("2013-02-06T10:00:00Z".to_string());
    platform.record_reply(&post, &edited).unwrap();
    let stored = platform.mapper().fetch(platform.kinds().reply, "c1").unwrap();
    assert_eq!(ReplyView::new(&stored).text(), Some("agreed, mostly"));
    assert_eq!(ReplyView::new(&stored).updated(), Some("2013-02-06T10:00:00Z"));
    assert_eq!(ReplyView::new(&stored).reply_to(), Some("z1"));

    let err = platform
        .record_reply(&paper, &incoming("c3", &fred, "?", "v1"))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation { .. }), "{err}");

    let stored = platform
        .mapper()
        .fetch(platform.kinds().paper, paper.key().cloned().unwrap())
        .unwrap();
    assert_eq!(stored.children("replies").len(), 2);
}

#[test]
fn interests_collect_topics_per_person() {
    let platform = TestPlatform::memory();
    let paper = platform.paper("Inflation");
    let fred = platform.person("fred");
    let jojo = platform.person("jojo");
    let cosmology = platform.topic("cosmology").unwrap();
    let physics = platform.topic("physics").unwrap();

    platform.add_interest(&paper, &fred, &cosmology).unwrap();
    platform.add_interest(&paper, &fred, &cosmology).unwrap();
    let mut interest = platform.add_interest(&paper, &fred, &physics).unwrap();
    platform.add_interest(&paper, &jojo, &physics).unwrap();
    assert_eq!(InterestView::new(&interest).topics(), vec!["cosmology", "physics"]);
    assert_eq!(InterestView::new(&interest).author(), fred.key().cloned());

    let topics = platform.mapper().resolve(&mut interest, "topics").unwrap();
    assert_eq!(topics.entities().collect::<Vec<_>>(), vec![&cosmology, &physics]);

    let stored = platform
        .mapper()
        .fetch(platform.kinds().paper, paper.key().cloned().unwrap())
        .unwrap();
    assert_eq!(stored.children("interests").len(), 2);
}

#[test]
fn subscriptions_resolve_both_ways() {
    let platform = TestPlatform::memory();
    let mut fred = platform.person("fred");
    let mut jojo = platform.person("jojo");
    assert!(platform.subscribe(&mut fred, &jojo).unwrap());

    let subscriptions = platform.mapper().resolve(&mut fred, "subscriptions").unwrap();
    assert_eq!(subscriptions.entities().collect::<Vec<_>>(), vec![&jojo]);
    let subscribers = platform.mapper().resolve(&mut jojo, "subscribers").unwrap();
    assert_eq!(subscribers.entities().collect::<Vec<_>>(), vec![&fred]);

    let mut loner = platform.person("loner");
    let none = platform.mapper().resolve(&mut loner, "subscriptions").unwrap();
    assert!(matches!(none, Resolved::Many(list) if list.is_empty()));
}

#[test]
fn profiles_seed_the_person() {
    let platform = TestPlatform::memory();
    let gplus = StubSource::new(
        "gplus",
        doc! { "displayName" => "Fred Smith", "image" => "http://img/fred.png" },
    );
    let fred = platform.person_by_gplus("1234567890", &gplus).unwrap();
    assert_eq!(fred.get("name"), Some(&Value::from("Fred Smith")));
    let profile = fred.child("gplus").unwrap();
    assert_eq!(profile.key(), Some(&Key::from("1234567890")));

    let papers = platform.papers_of(&mut fred.clone()).unwrap();
    assert!(papers.is_empty());
}

#[test]
fn json_metadata_lands_in_the_paper() {
    let platform = TestPlatform::memory();
    let source = JsonSource::new(serde_json::json!({
        "title": "Dark matter halos",
        "authorNames": ["Fred Smith", "Jojo Jones"],
        "published": "2012-11-30",
    }));
    let paper = platform.paper_by_doi("10.1103/PhysRevD.87.023501", &source).unwrap();
    assert_eq!(
        PaperView::new(&paper).author_names(),
        vec!["Fred Smith", "Jojo Jones"]
    );
    let doi = paper.child("doi").unwrap();
    assert_eq!(doi.get("published"), Some(&Value::from("2012-11-30")));
}
