//! Kind declarations and relation wiring.

use spnet_core::{
    CoreResult, KeyPolicy, KindId, KindSpec, LinkDef, Registry, RegistryBuilder, Resolved,
};
use spnet_store::Filter;

/// Kind names.
pub mod names {
    /// A paper, however it was first referenced.
    pub const PAPER: &str = "Paper";
    /// A person (author, recommender, subscriber).
    pub const PERSON: &str = "Person";
    /// A topic (special interest group), keyed by its name.
    pub const TOPIC: &str = "Topic";
    /// A question raised about a paper.
    pub const ISSUE: &str = "Issue";
    /// arXiv metadata embedded in a paper.
    pub const ARXIV: &str = "ArxivPaperData";
    /// PubMed metadata embedded in a paper.
    pub const PUBMED: &str = "PubmedPaperData";
    /// DOI metadata embedded in a paper.
    pub const DOI: &str = "DoiPaperData";
    /// Google+ profile embedded in a person.
    pub const GPLUS: &str = "GplusPersonData";
    /// A person's recommendation of a paper (one per person and paper).
    pub const RECOMMENDATION: &str = "Recommendation";
    /// A social-network post about a paper.
    pub const POST: &str = "Post";
    /// A reply to a post or recommendation, stored on the paper.
    pub const REPLY: &str = "Reply";
    /// The topics one person marked a paper as interesting for.
    pub const INTEREST: &str = "PaperInterest";
    /// An e-mail address of a person.
    pub const EMAIL: &str = "EmailAddress";
    /// A person's vote on an issue (one per person and issue).
    pub const ISSUE_VOTE: &str = "IssueVote";
}

use names::*;

/// Fields shared by the bibliographic metadata kinds.
const BIBLIOGRAPHIC_FIELDS: [&str; 5] = ["title", "authorNames", "summary", "published", "url"];

fn bibliographic(name: &str, path: &str) -> KindSpec {
    KindSpec::embedded(name, "paper", path)
        .fields(BIBLIOGRAPHIC_FIELDS)
        .seed("title", "title")
        .seed("authorNames", "authorNames")
}

fn none() -> Resolved {
    Resolved::Many(Vec::new())
}

/// Declares every kind, link and unwrap rule of the platform.
#[must_use]
pub fn builder() -> RegistryBuilder {
    RegistryBuilder::new()
        .kind(
            KindSpec::top_level(PAPER, "paper")
                .required(["title"])
                .fields(["authorNames", "year"]),
        )
        .kind(KindSpec::top_level(PERSON, "person").fields(["name"]))
        .kind(
            KindSpec::top_level(TOPIC, "topic")
                .key_policy(KeyPolicy::Supplied)
                .fields(["description"]),
        )
        .kind(
            KindSpec::top_level(ISSUE, "issue")
                .required(["title"])
                .fields(["category", "text"]),
        )
        .kind(bibliographic(ARXIV, "arxiv.id"))
        .kind(bibliographic(PUBMED, "pubmed.id"))
        .kind(bibliographic(DOI, "doi.id"))
        .kind(
            KindSpec::embedded(GPLUS, "person", "gplus.id")
                .fields(["displayName", "image", "url"])
                .seed("displayName", "name"),
        )
        .kind(
            KindSpec::array_element(RECOMMENDATION, "paper", "recommendations.author")
                .fields(["text", "published", "etag"]),
        )
        .kind(
            KindSpec::unique_array_element(POST, "paper", "posts.id")
                .fields(["text", "published", "etag"]),
        )
        .kind(
            KindSpec::unique_array_element(REPLY, "paper", "replies.id")
                .fields(["text", "published", "updated", "etag", "replyTo", "sourcetype"]),
        )
        .kind(KindSpec::array_element(INTEREST, "paper", "interests.author"))
        .kind(KindSpec::unique_array_element(EMAIL, "person", "email.address").fields(["current"]))
        .kind(KindSpec::array_element(ISSUE_VOTE, "issue", "votes.person").fields(["vote"]))
        // Paper
        .link(PAPER, "authors", LinkDef::by_key_list(PERSON))
        .link(PAPER, "references", LinkDef::by_key_list(PAPER).missing(none()))
        .link(
            PAPER,
            "issues",
            LinkDef::by_reverse_query(ISSUE, |paper| Filter::new().eq("paper", paper.key_value()))
                .missing(none()),
        )
        // Person
        .link(
            PERSON,
            "papers",
            LinkDef::by_reverse_query(PAPER, |person| {
                Filter::new().eq("authors", person.key_value())
            }),
        )
        .link(
            PERSON,
            "recommendations",
            LinkDef::by_reverse_query(RECOMMENDATION, |person| {
                Filter::new().eq("recommendations.author", person.key_value())
            }),
        )
        .link(PERSON, "subscriptions", LinkDef::by_key_list(PERSON).missing(none()))
        .link(
            PERSON,
            "subscribers",
            LinkDef::by_reverse_query(PERSON, |person| {
                Filter::new().eq("subscriptions", person.key_value())
            }),
        )
        // Issue
        .link(ISSUE, "paper", LinkDef::by_key(PAPER))
        .link(ISSUE, "author", LinkDef::by_key(PERSON))
        // Nested kinds
        .link(RECOMMENDATION, "author", LinkDef::by_key(PERSON))
        .link(RECOMMENDATION, "forwards", LinkDef::by_key_list(PERSON).missing(none()))
        .link(RECOMMENDATION, "sigs", LinkDef::by_key_list(TOPIC).missing(none()))
        .link(POST, "author", LinkDef::by_key(PERSON))
        .link(POST, "sigs", LinkDef::by_key_list(TOPIC).missing(none()))
        .link(REPLY, "author", LinkDef::by_key(PERSON))
        .link(INTEREST, "author", LinkDef::by_key(PERSON))
        .link(INTEREST, "topics", LinkDef::by_key_list(TOPIC).missing(none()))
        .link(ISSUE_VOTE, "person", LinkDef::by_key(PERSON))
        .link(ARXIV, "parent", LinkDef::by_parent_ref())
        .link(PUBMED, "parent", LinkDef::by_parent_ref())
        .link(DOI, "parent", LinkDef::by_parent_ref())
        .link(GPLUS, "parent", LinkDef::by_parent_ref())
        .link(RECOMMENDATION, "parent", LinkDef::by_parent_ref())
        .link(POST, "parent", LinkDef::by_parent_ref())
        .link(REPLY, "parent", LinkDef::by_parent_ref())
        .link(INTEREST, "parent", LinkDef::by_parent_ref())
        .link(EMAIL, "parent", LinkDef::by_parent_ref())
        .link(ISSUE_VOTE, "parent", LinkDef::by_parent_ref())
        // Unwrap rules
        .unwrap(PAPER, "arxiv", ARXIV)
        .unwrap(PAPER, "pubmed", PUBMED)
        .unwrap(PAPER, "doi", DOI)
        .unwrap(PAPER, "recommendations", RECOMMENDATION)
        .unwrap(PAPER, "posts", POST)
        .unwrap(PAPER, "replies", REPLY)
        .unwrap(PAPER, "interests", INTEREST)
        .unwrap(PERSON, "gplus", GPLUS)
        .unwrap(PERSON, "email", EMAIL)
        .unwrap(ISSUE, "votes", ISSUE_VOTE)
}

/// Builds the platform registry.
///
/// # Errors
///
/// Fails only if the declarations above are inconsistent.
pub fn registry() -> CoreResult<Registry> {
    builder().build()
}

/// Ids of every platform kind in a built registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kinds {
    /// [`names::PAPER`]
    pub paper: KindId,
    /// [`names::PERSON`]
    pub person: KindId,
    /// [`names::TOPIC`]
    pub topic: KindId,
    /// [`names::ISSUE`]
    pub issue: KindId,
    /// [`names::ARXIV`]
    pub arxiv: KindId,
    /// [`names::PUBMED`]
    pub pubmed: KindId,
    /// [`names::DOI`]
    pub doi: KindId,
    /// [`names::GPLUS`]
    pub gplus: KindId,
    /// [`names::RECOMMENDATION`]
    pub recommendation: KindId,
    /// [`names::POST`]
    pub post: KindId,
    /// [`names::REPLY`]
    pub reply: KindId,
    /// [`names::INTEREST`]
    pub interest: KindId,
    /// [`names::EMAIL`]
    pub email: KindId,
    /// [`names::ISSUE_VOTE`]
    pub issue_vote: KindId,
}

impl Kinds {
    /// Looks every kind up in `registry`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `registry` lacks a platform kind.
    pub fn resolve(registry: &Registry) -> CoreResult<Self> {
        let id = |name: &str| registry.kind_named(name).map(|kind| kind.id());
        Ok(Self {
            paper: id(PAPER)?,
            person: id(PERSON)?,
            topic: id(TOPIC)?,
            issue: id(ISSUE)?,
            arxiv: id(ARXIV)?,
            pubmed: id(PUBMED)?,
            doi: id(DOI)?,
            gplus: id(GPLUS)?,
            recommendation: id(RECOMMENDATION)?,
            post: id(POST)?,
            reply: id(REPLY)?,
            interest: id(INTEREST)?,
            email: id(EMAIL)?,
            issue_vote: id(ISSUE_VOTE)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spnet_core::{Strategy, Topology};

    #[test]
    fn platform_registry_builds() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), 14);
        let kinds = Kinds::resolve(&registry).unwrap();

        let rec = registry.kind(kinds.recommendation).unwrap();
        assert_eq!(rec.topology(), Topology::ArrayElement);
        assert_eq!(rec.parent(), Some(kinds.paper));
        assert_eq!(rec.path().map(|p| p.key_path()), Some("recommendations.author".to_string()));

        let person = registry.kind(kinds.person).unwrap();
        assert!(matches!(
            person.link("recommendations").unwrap().strategy(),
            Strategy::ByReverseQuery { target, .. } if *target == kinds.recommendation
        ));
        assert_eq!(person.unwrap_target("email"), Some(kinds.email));

        let paper = registry.kind(kinds.paper).unwrap();
        assert_eq!(paper.unwrap_target("replies"), Some(kinds.reply));
        assert_eq!(paper.unwrap_target("interests"), Some(kinds.interest));
        let reply = registry.kind(kinds.reply).unwrap();
        assert_eq!(reply.topology(), Topology::UniqueArrayElement);
        let interest = registry.kind(kinds.interest).unwrap();
        assert_eq!(interest.path().map(|p| p.key_path()), Some("interests.author".to_string()));
    }

    #[test]
    fn every_nested_kind_links_to_its_parent() {
        let registry = registry().unwrap();
        for kind in registry.kinds().filter(|k| k.topology().is_nested()) {
            assert!(kind.link("parent").is_some(), "{}", kind.name());
        }
    }
}
