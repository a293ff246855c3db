//! Comment link codec.
//!
//! Encodes a set of outgoing links as machine-parsable markers inside an
//! issue's free-text body, one marker per line:
//!
//! ```text
//! <!-- meridian:{type}={owner}/{repo}#{issueNumber} -->
//! ```
//!
//! The short form `<!-- meridian:{type}=#{issueNumber} -->` is accepted on
//! parse and resolves to the repository passed in. [`serialize`] always
//! writes the long form.
//!
//! Every write path composes the new body the same way:
//! [`compose`]`(body, links)` strips the existing marker block and appends a
//! fresh one after a blank-line separator.

use crate::domain::{ParsedNativeLink, RepoConfig};
use regex::Regex;
use std::sync::OnceLock;

const MARKER_PATTERN: &str = r"^\s*<!--\s*meridian:([A-Za-z0-9][A-Za-z0-9_-]*)=(?:([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+))?#(\d+)\s*-->\s*$";

fn marker_regex() -> &'static Regex {
    static MARKER_REGEX: OnceLock<Regex> = OnceLock::new();
    MARKER_REGEX.get_or_init(|| Regex::new(MARKER_PATTERN).expect("marker pattern is valid"))
}

/// Render one marker line.
#[must_use]
pub fn marker(link: &ParsedNativeLink) -> String {
    format!(
        "<!-- meridian:{}={}/{}#{} -->",
        link.link_type, link.owner, link.repo, link.issue_number
    )
}

/// Serialize links as marker lines, in input order.
///
/// Returns an empty string for an empty slice.
#[must_use]
pub fn serialize(links: &[ParsedNativeLink]) -> String {
    links.iter().map(marker).collect::<Vec<_>>().join("\n")
}

/// Parse every marker in `body`, in body order.
///
/// Lines that do not match the marker grammar are ignored, as are markers
/// whose issue number does not fit in a `u64`. A missing body yields an
/// empty set.
#[must_use]
pub fn parse(body: Option<&str>, repo: &RepoConfig) -> Vec<ParsedNativeLink> {
    let Some(body) = body else {
        return Vec::new();
    };

    body.lines()
        .filter_map(|line| parse_line(line, repo))
        .collect()
}

fn parse_line(line: &str, repo: &RepoConfig) -> Option<ParsedNativeLink> {
    let captures = marker_regex().captures(line)?;
    let issue_number = captures.get(4)?.as_str().parse::<u64>().ok()?;
    let (owner, name) = match (captures.get(2), captures.get(3)) {
        (Some(owner), Some(name)) => (owner.as_str().to_string(), name.as_str().to_string()),
        _ => (repo.owner.clone(), repo.repo.clone()),
    };

    Some(ParsedNativeLink {
        link_type: captures.get(1)?.as_str().to_string(),
        owner,
        repo: name,
        issue_number,
        reversed: false,
    })
}

fn is_marker(line: &str) -> bool {
    marker_regex().is_match(line)
}

/// Remove every marker line from `body`.
///
/// Blank lines that only separated a marker from its surroundings are
/// removed with it; a paragraph break around a removed marker collapses to
/// a single blank line. Trailing blank lines are always dropped.
#[must_use]
pub fn strip(body: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut after_marker = false;
    let mut had_gap = false;

    for line in body.lines() {
        if is_marker(line) {
            while kept.last().is_some_and(|l| l.trim().is_empty()) {
                kept.pop();
                had_gap = true;
            }
            after_marker = true;
            continue;
        }

        if after_marker {
            if line.trim().is_empty() {
                had_gap = true;
                continue;
            }
            if had_gap && !kept.is_empty() {
                kept.push("");
            }
            after_marker = false;
            had_gap = false;
        }

        kept.push(line);
    }

    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }

    kept.join("\n")
}

/// Build the body to write back: stripped content, then the marker block.
#[must_use]
pub fn compose(body: Option<&str>, links: &[ParsedNativeLink]) -> String {
    let stripped = strip(body.unwrap_or_default());
    if links.is_empty() {
        return stripped;
    }
    if stripped.is_empty() {
        return serialize(links);
    }
    format!("{stripped}\n\n{}", serialize(links))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn repo() -> RepoConfig {
        RepoConfig::new("acme", "widgets")
    }

    fn link(link_type: &str, number: u64) -> ParsedNativeLink {
        ParsedNativeLink::outgoing(link_type, &repo(), number)
    }

    #[test]
    fn test_serialize_format() {
        let out = serialize(&[link("duplicates", 7), link("relates-to", 12)]);
        assert_eq!(
            out,
            "<!-- meridian:duplicates=acme/widgets#7 -->\n<!-- meridian:relates-to=acme/widgets#12 -->"
        );
    }

    #[test]
    fn test_serialize_empty() {
        assert_eq!(serialize(&[]), "");
    }

    #[test]
    fn test_parse_none_body() {
        assert!(parse(None, &repo()).is_empty());
    }

    #[test]
    fn test_parse_ignores_prose_and_foreign_comments() {
        let body = "Steps to reproduce\n<!-- reviewer note -->\n<!-- meridian:duplicates=acme/widgets#3 -->\nmeridian:blocks=acme/widgets#4";
        assert_eq!(parse(Some(body), &repo()), vec![link("duplicates", 3)]);
    }

    #[test]
    fn test_parse_short_form_uses_repo() {
        let body = "<!-- meridian:relates-to=#9 -->";
        assert_eq!(parse(Some(body), &repo()), vec![link("relates-to", 9)]);
    }

    #[test]
    fn test_parse_keeps_cross_repo_coordinates() {
        let body = "<!-- meridian:duplicates=other-org/gadgets#41 -->";
        let parsed = parse(Some(body), &repo());
        assert_eq!(parsed[0].owner, "other-org");
        assert_eq!(parsed[0].repo, "gadgets");
        assert!(!parsed[0].is_in(&repo()));
    }

    #[test]
    fn test_parse_tolerates_surrounding_whitespace() {
        let body = "   <!--meridian:duplicates=acme/widgets#3-->   ";
        assert_eq!(parse(Some(body), &repo()), vec![link("duplicates", 3)]);
    }

    #[test]
    fn test_strip_trailing_block() {
        let body = "Description\n\n<!-- meridian:duplicates=acme/widgets#3 -->\n<!-- meridian:blocks=acme/widgets#4 -->\n";
        assert_eq!(strip(body), "Description");
    }

    #[test]
    fn test_strip_marker_between_paragraphs() {
        let body = "First\n\n<!-- meridian:duplicates=acme/widgets#3 -->\n\nSecond";
        assert_eq!(strip(body), "First\n\nSecond");
    }

    #[test]
    fn test_strip_marker_inside_paragraph() {
        let body = "First\n<!-- meridian:duplicates=acme/widgets#3 -->\nSecond";
        assert_eq!(strip(body), "First\nSecond");
    }

    #[test]
    fn test_strip_only_markers() {
        assert_eq!(strip("<!-- meridian:duplicates=acme/widgets#3 -->"), "");
    }

    #[test]
    fn test_compose() {
        let body = "Description\n\n<!-- meridian:duplicates=acme/widgets#3 -->";
        assert_eq!(
            compose(Some(body), &[link("duplicates", 5)]),
            "Description\n\n<!-- meridian:duplicates=acme/widgets#5 -->"
        );
        assert_eq!(compose(Some(body), &[]), "Description");
        assert_eq!(
            compose(None, &[link("duplicates", 5)]),
            "<!-- meridian:duplicates=acme/widgets#5 -->"
        );
    }

    #[test]
    fn test_compose_is_stable_when_reapplied() {
        let links = [link("duplicates", 5), link("relates-to", 6)];
        let once = compose(Some("Body text"), &links);
        let twice = compose(Some(&once), &links);
        assert_eq!(once, twice);
    }

    fn arb_link() -> impl Strategy<Value = ParsedNativeLink> {
        (
            "[a-z0-9][a-z0-9_-]{0,15}",
            "[A-Za-z0-9][A-Za-z0-9-]{0,15}",
            "[A-Za-z0-9_.-]{1,20}",
            1u64..1_000_000,
        )
            .prop_map(|(link_type, owner, repo, issue_number)| ParsedNativeLink {
                link_type,
                owner,
                repo,
                issue_number,
                reversed: false,
            })
    }

    proptest! {
        #[test]
        fn prop_parse_serialize_roundtrip(links in prop::collection::vec(arb_link(), 0..8)) {
            let body = serialize(&links);
            prop_assert_eq!(parse(Some(&body), &repo()), links);
        }

        #[test]
        fn prop_compose_preserves_prose(
            prose in "[A-Za-z .,]{1,40}(\n[A-Za-z .,]{1,40}){0,3}",
            links in prop::collection::vec(arb_link(), 1..5),
        ) {
            let body = compose(Some(&prose), &links);
            prop_assert_eq!(parse(Some(&body), &repo()), links);
            prop_assert_eq!(strip(&body), strip(&prose));
        }
    }
}
