//! Relationship type registry.
//!
//! A static table of link types loaded once at startup and shared read-only
//! (`Arc<RelationshipRegistry>`) by every component that needs labels or
//! type validation.

use crate::domain::{IssueId, IssueLink, LinkDirection};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the built-in directed blocking relationship.
pub const BLOCKS: &str = "blocks";

/// Name of the built-in directed duplicate relationship.
pub const DUPLICATES: &str = "duplicates";

/// Name of the built-in symmetric relationship.
pub const RELATES_TO: &str = "relates-to";

/// The hierarchy edge. Not a relationship type; reserved.
pub const PARENT: &str = "parent";

/// Reverse spelling of [`BLOCKS`] accepted by the GitHub backend; reserved.
pub const BLOCKED_BY: &str = "blocked_by";

/// Descriptor of one relationship type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelationshipType {
    /// Unique key
    pub name: String,

    /// Label shown when the viewing issue is the source
    pub forward_label: String,

    /// Label shown when the viewing issue is the target
    pub inverse_label: String,

    /// Whether A→B and B→A are the same relationship
    #[serde(default)]
    pub symmetric: bool,
}

impl RelationshipType {
    /// A directed type with distinct forward and inverse labels.
    pub fn directed(
        name: impl Into<String>,
        forward_label: impl Into<String>,
        inverse_label: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            forward_label: forward_label.into(),
            inverse_label: inverse_label.into(),
            symmetric: false,
        }
    }

    /// A symmetric type that reads the same from both ends.
    pub fn symmetric(name: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            name: name.into(),
            forward_label: label.clone(),
            inverse_label: label,
            symmetric: true,
        }
    }
}

/// Returns true for names of the form `[A-Za-z0-9][A-Za-z0-9_-]*`.
///
/// The comment marker grammar relies on this: a type name never contains
/// `=`, whitespace, or `-->`.
#[must_use]
pub fn is_valid_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Immutable lookup table of relationship types
#[derive(Debug, Clone)]
pub struct RelationshipRegistry {
    types: BTreeMap<String, RelationshipType>,
}

impl RelationshipRegistry {
    /// The three types that ship by default.
    #[must_use]
    pub fn default_types() -> Vec<RelationshipType> {
        vec![
            RelationshipType::directed(BLOCKS, "blocks", "is blocked by"),
            RelationshipType::directed(DUPLICATES, "duplicates", "is duplicated by"),
            RelationshipType::symmetric(RELATES_TO, "relates to"),
        ]
    }

    /// Registry containing only [`Self::default_types`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let types = Self::default_types()
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        Self { types }
    }

    /// Build a registry from a list of descriptors.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if a name is malformed or repeated, a label
    /// is empty, or a symmetric type has differing labels.
    pub fn from_types(types: impl IntoIterator<Item = RelationshipType>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for rel in types {
            validate_type(&rel)?;
            if table.contains_key(&rel.name) {
                return Err(Error::validation(
                    "relationship_type",
                    format!("relationship type '{}' is defined twice", rel.name),
                ));
            }
            table.insert(rel.name.clone(), rel);
        }
        Ok(Self { types: table })
    }

    /// Defaults plus additional descriptors (which may not redefine defaults).
    ///
    /// # Errors
    ///
    /// See [`Self::from_types`].
    pub fn with_extra(extra: impl IntoIterator<Item = RelationshipType>) -> Result<Self> {
        Self::from_types(Self::default_types().into_iter().chain(extra))
    }

    /// Look up a type by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RelationshipType> {
        self.types.get(name)
    }

    /// Look up a type by name, failing for unknown names.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownRelationshipType` if the name is not registered.
    pub fn require(&self, name: &str) -> Result<&RelationshipType> {
        self.get(name)
            .ok_or_else(|| Error::UnknownRelationshipType(name.to_string()))
    }

    /// Whether the named type is registered and symmetric.
    #[must_use]
    pub fn is_symmetric(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.symmetric)
    }

    /// All registered types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RelationshipType> {
        self.types.values()
    }

    /// Direction of `link` as seen from `viewing`.
    #[must_use]
    pub fn direction_for(viewing: &IssueId, link: &IssueLink) -> LinkDirection {
        if &link.source_issue_id == viewing {
            LinkDirection::Outgoing
        } else {
            LinkDirection::Incoming
        }
    }

    /// Label of `link` as seen from `viewing`.
    ///
    /// Unregistered types fall back to the raw type name.
    #[must_use]
    pub fn label_for(&self, viewing: &IssueId, link: &IssueLink) -> String {
        let Some(rel) = self.get(&link.link_type) else {
            return link.link_type.clone();
        };
        match Self::direction_for(viewing, link) {
            LinkDirection::Outgoing => rel.forward_label.clone(),
            LinkDirection::Incoming => rel.inverse_label.clone(),
        }
    }
}

impl Default for RelationshipRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn validate_type(rel: &RelationshipType) -> Result<()> {
    if !is_valid_type_name(&rel.name) {
        return Err(Error::validation(
            "relationship_type",
            format!(
                "'{}' must start with a letter or digit and contain only letters, digits, '-' or '_'",
                rel.name
            ),
        ));
    }
    if matches!(rel.name.as_str(), PARENT | BLOCKED_BY) {
        return Err(Error::validation(
            "relationship_type",
            format!("'{}' is a reserved name", rel.name),
        ));
    }
    if rel.forward_label.trim().is_empty() || rel.inverse_label.trim().is_empty() {
        return Err(Error::validation(
            "label",
            format!("relationship type '{}' has an empty label", rel.name),
        ));
    }
    if rel.symmetric && rel.forward_label != rel.inverse_label {
        return Err(Error::validation(
            "label",
            format!(
                "symmetric relationship type '{}' must use the same label in both directions",
                rel.name
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn link(source: &str, target: &str, link_type: &str) -> IssueLink {
        IssueLink::new(source.into(), target.into(), link_type, Utc::now())
    }

    #[test]
    fn test_defaults() {
        let registry = RelationshipRegistry::with_defaults();
        assert_eq!(registry.iter().count(), 3);
        assert!(registry.is_symmetric(RELATES_TO));
        assert!(!registry.is_symmetric(BLOCKS));
        assert!(!registry.is_symmetric("unknown"));
    }

    #[rstest]
    #[case::blocks_source("a", BLOCKS, "blocks")]
    #[case::blocks_target("b", BLOCKS, "is blocked by")]
    #[case::duplicates_target("b", DUPLICATES, "is duplicated by")]
    #[case::relates_source("a", RELATES_TO, "relates to")]
    #[case::relates_target("b", RELATES_TO, "relates to")]
    #[case::unknown_type("b", "parent", "parent")]
    fn test_label_for(#[case] viewing: &str, #[case] link_type: &str, #[case] expected: &str) {
        let registry = RelationshipRegistry::with_defaults();
        let label = registry.label_for(&viewing.into(), &link("a", "b", link_type));
        assert_eq!(label, expected);
    }

    #[test]
    fn test_require_unknown() {
        let registry = RelationshipRegistry::with_defaults();
        assert!(matches!(
            registry.require("clones"),
            Err(Error::UnknownRelationshipType(name)) if name == "clones"
        ));
    }

    #[rstest]
    #[case::empty("")]
    #[case::leading_dash("-blocks")]
    #[case::space("is like")]
    #[case::equals("a=b")]
    fn test_rejects_malformed_names(#[case] name: &str) {
        let result =
            RelationshipRegistry::with_extra([RelationshipType::directed(name, "x", "y")]);
        assert!(result.is_err());
    }

    #[rstest]
    #[case::hierarchy(PARENT)]
    #[case::reverse_blocks(BLOCKED_BY)]
    fn test_rejects_reserved_names(#[case] name: &str) {
        let err = RelationshipRegistry::with_extra([RelationshipType::directed(name, "x", "y")])
            .unwrap_err();
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn test_rejects_duplicate_definition() {
        let result = RelationshipRegistry::with_extra([RelationshipType::directed(
            BLOCKS, "blocks", "blocked",
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_asymmetric_labels_on_symmetric_type() {
        let mut rel = RelationshipType::symmetric("pairs-with", "pairs with");
        rel.inverse_label = "is paired by".into();
        assert!(RelationshipRegistry::from_types([rel]).is_err());
    }

    #[test]
    fn test_with_extra_keeps_defaults() {
        let registry = RelationshipRegistry::with_extra([RelationshipType::directed(
            "caused-by",
            "was caused by",
            "caused",
        )])
        .unwrap();
        assert!(registry.get(BLOCKS).is_some());
        assert_eq!(
            registry.get("caused-by").unwrap().inverse_label,
            "caused"
        );
    }
}
