//! Graph document import format
//!
//! A graph document is a JSON file describing concepts and prerequisite
//! edges for bulk import. Concepts are upserted by ID; edges that
//! reference concepts absent from both the document and the existing
//! graph fail validation.

use serde::{Deserialize, Serialize};

use super::entity::{slug_id, Concept, PrerequisiteEdge};

/// A bulk-importable description of (part of) a concept graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Concepts to upsert
    #[serde(default)]
    pub concepts: Vec<GraphConceptEntry>,
    /// Prerequisite edges to insert
    #[serde(default)]
    pub edges: Vec<GraphEdgeEntry>,
}

/// One concept in a graph document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConceptEntry {
    /// Explicit ID; derived from the name when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Concept name
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Difficulty on a 1-5 scale
    #[serde(default = "default_difficulty")]
    pub difficulty_level: u8,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_difficulty() -> u8 {
    1
}

impl GraphConceptEntry {
    /// The effective concept ID for this entry
    pub fn effective_id(&self) -> String {
        match &self.id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => slug_id(&self.name),
        }
    }

    /// Convert into a concept entity
    pub fn into_concept(self) -> Concept {
        let id = self.effective_id();
        Concept::new(self.name)
            .with_id(id)
            .with_description(self.description)
            .with_difficulty(self.difficulty_level)
            .with_tags(self.tags)
    }
}

/// One prerequisite edge in a graph document
///
/// `from` must be learned before `to`. Both sides accept concept IDs
/// or names; names are slugified before lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdgeEntry {
    /// The prerequisite concept (ID or name)
    pub from: String,
    /// The dependent concept (ID or name)
    pub to: String,
}

impl GraphEdgeEntry {
    /// Convert into an edge entity, slugifying names
    pub fn into_edge(self) -> PrerequisiteEdge {
        PrerequisiteEdge::new(slug_id(&self.from), slug_id(&self.to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_id_prefers_explicit() {
        let entry = GraphConceptEntry {
            id: Some("derivs".into()),
            name: "Derivatives".into(),
            description: String::new(),
            difficulty_level: 1,
            tags: vec![],
        };
        assert_eq!(entry.effective_id(), "derivs");
    }

    #[test]
    fn test_effective_id_derives_from_name() {
        let entry = GraphConceptEntry {
            id: None,
            name: "Chain Rule".into(),
            description: String::new(),
            difficulty_level: 1,
            tags: vec![],
        };
        assert_eq!(entry.effective_id(), "chain_rule");
    }

    #[test]
    fn test_document_parses_with_defaults() {
        let json = r#"{
            "concepts": [{"name": "Limits"}],
            "edges": [{"from": "Limits", "to": "Derivatives"}]
        }"#;
        let doc: GraphDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.concepts.len(), 1);
        assert_eq!(doc.concepts[0].difficulty_level, 1);

        let edge = doc.edges[0].clone().into_edge();
        assert_eq!(edge.from_id, "limits");
        assert_eq!(edge.to_id, "derivatives");
    }
}
