//! Learning path types
//!
//! A learning path is the ordered output of a prerequisite traversal:
//! everything the student needs, prerequisites first, targets last.

use serde::{Deserialize, Serialize};

/// Role of a node within a learning path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathRole {
    /// A concept the question directly asks about
    Target,
    /// A concept required before a target can be learned
    Prerequisite,
}

impl PathRole {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Prerequisite => "prerequisite",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "target" => Some(Self::Target),
            "prerequisite" | "prereq" => Some(Self::Prerequisite),
            _ => None,
        }
    }
}

impl std::fmt::Display for PathRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step in a learning path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    /// Concept identifier
    pub concept_id: String,
    /// Human-readable concept name
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Difficulty on a 1-5 scale
    #[serde(default)]
    pub difficulty_level: u8,
    /// Whether this node is a target or a prerequisite of one
    pub role: PathRole,
}

/// An ordered learning path
///
/// Nodes are sorted so every prerequisite appears before the concepts
/// that depend on it; targets come last. Serializes as a plain JSON
/// array of nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LearningPath {
    pub nodes: Vec<PathNode>,
}

impl LearningPath {
    /// Create an empty learning path
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the path
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the path has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that were directly asked about
    pub fn targets(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes.iter().filter(|n| n.role == PathRole::Target)
    }

    /// Nodes required before the targets
    pub fn prerequisites(&self) -> impl Iterator<Item = &PathNode> {
        self.nodes
            .iter()
            .filter(|n| n.role == PathRole::Prerequisite)
    }

    /// Concept names in path order
    pub fn names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }

    /// Render the path as "A → B → C" for prompts and display
    pub fn display_sequence(&self) -> String {
        self.names().join(" → ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, role: PathRole) -> PathNode {
        PathNode {
            concept_id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            difficulty_level: 1,
            role,
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!(PathRole::parse("target"), Some(PathRole::Target));
        assert_eq!(PathRole::parse("PREREQUISITE"), Some(PathRole::Prerequisite));
        assert_eq!(PathRole::parse("unknown"), None);
    }

    #[test]
    fn test_display_sequence() {
        let path = LearningPath {
            nodes: vec![
                node("limits", PathRole::Prerequisite),
                node("derivatives", PathRole::Target),
            ],
        };
        assert_eq!(path.display_sequence(), "limits → derivatives");
        assert_eq!(path.targets().count(), 1);
        assert_eq!(path.prerequisites().count(), 1);
    }

    #[test]
    fn test_serializes_as_array() {
        let path = LearningPath {
            nodes: vec![node("limits", PathRole::Prerequisite)],
        };
        let json = serde_json::to_string(&path).unwrap();
        assert!(json.starts_with('['), "expected array, got {}", json);

        let parsed: LearningPath = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.nodes[0].role, PathRole::Prerequisite);
    }
}
