//! Concept catalog
//!
//! The catalog is a read-only collaborator fetched once at startup. This
//! module defines its record shape, the [`ConceptSource`] seam, and the
//! pure helpers the session uses to filter and group concepts.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::sandbox::ExecutionResult;
use crate::Result;

/// Concept difficulty tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Entry level
    Beginner,
    /// Needs earlier concepts
    Intermediate,
    /// Deep cuts
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        })
    }
}

/// Illustrative input/expected pair shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Input description
    pub input: String,
    /// Expected result description
    pub expected: String,
}

/// One exercise.
///
/// Optional text fields treat an empty string like an absent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    /// Stable identifier
    pub id: String,
    /// Ordering and navigation key
    pub number: u32,
    /// Grouping label
    pub category: String,
    /// Difficulty tier
    pub difficulty: Difficulty,
    /// Display name
    pub name: String,
    /// One-line summary
    pub description: String,
    /// What the user has to do
    pub instruction: String,
    /// Starting code
    pub boilerplate: String,
    /// Reference solution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Output a successful run must print (compared trimmed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Illustrative test cases
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_cases: Vec<TestCase>,
    /// Teaching panel: explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Teaching panel: code example
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Teaching panel: when to use it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<String>,
    /// Ids of concepts to learn first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
    /// Ids of related concepts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_topics: Vec<String>,
    /// Link to reference documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
}

fn non_empty(field: Option<&String>) -> Option<&str> {
    field.map(String::as_str).filter(|s| !s.is_empty())
}

impl Concept {
    /// Reference solution, if one is provided
    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        non_empty(self.answer.as_ref())
    }

    /// Required output, if one is declared
    #[must_use]
    pub fn expected_output(&self) -> Option<&str> {
        non_empty(self.expected_output.as_ref())
    }

    /// Documentation link, if one is provided
    #[must_use]
    pub fn docs_url(&self) -> Option<&str> {
        non_empty(self.docs_url.as_ref())
    }

    /// Apply this concept's success criteria to a sandbox verdict.
    ///
    /// With an expected output, a `Success` whose trimmed output differs
    /// is downgraded to a `Failure`. Other verdicts pass through.
    #[must_use]
    pub fn validate(&self, result: ExecutionResult) -> ExecutionResult {
        let Some(expected) = self.expected_output() else {
            return result;
        };
        match result {
            ExecutionResult::Success { output } => {
                let expected = expected.trim();
                let got = output.trim();
                if got == expected {
                    ExecutionResult::Success { output }
                } else {
                    ExecutionResult::Failure {
                        error: format!("Expected: {expected:?}, Got: {got:?}"),
                        output,
                    }
                }
            }
            other => other,
        }
    }
}

/// Read-only concept source.
///
/// Uses return-position `impl Trait` like [`crate::kv::KvStore`] so
/// implementations can be plain `async fn`s.
pub trait ConceptSource: Send + Sync {
    /// Fetch every concept
    fn fetch_concepts(&self) -> impl Future<Output = Result<Vec<Concept>>> + Send;
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    concepts: Vec<Concept>,
}

impl StaticCatalog {
    /// Wrap a list of concepts
    #[must_use]
    pub const fn new(concepts: Vec<Concept>) -> Self {
        Self { concepts }
    }

    /// Parse a JSON array of concepts
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the JSON is malformed
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }
}

impl ConceptSource for StaticCatalog {
    async fn fetch_concepts(&self) -> Result<Vec<Concept>> {
        Ok(self.concepts.clone())
    }
}

/// Difficulty set plus free-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptFilter {
    difficulties: BTreeSet<Difficulty>,
    search: String,
}

impl Default for ConceptFilter {
    fn default() -> Self {
        Self {
            difficulties: BTreeSet::from([Difficulty::Beginner]),
            search: String::new(),
        }
    }
}

impl ConceptFilter {
    /// Toggle a difficulty. The last active difficulty cannot be removed.
    ///
    /// Returns whether the set changed.
    pub fn toggle(&mut self, difficulty: Difficulty) -> bool {
        if self.difficulties.contains(&difficulty) {
            if self.difficulties.len() == 1 {
                return false;
            }
            self.difficulties.remove(&difficulty)
        } else {
            self.difficulties.insert(difficulty)
        }
    }

    /// Check whether a difficulty is active
    #[must_use]
    pub fn is_active(&self, difficulty: Difficulty) -> bool {
        self.difficulties.contains(&difficulty)
    }

    /// Set the search query (trimmed)
    pub fn set_search(&mut self, query: &str) {
        self.search = query.trim().to_lowercase();
    }

    /// Current search query
    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Check a concept against difficulty and search
    #[must_use]
    pub fn matches(&self, concept: &Concept) -> bool {
        self.difficulties.contains(&concept.difficulty)
            && (self.search.is_empty()
                || concept.name.to_lowercase().contains(&self.search)
                || concept.description.to_lowercase().contains(&self.search))
    }
}

/// Unlearned concepts of one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    /// Category label
    pub category: String,
    /// Concepts, sorted by number
    pub concepts: Vec<Concept>,
}

impl fmt::Display for CategoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.category, self.concepts.len())
    }
}

/// Group the concepts that are not learned and pass `filter`.
///
/// Categories are ordered by their lowest concept number.
#[must_use]
pub fn group_unlearned(
    concepts: &[Concept],
    filter: &ConceptFilter,
    learned: &HashSet<String>,
) -> Vec<CategoryGroup> {
    let mut grouped: BTreeMap<&str, Vec<Concept>> = BTreeMap::new();
    for concept in concepts
        .iter()
        .filter(|c| !learned.contains(&c.id) && filter.matches(c))
    {
        grouped
            .entry(concept.category.as_str())
            .or_default()
            .push(concept.clone());
    }

    let mut groups: Vec<CategoryGroup> = grouped
        .into_iter()
        .map(|(category, mut concepts)| {
            concepts.sort_by_key(|c| c.number);
            CategoryGroup {
                category: category.to_string(),
                concepts,
            }
        })
        .collect();
    groups.sort_by_key(|g| g.concepts.first().map_or(u32::MAX, |c| c.number));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(id: &str, number: u32, category: &str, difficulty: Difficulty) -> Concept {
        Concept {
            id: id.to_string(),
            number,
            category: category.to_string(),
            difficulty,
            name: format!("{number}. {id}"),
            description: format!("About {id}"),
            instruction: String::new(),
            boilerplate: String::new(),
            answer: None,
            expected_output: None,
            test_cases: Vec::new(),
            explanation: None,
            example: None,
            use_case: None,
            prerequisites: Vec::new(),
            related_topics: Vec::new(),
            docs_url: None,
        }
    }

    // ========================================================================
    // Serde shape
    // ========================================================================

    #[test]
    fn test_parse_catalog_json() {
        let json = r#"[{
            "id": "type-conversion", "number": 9, "category": "Core Syntax",
            "difficulty": "beginner", "name": "9. Type Conversion",
            "description": "Convert between types", "instruction": "Print 3",
            "boilerplate": "", "answer": "print(3);", "expectedOutput": "3",
            "testCases": [{"input": "3.7", "expected": "3"}],
            "prerequisites": ["var-declaration"], "docsUrl": ""
        }]"#;

        let catalog = StaticCatalog::from_json(json).unwrap();
        let parsed = &catalog.concepts[0];

        assert_eq!(parsed.difficulty, Difficulty::Beginner);
        assert_eq!(parsed.expected_output(), Some("3"));
        assert_eq!(parsed.test_cases.len(), 1);
        assert_eq!(parsed.prerequisites, vec!["var-declaration"]);
        assert_eq!(parsed.docs_url(), None);
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        assert!(matches!(
            StaticCatalog::from_json("{"),
            Err(crate::Error::Serialization(_))
        ));
    }

    // ========================================================================
    // Output validation
    // ========================================================================

    #[test]
    fn test_validate_trims_output() {
        let mut c = concept("a", 1, "x", Difficulty::Beginner);
        c.expected_output = Some("42".to_string());

        let result = c.validate(ExecutionResult::Success {
            output: "42\n".to_string(),
        });

        assert!(result.is_success());
    }

    #[test]
    fn test_validate_mismatch_becomes_failure() {
        let mut c = concept("a", 1, "x", Difficulty::Beginner);
        c.expected_output = Some("3".to_string());

        let result = c.validate(ExecutionResult::Success {
            output: "3.7\n".to_string(),
        });

        assert_eq!(
            result,
            ExecutionResult::Failure {
                error: r#"Expected: "3", Got: "3.7""#.to_string(),
                output: "3.7\n".to_string(),
            }
        );
    }

    #[test]
    fn test_validate_without_expectation_passes_through() {
        let c = concept("a", 1, "x", Difficulty::Beginner);
        let result = ExecutionResult::Success {
            output: "anything".to_string(),
        };
        assert_eq!(c.validate(result.clone()), result);
    }

    // ========================================================================
    // Filtering and grouping
    // ========================================================================

    #[test]
    fn test_filter_toggle_keeps_one_active() {
        let mut filter = ConceptFilter::default();

        assert!(!filter.toggle(Difficulty::Beginner));
        assert!(filter.is_active(Difficulty::Beginner));

        assert!(filter.toggle(Difficulty::Advanced));
        assert!(filter.toggle(Difficulty::Beginner));
        assert!(!filter.is_active(Difficulty::Beginner));
        assert!(filter.is_active(Difficulty::Advanced));
    }

    #[test]
    fn test_filter_search_is_case_insensitive() {
        let mut filter = ConceptFilter::default();
        let c = concept("slices", 4, "Collections", Difficulty::Beginner);

        filter.set_search("  SLICES ");
        assert!(filter.matches(&c));

        filter.set_search("about sli");
        assert!(filter.matches(&c));

        filter.set_search("maps");
        assert!(!filter.matches(&c));
    }

    #[test]
    fn test_group_unlearned_ordering() {
        let concepts = vec![
            concept("d", 7, "Later", Difficulty::Beginner),
            concept("c", 5, "Core", Difficulty::Beginner),
            concept("a", 1, "Core", Difficulty::Beginner),
            concept("b", 2, "Basics", Difficulty::Beginner),
            concept("e", 3, "Core", Difficulty::Advanced),
        ];
        let learned = HashSet::from(["a".to_string()]);

        let groups = group_unlearned(&concepts, &ConceptFilter::default(), &learned);

        let names: Vec<_> = groups.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["Basics (1)", "Core (1)", "Later (1)"]);
        assert_eq!(groups[1].concepts[0].id, "c");
    }
}
