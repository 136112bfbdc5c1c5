//! Curriculum Table and Knowledge Profiles
//!
//! This module holds the static `grade -> skill` table that bounds what the
//! simulated pupil is allowed to know, and the resolver that turns a grade
//! into a cumulative knowledge profile. The table content is data: the
//! built-in LK20 mathematics goals can be replaced by a JSON file.

use crate::error::{CoreError, Result};
use anyhow::Context;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Separator placed between mastered entries in `KnowledgeProfile::mastered_text`.
pub const MASTERED_SEPARATOR: &str = " | ";

/// Returned as `in_progress` when the table has no entry for the requested grade.
pub const UNKNOWN_SYLLABUS: &str = "unknown syllabus";

/// An ordered mapping from grade level to a free-text skill description.
///
/// Grades are kept in ascending order, which is the order mastered skills are
/// reported in. The table may be sparse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurriculumTable {
    entries: BTreeMap<u32, String>,
}

impl CurriculumTable {
    /// Builds a table from `(grade, skill)` pairs. Later duplicates win.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(grade, skill)| (grade, skill.into()))
                .collect(),
        }
    }

    /// The reference table: LK20 mathematics goals for grades 1 through 10.
    pub fn lk20_mathematics() -> Self {
        Self::new([
            (
                1,
                "Telle til 20, sortere ting, begrepene over/under/størst/minst, enkel addisjon med fingre.",
            ),
            (
                2,
                "Telle til 100, addisjon og subtraksjon med tierovergang, måle lengde, kjenne igjen mynter.",
            ),
            (
                3,
                "Gangetabellen (2, 3, 5, 10), deling i like grupper, måle med linjal, speiling og symmetri.",
            ),
            (
                4,
                "Hele gangetabellen, tall opp til 1000, enkle brøker (1/2, 1/4), finne areal ved å telle ruter.",
            ),
            (
                5,
                "Brøk og desimaltall, tekstoppgaver, regne med penger, målestokk, negative tall (intro).",
            ),
            (6, "Prosent, vinkler (gradskive), gjennomsnitt og typetall, regne med tid."),
            (7, "Algebra (x og y), ligninger, volum av bokser, koordinatsystem, regneark."),
            (8, "Potenser, kvadratrot, lineære funksjoner (y=ax+b), Pytagoras, sannsynlighet."),
            (9, "Formlikhet, valuta og økonomi, volum av sylinder/kjegle, vitenskapelig notasjon."),
            (10, "Andregradsfunksjoner, matematisk bevisføring, komplekse figurer, modellering."),
        ])
    }

    /// Parses a table from a JSON object whose keys are grade numbers.
    ///
    /// ```json
    /// { "1": "Counting to 20", "2": "Counting to 100" }
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<String, String> =
            serde_json::from_str(json).map_err(|e| CoreError::Curriculum(e.to_string()))?;

        let mut entries = BTreeMap::new();
        for (key, skill) in raw {
            let grade = key.trim().parse::<u32>().map_err(|_| {
                CoreError::Curriculum(format!("'{}' is not a grade number", key))
            })?;
            entries.insert(grade, skill);
        }
        Ok(Self { entries })
    }

    /// Reads and parses a JSON table from disk.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read curriculum file {}", path.display()))?;
        Ok(Self::from_json_str(&json)?)
    }

    pub fn get(&self, grade: u32) -> Option<&str> {
        self.entries.get(&grade).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves the knowledge profile of a pupil in `grade`.
    ///
    /// Never fails: grades outside the table simply yield fewer mastered
    /// entries and the `UNKNOWN_SYLLABUS` sentinel for `in_progress`.
    pub fn resolve(&self, grade: i64) -> KnowledgeProfile {
        let mastered = self
            .entries
            .iter()
            .filter(|(g, _)| i64::from(**g) < grade)
            .map(|(g, skill)| MasteredSkill {
                grade: *g,
                skill: skill.clone(),
            })
            .collect();

        let in_progress = u32::try_from(grade)
            .ok()
            .and_then(|g| self.get(g))
            .unwrap_or(UNKNOWN_SYLLABUS)
            .to_string();

        KnowledgeProfile {
            mastered,
            in_progress,
        }
    }
}

impl Default for CurriculumTable {
    fn default() -> Self {
        Self::lk20_mathematics()
    }
}

/// A skill from an earlier grade that the pupil has mastered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasteredSkill {
    pub grade: u32,
    pub skill: String,
}

/// What a simulated pupil knows (`mastered`) and is currently learning (`in_progress`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeProfile {
    /// Entries for every grade strictly below the pupil's, ascending.
    pub mastered: Vec<MasteredSkill>,
    pub in_progress: String,
}

impl KnowledgeProfile {
    /// Renders `mastered` as `"{g}. trinn: {skill}"` entries joined by `MASTERED_SEPARATOR`.
    pub fn mastered_text(&self) -> String {
        self.mastered
            .iter()
            .map(|m| format!("{}. trinn: {}", m.grade, m.skill))
            .collect::<Vec<_>>()
            .join(MASTERED_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_grade_has_nothing_mastered() {
        let table = CurriculumTable::lk20_mathematics();
        let profile = table.resolve(1);

        assert!(profile.mastered.is_empty());
        assert_eq!(profile.mastered_text(), "");
        assert_eq!(profile.in_progress, table.get(1).unwrap());
    }

    #[test]
    fn test_mastered_is_cumulative_for_every_grade() {
        let table = CurriculumTable::lk20_mathematics();

        for grade in 2..=10u32 {
            let profile = table.resolve(i64::from(grade));
            let expected = (1..grade)
                .map(|g| format!("{}. trinn: {}", g, table.get(g).unwrap()))
                .collect::<Vec<_>>()
                .join(" | ");

            assert_eq!(profile.mastered_text(), expected, "grade {}", grade);
            assert_eq!(profile.mastered.len(), (grade - 1) as usize);
            assert!(profile.mastered.iter().all(|m| m.grade < grade));
            assert_eq!(profile.in_progress, table.get(grade).unwrap());
        }
    }

    #[test]
    fn test_grade_above_table_uses_sentinel() {
        let table = CurriculumTable::lk20_mathematics();
        let profile = table.resolve(11);

        assert_eq!(profile.mastered.len(), 10);
        assert_eq!(profile.in_progress, UNKNOWN_SYLLABUS);
    }

    #[test]
    fn test_grade_below_table_does_not_fail() {
        let table = CurriculumTable::lk20_mathematics();

        for grade in [0, -3] {
            let profile = table.resolve(grade);
            assert!(profile.mastered.is_empty());
            assert_eq!(profile.in_progress, UNKNOWN_SYLLABUS);
        }
    }

    #[test]
    fn test_sparse_table_skips_missing_grades() {
        let table = CurriculumTable::new([(1, "counting"), (3, "tables")]);
        let profile = table.resolve(4);

        assert_eq!(profile.mastered_text(), "1. trinn: counting | 3. trinn: tables");
        assert_eq!(profile.in_progress, UNKNOWN_SYLLABUS);
    }

    #[test]
    fn test_from_json_str_orders_by_grade() {
        let table =
            CurriculumTable::from_json_str(r#"{"3": "c", "1": "a", "2": "b"}"#).unwrap();
        let profile = table.resolve(3);

        assert_eq!(profile.mastered_text(), "1. trinn: a | 2. trinn: b");
        assert_eq!(profile.in_progress, "c");
    }

    #[test]
    fn test_from_json_str_rejects_non_numeric_keys() {
        let err = CurriculumTable::from_json_str(r#"{"first": "a"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Curriculum(msg) if msg.contains("first")));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curriculum.json");
        std::fs::write(&path, r#"{"1": "one", "2": "two"}"#).unwrap();

        let table = CurriculumTable::from_json_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(2), Some("two"));
    }
}
