//! Persona Compiler
//!
//! Turns a pupil identity, grade, topic and knowledge profile into the system
//! instruction that frames every pupil generation. Pure template expansion:
//! identical inputs always produce byte-identical output.

use crate::curriculum::KnowledgeProfile;
use crate::identity::age_for_grade;
use crate::prompts::{PromptTemplates, expand};

/// Substituted for `{mastered}` when the pupil has no earlier grades.
pub const NOTHING_MASTERED: &str = "ingenting ennå, du har akkurat begynt på skolen";

/// Compiles the pupil persona instruction.
pub fn compile(
    templates: &PromptTemplates,
    identity: &str,
    grade: u8,
    topic: &str,
    profile: &KnowledgeProfile,
) -> String {
    let age = age_for_grade(grade).to_string();
    let grade = grade.to_string();
    let mastered = if profile.mastered.is_empty() {
        NOTHING_MASTERED.to_string()
    } else {
        profile.mastered_text()
    };

    expand(
        &templates.pupil_persona,
        &[
            ("name", identity),
            ("age", age.as_str()),
            ("grade", grade.as_str()),
            ("topic", topic),
            ("mastered", mastered.as_str()),
            ("in_progress", profile.in_progress.as_str()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::CurriculumTable;

    fn templates() -> PromptTemplates {
        PromptTemplates {
            pupil_persona: "{name}|{age}|{grade}|{topic}|{mastered}|{in_progress}".to_string(),
            evaluator: String::new(),
        }
    }

    #[test]
    fn test_compile_fills_every_placeholder() {
        let profile = CurriculumTable::new([(1, "a"), (2, "b"), (3, "c")]).resolve(3);
        let out = compile(&templates(), "Emma", 3, "Brøk", &profile);

        assert_eq!(out, "Emma|9|3|Brøk|1. trinn: a | 2. trinn: b|c");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let table = CurriculumTable::lk20_mathematics();
        let profile = table.resolve(5);
        let builtin = PromptTemplates::default();

        let first = compile(&builtin, "Noah", 5, "Brøk", &profile);
        for _ in 0..10 {
            assert_eq!(compile(&builtin, "Noah", 5, "Brøk", &profile), first);
        }
    }

    #[test]
    fn test_first_grade_gets_nothing_mastered_phrase() {
        let profile = CurriculumTable::lk20_mathematics().resolve(1);
        let out = compile(&templates(), "Ella", 1, "Telling", &profile);

        assert!(out.contains(NOTHING_MASTERED));
    }

    #[test]
    fn test_builtin_persona_scopes_knowledge_to_grade() {
        let table = CurriculumTable::lk20_mathematics();
        let profile = table.resolve(5);
        let out = compile(&PromptTemplates::default(), "Noah", 5, "Brøk", &profile);

        assert!(out.contains("Noah"));
        assert!(out.contains("11 år"));
        assert!(out.contains(table.get(4).unwrap()));
        assert!(out.contains(table.get(5).unwrap()));
        assert!(!out.contains(table.get(6).unwrap()));
        assert!(!out.contains('{'), "unexpanded placeholder in: {}", out);
    }

    #[test]
    fn test_topic_with_braces_stays_literal() {
        let profile = CurriculumTable::new([(1, "a")]).resolve(2);
        let out = compile(&templates(), "Ali", 2, "{in_progress}", &profile);

        assert_eq!(out, "Ali|8|2|{in_progress}|1. trinn: a|unknown syllabus");
    }
}
