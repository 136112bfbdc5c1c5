//! Pupil identity generation.

use rand::{Rng, SeedableRng, rngs::StdRng};

/// First names the simulated pupil can be given.
pub const PUPIL_NAMES: &[&str] = &[
    "Emma", "Nora", "Sofie", "Ella", "Olivia", "Ingrid", "Leah", "Maja", "Noah", "Jakob",
    "Emil", "Lucas", "Filip", "Oskar", "Aksel", "Isak", "Sander", "Aisha", "Ali", "Mathilde",
];

/// Picks a pupil name deterministically from `seed`.
pub fn pick_identity(seed: u64) -> String {
    pick_identity_with(&mut StdRng::seed_from_u64(seed))
}

/// Picks a pupil name from the caller's random source.
pub fn pick_identity_with<R: Rng>(rng: &mut R) -> String {
    PUPIL_NAMES[rng.random_range(0..PUPIL_NAMES.len())].to_string()
}

/// Picks a name different from `current`, so a regenerated identity is visibly new.
pub fn pick_new_identity_with<R: Rng>(rng: &mut R, current: &str) -> String {
    let candidates: Vec<&str> = PUPIL_NAMES.iter().copied().filter(|n| *n != current).collect();
    candidates[rng.random_range(0..candidates.len())].to_string()
}

/// Age of a pupil in `grade`, as used in the prompt templates.
pub fn age_for_grade(grade: u8) -> u8 {
    grade.saturating_add(6)
}
