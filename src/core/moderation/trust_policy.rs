// Trust-score policy - turns a batch of violations into one reputation delta.
//
// Pure and synchronous: no I/O, no clamping. Clamping a user's stored score is
// the job of whoever applies the delta (see `core::trust`).

use super::moderation_models::Violation;

/// Penalty for any violation without a dedicated weight.
pub const DEFAULT_PENALTY: i32 = -3;

impl Violation {
    /// How much this single violation costs the user's trust score.
    pub fn penalty(&self) -> i32 {
        match self {
            Violation::ExplicitNudity | Violation::GraphicViolence => -15,
            Violation::HateSymbols => -20,
            Violation::NegativeSentiment => -5,
            Violation::ProhibitedWord(_) | Violation::Unrecognized(_) => DEFAULT_PENALTY,
        }
    }
}

/// Sum the penalties of every violation. Duplicates count every time.
///
/// Always `<= 0`; an empty batch is `0`. Saturates at `i32::MIN` instead of
/// overflowing.
pub fn calculate_trust_score_adjustment(violations: &[Violation]) -> i32 {
    total(violations.iter().map(Violation::penalty))
}

/// Same as [`calculate_trust_score_adjustment`] for raw label strings.
pub fn adjustment_for_labels<S: AsRef<str>>(labels: &[S]) -> i32 {
    total(
        labels
            .iter()
            .map(|label| Violation::from_label(label.as_ref()).penalty()),
    )
}

fn total(penalties: impl Iterator<Item = i32>) -> i32 {
    penalties.fold(0i32, |acc, p| acc.saturating_add(p))
}
