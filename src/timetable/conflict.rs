use super::model::Slot;

/// Half-open interval intersection: `[a.start, a.end)` against `[b.start, b.end)`.
/// A slot that ends exactly when another begins does not overlap it.
pub fn overlaps(a: &Slot, b: &Slot) -> bool {
    a.start_time < b.end_time && b.start_time < a.end_time
}

pub fn first_conflict<'a>(candidate: &Slot, day: &'a [Slot]) -> Option<&'a Slot> {
    day.iter().find(|s| overlaps(candidate, s))
}

pub fn conflicts_with_any(candidate: &Slot, day: &[Slot]) -> bool {
    first_conflict(candidate, day).is_some()
}
