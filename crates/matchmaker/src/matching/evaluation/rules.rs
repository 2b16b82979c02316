use super::super::domain::{AttributeValue, Preference, RangeBounds};
use super::Breach;

pub(crate) enum Check {
    Satisfied,
    Violated(Breach),
}

pub(crate) fn check(observed: &AttributeValue, preference: &Preference) -> Check {
    match preference {
        Preference::Range(bounds) => check_range(observed, bounds),
        Preference::OneOf(accepted) => {
            if accepted.iter().any(|value| value.matches(observed)) {
                Check::Satisfied
            } else {
                Check::Violated(Breach::NotInSet {
                    accepted: accepted.clone(),
                })
            }
        }
        Preference::Exact(expected) => {
            if expected.matches(observed) {
                Check::Satisfied
            } else {
                Check::Violated(Breach::Mismatch {
                    expected: expected.clone(),
                })
            }
        }
    }
}

// Bounds are inclusive on both ends.
fn check_range(observed: &AttributeValue, bounds: &RangeBounds) -> Check {
    let Some(value) = observed.as_number() else {
        return Check::Violated(Breach::NotNumeric { bounds: *bounds });
    };

    if let Some(min) = bounds.min {
        if value < min {
            return Check::Violated(Breach::BelowMin { min });
        }
    }

    if let Some(max) = bounds.max {
        if value > max {
            return Check::Violated(Breach::AboveMax { max });
        }
    }

    Check::Satisfied
}
