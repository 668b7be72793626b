//! Helpers for the test scaffolding around the protocol engine.

/// Probabilistic fault-injection switch.
///
/// Returns `true` with approximately `threshold` percent probability:
/// thresholds at or below 0 never fire, thresholds of 100 or more always
/// fire. Surrounding test scaffolding uses this to decide when to drop or
/// mangle a datagram; the protocol engine itself never calls it.
///
/// ```
/// assert!(!seqlink::util::chance(0));
/// assert!(seqlink::util::chance(100));
/// ```
pub fn chance(threshold: i32) -> bool {
    if threshold < 1 {
        return false;
    }
    if threshold > 99 {
        return true;
    }
    rand::random_range(1..=100) <= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_fires_at_or_below_zero() {
        for _ in 0..1000 {
            assert!(!chance(0));
            assert!(!chance(-5));
        }
    }

    #[test]
    fn always_fires_at_or_above_one_hundred() {
        for _ in 0..1000 {
            assert!(chance(100));
            assert!(chance(250));
        }
    }

    #[test]
    fn middle_thresholds_fire_sometimes_but_not_always() {
        let fired = (0..1000).filter(|_| chance(50)).count();
        assert!(fired > 0);
        assert!(fired < 1000);
    }
}
