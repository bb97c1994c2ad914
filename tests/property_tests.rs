//! Property tests for the target calculator.
//!
//! Uses proptest to verify:
//! 1. Ordering: stop < entry < tp1 < tp2 < tp3 for LONG, mirrored for SHORT
//! 2. Symmetry: SHORT distances equal LONG distances
//! 3. Stops only widen as confidence drops

use proptest::prelude::*;
use sigtrack::targets::{compute_targets, TargetCalculator, TargetConfig};
use sigtrack::types::Direction;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_entry_price() -> impl Strategy<Value = f64> {
    prop_oneof![0.0001..1.0_f64, 1.0..100_000.0_f64]
}

fn arb_confidence() -> impl Strategy<Value = f64> {
    0.0..=100.0_f64
}

fn arb_volatility() -> impl Strategy<Value = f64> {
    0.0..=1.0_f64
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Long), Just(Direction::Short)]
}

// ── 1. Ordering ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn targets_are_strictly_ordered(
        entry in arb_entry_price(),
        confidence in arb_confidence(),
        volatility in arb_volatility(),
        direction in arb_direction(),
    ) {
        let t = compute_targets(entry, direction, confidence, volatility).unwrap();
        prop_assert!(t.is_ordered(direction, entry), "{:?} entry={} {:?}", direction, entry, t);
        prop_assert!(t.stop_loss > 0.0);
        prop_assert!(t.tp3 > 0.0);
    }
}

// ── 2. Symmetry ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn short_mirrors_long(
        entry in arb_entry_price(),
        confidence in arb_confidence(),
        volatility in arb_volatility(),
    ) {
        let long = compute_targets(entry, Direction::Long, confidence, volatility).unwrap();
        let short = compute_targets(entry, Direction::Short, confidence, volatility).unwrap();
        let tol = entry * 1e-9;
        prop_assert!(((long.tp2 - entry) - (entry - short.tp2)).abs() <= tol);
        prop_assert!(((entry - long.stop_loss) - (short.stop_loss - entry)).abs() <= tol);
    }
}

// ── 3. Stop monotonicity ─────────────────────────────────────────────

proptest! {
    #[test]
    fn lower_confidence_never_tightens_the_stop(
        a in arb_confidence(),
        b in arb_confidence(),
        volatility in arb_volatility(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let calc = TargetCalculator::new(TargetConfig::default());
        let loose = calc.compute(100.0, Direction::Long, low, volatility).unwrap();
        let tight = calc.compute(100.0, Direction::Long, high, volatility).unwrap();
        prop_assert!(loose.stop_loss <= tight.stop_loss + 1e-9);
    }
}
