//! Clock Module Tests
//!
//! ## Test Scopes
//! - **Bookkeeping**: increment, merge and the id range check.
//! - **Ordering**: causal comparison and the owner-id tie-break.
//! - **Algebra**: property tests for the join and the totality of the order.

#[cfg(test)]
mod tests {
    use crate::clock::{CLOCK_WIDTH, Causality, ClockError, ProcessId, VectorClock};
    use proptest::prelude::*;
    use std::cmp::Ordering;

    fn clock(owner: u32, counters: &[u64]) -> VectorClock {
        let mut c = VectorClock::new(ProcessId(owner)).unwrap();
        for (slot, &n) in counters.iter().enumerate() {
            for _ in 0..n {
                c.increment(ProcessId(slot as u32)).unwrap();
            }
        }
        c
    }

    // ============================================================
    // BOOKKEEPING
    // ============================================================

    #[test]
    fn test_increment_advances_only_own_slot() {
        let mut c = VectorClock::new(ProcessId(3)).unwrap();
        c.increment(ProcessId(3)).unwrap();
        c.increment(ProcessId(3)).unwrap();

        assert_eq!(c.counters()[3], 2);
        assert_eq!(c.counters().iter().sum::<u64>(), 2);
    }

    #[test]
    fn test_increment_out_of_range_is_rejected() {
        let mut c = VectorClock::new(ProcessId(0)).unwrap();
        let before = c.clone();

        let err = c.increment(ProcessId(CLOCK_WIDTH as u32)).unwrap_err();

        assert_eq!(err, ClockError::OutOfRange(CLOCK_WIDTH as u32));
        assert_eq!(c, before, "A failed increment must not touch the clock");
    }

    #[test]
    fn test_new_rejects_out_of_range_owner() {
        assert!(VectorClock::new(ProcessId(42)).is_err());
    }

    #[test]
    fn test_merge_takes_pointwise_max_and_keeps_owner() {
        let mut a = clock(1, &[3, 0, 1]);
        let b = clock(2, &[1, 4, 1]);

        a.merge(&b);

        assert_eq!(&a.counters()[..3], &[3, 4, 1]);
        assert_eq!(a.owner(), ProcessId(1));
    }

    #[test]
    fn test_display_lists_counters_and_owner() {
        let c = clock(2, &[1, 0, 5]);
        assert_eq!(c.to_string(), "<<1, 0, 5, 0, 0, 0, 0, 0, 0, 0>, 2>");
    }

    // ============================================================
    // ORDERING
    // ============================================================

    #[test]
    fn test_compare_causal_cases() {
        let a = clock(0, &[1, 0]);
        let b = clock(0, &[2, 0]);
        let c = clock(1, &[0, 1]);

        assert_eq!(a.compare(&b), Causality::Less);
        assert_eq!(b.compare(&a), Causality::Greater);
        assert_eq!(a.compare(&c), Causality::Concurrent);
        assert_eq!(a.compare(&a.clone()), Causality::Equal);
    }

    #[test]
    fn test_total_order_breaks_concurrency_by_owner() {
        let low = clock(1, &[0, 1, 0]);
        let high = clock(2, &[0, 0, 1]);

        assert_eq!(low.compare(&high), Causality::Concurrent);
        assert_eq!(high.total_order(&low), Ordering::Greater);
        assert_eq!(low.total_order(&high), Ordering::Less);
    }

    #[test]
    fn test_total_order_respects_causality_over_owner() {
        // Owner 9 wrote first, owner 0 saw it and wrote again.
        let earlier = clock(9, &[0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let later = clock(0, &[1, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

        assert!(later.supersedes(&earlier));
        assert!(!earlier.supersedes(&later));
    }

    #[test]
    fn test_identical_clocks_do_not_supersede_each_other() {
        let a = clock(4, &[1, 2, 3]);
        assert_eq!(a.total_order(&a.clone()), Ordering::Equal);
        assert!(!a.supersedes(&a.clone()));
    }

    #[test]
    fn test_clock_bincode_round_trip() {
        let c = clock(7, &[5, 0, 9, 0, 0, 0, 0, 1]);

        let encoded = bincode::serialize(&c).expect("serialize");
        let decoded: VectorClock = bincode::deserialize(&encoded).expect("deserialize");

        assert_eq!(decoded, c);
        assert_eq!(decoded.owner(), ProcessId(7));
    }

    #[test]
    fn test_decoded_clock_with_bad_owner_fails_validation() {
        let json = format!(
            r#"{{"owner":{},"counters":[0,0,0,0,0,0,0,0,0,0]}}"#,
            CLOCK_WIDTH + 3
        );
        let c: VectorClock = serde_json::from_str(&json).unwrap();
        assert!(c.validate().is_err());
    }

    // ============================================================
    // ALGEBRA
    // ============================================================

    fn arb_clock() -> impl Strategy<Value = VectorClock> {
        (0..CLOCK_WIDTH as u32, prop::collection::vec(0u64..4, CLOCK_WIDTH))
            .prop_map(|(owner, counters)| clock(owner, &counters))
    }

    proptest! {
        #[test]
        fn prop_merge_is_commutative(a in arb_clock(), b in arb_clock()) {
            let mut ab = a.clone();
            ab.merge(&b);
            let mut ba = b.clone();
            ba.merge(&a);
            prop_assert_eq!(ab.counters(), ba.counters());
        }

        #[test]
        fn prop_merge_is_associative(a in arb_clock(), b in arb_clock(), c in arb_clock()) {
            let mut left = a.clone();
            left.merge(&b);
            left.merge(&c);

            let mut bc = b.clone();
            bc.merge(&c);
            let mut right = a.clone();
            right.merge(&bc);

            prop_assert_eq!(left.counters(), right.counters());
        }

        #[test]
        fn prop_merge_is_idempotent(a in arb_clock()) {
            let mut twice = a.clone();
            twice.merge(&a);
            prop_assert_eq!(twice, a);
        }

        #[test]
        fn prop_total_order_is_total_and_antisymmetric(a in arb_clock(), b in arb_clock()) {
            let ab = a.total_order(&b);
            let ba = b.total_order(&a);
            prop_assert_eq!(ab, ba.reverse());
            if a != b {
                prop_assert_ne!(ab, Ordering::Equal);
            }
        }
    }
}
