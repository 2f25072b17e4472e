use crate::domain::models::{Interval, UnresolvedEntry};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Returns every primary interval lacking a corrective interval with the same
/// `(start, end)`, most recent `end` first.
///
/// Identical primary intervals are reported once each: the store does not
/// guarantee uniqueness and a single corrective record resolves all of them.
pub fn reconcile(records: &[Interval]) -> Vec<UnresolvedEntry> {
    let corrected: HashSet<(DateTime<Utc>, DateTime<Utc>)> = records
        .iter()
        .filter(|record| record.is_corrective())
        .map(Interval::key)
        .collect();

    let mut unresolved: Vec<UnresolvedEntry> = records
        .iter()
        .filter(|record| record.is_primary() && !corrected.contains(&record.key()))
        .map(UnresolvedEntry::from)
        .collect();

    unresolved.sort_by(|left, right| {
        right
            .end
            .cmp(&left.end)
            .then_with(|| right.start.cmp(&left.start))
    });
    unresolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IntervalCategory;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, hour, minute, 0)
            .single()
            .expect("valid time")
    }

    fn primary(start: DateTime<Utc>, end: DateTime<Utc>) -> Interval {
        Interval::primary(start, end).expect("valid primary")
    }

    fn corrective(start: DateTime<Utc>, end: DateTime<Utc>) -> Interval {
        Interval::corrective(start, end).expect("valid corrective")
    }

    #[test]
    fn reports_primary_without_matching_corrective() {
        let records = vec![
            primary(at(10, 0), at(10, 30)),
            primary(at(11, 0), at(11, 15)),
            corrective(at(10, 0), at(10, 30)),
        ];

        assert_eq!(
            reconcile(&records),
            vec![UnresolvedEntry {
                start: at(11, 0),
                end: at(11, 15),
            }]
        );
    }

    #[test]
    fn empty_snapshot_has_nothing_to_fix() {
        assert!(reconcile(&[]).is_empty());
    }

    #[test]
    fn corrective_must_match_both_bounds() {
        let records = vec![
            primary(at(1, 0), at(7, 0)),
            corrective(at(1, 0), at(6, 59)),
            corrective(at(1, 1), at(7, 0)),
        ];
        assert_eq!(reconcile(&records).len(), 1);
    }

    #[test]
    fn orphan_corrective_is_ignored() {
        let records = vec![corrective(at(1, 0), at(7, 0))];
        assert!(reconcile(&records).is_empty());
    }

    #[test]
    fn orders_by_end_descending_with_start_tiebreak() {
        let records = vec![
            primary(at(1, 0), at(2, 0)),
            primary(at(5, 0), at(8, 0)),
            primary(at(6, 0), at(8, 0)),
            primary(at(3, 0), at(4, 0)),
        ];

        let keys: Vec<_> = reconcile(&records)
            .into_iter()
            .map(|entry| entry.key())
            .collect();
        assert_eq!(
            keys,
            vec![
                (at(6, 0), at(8, 0)),
                (at(5, 0), at(8, 0)),
                (at(3, 0), at(4, 0)),
                (at(1, 0), at(2, 0)),
            ]
        );
    }

    #[test]
    fn duplicate_primaries_pass_through_independently() {
        let records = vec![primary(at(1, 0), at(2, 0)), primary(at(1, 0), at(2, 0))];
        assert_eq!(reconcile(&records).len(), 2);

        let mut resolved = records.clone();
        resolved.push(corrective(at(1, 0), at(2, 0)));
        assert!(reconcile(&resolved).is_empty());
    }

    fn interval_strategy() -> impl Strategy<Value = Interval> {
        (0i64..48, 1i64..12, any::<bool>()).prop_map(|(offset, length, is_primary)| {
            let base = Utc
                .with_ymd_and_hms(2026, 3, 1, 0, 0, 0)
                .single()
                .expect("valid base");
            let start = base + Duration::minutes(offset * 15);
            let end = start + Duration::minutes(length * 15);
            let category = if is_primary {
                IntervalCategory::Primary
            } else {
                IntervalCategory::Corrective
            };
            Interval::new(start, end, category).expect("generated interval is valid")
        })
    }

    proptest! {
        #[test]
        fn output_is_exactly_the_unmatched_primaries(
            records in proptest::collection::vec(interval_strategy(), 0..40)
        ) {
            let unresolved = reconcile(&records);

            let expected = records
                .iter()
                .filter(|record| record.is_primary())
                .filter(|record| {
                    !records
                        .iter()
                        .any(|other| other.is_corrective() && other.key() == record.key())
                })
                .count();
            prop_assert_eq!(unresolved.len(), expected);

            for entry in &unresolved {
                let matches = |record: &&Interval| record.key() == entry.key();
                prop_assert!(records.iter().filter(matches).any(Interval::is_primary));
                prop_assert!(!records.iter().filter(matches).any(Interval::is_corrective));
            }
        }

        #[test]
        fn output_is_deterministic_and_non_increasing_by_end(
            records in proptest::collection::vec(interval_strategy(), 0..40)
        ) {
            let first = reconcile(&records);
            let second = reconcile(&records);
            prop_assert_eq!(&first, &second);
            for pair in first.windows(2) {
                prop_assert!(pair[0].end >= pair[1].end);
            }
        }

        #[test]
        fn writing_every_corrective_converges_to_empty(
            records in proptest::collection::vec(interval_strategy(), 0..40)
        ) {
            let mut snapshot = records.clone();
            snapshot.extend(reconcile(&records).iter().map(Interval::corrective_for));
            prop_assert!(reconcile(&snapshot).is_empty());
        }
    }
}
