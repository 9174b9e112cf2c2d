use cadence_core::models::RecurrenceRule;
use cadence_core::recurrence::RecurrenceManager;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use proptest::prelude::*;

fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    // 2000-01-01 .. 2040-01-01, whole seconds
    (946_684_800i64..2_208_988_800i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn rule() -> impl Strategy<Value = RecurrenceRule> {
    let selectors = prop::collection::vec(0u8..40, 0..8);
    (instant(), 0usize..4, 1u32..5, selectors).prop_map(|(start, kind, interval, values)| {
        let rule = match kind {
            0 => RecurrenceRule::daily(start),
            1 => RecurrenceRule::weekly(start, values),
            2 => RecurrenceRule::monthly(start, values),
            _ => RecurrenceRule::yearly(start, values),
        };
        rule.every(interval)
    })
}

proptest! {
    #[test]
    fn occurrences_are_sorted_unique_and_bounded(
        rule in rule(),
        offset_days in -60i64..400,
        span_days in 0i64..400,
        max_count in 0usize..50,
    ) {
        let manager = RecurrenceManager::new(rule.clone());
        let from = rule.start_date + Duration::days(offset_days);
        let to = from + Duration::days(span_days);

        let got = manager.occurrences_in_range(from, to, max_count);

        prop_assert!(got.len() <= max_count);
        prop_assert!(got.windows(2).all(|pair| pair[0] < pair[1]));
        for occurrence in &got {
            prop_assert!(*occurrence >= from);
            prop_assert!(*occurrence >= rule.start_date);
            prop_assert!(*occurrence <= to);
            prop_assert_eq!(occurrence.time(), rule.start_date.time());
        }
    }

    #[test]
    fn evaluation_is_deterministic(rule in rule(), span_days in 0i64..200) {
        let manager = RecurrenceManager::new(rule.clone());
        let to = rule.start_date + Duration::days(span_days);
        prop_assert_eq!(
            manager.occurrences_in_range(rule.start_date, to, 100),
            manager.occurrences_in_range(rule.start_date, to, 100)
        );
    }

    #[test]
    fn inverted_window_is_empty(rule in rule(), gap_seconds in 1i64..1_000_000) {
        let manager = RecurrenceManager::new(rule.clone());
        let from = rule.start_date + Duration::days(30);
        let to = from - Duration::seconds(gap_seconds);
        prop_assert!(manager.occurrences_in_range(from, to, 100).is_empty());
    }

    #[test]
    fn daily_windows_hold_one_occurrence_per_day(start in instant(), offset_days in 0i64..365) {
        let manager = RecurrenceManager::new(RecurrenceRule::daily(start));
        let from = start + Duration::days(offset_days);
        // 30 days, upper bound exclusive
        let to = from + Duration::days(30) - Duration::seconds(1);

        let got = manager.occurrences_in_range(from, to, 100);

        prop_assert_eq!(got.len(), 30);
        prop_assert!(got.windows(2).all(|pair| pair[1] - pair[0] == Duration::hours(24)));
    }

    #[test]
    fn mon_wed_fri_fires_three_times_a_week(start in instant(), offset_days in 0i64..365) {
        let manager = RecurrenceManager::new(RecurrenceRule::weekly(start, vec![1, 3, 5]));
        let from = start + Duration::days(offset_days);
        let to = from + Duration::days(7) - Duration::seconds(1);

        let got = manager.occurrences_in_range(from, to, 100);

        prop_assert_eq!(got.len(), 3);
        let mut weekdays: Vec<u32> = got.iter().map(|o| o.weekday().num_days_from_sunday()).collect();
        weekdays.sort_unstable();
        prop_assert_eq!(weekdays, vec![1, 3, 5]);
    }

    #[test]
    fn next_occurrence_is_the_first_one_after(rule in rule(), offset_days in 0i64..200) {
        let manager = RecurrenceManager::new(rule.clone());
        let after = rule.start_date + Duration::days(offset_days);

        if let Some(next) = manager.next_occurrence_after(after) {
            prop_assert!(next > after);
            let between = manager.occurrences_in_range(after + Duration::seconds(1), next, 10);
            prop_assert_eq!(between.first().copied(), Some(next));
        }
    }
}
