use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::models::{Frequency, RecurrenceRule};

/// Upper bound on occurrences returned by a single evaluation.
pub const DEFAULT_MAX_OCCURRENCES: usize = 1000;

/// How far ahead a preview looks when the caller gives no end date.
pub const DEFAULT_PREVIEW_HORIZON_DAYS: i64 = 5 * 366;

/// Number of candidate periods scanned when searching for the next
/// occurrence without an explicit end.
const SEARCH_PERIODS: i64 = 400;

/// Evaluates a [`RecurrenceRule`] over time windows.
///
/// The manager is a pure function of its rule: every call recomputes from the
/// rule and the window it is given, so results are restartable and never
/// depend on earlier calls. All calculations happen in UTC; each occurrence
/// keeps the time of day of the rule's `start_date`.
///
/// Candidate periods count from the period containing `start_date`:
/// - `daily`: `start_date + k * interval` days
/// - `weekly`: the Sunday-based week of `start_date` plus `k * interval` weeks,
///   one occurrence per selected weekday
/// - `monthly`: the month of `start_date` plus `k * interval` months, one
///   occurrence per selected day; days the month does not have are skipped
/// - `yearly`: the year of `start_date` plus `k * interval` years, one
///   occurrence per selected month on `start_date`'s day of month, skipping
///   dates that do not exist
#[derive(Debug, Clone)]
pub struct RecurrenceManager {
    rule: RecurrenceRule,
    /// Sorted, deduplicated, in-range weekdays / days / months for the frequency
    selectors: Vec<u8>,
    time_of_day: NaiveTime,
}

impl RecurrenceManager {
    pub fn new(rule: RecurrenceRule) -> Self {
        let raw: &[u8] = match rule.frequency {
            Frequency::Daily => &[],
            Frequency::Weekly => &rule.days_of_week,
            Frequency::Monthly => &rule.days_of_month,
            Frequency::Yearly => &rule.months_of_year,
        };
        let mut selectors: Vec<u8> = raw
            .iter()
            .copied()
            .filter(|v| selector_in_range(rule.frequency, *v))
            .collect();
        selectors.sort_unstable();
        selectors.dedup();

        let time_of_day = rule.start_date.time();
        Self {
            rule,
            selectors,
            time_of_day,
        }
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    /// Occurrences `v` with `max(range_start, start_date) <= v <= min(range_end, end_date)`,
    /// ascending and without duplicates, at most `max_count` of them.
    ///
    /// Degenerate input (inverted window, `end_date` before `start_date`,
    /// nothing selected for the frequency, `max_count == 0`) yields an empty
    /// vector.
    pub fn occurrences_in_range(
        &self,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
        max_count: usize,
    ) -> Vec<DateTime<Utc>> {
        let lower = range_start.max(self.rule.start_date);
        let upper = match self.rule.end_date {
            Some(end) => range_end.min(end),
            None => range_end,
        };

        if max_count == 0 || lower > upper {
            return Vec::new();
        }
        if self.rule.frequency != Frequency::Daily && self.selectors.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        let interval = i64::from(self.rule.interval.max(1));
        let mut k = self.first_period(lower, interval);

        loop {
            let Some(period_start) = self.period_start(k * interval) else {
                break;
            };
            if period_start > upper {
                break;
            }

            for candidate in self.expand_period(k * interval) {
                if candidate > upper {
                    return out;
                }
                if candidate < lower {
                    continue;
                }
                out.push(candidate);
                if out.len() >= max_count {
                    return out;
                }
            }
            k += 1;
        }

        out
    }

    /// First occurrence strictly after `after`, if any.
    pub fn next_occurrence_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let horizon = self.search_horizon(after);
        self.occurrences_in_range(after, horizon, 2)
            .into_iter()
            .find(|occurrence| *occurrence > after)
    }

    /// Preview of up to `count` occurrences from `from`, ending at `to` or
    /// [`DEFAULT_PREVIEW_HORIZON_DAYS`] after `from`.
    pub fn upcoming(
        &self,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
        count: usize,
    ) -> Vec<DateTime<Utc>> {
        let to = to.unwrap_or_else(|| {
            from.checked_add_signed(Duration::days(DEFAULT_PREVIEW_HORIZON_DAYS))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        self.occurrences_in_range(from, to, count)
    }

    /// Index of the first candidate period that can contain `lower`.
    /// Rounds down; occurrences before `lower` are filtered afterwards.
    fn first_period(&self, lower: DateTime<Utc>, interval: i64) -> i64 {
        let start = self.rule.start_date;
        let elapsed_periods = match self.rule.frequency {
            Frequency::Daily => (lower - start).num_days(),
            Frequency::Weekly => {
                let anchor = week_start(start.date_naive());
                (week_start(lower.date_naive()) - anchor).num_days() / 7
            }
            Frequency::Monthly => month_index(lower.date_naive()) - month_index(start.date_naive()),
            Frequency::Yearly => i64::from(lower.year() - start.year()),
        };
        (elapsed_periods.max(0)) / interval
    }

    /// Earliest instant of the period `offset` periods after the anchor period.
    fn period_start(&self, offset: i64) -> Option<DateTime<Utc>> {
        let start = self.rule.start_date;
        let date = match self.rule.frequency {
            Frequency::Daily => return start.checked_add_signed(Duration::try_days(offset)?),
            Frequency::Weekly => week_start(start.date_naive())
                .checked_add_signed(Duration::try_days(offset.checked_mul(7)?)?)?,
            Frequency::Monthly => {
                let (year, month) = split_month_index(month_index(start.date_naive()) + offset)?;
                NaiveDate::from_ymd_opt(year, month, 1)?
            }
            Frequency::Yearly => {
                let year = i32::try_from(i64::from(start.year()) + offset).ok()?;
                NaiveDate::from_ymd_opt(year, 1, 1)?
            }
        };
        Some(date.and_time(NaiveTime::MIN).and_utc())
    }

    /// Occurrences of one period in ascending order.
    fn expand_period(&self, offset: i64) -> Vec<DateTime<Utc>> {
        let start = self.rule.start_date;
        let dates: Vec<NaiveDate> = match self.rule.frequency {
            Frequency::Daily => {
                return Duration::try_days(offset)
                    .and_then(|d| start.checked_add_signed(d))
                    .into_iter()
                    .collect();
            }
            Frequency::Weekly => {
                let Some(week) = Duration::try_days(offset.saturating_mul(7))
                    .and_then(|d| week_start(start.date_naive()).checked_add_signed(d))
                else {
                    return Vec::new();
                };
                self.selectors
                    .iter()
                    .filter_map(|day| week.checked_add_signed(Duration::days(i64::from(*day))))
                    .collect()
            }
            Frequency::Monthly => {
                let Some((year, month)) =
                    split_month_index(month_index(start.date_naive()) + offset)
                else {
                    return Vec::new();
                };
                self.selectors
                    .iter()
                    .filter_map(|day| NaiveDate::from_ymd_opt(year, month, u32::from(*day)))
                    .collect()
            }
            Frequency::Yearly => {
                let Ok(year) = i32::try_from(i64::from(start.year()) + offset) else {
                    return Vec::new();
                };
                self.selectors
                    .iter()
                    .filter_map(|month| {
                        NaiveDate::from_ymd_opt(year, u32::from(*month) + 1, start.day())
                    })
                    .collect()
            }
        };

        dates
            .into_iter()
            .map(|date| NaiveDateTime::new(date, self.time_of_day).and_utc())
            .collect()
    }

    fn search_horizon(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let period_days = match self.rule.frequency {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 31,
            Frequency::Yearly => 366,
        };
        let days = period_days * i64::from(self.rule.interval.max(1)) * SEARCH_PERIODS;
        Duration::try_days(days)
            .and_then(|d| after.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Convenience wrapper over [`RecurrenceManager::occurrences_in_range`].
pub fn occurrences_in_range(
    rule: &RecurrenceRule,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    max_count: usize,
) -> Vec<DateTime<Utc>> {
    RecurrenceManager::new(rule.clone()).occurrences_in_range(range_start, range_end, max_count)
}

fn selector_in_range(frequency: Frequency, value: u8) -> bool {
    match frequency {
        Frequency::Daily => true,
        Frequency::Weekly => value <= 6,
        Frequency::Monthly => (1..=31).contains(&value),
        Frequency::Yearly => value <= 11,
    }
}

/// The Sunday that opens the week of `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Inverse of [`month_index`]: `(year, month)` with a 1-based month.
fn split_month_index(index: i64) -> Option<(i32, u32)> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}
