use chrono::{DateTime, Duration as ChronoDuration, DurationRound, FixedOffset, Utc};

/// 壁時計に揃えた一定間隔（例: 5分ごと）の起動タイミング。
#[derive(Debug, Clone)]
pub(crate) struct IntervalCadence {
    tz: FixedOffset,
    interval: ChronoDuration,
}

impl IntervalCadence {
    pub(crate) fn new(tz: FixedOffset, interval_minutes: u32) -> Self {
        let interval = ChronoDuration::minutes(i64::from(interval_minutes.max(1)));
        Self { tz, interval }
    }

    pub(crate) fn tz(&self) -> FixedOffset {
        self.tz
    }

    /// `now` 以降で最初の境界。`now` がちょうど境界ならそのまま返す。
    pub(crate) fn next_run_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let localized_now = now.with_timezone(&self.tz);
        match localized_now.duration_trunc(self.interval) {
            Ok(floor) if floor == localized_now => now,
            Ok(floor) => (floor + self.interval).with_timezone(&Utc),
            Err(_) => now + self.interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IntervalCadence;
    use chrono::{DateTime, FixedOffset, Utc};

    fn parse_utc(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("jst offset")
    }

    #[test]
    fn next_run_rounds_up_to_the_next_boundary() {
        let cadence = IntervalCadence::new(jst(), 5);
        let now = parse_utc("2025-11-10T00:01:30Z"); // 09:01:30 JST
        assert_eq!(cadence.next_run_from(now), parse_utc("2025-11-10T00:05:00Z"));
    }

    #[test]
    fn next_run_immediate_when_exact_boundary() {
        let cadence = IntervalCadence::new(jst(), 5);
        let now = parse_utc("2025-11-10T00:10:00Z");
        assert_eq!(cadence.next_run_from(now), now);
    }

    #[test]
    fn next_run_crosses_midnight_jst() {
        let cadence = IntervalCadence::new(jst(), 5);
        let now = parse_utc("2025-11-09T14:58:00Z"); // 23:58 JST
        assert_eq!(cadence.next_run_from(now), parse_utc("2025-11-09T15:00:00Z"));
    }
}
