//! Calendar matching of generation schedules against the JST wall clock.

use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};

use crate::store::ScheduleDefinition;

use super::JST_OFFSET_HOURS;

/// 分の丸め方。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MinuteRounding {
    /// 5分単位に四捨五入する。時は繰り上げないため 19:58 は `19:60` になる。
    #[default]
    Nearest,
    /// 5分単位に切り捨てる。
    Floor,
}

impl FromStr for MinuteRounding {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "nearest" | "round" => Ok(Self::Nearest),
            "floor" => Ok(Self::Floor),
            other => Err(format!("unknown minute rounding: {other}")),
        }
    }
}

/// JST での曜日コードと丸め済み時刻。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockReading {
    /// `"0"` = 日曜 … `"6"` = 土曜
    pub day_of_week: String,
    /// `HH:MM`
    pub time: String,
}

#[must_use]
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix())
}

/// `now` を固定 UTC+9 の壁時計として読む。スケジュールの `timezone` は参照しない。
#[must_use]
pub fn read_clock(now: DateTime<Utc>, rounding: MinuteRounding) -> ClockReading {
    let local = now.with_timezone(&jst());
    let minute = local.minute();
    let rounded = match rounding {
        MinuteRounding::Nearest => (minute + 2) / 5 * 5,
        MinuteRounding::Floor => minute / 5 * 5,
    };
    ClockReading {
        day_of_week: local.weekday().num_days_from_sunday().to_string(),
        time: format!("{:02}:{rounded:02}", local.hour()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleMatcher {
    rounding: MinuteRounding,
}

impl ScheduleMatcher {
    #[must_use]
    pub fn new(rounding: MinuteRounding) -> Self {
        Self { rounding }
    }

    /// 現在時刻に実行すべき有効なスケジュールを返す。各スケジュールは高々1回だけ含まれる。
    #[must_use]
    pub fn find_due(
        &self,
        schedules: &[ScheduleDefinition],
        now: DateTime<Utc>,
    ) -> Vec<ScheduleDefinition> {
        let clock = read_clock(now, self.rounding);
        let mut due: Vec<ScheduleDefinition> = Vec::new();
        for schedule in schedules {
            if is_due(schedule, &clock) && !due.iter().any(|seen| seen.id == schedule.id) {
                due.push(schedule.clone());
            }
        }
        due
    }
}

fn is_due(schedule: &ScheduleDefinition, clock: &ClockReading) -> bool {
    schedule.is_active
        && schedule.days_of_week.contains(&clock.day_of_week)
        && schedule.time_of_day == clock.time
}
