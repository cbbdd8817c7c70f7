pub mod batch;
pub(crate) mod cadence;
pub mod daemon;
pub mod matcher;

/// スケジュール評価に用いる固定オフセット（UTC+9）。
pub const JST_OFFSET_HOURS: i32 = 9;

pub use batch::{BatchReport, ScheduleFailure, ScheduleSuccess, ScheduledBatchRunner};
pub use daemon::spawn_cron_daemon;
pub use matcher::{ClockReading, MinuteRounding, ScheduleMatcher, read_clock};
