use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{error, info};

use crate::scheduler::{ScheduledBatchRunner, cadence::IntervalCadence, matcher::jst};

const TICK_MINUTES: u32 = 5;

/// 5分ごと（JST の壁時計に整列）にスケジュール評価を行う常駐タスクを起動する。
///
/// 外部の cron から `/cron-trigger` を叩く運用と同じ処理を、プロセス内で行う。
pub fn spawn_cron_daemon(runner: Arc<ScheduledBatchRunner>) -> JoinHandle<()> {
    let cadence = IntervalCadence::new(jst(), TICK_MINUTES);
    CronDaemon { runner, cadence }.spawn()
}

struct CronDaemon {
    runner: Arc<ScheduledBatchRunner>,
    cadence: IntervalCadence,
}

impl CronDaemon {
    fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let state = self;
        loop {
            let now = Utc::now();
            let next = state.cadence.next_run_from(now);
            let wait = duration_until(next, now);
            info!(
                next_run_utc = %next.to_rfc3339(),
                next_run_jst = %next.with_timezone(&state.cadence.tz()).to_rfc3339(),
                wait_seconds = wait.as_secs(),
                "scheduled next schedule evaluation"
            );
            sleep(wait).await;

            match state.runner.run(next).await {
                Ok(report) => info!(
                    due = report.due_count,
                    succeeded = report.succeeded.len(),
                    failed = report.failed.len(),
                    "in-process schedule evaluation completed"
                ),
                Err(err) => error!(error = %err, "in-process schedule evaluation failed"),
            }

            // 境界ちょうどに終わった場合に同じ境界を再評価しない
            if Utc::now() <= next {
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn duration_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    match (next - now).to_std() {
        Ok(duration) => duration,
        Err(_) => Duration::from_secs(0),
    }
}
