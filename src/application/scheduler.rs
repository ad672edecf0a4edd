use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};

use crate::storage::GroupStore;

use super::GroupService;

/// Daily cycle rollover trigger.
///
/// The task wakes up periodically and rolls over the groups anchored on
/// today's day of month, at most once per calendar date.
///
/// "Today" is the UTC calendar date. A group in UTC+7 therefore rolls over
/// at 07:00 local time on its due day, and the cycle month is the UTC month.
#[derive(Debug, Default)]
pub struct RolloverTask {
    last_fired: Option<NaiveDate>,
}

impl RolloverTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// The due day to roll over at `now`, or `None` if today already fired.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<u32> {
        let today = now.date_naive();
        if self.last_fired == Some(today) {
            return None;
        }
        self.last_fired = Some(today);
        Some(today.day())
    }

    /// Tick every `period` until `shutdown` resolves. The first check
    /// happens one period after start.
    pub async fn run<S, F>(mut self, service: Arc<GroupService<S>>, period: Duration, shutdown: F)
    where
        S: GroupStore,
        F: Future<Output = ()>,
    {
        let mut ticker = interval_at(Instant::now() + period, period);
        tokio::pin!(shutdown);

        info!(period_secs = period.as_secs(), "Rollover task started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Rollover task stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let now = Utc::now();
            let Some(due_day) = self.poll(now) else {
                debug!("Rollover already ran today");
                continue;
            };

            match service.rollover_cycle_at(due_day, now).await {
                Ok(report) => {
                    for failure in &report.failures {
                        error!(group_id = failure.group_id, error = %failure.error, "Group rollover failed");
                    }
                    if report.is_clean() {
                        info!(due_day, groups = report.groups.len(), "Daily rollover done");
                    } else {
                        warn!(due_day, failed = report.failures.len(), "Daily rollover finished with failures");
                    }
                }
                Err(e) => error!(due_day, error = %e, "Daily rollover failed"),
            }
        }
    }
}
