//! Daily response-cache clear.
//!
//! A background task sleeps until the next configured local wall-clock
//! time, clears the cache and repeats. The schedule lives only in memory;
//! it starts with the process and ends with [`ClearScheduler::stop`].

use crate::config::DailyClearConfig;
use crate::pipeline::cache::ResponseCache;
use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Next instant strictly after `now` whose local time is `hour:minute`.
///
/// Local times skipped by a DST jump move on to the next day. Returns
/// `None` for an invalid time of day.
#[must_use]
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> Option<DateTime<Tz>> {
    let at = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let today = now.date_naive();
    (0..=2)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|day| now.timezone().from_local_datetime(&day.and_time(at)).earliest())
        .find(|candidate| candidate > now)
}

/// Handle of the running daily-clear task.
#[derive(Debug)]
pub struct ClearScheduler {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ClearScheduler {
    /// Starts clearing `cache` daily at the configured local time.
    ///
    /// Returns `None` when the clear is disabled. Must be called inside a
    /// tokio runtime.
    #[must_use]
    pub fn start(cache: ResponseCache, config: DailyClearConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        info!(hour = config.hour, minute = config.minute, "daily cache clear scheduled");
        Some(Self::spawn_with(cache, move || {
            let now = Local::now();
            let next = next_occurrence(&now, config.hour, config.minute)?;
            (next - now).to_std().ok()
        }))
    }

    /// Spawns the loop; `next_wait` gives the delay before each clear.
    fn spawn_with<F>(cache: ResponseCache, next_wait: F) -> Self
    where
        F: Fn() -> Option<Duration> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            loop {
                let Some(wait) = next_wait() else {
                    warn!("no next clear time, stopping daily clear");
                    return;
                };
                debug!(wait_secs = wait.as_secs(), "sleeping until next cache clear");
                tokio::select! {
                    _ = &mut shutdown_rx => return,
                    () = tokio::time::sleep(wait) => cache.clear_all(),
                }
            }
        });
        Self {
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    /// Stops the task and waits for it to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!("daily cache clear stopped");
    }
}

impl Drop for ClearScheduler {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GeneratedResponse, Intent};
    use chrono::{FixedOffset, Utc};
    use std::sync::Arc;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_next_occurrence_later_today() {
        let next = next_occurrence(&at("2024-03-10T01:30:00+09:00"), 3, 0).unwrap();
        assert_eq!(next, at("2024-03-10T03:00:00+09:00"));
    }

    #[test]
    fn test_next_occurrence_rolls_to_tomorrow() {
        let next = next_occurrence(&at("2024-03-10T03:00:00+09:00"), 3, 0).unwrap();
        assert_eq!(next, at("2024-03-11T03:00:00+09:00"));

        let next = next_occurrence(&at("2024-12-31T23:59:00+09:00"), 0, 0).unwrap();
        assert_eq!(next, at("2025-01-01T00:00:00+09:00"));
    }

    #[test]
    fn test_next_occurrence_month_end() {
        let next = next_occurrence(&at("2024-02-29T22:00:00+09:00"), 21, 15).unwrap();
        assert_eq!(next, at("2024-03-01T21:15:00+09:00"));
    }

    #[test]
    fn test_next_occurrence_invalid_time() {
        assert!(next_occurrence(&Utc::now(), 24, 0).is_none());
        assert!(next_occurrence(&Utc::now(), 3, 60).is_none());
    }

    #[test]
    fn test_disabled_does_not_start() {
        let config = DailyClearConfig {
            enabled: false,
            ..DailyClearConfig::default()
        };
        assert!(ClearScheduler::start(ResponseCache::default(), config).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clears_when_due() {
        let cache = ResponseCache::default();
        let response = Arc::new(GeneratedResponse::new("답변", Intent::InfoQuery, vec![], "test"));
        cache.put("k".to_string(), response).await;

        let scheduler =
            ClearScheduler::spawn_with(cache.clone(), || Some(Duration::from_secs(3600)));
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert!(cache.get("k").await.is_none());

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_due_keeps_entries() {
        let cache = ResponseCache::default();
        let response = Arc::new(GeneratedResponse::new("답변", Intent::InfoQuery, vec![], "test"));
        cache.put("k".to_string(), response).await;

        let scheduler =
            ClearScheduler::spawn_with(cache.clone(), || Some(Duration::from_secs(3600)));
        scheduler.stop().await;
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert!(cache.get("k").await.is_some());
    }
}
