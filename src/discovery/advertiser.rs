use crate::shutdown::ShutdownListener;
use anyhow::Result;
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// An open advertisement session
pub trait Announcer: Send + Sized {
    /// Announce (or re-announce) presence
    fn alive(&mut self) -> impl Future<Output = Result<()>> + Send;
    /// Withdraw the announcement
    fn bye(&mut self) -> impl Future<Output = Result<()>> + Send;
    /// Release the session
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// Advertise until `shutdown` fires, then withdraw.
///
/// An alive is sent on start and then every `alive_interval`; `None` sends only the first one.
/// Failures are logged and never retried.
pub async fn run_advertiser<A: Announcer>(mut announcer: A, alive_interval: Option<Duration>, mut shutdown: ShutdownListener) {
    if let Err(e) = announcer.alive().await {
        warn!("Initial SSDP alive failed: {}", e);
    }

    let mut ticker = alive_interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    match alive_interval {
        Some(period) => debug!("Sending SSDP alive every {}s", period.as_secs_f32()),
        None => debug!("Periodic SSDP alive disabled"),
    }

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = next_tick(&mut ticker) => {
                if let Err(e) = announcer.alive().await {
                    warn!("SSDP alive failed: {}", e);
                }
            }
        }
    }

    info!("SSDP advertiser stopping");
    if let Err(e) = announcer.bye().await {
        warn!("SSDP bye failed: {}", e);
    }
    if let Err(e) = announcer.close().await {
        warn!("Failed to close SSDP session: {}", e);
    }
    info!("SSDP advertiser stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Shutdown;
    use anyhow::bail;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<&'static str>>>,
        failing: bool,
    }

    impl Recorder {
        fn record(&self, event: &'static str) -> Result<()> {
            self.events.lock().unwrap().push(event);
            if self.failing {
                bail!("network unreachable");
            }
            Ok(())
        }

        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Announcer for Recorder {
        async fn alive(&mut self) -> Result<()> {
            self.record("alive")
        }

        async fn bye(&mut self) -> Result<()> {
            self.record("bye")
        }

        async fn close(self) -> Result<()> {
            self.record("close")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_until_shutdown() {
        let recorder = Recorder::default();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(run_advertiser(recorder.clone(), Some(Duration::from_secs(10)), shutdown.subscribe()));

        tokio::time::sleep(Duration::from_secs(35)).await;
        shutdown.trigger();
        task.await.unwrap();

        assert_eq!(recorder.events(), vec!["alive", "alive", "alive", "alive", "bye", "close"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_interval_only_announces_once() {
        let recorder = Recorder::default();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(run_advertiser(recorder.clone(), None, shutdown.subscribe()));

        tokio::time::sleep(Duration::from_secs(3600)).await;
        shutdown.trigger();
        task.await.unwrap();

        assert_eq!(recorder.events(), vec!["alive", "bye", "close"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_shutdown_sends_one_bye() {
        let recorder = Recorder::default();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(run_advertiser(recorder.clone(), Some(Duration::from_secs(10)), shutdown.subscribe()));

        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        task.await.unwrap();

        let events = recorder.events();
        assert_eq!(events.iter().filter(|e| **e == "bye").count(), 1);
        assert_eq!(events.last(), Some(&"close"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_absorbed() {
        let recorder = Recorder { failing: true, ..Recorder::default() };
        let shutdown = Shutdown::new();
        let task = tokio::spawn(run_advertiser(recorder.clone(), Some(Duration::from_secs(10)), shutdown.subscribe()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.trigger();
        task.await.unwrap();

        assert_eq!(recorder.events(), vec!["alive", "alive", "alive", "bye", "close"]);
    }
}
