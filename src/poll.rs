use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};

/// Fixed-interval ticks for the notification poll.
///
/// The first tick fires immediately. A tick is only taken after the caller has
/// finished the previous poll, so polls never overlap; ticks missed while a poll
/// was slow are not replayed.
pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn every_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_spaced() {
        let mut ticker = Ticker::every_secs(30);
        let started = time::Instant::now();

        ticker.tick().await;
        assert_eq!(started.elapsed(), Duration::ZERO);

        ticker.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_poll_delays_the_next_tick() {
        let mut ticker = Ticker::every_secs(30);
        ticker.tick().await;

        let started = time::Instant::now();
        time::sleep(Duration::from_secs(45)).await;
        ticker.tick().await;
        ticker.tick().await;
        assert_eq!(started.elapsed(), Duration::from_secs(75));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_a_slow_poll() {
        let mut ticker = Ticker::every_secs(30);
        let mut finished = 0;
        let started = time::Instant::now();

        tokio::select! {
            _ = async {
                loop {
                    ticker.tick().await;
                    time::sleep(Duration::from_secs(600)).await;
                    finished += 1;
                }
            } => {}
            _ = time::sleep(Duration::from_secs(5)) => {}
        }

        assert_eq!(finished, 0);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn zero_period_is_clamped() {
        let ticker = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(async { Ticker::every_secs(0).period() });
        assert_eq!(ticker, Duration::from_millis(1));
    }
}
