use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::sleep,
    time::{Duration, Instant},
};

use crate::{
    fetcher::Fetcher,
    reporter::ProgressReporter,
    types::{FetchStats, WarmError},
};

// granularity at which the delay between requests checks for termination
const PAUSE_STEP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// stop the run on the first page that cannot be fetched
    Abort,
    /// log the failure and leave the page out of the timings
    Skip,
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct RunOptions {
    // pause after each request, in seconds
    #[builder(default = "0")]
    pub delay_secs: u64,
    #[builder(default = "FailurePolicy::Abort")]
    pub failure_policy: FailurePolicy,
}

impl RunOptions {
    pub fn default_builder() -> RunOptionsBuilder {
        RunOptionsBuilder::default()
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            delay_secs: 0,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Fetches urls one after the other and times each request.
pub struct Runner<'a> {
    fetcher: &'a dyn Fetcher,
    reporter: &'a mut dyn ProgressReporter,
    options: &'a RunOptions,
    should_terminate: Arc<AtomicBool>,
}

impl<'a> Runner<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        reporter: &'a mut dyn ProgressReporter,
        options: &'a RunOptions,
        should_terminate: Arc<AtomicBool>,
    ) -> Self {
        Runner {
            fetcher,
            reporter,
            options,
            should_terminate,
        }
    }

    pub fn run(&mut self, urls: &[String]) -> Result<FetchStats, WarmError> {
        if urls.is_empty() {
            return Err(WarmError::DivisionByZero);
        }

        let total = urls.len();
        let mut durations = Vec::with_capacity(total);
        let mut failed = 0;

        for (i, url) in urls.iter().enumerate() {
            if self.should_terminate.load(Ordering::Relaxed) {
                return Err(WarmError::EarlyTermination);
            }

            self.reporter
                .report(&format!("({}/{}) - Fetching {}", i + 1, total, url))?;

            let started = Instant::now();
            let res = self.fetcher.fetch(url);
            let elapsed = started.elapsed();

            match res {
                Ok(_) => {
                    debug!("fetched {} in {:?}", url, elapsed);
                    durations.push(elapsed);
                }
                Err(e) => match self.options.failure_policy {
                    FailurePolicy::Abort => return Err(e.into_download(url)),
                    FailurePolicy::Skip => {
                        warn!("skipping {} after failed fetch: {}", url, e);
                        self.reporter
                            .report(&format!("({}/{}) - Failed {}: {}", i + 1, total, url, e))?;
                        failed += 1;
                    }
                },
            }

            if self.options.delay_secs > 0 {
                self.pause(Duration::from_secs(self.options.delay_secs))?;
            }
        }

        FetchStats::from_durations(&durations, failed)
    }

    fn pause(&self, delay: Duration) -> Result<(), WarmError> {
        debug!("sleeping for {} seconds", delay.as_secs());
        let deadline = Instant::now() + delay;
        loop {
            if self.should_terminate.load(Ordering::Relaxed) {
                return Err(WarmError::EarlyTermination);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            sleep(PAUSE_STEP.min(deadline - now));
        }
    }
}
