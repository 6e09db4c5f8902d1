use std::sync::{atomic::AtomicBool, Arc};

use chrono::Utc;
use rand::RngCore;

use crate::{
    fetcher::Fetcher,
    reporter::ProgressReporter,
    runner::{FailurePolicy, RunOptions, Runner},
    sitemap::load_sitemap,
    types::{FetchStats, WarmError, WarmReport},
    utils::{calc_change, direction_of, format_millis, round_to, sample_urls, MAX_TEST_URLS},
};

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct WarmerOptions {
    sitemap_url: String,
    // pause after each request, in seconds
    #[builder(default = "0")]
    delay_secs: u64,
    // skip TLS certificate and hostname verification
    #[builder(default = "false")]
    insecure: bool,
    #[builder(default = "MAX_TEST_URLS")]
    max_test_urls: usize,
    #[builder(default = "FailurePolicy::Abort")]
    failure_policy: FailurePolicy,
}

impl WarmerOptions {
    pub fn default_builder() -> WarmerOptionsBuilder {
        WarmerOptionsBuilder::default()
    }

    pub fn sitemap_url(&self) -> &str {
        &self.sitemap_url
    }

    pub fn insecure(&self) -> bool {
        self.insecure
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            delay_secs: self.delay_secs,
            failure_policy: self.failure_policy,
        }
    }
}

/// Holds one sitemap's urls and the timings gathered while testing and
/// warming it. `load` must be called before `test` or `warm`.
pub struct WarmSession {
    options: WarmerOptions,
    fetcher: Box<dyn Fetcher>,
    reporter: Box<dyn ProgressReporter>,
    rng: Box<dyn RngCore>,
    should_terminate: Arc<AtomicBool>,
    urls: Option<Vec<String>>,
    before: Option<FetchStats>,
    after: Option<FetchStats>,
    last: Option<FetchStats>,
}

impl WarmSession {
    pub fn new(
        options: WarmerOptions,
        fetcher: Box<dyn Fetcher>,
        reporter: Box<dyn ProgressReporter>,
        rng: Box<dyn RngCore>,
        should_terminate: Arc<AtomicBool>,
    ) -> Self {
        WarmSession {
            options,
            fetcher,
            reporter,
            rng,
            should_terminate,
            urls: None,
            before: None,
            after: None,
            last: None,
        }
    }

    /// Downloads and parses the sitemap.
    pub fn load(&mut self) -> Result<&mut Self, WarmError> {
        let urls = load_sitemap(self.fetcher.as_ref(), &self.options.sitemap_url)?;
        self.urls = Some(urls);
        Ok(self)
    }

    pub fn urls(&self) -> Option<&[String]> {
        self.urls.as_deref()
    }

    pub fn before(&self) -> Option<&FetchStats> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&FetchStats> {
        self.after.as_ref()
    }

    /// Stats of the most recent pass, whichever it was.
    pub fn last_stats(&self) -> Option<&FetchStats> {
        self.last.as_ref()
    }

    /// Hits a random subset of the site's urls to gauge performance.
    pub fn test(&mut self) -> Result<FetchStats, WarmError> {
        let urls = self.urls.as_deref().ok_or(WarmError::NotLoaded)?;
        let sample = sample_urls(urls, self.options.max_test_urls, self.rng.as_mut());

        self.reporter
            .report(&format!("Testing with {} URLs", sample.len()))?;
        let stats = self.run(&sample)?;
        self.reporter.report(&format!(
            "Average page time is {}",
            stats.average_duration_millis
        ))?;

        Ok(stats)
    }

    /// Tests the site, warms every url of the sitemap and tests again,
    /// returning the relative change of the average page time in percent.
    pub fn warm(&mut self) -> Result<f64, WarmError> {
        self.warm_report().map(|r| r.percent_change)
    }

    pub fn warm_report(&mut self) -> Result<WarmReport, WarmError> {
        let urls = self.urls.clone().ok_or(WarmError::NotLoaded)?;

        let before = self.test()?;
        self.before = Some(before.clone());

        self.reporter.report("")?;
        self.reporter
            .report(&format!("Warming {} URLs", urls.len()))?;
        let warm = self.run(&urls)?;
        self.reporter.report(&format!(
            "Warmed {} URLs in {}",
            warm.url_count,
            format_millis(warm.total_duration_secs * 1000.0)
        ))?;
        self.reporter.report("")?;

        let after = self.test()?;
        self.after = Some(after.clone());

        let change = calc_change(before.average_duration_millis, after.average_duration_millis);
        let percent_change = round_to(100.0 * change, 2);
        info!(
            "average page time went from {:.2}ms to {:.2}ms ({}%)",
            before.average_duration_millis, after.average_duration_millis, percent_change
        );

        Ok(WarmReport {
            sitemap_url: self.options.sitemap_url.clone(),
            url_count: urls.len(),
            direction: direction_of(before.average_duration_millis, after.average_duration_millis),
            before,
            warm,
            after,
            percent_change,
            finished_at: Utc::now(),
        })
    }

    fn run(&mut self, urls: &[String]) -> Result<FetchStats, WarmError> {
        let options = self.options.run_options();
        let stats = Runner::new(
            self.fetcher.as_ref(),
            self.reporter.as_mut(),
            &options,
            self.should_terminate.clone(),
        )
        .run(urls)?;
        self.last = Some(stats.clone());
        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::FetchError;
    use rand::{rngs::StdRng, SeedableRng};
    use std::{cell::RefCell, io, rc::Rc};

    struct SiteFetcher {
        sitemap: String,
        requested: Rc<RefCell<Vec<String>>>,
    }

    impl Fetcher for SiteFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requested.borrow_mut().push(url.to_string());
            if url.ends_with("sitemap.xml") {
                return Ok(self.sitemap.clone().into_bytes());
            }
            Ok(b"<html></html>".to_vec())
        }
    }

    fn sitemap(n: usize) -> String {
        let locs: String = (0..n)
            .map(|i| format!("<url><loc>https://example.com/{}</loc></url>", i))
            .collect();
        format!(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            locs
        )
    }

    fn session(
        pages: usize,
    ) -> (
        WarmSession,
        Rc<RefCell<Vec<String>>>,
        Rc<RefCell<Vec<String>>>,
    ) {
        let requested = Rc::new(RefCell::new(vec![]));
        let messages = Rc::new(RefCell::new(vec![]));
        let sink = messages.clone();
        let reporter = move |m: &str| -> io::Result<()> {
            sink.borrow_mut().push(m.to_string());
            Ok(())
        };
        let options = WarmerOptions::default_builder()
            .sitemap_url("https://example.com/sitemap.xml")
            .build()
            .unwrap();
        let s = WarmSession::new(
            options,
            Box::new(SiteFetcher {
                sitemap: sitemap(pages),
                requested: requested.clone(),
            }),
            Box::new(reporter),
            Box::new(StdRng::seed_from_u64(3)),
            Arc::new(AtomicBool::new(false)),
        );
        (s, requested, messages)
    }

    #[test]
    fn test_before_load_fails() {
        let (mut s, requested, _) = session(3);
        assert!(matches!(s.test(), Err(WarmError::NotLoaded)));
        assert!(matches!(s.warm(), Err(WarmError::NotLoaded)));
        assert!(requested.borrow().is_empty());
    }

    #[test]
    fn test_uses_every_url_of_a_small_sitemap() {
        let (mut s, requested, messages) = session(3);
        s.load().unwrap();
        let stats = s.test().unwrap();

        assert_eq!(stats.url_count, 3);
        assert!(stats.average_duration_millis >= 0.0);
        assert_eq!(s.last_stats(), Some(&stats));
        // sitemap plus three pages
        assert_eq!(requested.borrow().len(), 4);
        assert_eq!(messages.borrow()[0], "Testing with 3 URLs");
        assert!(messages
            .borrow()
            .last()
            .unwrap()
            .starts_with("Average page time is "));
    }

    #[test]
    fn test_samples_large_sitemaps() {
        let (mut s, _, messages) = session(25);
        s.load().unwrap();
        let stats = s.test().unwrap();
        assert_eq!(stats.url_count, MAX_TEST_URLS);
        assert_eq!(messages.borrow()[0], "Testing with 10 URLs");
    }

    #[test]
    fn warm_tests_then_warms_everything_then_tests_again() {
        let (mut s, requested, messages) = session(12);
        s.load().unwrap();
        let report = s.warm_report().unwrap();

        assert_eq!(report.url_count, 12);
        assert_eq!(report.before.url_count, 10);
        assert_eq!(report.warm.url_count, 12);
        assert_eq!(report.after.url_count, 10);
        assert!(report.percent_change >= 0.0);
        assert_eq!(s.before(), Some(&report.before));
        assert_eq!(s.after(), Some(&report.after));
        // sitemap, test pass, warm pass, test pass
        assert_eq!(requested.borrow().len(), 1 + 10 + 12 + 10);
        assert!(messages.borrow().iter().any(|m| m == "Warming 12 URLs"));
    }

    #[test]
    fn empty_sitemap_cannot_be_tested() {
        let (mut s, _, _) = session(0);
        s.load().unwrap();
        assert!(matches!(s.test(), Err(WarmError::DivisionByZero)));
    }
}
