use crate::config::Config;
use crate::error::ScoutError;
use crate::models::ProductRecord;
use crate::notify::{DeliveryReport, Notifier, SlackWebhook};
use crate::scrapers::{ChromePage, ListingExtractor, ListingReport, PageAccessor, StaticPage};
use crate::store::{date_key_now, ArtifactId, SnapshotStore};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Extract today's ranking and persist it. Nothing is written when the
/// listing cannot be located.
pub async fn scrape(config: &Config) -> Result<ArtifactId> {
    let settings = config.clone();
    let (records, report) = tokio::task::spawn_blocking(move || extract_records(&settings))
        .await
        .context("Extraction task panicked")??;

    save(config, &records, &report).await
}

/// Send the latest snapshot to the configured webhook
pub async fn notify(config: &Config) -> Result<DeliveryReport> {
    let url = config.webhook_url.as_deref().ok_or_else(|| {
        ScoutError::Configuration(
            "no webhook configured; set SLACK_WEBHOOK_URL or --webhook-url".to_string(),
        )
    })?;

    let store = SnapshotStore::new(&config.output_dir);
    let sink = SlackWebhook::new(url).map_err(ScoutError::Delivery)?;
    let report = Notifier::new(&store, sink, config.top_n)
        .notify_latest()
        .await?;

    Ok(report)
}

/// Scrape, then notify if possible. A failed notification is reported but the
/// run still counts as successful.
pub async fn run(config: &Config) -> Result<ArtifactId> {
    let artifact = scrape(config).await?;

    if config.webhook_url.is_none() {
        info!("💡 Set SLACK_WEBHOOK_URL to receive the ranking in Slack");
        return Ok(artifact);
    }

    if let Err(e) = notify(config).await {
        warn!("Notification skipped: {:#}", e);
    }

    Ok(artifact)
}

async fn save(
    config: &Config,
    records: &[ProductRecord],
    report: &ListingReport,
) -> Result<ArtifactId> {
    if report.fully_unknown > 0 {
        warn!(
            "{} of {} cards yielded no fields; selectors may need updating",
            report.fully_unknown, report.cards
        );
    }
    if report.unranked > 0 {
        info!("{} entries carry no rank badge (special deals)", report.unranked);
    }

    let store = SnapshotStore::new(&config.output_dir);
    let artifact = store.write(records, date_key_now()).await?;

    for record in records.iter().take(config.top_n) {
        info!("{}. {} ({})", record.rank, record.name, record.price);
    }

    Ok(artifact)
}

fn extract_records(config: &Config) -> Result<(Vec<ProductRecord>, ListingReport), ScoutError> {
    match &config.from_html {
        Some(path) => {
            info!("Replaying captured page {}", path.display());
            let mut page = StaticPage::from_file(path, None).map_err(|source| {
                ScoutError::Navigation {
                    url: path.display().to_string(),
                    source,
                }
            })?;
            extract_with_retries(&mut page, config)
        }
        None => {
            let mut page = ChromePage::launch(config.chrome.clone()).map_err(|source| {
                ScoutError::Navigation {
                    url: config.url.clone(),
                    source,
                }
            })?;
            extract_with_retries(&mut page, config)
        }
    }
}

/// Open the ranking page and extract it, reloading after navigation or
/// listing failures up to `config.max_attempts` loads in total. Every failed
/// attempt leaves a `fail_attempt_<n>` dump; only the last failure is returned.
fn extract_with_retries<P: PageAccessor>(
    page: &mut P,
    config: &Config,
) -> Result<(Vec<ProductRecord>, ListingReport), ScoutError> {
    let extractor = ListingExtractor::new(&config.selectors, config.wait_timeout);
    let mut opened = false;
    let mut attempt = 1;

    loop {
        let loaded = if opened {
            page.reload()
        } else {
            page.navigate(&config.url)
        };

        let result = match loaded {
            Ok(()) => {
                opened = true;
                extractor.extract_listing(&*page, config.max_items)
            }
            Err(source) => Err(ScoutError::Navigation {
                url: config.url.clone(),
                source,
            }),
        };

        let err = match result {
            Ok(extracted) => {
                if attempt > 1 {
                    info!("✅ Listing extracted on attempt {}", attempt);
                }
                return Ok(extracted);
            }
            Err(e) => e,
        };

        let prefix = format!("fail_attempt_{}", attempt);
        if let Err(e) = page.dump_debug(&config.debug_dir, &prefix) {
            warn!("Could not save debug dump: {:#}", e);
        }

        if !err.is_retryable() || attempt >= config.max_attempts {
            return Err(err);
        }

        warn!(
            "⚠️ Attempt {}/{} failed at {}: {}; reloading",
            attempt,
            config.max_attempts,
            err.stage(),
            err
        );
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Config};
    use clap::Parser;
    use scraper::ElementRef;
    use std::cell::RefCell;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config_for(args: &[&str]) -> Config {
        let cli = Cli::try_parse_from(
            ["ranking-scout", "scrape", "--webhook-url", ""]
                .into_iter()
                .chain(args.iter().copied()),
        )
        .unwrap();
        Config::from_options(cli.options).unwrap()
    }

    #[tokio::test]
    async fn replayed_page_is_written_as_todays_snapshot() {
        let dir = tempdir().unwrap();
        let page = dir.path().join("page.html");
        std::fs::write(
            &page,
            r#"<ul class="cate_prd_list">
                 <li><a href="/g/1"></a><p class="tx_name">One</p><span class="tx_cur">1,000원</span></li>
                 <li><a href="/g/2"></a><p class="tx_name">Two</p></li>
               </ul>"#,
        )
        .unwrap();
        let out = dir.path().join("out");
        let config = config_for(&[
            "--from-html",
            page.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ]);

        let artifact = scrape(&config).await.unwrap();

        let snapshot = SnapshotStore::load(&artifact.path).await.unwrap();
        assert_eq!(snapshot.date, date_key_now());
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.items[0].link, "https://www.oliveyoung.co.kr/g/1");
        assert_eq!(snapshot.items[1].price, crate::models::UNKNOWN);
    }

    #[tokio::test]
    async fn missing_listing_writes_nothing() {
        let dir = tempdir().unwrap();
        let page = dir.path().join("page.html");
        std::fs::write(&page, "<p>Service check in progress</p>").unwrap();
        let out = dir.path().join("out");
        let config = config_for(&[
            "--from-html",
            page.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
            "--wait-timeout-secs",
            "0",
        ]);

        let err = scrape(&config).await.unwrap_err();

        let err = err.downcast_ref::<ScoutError>().unwrap();
        assert_eq!(err.stage(), "listing resolution");
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn notify_requires_a_webhook() {
        let config = config_for(&[]);

        let err = notify(&config).await.unwrap_err();
        let err = err.downcast_ref::<ScoutError>().unwrap();
        assert_eq!(err.stage(), "configuration");
    }

    const LISTING: &str = r#"
        <ul class="cate_prd_list">
          <li><a href="/g/1"></a><p class="tx_name">One</p><span class="tx_cur">1,000원</span></li>
          <li><a href="/g/2"></a><p class="tx_name">Two</p><span class="tx_cur">2,000원</span></li>
        </ul>
    "#;

    /// Captured page whose first `failing_loads` loads render no listing
    struct FlakyPage {
        inner: StaticPage,
        failing_loads: u32,
        rendered: bool,
        loads: Vec<&'static str>,
        dumps: RefCell<Vec<String>>,
    }

    impl FlakyPage {
        fn new(failing_loads: u32) -> Self {
            Self {
                inner: StaticPage::from_html(LISTING, None),
                failing_loads,
                rendered: false,
                loads: Vec::new(),
                dumps: RefCell::new(Vec::new()),
            }
        }

        fn load(&mut self, kind: &'static str) {
            self.loads.push(kind);
            self.rendered = self.failing_loads == 0;
            self.failing_loads = self.failing_loads.saturating_sub(1);
        }
    }

    impl PageAccessor for FlakyPage {
        type Element<'a> = ElementRef<'a>
        where
            Self: 'a;

        fn navigate(&mut self, url: &str) -> Result<()> {
            self.load("navigate");
            self.inner.navigate(url)
        }

        fn reload(&mut self) -> Result<()> {
            self.load("reload");
            Ok(())
        }

        fn base_url(&self) -> Option<String> {
            self.inner.base_url()
        }

        fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
            if !self.rendered {
                return Ok(false);
            }
            self.inner.wait_for_selector(selector, timeout)
        }

        fn query_all<'a>(&'a self, selector: &str) -> Result<Vec<ElementRef<'a>>> {
            self.inner.query_all(selector)
        }

        fn query_one<'a>(
            &'a self,
            scope: &ElementRef<'a>,
            selector: &str,
        ) -> Result<Option<ElementRef<'a>>> {
            self.inner.query_one(scope, selector)
        }

        fn get_attribute<'a>(
            &'a self,
            element: &ElementRef<'a>,
            name: &str,
        ) -> Result<Option<String>> {
            self.inner.get_attribute(element, name)
        }

        fn get_text<'a>(&'a self, element: &ElementRef<'a>) -> Result<String> {
            self.inner.get_text(element)
        }

        fn dump_debug(&self, _dir: &Path, prefix: &str) -> Result<()> {
            self.dumps.borrow_mut().push(prefix.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn listing_found_after_reload_is_written_once() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let config = config_for(&["--output-dir", out.to_str().unwrap()]);
        let mut page = FlakyPage::new(1);

        let (records, report) = extract_with_retries(&mut page, &config).unwrap();

        assert_eq!(page.loads, vec!["navigate", "reload"]);
        assert_eq!(*page.dumps.borrow(), vec!["fail_attempt_1".to_string()]);
        assert_eq!(records.len(), 2);

        let artifact = save(&config, &records, &report).await.unwrap();
        let files: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(SnapshotStore::load(&artifact.path).await.unwrap().count, 2);
    }

    #[test]
    fn last_failure_surfaces_after_every_attempt() {
        let config = config_for(&["--max-attempts", "3"]);
        let mut page = FlakyPage::new(5);

        let err = extract_with_retries(&mut page, &config).unwrap_err();

        assert!(matches!(err, ScoutError::NoListingFound { .. }));
        assert_eq!(page.loads, vec!["navigate", "reload", "reload"]);
        assert_eq!(
            *page.dumps.borrow(),
            vec!["fail_attempt_1", "fail_attempt_2", "fail_attempt_3"]
        );
    }

    #[test]
    fn single_attempt_does_not_reload() {
        let config = config_for(&["--max-attempts", "1"]);
        let mut page = FlakyPage::new(1);

        assert!(extract_with_retries(&mut page, &config).is_err());
        assert_eq!(page.loads, vec!["navigate"]);
    }
}
