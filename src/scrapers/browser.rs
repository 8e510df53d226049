use crate::scrapers::traits::PageAccessor;
use anyhow::{Context, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, Element as DomElement, LaunchOptions, Tab};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// How often a pending selector wait re-checks the DOM
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launch settings for the headless browser
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    /// Upper bound for a single navigation
    pub navigation_timeout: Duration,
    /// Pause after navigation so client-side rendering can start
    pub settle_delay: Duration,
    /// Scroll rounds attempted by `load_more`
    pub scroll_rounds: u32,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(5),
            scroll_rounds: 15,
        }
    }
}

/// Live page in headless Chrome.
///
/// Owns the browser process and its single tab. Dropping the page closes the
/// browser, so the session never outlives the run.
pub struct ChromePage {
    // Held so the browser process stays alive as long as the tab
    _browser: Browser,
    tab: Arc<Tab>,
    options: ChromeOptions,
}

impl ChromePage {
    /// Launch headless Chrome with one blank tab
    pub fn launch(options: ChromeOptions) -> Result<Self> {
        info!("Launching headless Chrome...");

        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(options.navigation_timeout * 2)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(launch_options).context("Failed to launch Chrome browser")?;

        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(options.navigation_timeout);
        tab.set_user_agent(USER_AGENT, Some("ko-KR,ko;q=0.9,en;q=0.8"), None)
            .context("Failed to set user agent")?;

        Ok(Self {
            _browser: browser,
            tab,
            options,
        })
    }

    /// Click away cookie banners and layer popups that cover the listing
    fn dismiss_popups(&self) {
        let result = self.tab.evaluate(
            r#"
            (() => {
                const selectors = ['#chkToday', '.btnClose', '.btn-close', '.oy-cookie-accept',
                                   'div.layerPop button', 'button[id*="accept"]'];
                let clicked = 0;
                for (const sel of selectors) {
                    const el = document.querySelector(sel);
                    if (el) { el.click(); clicked++; }
                }
                return clicked;
            })()
            "#,
            false,
        );

        match result {
            Ok(obj) => debug!("Dismissed popups: {:?}", obj.value),
            Err(e) => debug!("Popup dismissal skipped: {}", e),
        }
    }

    /// Wait for navigation to finish and client-side rendering to start
    fn settle(&self) -> Result<()> {
        self.tab
            .wait_until_navigated()
            .context("Navigation did not complete")?;

        info!("Waiting {:?} for client-side rendering...", self.options.settle_delay);
        thread::sleep(self.options.settle_delay);

        self.dismiss_popups();
        Ok(())
    }

    fn evaluate_bool(&self, script: &str) -> Result<bool> {
        let result = self.tab.evaluate(script, false)?;
        Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn scroll_height(&self) -> Result<u64> {
        let result = self.tab.evaluate("document.body.scrollHeight", false)?;
        Ok(result.value.and_then(|v| v.as_u64()).unwrap_or(0))
    }
}

impl PageAccessor for ChromePage {
    type Element<'a> = DomElement<'a>
    where
        Self: 'a;

    fn navigate(&mut self, url: &str) -> Result<()> {
        info!("Opening {}", url);

        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.settle()
    }

    fn reload(&mut self) -> Result<()> {
        info!("Reloading {}", self.tab.get_url());

        self.tab
            .reload(false, None)
            .context("Failed to reload page")?;
        self.settle()
    }

    fn base_url(&self) -> Option<String> {
        Some(self.tab.get_url())
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let quoted = serde_json::to_string(selector)?;
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.display !== 'none' && style.visibility !== 'hidden'
                    && (rect.width > 0 || rect.height > 0);
            }})()
            "#,
            quoted
        );

        poll_until(Instant::now() + timeout, POLL_INTERVAL, || {
            self.evaluate_bool(&script)
        })
        .map_err(|e| e.context(format!("Visibility check for {:?} failed", selector)))
    }

    fn query_all<'a>(&'a self, selector: &str) -> Result<Vec<DomElement<'a>>> {
        match self.tab.find_elements(selector) {
            Ok(elements) => Ok(elements),
            Err(e) => {
                // The driver reports an empty match set as an error
                debug!("No elements for {:?}: {}", selector, e);
                Ok(Vec::new())
            }
        }
    }

    fn query_one<'a>(&'a self, scope: &DomElement<'a>, selector: &str) -> Result<Option<DomElement<'a>>> {
        match scope.find_element(selector) {
            Ok(element) => Ok(Some(element)),
            Err(e) => {
                debug!("No descendant for {:?}: {}", selector, e);
                Ok(None)
            }
        }
    }

    fn get_attribute<'a>(&'a self, element: &DomElement<'a>, name: &str) -> Result<Option<String>> {
        element.get_attribute_value(name)
    }

    fn get_text<'a>(&'a self, element: &DomElement<'a>) -> Result<String> {
        element.get_inner_text()
    }

    fn load_more(&self) -> Result<()> {
        let mut last_height = self.scroll_height()?;

        for round in 1..=self.options.scroll_rounds {
            self.tab.evaluate("window.scrollBy(0, 1200)", false)?;
            thread::sleep(Duration::from_millis(300));

            let height = self.scroll_height()?;
            if height <= last_height {
                debug!("Page stopped growing after {} scroll rounds", round);
                return Ok(());
            }
            last_height = height;
        }

        warn!(
            "Page still growing after {} scroll rounds; some entries may be missing",
            self.options.scroll_rounds
        );
        Ok(())
    }

    /// Save the current HTML and a screenshot for post-mortem inspection
    fn dump_debug(&self, dir: &Path, prefix: &str) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let html = self.tab.get_content().context("Failed to read page HTML")?;
        let html_path = dir.join(format!("{}.html", prefix));
        std::fs::write(&html_path, &html)?;
        info!("Saved page HTML to {} ({} bytes)", html_path.display(), html.len());

        let screenshot = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .context("Failed to capture screenshot")?;
        let png_path = dir.join(format!("{}.png", prefix));
        std::fs::write(&png_path, screenshot)?;
        info!("Saved screenshot to {}", png_path.display());

        Ok(())
    }
}

/// Re-run `check` every `interval` until it reports `true` or `deadline`
/// passes. A failing check counts as "not yet" while time remains; only a
/// failure on the final check is returned.
fn poll_until<F>(deadline: Instant, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    loop {
        let outcome = check();
        let expired = Instant::now() >= deadline;

        match outcome {
            Ok(true) => return Ok(true),
            Ok(false) if expired => return Ok(false),
            Err(e) if expired => return Err(e),
            Ok(false) => {}
            Err(e) => debug!("Check failed, polling again: {}", e),
        }

        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(1);

    #[test]
    fn transient_errors_do_not_end_the_wait() {
        let mut calls = 0;
        let found = poll_until(Instant::now() + Duration::from_secs(5), TICK, || {
            calls += 1;
            match calls {
                1 | 2 => anyhow::bail!("Execution context was destroyed"),
                3 => Ok(false),
                _ => Ok(true),
            }
        })
        .unwrap();

        assert!(found);
        assert_eq!(calls, 4);
    }

    #[test]
    fn expired_wait_reports_a_miss() {
        let mut calls = 0;
        let found = poll_until(Instant::now() + Duration::from_millis(20), TICK, || {
            calls += 1;
            Ok(false)
        })
        .unwrap();

        assert!(!found);
        assert!(calls >= 2);
    }

    #[test]
    fn failure_on_the_final_check_is_returned() {
        let result = poll_until(Instant::now(), TICK, || {
            anyhow::bail!("Target closed")
        });

        assert!(result.is_err());
    }
}
