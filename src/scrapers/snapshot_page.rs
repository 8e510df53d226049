use crate::scrapers::traits::PageAccessor;
use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Page backed by captured HTML instead of a live browser.
///
/// Used to replay a page dumped by an earlier run, and as the page under test
/// for the extraction pipeline. There is no script execution, so whatever is in
/// the markup is considered rendered.
pub struct StaticPage {
    document: Html,
    base_url: Option<String>,
}

impl StaticPage {
    pub fn from_html(html: &str, base_url: Option<String>) -> Self {
        Self {
            document: Html::parse_document(html),
            base_url,
        }
    }

    pub fn from_file(path: &Path, base_url: Option<String>) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read captured page {}", path.display()))?;
        debug!("Loaded {} bytes of HTML from {}", html.len(), path.display());
        Ok(Self::from_html(&html, base_url))
    }
}

impl PageAccessor for StaticPage {
    type Element<'a> = ElementRef<'a>
    where
        Self: 'a;

    fn navigate(&mut self, url: &str) -> Result<()> {
        // The document is already loaded; only remember where it came from
        if self.base_url.is_none() {
            self.base_url = Some(url.to_string());
        }
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        Ok(())
    }

    fn base_url(&self) -> Option<String> {
        self.base_url.clone()
    }

    fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        let selector = parse(selector)?;
        Ok(self.document.select(&selector).any(is_visible))
    }

    fn query_all<'a>(&'a self, selector: &str) -> Result<Vec<ElementRef<'a>>> {
        let selector = parse(selector)?;
        Ok(self.document.select(&selector).collect())
    }

    fn query_one<'a>(
        &'a self,
        scope: &ElementRef<'a>,
        selector: &str,
    ) -> Result<Option<ElementRef<'a>>> {
        let selector = parse(selector)?;
        Ok(scope.select(&selector).next())
    }

    fn get_attribute<'a>(&'a self, element: &ElementRef<'a>, name: &str) -> Result<Option<String>> {
        Ok(element.value().attr(name).map(str::to_string))
    }

    fn get_text<'a>(&'a self, element: &ElementRef<'a>) -> Result<String> {
        let text = element.text().collect::<String>();
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

fn parse(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Invalid selector {:?}: {:?}", selector, e))
}

/// Markup-level visibility: neither the element nor an ancestor is `hidden`
/// or styled `display: none`.
fn is_visible(element: ElementRef<'_>) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|el| {
            let value = el.value();
            let hidden_style = value
                .attr("style")
                .map(|style| style.replace(' ', "").contains("display:none"))
                .unwrap_or(false);
            value.attr("hidden").is_none() && !hidden_style
        })
}
