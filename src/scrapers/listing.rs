use crate::error::ScoutError;
use crate::models::ProductRecord;
use crate::scrapers::fields::{extract_field, extract_href};
use crate::scrapers::resolver::resolve;
use crate::scrapers::traits::PageAccessor;
use crate::scrapers::types::Selectors;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Extraction quality of one listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingReport {
    /// Card selector that located the listing
    pub card_selector: String,
    pub cards: usize,
    /// Records with at least one field degraded to the sentinel
    pub degraded: usize,
    /// Records where only the rank survived
    pub fully_unknown: usize,
    /// Records without a rank badge, usually special deals mixed into the list
    pub unranked: usize,
}

/// Turns the product cards of a rendered page into ranked records
pub struct ListingExtractor<'s> {
    selectors: &'s Selectors,
    wait_timeout: Duration,
}

impl<'s> ListingExtractor<'s> {
    pub fn new(selectors: &'s Selectors, wait_timeout: Duration) -> Self {
        Self {
            selectors,
            wait_timeout,
        }
    }

    /// Extract up to `max_items` records (all when `None`) in on-page order.
    ///
    /// Every located card yields exactly one record with `rank` = its 1-based
    /// position; fields that cannot be read degrade to the sentinel.
    pub fn extract_listing<P: PageAccessor>(
        &self,
        page: &P,
        max_items: Option<usize>,
    ) -> Result<(Vec<ProductRecord>, ListingReport), ScoutError> {
        let resolved = resolve(page, "product card", &self.selectors.card, self.wait_timeout)
            .map_err(|e| ScoutError::NoListingFound { tried: e.tried() })?;
        let card_selector = resolved.selector.to_string();
        let resolved_position = resolved.position;

        if let Err(e) = page.load_more() {
            warn!("Could not load further entries: {}", e);
        }

        let mut cards = match page.query_all(&card_selector) {
            Ok(cards) => cards,
            Err(e) => {
                warn!("Card query failed after resolution: {}", e);
                Vec::new()
            }
        };
        if cards.is_empty() {
            // Resolution saw at least this one card
            cards.push(resolved.element);
        }
        info!(
            "Found {} product cards with '{}' (candidate {} of {})",
            cards.len(),
            card_selector,
            resolved_position + 1,
            self.selectors.card.len()
        );

        if let Some(limit) = max_items {
            cards.truncate(limit);
        }

        let base = page.base_url().and_then(|url| Url::parse(&url).ok());
        let attribute = self.selectors.text_attribute.as_str();

        let mut records = Vec::with_capacity(cards.len());
        for (idx, card) in cards.iter().enumerate() {
            let rank = idx as u32 + 1;

            let name = extract_field(page, card, &self.selectors.name, attribute);
            let price = extract_field(page, card, &self.selectors.price, attribute);
            let link = extract_href(page, card, &self.selectors.link, base.as_ref());
            let badge = extract_field(page, card, &self.selectors.rank, attribute);

            let record = ProductRecord::from_extracted(rank, name, price, link).with_badge(&badge);
            if record.is_fully_unknown() {
                warn!("Card {} yielded no fields", rank);
            } else {
                debug!("{}. {} ({})", record.rank, record.name, record.price);
            }
            records.push(record);
        }

        let report = ListingReport {
            card_selector,
            cards: records.len(),
            degraded: records.iter().filter(|r| r.is_degraded()).count(),
            fully_unknown: records.iter().filter(|r| r.is_fully_unknown()).count(),
            unranked: records.iter().filter(|r| r.badge_rank.is_none()).count(),
        };

        info!(
            "Extracted {} records ({} degraded, {} empty)",
            report.cards, report.degraded, report.fully_unknown
        );

        Ok((records, report))
    }
}
