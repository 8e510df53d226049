use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel written in place of a field that could not be extracted
pub const UNKNOWN: &str = "unknown";

/// One ranked entry of the listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    /// 1-based on-page position
    pub rank: u32,
    pub name: String,
    pub price: String,
    /// Digits of `price` as a number, when it has any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_value: Option<u64>,
    /// Absolute URL, or empty
    pub link: String,
    /// Number shown on the card's rank badge. Special-deal entries have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_rank: Option<u32>,
    #[serde(default = "Utc::now")]
    pub scraped_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Build a record from raw extracted strings, degrading empty fields to [`UNKNOWN`]
    pub fn from_extracted(rank: u32, name: String, price: String, link: String) -> Self {
        let name = or_unknown(name);
        let price = or_unknown(price);
        let price_value = parse_price(&price);

        Self {
            rank,
            name,
            price,
            price_value,
            link,
            badge_rank: None,
            scraped_at: Utc::now(),
        }
    }

    /// Attach the text of the card's rank badge
    pub fn with_badge(mut self, badge: &str) -> Self {
        self.badge_rank = parse_rank(badge);
        self
    }

    /// True when at least one field fell back to the sentinel
    pub fn is_degraded(&self) -> bool {
        self.name == UNKNOWN || self.price == UNKNOWN || self.link.is_empty()
    }

    /// True when nothing but the rank was recovered
    pub fn is_fully_unknown(&self) -> bool {
        self.name == UNKNOWN && self.price == UNKNOWN && self.link.is_empty()
    }
}

/// Persisted output of one run, keyed by `date`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub date: NaiveDate,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub items: Vec<ProductRecord>,
}

impl Snapshot {
    pub fn new(date: NaiveDate, items: Vec<ProductRecord>) -> Self {
        Self {
            date,
            generated_at: Utc::now(),
            count: items.len(),
            items,
        }
    }
}

fn or_unknown(value: String) -> String {
    if value.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

/// Pull the numeric amount out of a price label like "23,900원" or "₩ 12,000~"
pub fn parse_price(text: &str) -> Option<u64> {
    if text == UNKNOWN {
        return None;
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    digits.parse().ok()
}

/// First run of digits in a rank badge like "1위" or "TOP 12"
pub fn parse_rank(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
