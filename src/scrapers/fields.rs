use crate::scrapers::traits::PageAccessor;
use anyhow::Result;
use reqwest::Url;
use tracing::debug;

/// Extract one text field from a card.
///
/// Candidates are tried in order. For the first sub-element found, the
/// `attribute` value is preferred over rendered text since attributes are not
/// truncated for display. The first non-empty trimmed value wins. Lookup
/// failures only move on to the next candidate; exhaustion yields `""`.
pub fn extract_field<'a, P: PageAccessor>(
    page: &'a P,
    card: &P::Element<'a>,
    candidates: &[String],
    attribute: &str,
) -> String
where
    P: 'a,
{
    for selector in candidates {
        match read_text(page, card, selector, attribute) {
            Ok(Some(value)) => return value,
            Ok(None) => {}
            Err(e) => debug!("Field selector '{}' failed: {}", selector, e),
        }
    }

    String::new()
}

/// Extract the first usable `href` from a card, absolutized against `base`.
/// Returns `""` when no candidate yields a link.
pub fn extract_href<'a, P: PageAccessor>(
    page: &'a P,
    card: &P::Element<'a>,
    candidates: &[String],
    base: Option<&Url>,
) -> String
where
    P: 'a,
{
    for selector in candidates {
        let href = page
            .query_one(card, selector)
            .and_then(|found| match found {
                Some(element) => page.get_attribute(&element, "href"),
                None => Ok(None),
            });

        match href {
            Ok(Some(href)) => {
                if let Some(link) = absolutize(href.trim(), base) {
                    return link;
                }
            }
            Ok(None) => {}
            Err(e) => debug!("Link selector '{}' failed: {}", selector, e),
        }
    }

    String::new()
}

fn read_text<'a, P: PageAccessor>(
    page: &'a P,
    card: &P::Element<'a>,
    selector: &str,
    attribute: &str,
) -> Result<Option<String>>
where
    P: 'a,
{
    let Some(element) = page.query_one(card, selector)? else {
        return Ok(None);
    };

    if let Some(value) = page.get_attribute(&element, attribute)? {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(Some(value.to_string()));
        }
    }

    let text = page.get_text(&element)?;
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.to_string()))
    }
}

/// Resolve `href` to an absolute http(s) URL. Script and fragment-only links
/// are not product links.
fn absolutize(href: &str, base: Option<&Url>) -> Option<String> {
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let url = match Url::parse(href) {
        Ok(url) => url,
        Err(_) => base?.join(href).ok()?,
    };

    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}
