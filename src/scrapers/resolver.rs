use crate::scrapers::traits::PageAccessor;
use std::time::Duration;
use tracing::{info, warn};

/// What happened when one candidate selector was tried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Found,
    TimedOut,
    /// The driver rejected the selector or failed mid-wait
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub selector: String,
    pub outcome: AttemptOutcome,
}

/// First candidate that produced a visible match
#[derive(Debug)]
pub struct Resolved<'c, E> {
    pub selector: &'c str,
    /// Position of `selector` in the candidate list
    pub position: usize,
    /// First matching element
    pub element: E,
    pub attempts: Vec<Attempt>,
}

/// No candidate matched. Recoverable: callers decide whether to escalate.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("no visible match for {target}")]
pub struct SelectorNotFound {
    pub target: String,
    pub attempts: Vec<Attempt>,
}

impl SelectorNotFound {
    pub fn tried(&self) -> Vec<String> {
        self.attempts.iter().map(|a| a.selector.clone()).collect()
    }
}

/// Try `candidates` in order, waiting up to `timeout` on each, and stop at the
/// first one with a visible match.
pub fn resolve<'a, 'c, P: PageAccessor>(
    page: &'a P,
    target: &str,
    candidates: &'c [String],
    timeout: Duration,
) -> Result<Resolved<'c, P::Element<'a>>, SelectorNotFound>
where
    P: 'a,
{
    let mut attempts = Vec::with_capacity(candidates.len());

    for (position, selector) in candidates.iter().enumerate() {
        let outcome = match page.wait_for_selector(selector, timeout) {
            Ok(true) => AttemptOutcome::Found,
            Ok(false) => AttemptOutcome::TimedOut,
            Err(e) => AttemptOutcome::Failed(e.to_string()),
        };

        match &outcome {
            AttemptOutcome::Found => info!("✅ {}: selector '{}' found", target, selector),
            AttemptOutcome::TimedOut => {
                warn!("⚠️ {}: selector '{}' timed out after {:?}", target, selector, timeout)
            }
            AttemptOutcome::Failed(reason) => {
                warn!("⚠️ {}: selector '{}' failed: {}", target, selector, reason)
            }
        }

        attempts.push(Attempt {
            selector: selector.clone(),
            outcome: outcome.clone(),
        });

        if outcome != AttemptOutcome::Found {
            continue;
        }

        // Visible a moment ago; a re-render between the wait and the query
        // counts as a miss for this candidate.
        match page.query_all(selector) {
            Ok(elements) => {
                if let Some(element) = elements.into_iter().next() {
                    return Ok(Resolved {
                        selector,
                        position,
                        element,
                        attempts,
                    });
                }
                warn!("⚠️ {}: selector '{}' matched nothing on query", target, selector);
            }
            Err(e) => warn!("⚠️ {}: selector '{}' query failed: {}", target, selector, e),
        }
    }

    Err(SelectorNotFound {
        target: target.to_string(),
        attempts,
    })
}
