use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Render capability the extraction pipeline runs against.
///
/// Implementations own the page for the whole run. Element handles borrow the
/// page, so none of them can outlive it.
pub trait PageAccessor {
    /// Handle to one element of the current page
    type Element<'a>
    where
        Self: 'a;

    /// Load `url` and wait for navigation to settle
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Load the current page again after a failed extraction
    fn reload(&mut self) -> Result<()>;

    /// URL of the loaded page, used to absolutize relative links
    fn base_url(&self) -> Option<String>;

    /// Wait up to `timeout` for a visible element matching `selector`.
    /// Returns `Ok(false)` on timeout.
    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// All elements matching `selector`, in document order
    fn query_all<'a>(&'a self, selector: &str) -> Result<Vec<Self::Element<'a>>>;

    /// First descendant of `scope` matching `selector`
    fn query_one<'a>(
        &'a self,
        scope: &Self::Element<'a>,
        selector: &str,
    ) -> Result<Option<Self::Element<'a>>>;

    fn get_attribute<'a>(&'a self, element: &Self::Element<'a>, name: &str)
        -> Result<Option<String>>;

    fn get_text<'a>(&'a self, element: &Self::Element<'a>) -> Result<String>;

    /// Trigger lazy loading of further list entries. Pages that render
    /// everything up front keep the default.
    fn load_more(&self) -> Result<()> {
        Ok(())
    }

    /// Save whatever the page can show for post-mortem inspection, named
    /// after `prefix`. Pages with nothing to add keep the default.
    fn dump_debug(&self, _dir: &Path, _prefix: &str) -> Result<()> {
        Ok(())
    }
}
