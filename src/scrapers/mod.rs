pub mod browser;
pub mod fields;
pub mod listing;
pub mod resolver;
pub mod snapshot_page;
pub mod traits;
pub mod types;

pub use browser::ChromePage;
pub use listing::{ListingExtractor, ListingReport};
pub use snapshot_page::StaticPage;
pub use traits::PageAccessor;
