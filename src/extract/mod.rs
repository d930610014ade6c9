//! Record extractor
//!
//! Lists raw input files under a root and parses them into typed records:
//! song catalog files hold a single [`CatalogEntry`], event log files hold
//! one [`LogEvent`] per line. A file either parses completely or fails as a
//! whole.

mod parser;
mod source;
mod types;

pub use parser::{parse_catalog, parse_events};
pub use source::InputSource;
pub use types::{CatalogEntry, LogEvent};

#[cfg(test)]
mod tests;
