//! App commands.

pub mod export;
pub mod records;
pub mod scrape;
