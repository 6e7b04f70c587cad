//! Whitelist of broadcasters eligible for recording, plus the completion
//! history log.
//!
//! The whitelist file is a two-column table (`name,annotation`), one record
//! per line, sorted by name. An empty annotation marks a broadcaster that has
//! been seen live but is not enabled; any other annotation enables recording.
//! New names are added automatically on discovery, entries are never removed
//! automatically.

mod file_store;
mod history;
mod store;
mod types;

pub use file_store::{parse_whitelist, render_whitelist, CsvWhitelistStore};
pub use history::{format_history_line, FileHistoryLog, HistoryLog, HISTORY_TIME_FORMAT};
pub use store::{StoreError, WhitelistStore};
pub use types::{merge, Whitelist};
