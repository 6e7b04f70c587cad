//! File-backed whitelist store.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::broadcaster::BroadcasterName;

use super::store::{StoreError, WhitelistStore};
use super::types::Whitelist;

/// Whitelist persisted as `name,annotation` lines.
#[derive(Debug, Clone)]
pub struct CsvWhitelistStore {
    path: PathBuf,
}

impl CsvWhitelistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "whitelist".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Parse whitelist file contents.
///
/// Each line splits on its first comma. A line without a comma is a name
/// with an empty annotation. Blank lines and unusable names are skipped.
/// When two lines normalize to the same name, the first non-empty
/// annotation wins.
pub fn parse_whitelist(contents: &str) -> Whitelist {
    let mut whitelist = Whitelist::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (raw_name, annotation) = match line.split_once(',') {
            Some((n, a)) => (n, a),
            None => (line, ""),
        };
        let name = match BroadcasterName::new(raw_name) {
            Ok(name) => name,
            Err(e) => {
                warn!(line = idx + 1, "Skipping whitelist line: {}", e);
                continue;
            }
        };
        match whitelist.get(&name) {
            Some(existing) if !existing.is_empty() => {}
            _ => {
                whitelist.insert(name, annotation);
            }
        }
    }
    whitelist
}

/// Render the whitelist in file format.
pub fn render_whitelist(whitelist: &Whitelist) -> String {
    let mut out = String::new();
    for (name, annotation) in whitelist.iter() {
        out.push_str(name.as_str());
        out.push(',');
        out.push_str(annotation);
        out.push('\n');
    }
    out
}

impl WhitelistStore for CsvWhitelistStore {
    fn load(&self) -> Result<Whitelist, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(parse_whitelist(&contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No whitelist file yet, starting empty");
                Ok(Whitelist::new())
            }
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    fn save(&self, whitelist: &Whitelist) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp).map_err(|e| StoreError::io(&temp, e))?;
        file.write_all(render_whitelist(whitelist).as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::io(&temp, e))?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        debug!(path = %self.path.display(), entries = whitelist.len(), "Whitelist saved");
        Ok(())
    }
}
