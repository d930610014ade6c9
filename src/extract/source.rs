//! Input roots backed by object storage

use super::parser::{parse_catalog, parse_events};
use super::types::{CatalogEntry, LogEvent};
use crate::error::{Error, Result};
use crate::output::cloud::StoreRoot;
use tracing::debug;

/// A directory tree of raw input files (local path or bucket URL)
#[derive(Debug, Clone)]
pub struct InputSource {
    url: String,
    root: StoreRoot,
}

impl InputSource {
    /// Open an input root; local roots must exist
    pub fn open(url: &str) -> Result<Self> {
        Ok(Self {
            url: url.to_string(),
            root: StoreRoot::parse(url, false)?,
        })
    }

    /// The root as configured
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Recursively list files with the given extension, sorted by path
    ///
    /// Hidden files and directories (leading `.`) are skipped, which keeps
    /// editor and checkpoint litter out of a run.
    pub async fn list(&self, extension: &str) -> Result<Vec<String>> {
        let suffix = format!(".{}", extension.trim_start_matches('.'));

        let mut files: Vec<String> = self
            .root
            .list("")
            .await?
            .iter()
            .map(|p| self.root.relative(p).to_string())
            .filter(|p| p.ends_with(&suffix))
            .filter(|p| !p.split('/').any(|part| part.starts_with('.')))
            .collect();
        files.sort();

        debug!(root = %self.url, count = files.len(), "Listed input files");
        Ok(files)
    }

    /// Read a file as UTF-8 text
    pub async fn read_to_string(&self, relative: &str) -> Result<String> {
        let path = self.root.path(relative);
        let bytes = self.root.store.get(&path).await?.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::extract(relative, format!("not valid UTF-8: {e}")))
    }

    /// Read and parse one catalog file
    pub async fn read_catalog(&self, relative: &str) -> Result<CatalogEntry> {
        let body = self.read_to_string(relative).await?;
        parse_catalog(relative, &body)
    }

    /// Read and parse one event log file
    pub async fn read_events(&self, relative: &str) -> Result<Vec<LogEvent>> {
        let body = self.read_to_string(relative).await?;
        parse_events(relative, &body)
    }
}
