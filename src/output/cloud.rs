//! Object storage access (S3, R2, GCS, Azure, local filesystem)
//!
//! Both the input side (listing and reading raw files) and the file-store
//! sink (writing partitioned Parquet) resolve their roots through here.

use crate::error::{Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

/// Value written for a null partition column, as Hive does
pub const NULL_PARTITION_VALUE: &str = "__HIVE_DEFAULT_PARTITION__";

/// Build a Hive-style partitioned file path
///
/// Format: `{relation}/{col}={value}/.../{file_name}`
///
/// Examples:
/// - `songs/year=1969/artist_id=ARMJAGH1187FB546F3/part-00000.snappy.parquet`
/// - `users/part-00000.snappy.parquet`
pub fn build_partitioned_path(
    relation: &str,
    partition: &[(&str, Option<&str>)],
    file_name: &str,
) -> String {
    let mut path = relation.trim_end_matches('/').to_string();
    for (column, value) in partition {
        let value = value.map_or_else(|| NULL_PARTITION_VALUE.to_string(), escape_partition_value);
        path.push('/');
        path.push_str(&format!("{column}={value}"));
    }
    path.push('/');
    path.push_str(file_name);
    path
}

/// Percent-encode characters that would break a `key=value` path segment
pub fn escape_partition_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            escaped.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    if escaped.is_empty() {
        NULL_PARTITION_VALUE.to_string()
    } else {
        escaped
    }
}

/// A resolved object store root
#[derive(Debug, Clone)]
pub(crate) struct StoreRoot {
    pub store: Arc<dyn ObjectStore>,
    pub prefix: String,
    pub scheme: String,
}

impl StoreRoot {
    /// Parse a root URL and create the matching object store
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` and `s3a://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `/local/path/`, `./path/` or `file:///path` - Local filesystem
    ///
    /// Local roots are created when `create_local` is set, otherwise they
    /// must already exist.
    pub fn parse(url: &str, create_local: bool) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("s3://") {
            Self::s3(rest, "s3", false)
        } else if let Some(rest) = url.strip_prefix("s3a://") {
            Self::s3(rest, "s3", false)
        } else if let Some(rest) = url.strip_prefix("r2://") {
            Self::s3(rest, "r2", true)
        } else if let Some(rest) = url.strip_prefix("gs://") {
            let (bucket, prefix) = split_bucket(rest);
            let store = GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;
            Ok(Self::new(Arc::new(store), prefix, "gs"))
        } else if let Some(rest) = url.strip_prefix("az://") {
            let (container, prefix) = split_bucket(rest);
            let store = MicrosoftAzureBuilder::from_env()
                .with_container_name(container)
                .build()
                .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;
            Ok(Self::new(Arc::new(store), prefix, "az"))
        } else {
            Self::local(url.strip_prefix("file://").unwrap_or(url), create_local)
        }
    }

    fn new(store: Arc<dyn ObjectStore>, prefix: String, scheme: &str) -> Self {
        Self {
            store,
            prefix: prefix.trim_matches('/').to_string(),
            scheme: scheme.to_string(),
        }
    }

    fn s3(rest: &str, scheme: &str, is_r2: bool) -> Result<Self> {
        let (bucket, prefix) = split_bucket(rest);
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        // R2 endpoint: https://<account_id>.r2.cloudflarestorage.com
        if is_r2 {
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;
        Ok(Self::new(Arc::new(store), prefix, scheme))
    }

    fn local(path: &str, create: bool) -> Result<Self> {
        if create {
            std::fs::create_dir_all(path)
                .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;
        } else if !std::path::Path::new(path).is_dir() {
            return Err(Error::FileNotFound {
                path: path.to_string(),
            });
        }

        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;
        Ok(Self::new(Arc::new(store), String::new(), "file"))
    }

    /// Resolve a path relative to this root
    pub fn path(&self, relative: &str) -> ObjectPath {
        let relative = relative.trim_matches('/');
        match (self.prefix.is_empty(), relative.is_empty()) {
            (true, _) => ObjectPath::from(relative),
            (false, true) => ObjectPath::from(self.prefix.as_str()),
            (false, false) => ObjectPath::from(format!("{}/{relative}", self.prefix)),
        }
    }

    /// Path relative to this root, for display and partition parsing
    pub fn relative<'a>(&self, path: &'a ObjectPath) -> &'a str {
        let full = path.as_ref();
        if self.prefix.is_empty() {
            full
        } else {
            full.strip_prefix(self.prefix.as_str())
                .map_or(full, |rest| rest.trim_start_matches('/'))
        }
    }

    /// List every object under a relative prefix
    pub async fn list(&self, relative: &str) -> Result<Vec<ObjectPath>> {
        let prefix = self.path(relative);
        let prefix = if prefix.as_ref().is_empty() {
            None
        } else {
            Some(&prefix)
        };
        let objects: Vec<_> = self.store.list(prefix).try_collect().await?;
        Ok(objects.into_iter().map(|meta| meta.location).collect())
    }
}

/// Split `bucket/some/prefix` into (`bucket`, `some/prefix`)
fn split_bucket(rest: &str) -> (&str, String) {
    match rest.find('/') {
        Some(idx) => (&rest[..idx], rest[idx + 1..].to_string()),
        None => (rest, String::new()),
    }
}

/// Output destination for the file-store sink
#[derive(Debug, Clone)]
pub struct CloudDestination {
    root: StoreRoot,
}

impl CloudDestination {
    /// Parse a destination URL and create the appropriate object store
    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self {
            root: StoreRoot::parse(url, true)?,
        })
    }

    /// Get the scheme (s3, r2, gs, az, file)
    pub fn scheme(&self) -> &str {
        &self.root.scheme
    }

    /// Write bytes to a file relative to the destination root
    pub async fn write(&self, filename: &str, data: Bytes) -> Result<String> {
        let path = self.root.path(filename);

        self.root
            .store
            .put(&path, data.into())
            .await
            .map_err(|e| match e {
                object_store::Error::Generic { .. } => Error::ObjectStore(e),
                other => Error::output(format!("Failed to write {path}: {other}")),
            })?;

        Ok(format!("{}://{path}", self.root.scheme))
    }

    /// Read a file relative to the destination root
    pub async fn read(&self, filename: &str) -> Result<Bytes> {
        let path = self.root.path(filename);
        let result = self.root.store.get(&path).await?;
        Ok(result.bytes().await?)
    }

    /// List files under a relative prefix, as paths relative to the root, sorted
    pub async fn list(&self, relative: &str) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .root
            .list(relative)
            .await?
            .iter()
            .map(|p| self.root.relative(p).to_string())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Delete every object under a relative prefix, returning how many were removed
    pub async fn delete_prefix(&self, relative: &str) -> Result<usize> {
        let paths = self.root.list(relative).await?;
        for path in &paths {
            match self.root.store.delete(path).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(paths.len())
    }
}
