use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use rodio::{Decoder, Source};
use thiserror::Error;
use tracing::debug;

/// Playable metadata for a submitted URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub title: String,
    pub url: String,
    pub duration_seconds: u64,
    pub stream_uri: String,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot resolve {url}: {reason}")]
    Unresolvable { url: String, reason: String },
}

impl ResolveError {
    pub fn unresolvable(url: &str, reason: impl ToString) -> ResolveError {
        ResolveError::Unresolvable {
            url: url.to_owned(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, ResolveError>;
}

/// Resolves local audio files, given as plain paths or `file://` URLs.
/// Relative paths are looked up under the library directory when one is set.
#[derive(Debug, Clone, Default)]
pub struct LocalFileResolver {
    library_dir: Option<PathBuf>,
}

impl LocalFileResolver {
    pub fn new(library_dir: Option<PathBuf>) -> LocalFileResolver {
        LocalFileResolver { library_dir }
    }

    fn locate(&self, url: &str) -> PathBuf {
        let raw = url.trim();
        let raw = raw.strip_prefix("file://").unwrap_or(raw);
        let path = PathBuf::from(shellexpand::tilde(raw).into_owned());

        match &self.library_dir {
            Some(library_dir) if path.is_relative() => library_dir.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl MediaResolver for LocalFileResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, ResolveError> {
        if url.trim().is_empty() {
            return Err(ResolveError::unresolvable(url, "empty url"));
        }

        let path = self.locate(url);
        let owned_url = url.to_owned();

        tokio::task::spawn_blocking(move || probe_file(&owned_url, &path))
            .await
            .map_err(|e| ResolveError::unresolvable(url, e))?
    }
}

fn probe_file(url: &str, path: &Path) -> Result<ResolvedMedia, ResolveError> {
    let path = path
        .canonicalize()
        .map_err(|e| ResolveError::unresolvable(url, e))?;

    let file = File::open(&path).map_err(|e| ResolveError::unresolvable(url, e))?;
    let decoder =
        Decoder::new(BufReader::new(file)).map_err(|e| ResolveError::unresolvable(url, e))?;

    let duration_seconds = decoder
        .total_duration()
        .map(|duration| duration.as_secs())
        .unwrap_or(0);

    let title = title_from_path(&path);
    let stream_uri = path.to_string_lossy().into_owned();

    debug!("Resolved {url} to {stream_uri} ({duration_seconds}s)");

    Ok(ResolvedMedia {
        title,
        url: format!("file://{stream_uri}"),
        duration_seconds,
        stream_uri,
    })
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
