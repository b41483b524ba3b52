//! Resource locators for models and catalog images.
//!
//! A locator is either a filesystem path (relative paths resolve against the
//! fetcher's base directory) or an `http(s)://` URL. Remote bytes are cached on
//! disk keyed by the SHA-256 of the URL so a restart does not refetch them.

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("empty resource locator")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    Local(PathBuf),
    Remote(String),
}

impl ResourceLocator {
    pub fn parse(value: &str) -> Result<Self, ResourceError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ResourceError::Empty);
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Remote(trimmed.to_string()));
        }
        let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);
        Ok(Self::Local(PathBuf::from(path)))
    }

    /// File extension without the dot, lowercased. Query strings are ignored.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            Self::Local(path) => path.file_name()?.to_str()?.to_string(),
            Self::Remote(url) => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query.rsplit('/').next()?.to_string()
            }
        };
        let (_, ext) = name.rsplit_once('.')?;
        (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_name()
                .and_then(|value| value.to_str())
                .unwrap_or("model")
                .to_string(),
            Self::Remote(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|value| value.rsplit('/').next())
                .filter(|value| !value.is_empty())
                .unwrap_or("model")
                .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    base_dir: PathBuf,
    cache_dir: Option<PathBuf>,
}

impl ResourceFetcher {
    pub fn new(base_dir: PathBuf, cache_dir: Option<PathBuf>) -> Self {
        Self {
            base_dir,
            cache_dir,
        }
    }

    pub fn resolve_local(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn fetch(&self, locator: &ResourceLocator) -> Result<Vec<u8>, ResourceError> {
        match locator {
            ResourceLocator::Local(path) => {
                let resolved = self.resolve_local(path);
                std::fs::read(&resolved).map_err(|source| ResourceError::Read {
                    path: resolved.display().to_string(),
                    source,
                })
            }
            ResourceLocator::Remote(url) => self.fetch_remote(url, locator.extension()),
        }
    }

    pub fn fetch_str(&self, value: &str) -> Result<Vec<u8>, ResourceError> {
        self.fetch(&ResourceLocator::parse(value)?)
    }

    fn fetch_remote(&self, url: &str, extension: Option<String>) -> Result<Vec<u8>, ResourceError> {
        let cached_path = self
            .cache_dir
            .as_ref()
            .map(|dir| dir.join(cache_file_name(url, extension.as_deref())));
        if let Some(path) = &cached_path {
            if let Ok(bytes) = std::fs::read(path) {
                log::debug!("Cache hit for {} ({})", url, path.display());
                return Ok(bytes);
            }
        }

        log::info!("Fetching {}", url);
        let response = ureq::get(url).call().map_err(|source| ResourceError::Http {
            url: url.to_string(),
            source: Box::new(source),
        })?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|source| ResourceError::Body {
                url: url.to_string(),
                source,
            })?;

        if let Some(path) = &cached_path {
            if let Err(err) = write_cache_file(path, &bytes) {
                log::warn!("Failed to cache {} at {}: {}", url, path.display(), err);
            }
        }
        Ok(bytes)
    }
}

/// Writes beside the final path and renames into place, so an interrupted
/// write never leaves a truncated file that later reads as a cache hit.
fn write_cache_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut partial = path.as_os_str().to_owned();
    partial.push(format!(".{}.part", std::process::id()));
    let partial = PathBuf::from(partial);
    if let Err(err) = std::fs::write(&partial, bytes).and_then(|()| std::fs::rename(&partial, path)) {
        let _ = std::fs::remove_file(&partial);
        return Err(err);
    }
    Ok(())
}

pub fn cache_file_name(url: &str, extension: Option<&str>) -> String {
    let digest = Sha256::digest(url.as_bytes());
    match extension {
        Some(ext) => format!("{:x}.{}", digest, ext),
        None => format!("{:x}", digest),
    }
}

#[cfg(test)]
mod tests {
    use super::{cache_file_name, write_cache_file, ResourceFetcher, ResourceLocator};
    use std::path::PathBuf;

    #[test]
    fn classifies_locators() {
        assert_eq!(
            ResourceLocator::parse("https://example.com/house.glb").unwrap(),
            ResourceLocator::Remote("https://example.com/house.glb".to_string())
        );
        assert_eq!(
            ResourceLocator::parse("assets/models/house.glb").unwrap(),
            ResourceLocator::Local(PathBuf::from("assets/models/house.glb"))
        );
        assert_eq!(
            ResourceLocator::parse("file:///tmp/a.png").unwrap(),
            ResourceLocator::Local(PathBuf::from("/tmp/a.png"))
        );
        assert!(ResourceLocator::parse("   ").is_err());
    }

    #[test]
    fn extension_ignores_query_string() {
        let remote = ResourceLocator::parse("https://cdn.example.com/tiles/Marble.JPG?v=2").unwrap();
        assert_eq!(remote.extension().as_deref(), Some("jpg"));
        assert_eq!(remote.display_name(), "Marble.JPG");
        let local = ResourceLocator::parse("textures/no_extension").unwrap();
        assert_eq!(local.extension(), None);
    }

    #[test]
    fn cache_names_are_stable_and_distinct() {
        let a = cache_file_name("https://a.example/x.png", Some("png"));
        let b = cache_file_name("https://b.example/x.png", Some("png"));
        assert_eq!(a, cache_file_name("https://a.example/x.png", Some("png")));
        assert_ne!(a, b);
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), 64 + 4);
    }

    #[test]
    fn local_fetch_resolves_against_base_dir() {
        let mut dir = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("house_customizer_resource_{}_{}", std::process::id(), nonce));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("swatch.bin"), [1u8, 2, 3]).unwrap();

        let fetcher = ResourceFetcher::new(dir.clone(), None);
        assert_eq!(fetcher.fetch_str("swatch.bin").unwrap(), vec![1, 2, 3]);
        assert!(fetcher.fetch_str("missing.bin").is_err());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn cache_files_appear_complete_or_not_at_all() {
        let mut dir = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("house_customizer_cache_{}_{}", std::process::id(), nonce));
        let path = dir.join("nested").join(cache_file_name("https://a.example/x.png", Some("png")));

        write_cache_file(&path, &[7u8; 64]).unwrap();
        write_cache_file(&path, &[9u8; 16]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![9u8; 16]);

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![path.clone()]);

        let blocked = dir.join("blocked");
        std::fs::create_dir_all(blocked.join("occupied")).unwrap();
        std::fs::write(blocked.join("occupied").join("keep"), b"x").unwrap();
        assert!(write_cache_file(&blocked.join("occupied"), b"data").is_err());
        assert!(!blocked.join(format!("occupied.{}.part", std::process::id())).exists());

        let _ = std::fs::remove_dir_all(dir);
    }
}
