//! A local cache of files downloaded by URL.
//!
//! The cache folder holds the downloaded files and an `index.json` mapping each URL to the
//! path of its file relative to the folder. Concurrent processes sharing a folder may lose
//! index updates.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Environment variable overriding the cache folder.
pub const CACHE_FOLDER_VARIABLE: &str = "GEOTABLE_CACHE_FOLDER";

const INDEX_NAME: &str = "index.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct CacheIndex(BTreeMap<String, String>);

/// Where downloaded sources are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub folder: PathBuf,
}

impl CacheConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.folder.join(INDEX_NAME)
    }

    fn read_index(&self) -> Result<CacheIndex> {
        match fs::read_to_string(self.index_path()) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(CacheIndex::default()),
            Err(error) => Err(error.into()),
        }
    }

    fn write_index(&self, index: &CacheIndex) -> Result<()> {
        fs::create_dir_all(&self.folder)?;
        write_atomic(&self.index_path(), serde_json::to_string_pretty(index)?.as_bytes())
    }

    /// The cached file for `url`, if it was downloaded before and is still on disk.
    pub fn get(&self, url: &str) -> Result<Option<PathBuf>> {
        let index = self.read_index()?;
        Ok(index
            .0
            .get(url)
            .map(|relative_path| self.folder.join(relative_path))
            .filter(|path| path.exists()))
    }

    /// Store `content` as the cached file for `url` and return its path.
    pub fn put(&self, url: &str, content: &[u8]) -> Result<PathBuf> {
        let mut index = self.read_index()?;
        let relative_path = match index.0.get(url) {
            Some(relative_path) => PathBuf::from(relative_path),
            None => Path::new(&next_entry_name(&index)).join(file_name_from_url(url)),
        };
        let path = self.folder.join(&relative_path);
        write_atomic(&path, content)?;
        index
            .0
            .insert(url.to_string(), relative_path.to_string_lossy().replace('\\', "/"));
        self.write_index(&index)?;
        Ok(path)
    }

    /// The local path for `url`, downloading it on first use.
    #[cfg(feature = "http")]
    pub fn fetch(&self, url: &str) -> Result<PathBuf> {
        if let Some(path) = self.get(url)? {
            log::debug!("cache hit (url={}, path={})", url, path.display());
            return Ok(path);
        }
        log::debug!("cache miss (url={})", url);
        let response = reqwest::blocking::get(url)?.error_for_status()?;
        let content = response.bytes()?;
        self.put(url, &content)
    }

    /// Forget `url` and delete its cached file. Unknown URLs are ignored.
    pub fn clear(&self, url: &str) -> Result<()> {
        let mut index = self.read_index()?;
        if let Some(relative_path) = index.0.remove(url) {
            let path = self.folder.join(relative_path);
            if path.exists() {
                fs::remove_file(&path)?;
            }
            self.write_index(&index)?;
        }
        Ok(())
    }

    /// Delete the whole cache folder.
    pub fn clear_all(&self) -> Result<()> {
        if self.folder.exists() {
            fs::remove_dir_all(&self.folder)?;
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let folder = env::var_os(CACHE_FOLDER_VARIABLE)
            .map(PathBuf::from)
            .or_else(|| dirs::cache_dir().map(|folder| folder.join("geotable")))
            .unwrap_or_else(|| env::temp_dir().join("geotable"));
        Self::new(folder)
    }
}

/// Write `content` to a temporary file next to `path` and move it into place.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let folder = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(folder)?;
    let mut staged = tempfile::NamedTempFile::new_in(folder)?;
    staged.write_all(content)?;
    staged.persist(path).map_err(|error| error.error)?;
    Ok(())
}

fn next_entry_name(index: &CacheIndex) -> String {
    (index.0.len()..)
        .map(|number| number.to_string())
        .find(|name| {
            !index
                .0
                .values()
                .any(|relative_path| relative_path.starts_with(&format!("{}/", name)))
        })
        .unwrap_or_default()
}

fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let name: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "._-".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() || name.contains("://") {
        "source".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/data/points.csv?x=1"),
            "points.csv"
        );
        assert_eq!(file_name_from_url("https://example.com/a b.zip"), "a_b.zip");
    }

    #[test]
    fn test_put_replaces_content() {
        let folder = tempfile::tempdir().unwrap();
        let cache = CacheConfig::new(folder.path().join("cache"));
        let url = "https://example.com/points.csv";
        let path = cache.put(url, b"old").unwrap();
        assert_eq!(cache.put(url, b"new").unwrap(), path);
        assert_eq!(fs::read(&path).unwrap(), b"new");

        let mut names: Vec<String> = fs::read_dir(folder.path().join("cache"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["0", INDEX_NAME]);
    }

    #[test]
    fn test_put_get_clear() {
        let folder = tempfile::tempdir().unwrap();
        let cache = CacheConfig::new(folder.path());
        let url = "https://example.com/points.csv";
        assert!(cache.get(url).unwrap().is_none());

        let path = cache.put(url, b"lon,lat\n0,0\n").unwrap();
        assert_eq!(cache.get(url).unwrap(), Some(path.clone()));
        assert_eq!(fs::read(&path).unwrap(), b"lon,lat\n0,0\n");
        assert!(fs::read_to_string(folder.path().join(INDEX_NAME))
            .unwrap()
            .contains(url));

        let other = cache.put("https://example.com/b/points.csv", b"x").unwrap();
        assert_ne!(other, path);

        cache.clear(url).unwrap();
        assert!(cache.get(url).unwrap().is_none());
        assert!(!path.exists());
        assert!(other.exists());

        cache.clear_all().unwrap();
        assert!(!folder.path().exists());
    }
}
