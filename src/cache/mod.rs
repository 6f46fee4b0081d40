//! File hash caching for incremental checks
//!
//! Architecture: Infrastructure Layer - Cache speeds up repeated runs without affecting results
//! - FileCache acts as a repository for file metadata and the violations found in each file
//! - Hash-based validation ensures cache coherence with minimal overhead
//! - An entry is only reused under the rule-set fingerprint it was produced with

use crate::domain::violations::{StyleError, StyleResult, Violation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Default cache location, relative to the project root
pub const DEFAULT_CACHE_PATH: &str = ".cstyle/cache.json";

const CURRENT_VERSION: u32 = 2;

/// Cache for storing per-file check results and metadata
#[derive(Debug)]
pub struct FileCache {
    /// Path to the cache file
    cache_path: PathBuf,
    /// In-memory cache data
    data: CacheData,
    /// Whether the cache has been modified
    dirty: bool,
}

/// Serializable cache data structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheData {
    /// Cache format version for migration support
    version: u32,
    /// Rule-set fingerprint of the most recent run
    config_fingerprint: Option<String>,
    /// Cached file entries, in path order so the file diffs cleanly
    files: BTreeMap<PathBuf, FileEntry>,
    metadata: CacheMetadata,
}

/// Metadata about the cache itself
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Number of cache hits since creation
    hits: u64,
    /// Number of cache misses since creation
    misses: u64,
}

impl Default for CacheMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self { created_at: now, updated_at: now, hits: 0, misses: 0 }
    }
}

/// Cached information about a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// SHA-256 hash of file content
    pub content_hash: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp (seconds since the Unix epoch)
    pub modified_at: u64,
    /// Violations found in this file
    #[serde(default)]
    pub violations: Vec<Violation>,
    /// When this file was last checked
    pub checked_at: DateTime<Utc>,
    /// Rule-set fingerprint the violations were produced with
    pub config_fingerprint: String,
}

impl FileCache {
    /// Create a new file cache with the given cache file path
    pub fn new<P: AsRef<Path>>(cache_path: P) -> Self {
        Self {
            cache_path: cache_path.as_ref().to_path_buf(),
            data: CacheData::default(),
            dirty: false,
        }
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.cache_path
    }

    /// Load cache from disk, creating it if it doesn't exist
    pub fn load(&mut self) -> StyleResult<()> {
        if self.cache_path.exists() {
            let content = fs::read_to_string(&self.cache_path)
                .map_err(|e| StyleError::cache(format!("Failed to read cache file: {e}")))?;

            self.data = serde_json::from_str(&content)
                .map_err(|e| StyleError::cache(format!("Failed to parse cache file: {e}")))?;

            self.migrate_if_needed()?;
            tracing::debug!(path = %self.cache_path.display(), files = self.data.files.len(), "cache loaded");
        } else {
            self.data = CacheData { version: CURRENT_VERSION, ..CacheData::default() };
            self.dirty = true;
        }

        Ok(())
    }

    /// Save cache to disk if it has been modified
    pub fn save(&mut self) -> StyleResult<()> {
        if !self.dirty {
            return Ok(());
        }

        self.data.metadata.updated_at = Utc::now();

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StyleError::cache(format!("Failed to create cache directory: {e}")))?;
        }

        let content = serde_json::to_string_pretty(&self.data)
            .map_err(|e| StyleError::cache(format!("Failed to serialize cache: {e}")))?;

        fs::write(&self.cache_path, content)
            .map_err(|e| StyleError::cache(format!("Failed to write cache file: {e}")))?;

        self.dirty = false;
        Ok(())
    }

    /// Cached violations for a file, if its content and the rule set are unchanged
    pub fn cached_violations<P: AsRef<Path>>(
        &mut self,
        file_path: P,
        config_fingerprint: &str,
    ) -> StyleResult<Option<Vec<Violation>>> {
        let file_path = file_path.as_ref();
        if self.needs_analysis(file_path, config_fingerprint)? {
            return Ok(None);
        }
        Ok(self.data.files.get(file_path).map(|entry| entry.violations.clone()))
    }

    /// Check if a file needs to be checked again
    pub fn needs_analysis<P: AsRef<Path>>(
        &mut self,
        file_path: P,
        config_fingerprint: &str,
    ) -> StyleResult<bool> {
        let file_path = file_path.as_ref();
        let (current_size, current_modified) = file_stamp(file_path)?;

        let fresh = match self.data.files.get(file_path) {
            Some(entry) => {
                entry.size == current_size
                    && entry.modified_at == current_modified
                    && entry.config_fingerprint == config_fingerprint
                    && entry.content_hash == self.calculate_file_hash(file_path)?
            }
            None => false,
        };

        if fresh {
            self.data.metadata.hits += 1;
        } else {
            self.data.metadata.misses += 1;
        }
        self.dirty = true;
        Ok(!fresh)
    }

    /// Update cache entry for a file after checking it
    pub fn update_entry<P: AsRef<Path>>(
        &mut self,
        file_path: P,
        violations: &[Violation],
        config_fingerprint: &str,
    ) -> StyleResult<()> {
        let file_path = file_path.as_ref();
        let (size, modified_at) = file_stamp(file_path)?;

        let entry = FileEntry {
            content_hash: self.calculate_file_hash(file_path)?,
            size,
            modified_at,
            violations: violations.to_vec(),
            checked_at: Utc::now(),
            config_fingerprint: config_fingerprint.to_string(),
        };

        self.data.files.insert(file_path.to_path_buf(), entry);
        self.dirty = true;

        Ok(())
    }

    /// Get cache statistics
    pub fn statistics(&self) -> CacheStatistics {
        let lookups = self.data.metadata.hits + self.data.metadata.misses;
        CacheStatistics {
            total_files: self.data.files.len(),
            cached_violations: self.data.files.values().map(|e| e.violations.len()).sum(),
            cache_hits: self.data.metadata.hits,
            cache_misses: self.data.metadata.misses,
            hit_rate: if lookups > 0 {
                self.data.metadata.hits as f64 / lookups as f64
            } else {
                0.0
            },
            created_at: self.data.metadata.created_at,
            updated_at: self.data.metadata.updated_at,
        }
    }

    /// Clear the entire cache
    pub fn clear(&mut self) -> StyleResult<()> {
        self.data.files.clear();
        self.data.metadata.hits = 0;
        self.data.metadata.misses = 0;
        self.data.metadata.updated_at = Utc::now();
        self.dirty = true;

        if self.cache_path.exists() {
            fs::remove_file(&self.cache_path)
                .map_err(|e| StyleError::cache(format!("Failed to remove cache file: {e}")))?;
        }

        Ok(())
    }

    /// Remove cache entries for files that no longer exist
    pub fn cleanup(&mut self) -> StyleResult<usize> {
        let before = self.data.files.len();
        self.data.files.retain(|file_path, _| file_path.exists());
        let removed = before - self.data.files.len();

        if removed > 0 {
            self.dirty = true;
        }

        Ok(removed)
    }

    /// Record the rule-set fingerprint of the current run
    pub fn set_config_fingerprint(&mut self, fingerprint: String) {
        if self.data.config_fingerprint.as_ref() != Some(&fingerprint) {
            self.data.config_fingerprint = Some(fingerprint);
            self.dirty = true;
        }
    }

    /// Calculate SHA-256 hash of file content
    fn calculate_file_hash<P: AsRef<Path>>(&self, file_path: P) -> StyleResult<String> {
        let mut file = File::open(&file_path)
            .map_err(|e| StyleError::cache(format!("Failed to open file for hashing: {e}")))?;

        let mut hasher = Sha256::new();
        let mut buffer = [0; 8192];

        loop {
            let bytes_read = file
                .read(&mut buffer)
                .map_err(|e| StyleError::cache(format!("Failed to read file for hashing: {e}")))?;

            if bytes_read == 0 {
                break;
            }

            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Migrate cache format if needed
    fn migrate_if_needed(&mut self) -> StyleResult<()> {
        if self.data.version < CURRENT_VERSION {
            tracing::info!(
                "Migrating cache from version {} to {}",
                self.data.version,
                CURRENT_VERSION
            );

            match self.data.version {
                // version 1 entries carried counts, not violations; they cannot be reused
                0 | 1 => {
                    self.data.files.clear();
                    self.data.version = CURRENT_VERSION;
                    self.dirty = true;
                }
                _ => {
                    return Err(StyleError::cache(format!(
                        "Unsupported cache version: {}. Please delete the cache file.",
                        self.data.version
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Size and modification time of a file
fn file_stamp(file_path: &Path) -> StyleResult<(u64, u64)> {
    let metadata = fs::metadata(file_path).map_err(|e| {
        StyleError::cache(format!("Failed to get file metadata for {}: {}", file_path.display(), e))
    })?;
    let modified = metadata
        .modified()
        .map_err(|e| StyleError::cache(format!("Failed to get modification time: {e}")))?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    Ok((metadata.len(), modified))
}

/// Cache performance statistics
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub total_files: usize,
    pub cached_violations: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CacheStatistics {
    /// Format statistics for display
    pub fn format_display(&self) -> String {
        format!(
            "Cache: {} files, {:.1}% hit rate ({} hits, {} misses)",
            self.total_files,
            self.hit_rate * 100.0,
            self.cache_hits,
            self.cache_misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::violations::Severity;
    use std::fs;
    use tempfile::TempDir;

    fn violation(path: &Path) -> Violation {
        Violation::new("variable.verb-led", Severity::Error, path.to_path_buf(), "verb")
            .with_position(1, 5)
    }

    #[test]
    fn test_cache_creation() {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join(".cstyle/cache.json");

        let mut cache = FileCache::new(&cache_path);
        cache.load().unwrap();

        assert_eq!(cache.data.version, CURRENT_VERSION);
        assert_eq!(cache.data.files.len(), 0);
    }

    #[test]
    fn test_needs_analysis() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("cache.json");
        let test_file = temp_dir.path().join("device.c");

        fs::write(&test_file, "int runningDevice;\n")?;

        let mut cache = FileCache::new(&cache_path);
        cache.load()?;

        assert!(cache.needs_analysis(&test_file, "rules123")?);
        cache.update_entry(&test_file, &[violation(&test_file)], "rules123")?;
        assert!(!cache.needs_analysis(&test_file, "rules123")?);

        // a different rule set invalidates the entry
        assert!(cache.needs_analysis(&test_file, "rules456")?);
        Ok(())
    }

    #[test]
    fn test_cached_violations_survive_reload() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join(".cstyle/cache.json");
        let test_file = temp_dir.path().join("device.c");
        fs::write(&test_file, "int runningDevice;\n")?;

        {
            let mut cache = FileCache::new(&cache_path);
            cache.load()?;
            cache.update_entry(&test_file, &[violation(&test_file)], "rules123")?;
            cache.save()?;
        }

        let mut cache = FileCache::new(&cache_path);
        cache.load()?;
        let cached = cache.cached_violations(&test_file, "rules123")?.unwrap();
        assert_eq!(cached, vec![violation(&test_file)]);
        assert_eq!(cache.statistics().cached_violations, 1);
        Ok(())
    }

    #[test]
    fn test_content_change_detected() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("device.c");
        fs::write(&test_file, "int runningDevice;\n")?;

        let mut cache = FileCache::new(temp_dir.path().join("cache.json"));
        cache.load()?;
        cache.update_entry(&test_file, &[], "rules123")?;

        fs::write(&test_file, "int activeDevice = 1;\n")?;
        assert!(cache.cached_violations(&test_file, "rules123")?.is_none());
        Ok(())
    }

    #[test]
    fn test_cache_cleanup() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("first.c");
        let second = temp_dir.path().join("second.c");
        fs::write(&first, "int a;\n")?;
        fs::write(&second, "int b;\n")?;

        let mut cache = FileCache::new(temp_dir.path().join("cache.json"));
        cache.load()?;
        cache.update_entry(&first, &[], "rules123")?;
        cache.update_entry(&second, &[], "rules123")?;

        fs::remove_file(&first)?;
        assert_eq!(cache.cleanup()?, 1);
        assert_eq!(cache.data.files.len(), 1);
        Ok(())
    }

    #[test]
    fn test_statistics() {
        let temp_dir = TempDir::new().unwrap();
        let mut cache = FileCache::new(temp_dir.path().join("cache.json"));
        cache.load().unwrap();

        cache.data.metadata.hits = 10;
        cache.data.metadata.misses = 5;

        let stats = cache.statistics();
        assert_eq!(stats.hit_rate, 10.0 / 15.0);
        assert!(stats.format_display().contains("66.7% hit rate"));
    }

    #[test]
    fn test_old_cache_versions_are_reset() -> StyleResult<()> {
        let temp_dir = TempDir::new().unwrap();
        let cache_path = temp_dir.path().join("cache.json");
        let now = Utc::now().to_rfc3339();
        fs::write(
            &cache_path,
            format!(
                r#"{{"version":1,"config_fingerprint":null,"files":{{}},"metadata":{{"created_at":"{now}","updated_at":"{now}","hits":3,"misses":1}}}}"#
            ),
        )?;

        let mut cache = FileCache::new(&cache_path);
        cache.load()?;
        assert_eq!(cache.data.version, CURRENT_VERSION);
        Ok(())
    }
}
