use std::sync::Arc;

use rowmap_api::cursor::Cursor;
use rowmap_api::scan::Scan;

use crate::classify::{self, Classification};
use crate::config::MapperConfig;
use crate::error::{ConfigError, ScanError};
use crate::normalize::NameNormalizer;
use crate::scan::{self, Destination, ScanOptions};
use crate::structure::{StructureCache, StructureMap, Traversal};

/// Owns the name normalizer and the structure cache built with it.
///
/// `Send + Sync`; share one per process behind an `Arc`.
#[derive(Debug)]
pub struct Mapper {
    cache: StructureCache,
    config: MapperConfig,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(MapperConfig::default())
    }
}

impl Mapper {
    pub fn new(config: MapperConfig) -> Self {
        Self {
            cache: StructureCache::new(NameNormalizer::from_case(config.name_case)),
            config,
        }
    }

    /// Mapper with a custom normalizer instead of a configured one.
    pub fn with_normalizer(config: MapperConfig, normalizer: NameNormalizer) -> Self {
        Self {
            cache: StructureCache::new(normalizer),
            config,
        }
    }

    /// Build from a TOML config file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = MapperConfig::load(path)?;
        tracing::debug!(path, name_case = ?config.name_case, lenient = config.lenient, "loaded mapper config");
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Default lenient flag for sessions built on this mapper.
    pub fn is_lenient(&self) -> bool {
        self.config.lenient
    }

    /// Options matching this mapper's configuration.
    pub fn options(&self) -> ScanOptions {
        ScanOptions::default().with_lenient(self.config.lenient)
    }

    pub fn cache(&self) -> &StructureCache {
        &self.cache
    }

    /// Replace the normalizer. Maps computed with the old one are dropped
    /// before this returns.
    pub fn set_normalizer(&self, normalizer: NameNormalizer) {
        self.cache.set_normalizer(normalizer);
    }

    pub fn normalizer(&self) -> NameNormalizer {
        self.cache.normalizer()
    }

    pub fn resolve<T: Scan>(&self) -> Arc<StructureMap> {
        self.cache.resolve::<T>()
    }

    pub fn traversals_by_names<T: Scan, S: AsRef<str>>(&self, names: &[S]) -> Vec<Traversal> {
        self.cache.traversals_by_names::<T, S>(names)
    }

    pub fn classify<T: Scan>(&self) -> Classification {
        classify::classify::<T>(&self.cache)
    }

    pub fn is_scalar_like<T: Scan>(&self) -> bool {
        classify::is_scalar_like::<T>(&self.cache)
    }

    /// See [`scan::scan_all`].
    pub fn scan_all<C, D>(
        &self,
        cursor: &mut C,
        dest: &mut D,
        options: ScanOptions,
    ) -> Result<usize, ScanError>
    where
        C: Cursor + ?Sized,
        D: Destination,
    {
        scan::scan_all(&self.cache, cursor, dest, options)
    }

    /// See [`scan::scan_one`].
    pub fn scan_one<C, T>(&self, cursor: &mut C, dest: &mut T, options: ScanOptions) -> Result<(), ScanError>
    where
        C: Cursor + ?Sized,
        T: Scan,
    {
        scan::scan_one(&self.cache, cursor, dest, options)
    }
}
