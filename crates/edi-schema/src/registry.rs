//! Mapping model registries
//!
//! A registry is built once at configuration time and shared read-only by
//! every parsing session. Lookup is exact on name and version first, then
//! falls back to a name-only match.

use crate::edimap::Edimap;
use crate::loader::EdimapLoader;
use crate::model::Description;
use crate::{Error, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Source of mapping models keyed by message [`Description`]
pub trait MappingsRegistry: Send + Sync {
    /// Find the model for a message.
    ///
    /// `Ok(None)` means no model is registered; errors are reserved for
    /// models that exist but cannot be loaded.
    fn lookup(&self, description: &Description) -> Result<Option<Arc<Edimap>>>;

    /// Descriptions of the models currently known to the registry
    fn descriptions(&self) -> Vec<Description>;
}

/// Immutable registry populated up front
#[derive(Debug, Default, Clone)]
pub struct StaticMappingsRegistry {
    models: BTreeMap<String, Arc<Edimap>>,
}

impl StaticMappingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from already loaded models
    pub fn from_models(models: impl IntoIterator<Item = Edimap>) -> Self {
        let mut registry = Self::new();
        for model in models {
            registry.register(model);
        }
        registry
    }

    /// Load every model in a directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Ok(Self::from_models(EdimapLoader::new().load_dir(dir)?))
    }

    /// Register a model, replacing any model with the same name and version
    pub fn register(&mut self, model: Edimap) {
        let key = model.description().lookup_name();
        debug!("Registering mapping model {}", key);
        self.models.insert(key, Arc::new(model));
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl MappingsRegistry for StaticMappingsRegistry {
    fn lookup(&self, description: &Description) -> Result<Option<Arc<Edimap>>> {
        if let Some(model) = self.models.get(&description.lookup_name()) {
            trace!("Exact mapping model match for {}", description);
            return Ok(Some(Arc::clone(model)));
        }

        let fallback = self
            .models
            .values()
            .find(|m| m.description().matches_name(&description.name));
        if let Some(model) = fallback {
            debug!(
                "Using {} for {} (name-only match)",
                model.description(),
                description
            );
        }
        Ok(fallback.cloned())
    }

    fn descriptions(&self) -> Vec<Description> {
        self.models
            .values()
            .map(|m| m.description().clone())
            .collect()
    }
}

/// Registry that loads models from search paths on first use and caches them
pub struct LazyMappingsRegistry {
    loader: EdimapLoader,
    search_paths: Vec<PathBuf>,
    cache: DashMap<String, Arc<Edimap>>,
}

impl LazyMappingsRegistry {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            loader: EdimapLoader::new(),
            search_paths,
            cache: DashMap::new(),
        }
    }

    pub fn add_path(&mut self, path: PathBuf) {
        self.search_paths.push(path);
    }

    /// Number of cached models
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn candidate_files(stem: &str) -> [String; 3] {
        [
            format!("{stem}.json"),
            format!("{stem}.yaml"),
            format!("{stem}.yml"),
        ]
    }

    fn find_file(&self, stem: &str) -> Option<PathBuf> {
        self.search_paths.iter().find_map(|dir| {
            Self::candidate_files(stem)
                .into_iter()
                .map(|name| dir.join(name))
                .find(|p| p.is_file())
        })
    }

    /// Load `path` and cache it under `key` once `accept` holds for the
    /// model's declared description.
    fn load_checked(
        &self,
        key: &str,
        path: &Path,
        wanted: &str,
        accept: impl Fn(&Description) -> bool,
    ) -> Result<Arc<Edimap>> {
        let model = self.loader.load_from_file(path)?;
        if !accept(model.description()) {
            return Err(Error::InvalidModel(format!(
                "{} declares {} instead of {}",
                path.display(),
                model.description(),
                wanted
            )));
        }
        let model = Arc::new(model);
        self.cache.insert(key.to_string(), Arc::clone(&model));
        Ok(model)
    }
}

/// File stem for a name/version pair, e.g. `orders_d_96a_un`
fn file_stem(name: &str, version: Option<&str>) -> String {
    let stem = match version {
        Some(v) => format!("{name}_{v}"),
        None => name.to_string(),
    };
    stem.to_lowercase().replace([':', '/', '\\'], "_")
}

impl MappingsRegistry for LazyMappingsRegistry {
    fn lookup(&self, description: &Description) -> Result<Option<Arc<Edimap>>> {
        let key = description.lookup_name();
        if let Some(cached) = self.cache.get(&key) {
            trace!("Cache hit for mapping model {}", key);
            return Ok(Some(Arc::clone(cached.value())));
        }

        if let Some(path) = self.find_file(&file_stem(&description.name, Some(&description.version))) {
            return self
                .load_checked(&key, &path, &key, |found| found == description)
                .map(Some);
        }

        let name_key = description.name.clone();
        if let Some(cached) = self.cache.get(&name_key) {
            return Ok(Some(Arc::clone(cached.value())));
        }
        match self.find_file(&file_stem(&description.name, None)) {
            Some(path) => {
                debug!("Loading {:?} for {} (name-only match)", path, description);
                self.load_checked(&name_key, &path, &description.name, |found| {
                    found.matches_name(&description.name)
                })
                .map(Some)
            }
            None => {
                trace!("No mapping model found for {}", key);
                Ok(None)
            }
        }
    }

    fn descriptions(&self) -> Vec<Description> {
        let mut found: Vec<Description> = self
            .cache
            .iter()
            .map(|entry| entry.value().description().clone())
            .collect();
        found.sort_by_key(Description::lookup_name);
        found.dedup();
        found
    }
}
