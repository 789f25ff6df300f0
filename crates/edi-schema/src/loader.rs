//! Mapping model loader with import resolution

use crate::edimap::Edimap;
use crate::imports::{ImportGraph, resolve_segrefs};
use crate::model::EdimapDef;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Listing file naming the models of a directory, one relative path per line
pub const MODEL_LIST_FILE: &str = "mapping-models.lst";

/// Loads mapping models from JSON or YAML resources
#[derive(Debug, Clone, Default)]
pub struct EdimapLoader {
    base_dir: Option<PathBuf>,
}

impl EdimapLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve import resources relative to `base_dir`
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Load and compile a model from a file, choosing the format by extension
    pub fn load_from_file(&self, path: &Path) -> Result<Edimap> {
        let mut graph = ImportGraph::new();
        let def = self.load_def(path, &mut graph)?;
        Edimap::compile(def)
    }

    /// Load a model from a JSON string
    pub fn load_from_json(&self, json: &str) -> Result<Edimap> {
        let def = parse_json(json)?;
        self.finish(def)
    }

    /// Load a model from a YAML string
    pub fn load_from_yaml(&self, yaml: &str) -> Result<Edimap> {
        let def = parse_yaml(yaml)?;
        self.finish(def)
    }

    /// Load every model of a directory.
    ///
    /// When the directory holds a [`MODEL_LIST_FILE`], only the listed
    /// resources are loaded; otherwise every `.json`, `.yaml` and `.yml`
    /// file is.
    pub fn load_dir(&self, dir: &Path) -> Result<Vec<Edimap>> {
        let list_path = dir.join(MODEL_LIST_FILE);
        let paths = if list_path.is_file() {
            debug!("Reading model listing {:?}", list_path);
            std::fs::read_to_string(&list_path)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(|line| dir.join(line))
                .collect::<Vec<_>>()
        } else {
            let mut paths = Vec::new();
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() && is_model_file(&path) {
                    paths.push(path);
                }
            }
            paths.sort();
            paths
        };

        let loader = Self::with_base_dir(dir);
        let models = paths
            .iter()
            .map(|p| loader.load_from_file(p))
            .collect::<Result<Vec<_>>>()?;
        info!("Loaded {} mapping models from {:?}", models.len(), dir);
        Ok(models)
    }

    fn load_def(&self, path: &Path, graph: &mut ImportGraph) -> Result<EdimapDef> {
        trace!("Loading mapping model from file: {:?}", path);
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::NotFound(format!("{}: {e}", path.display())))?;

        let def = if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            parse_yaml(&content)?
        } else {
            parse_json(&content)?
        };

        let dir = path.parent().map(Path::to_path_buf);
        self.resolve_imports(def, dir.as_deref(), &resource_key(path), graph)
    }

    fn finish(&self, def: EdimapDef) -> Result<Edimap> {
        let key = def.description.lookup_name();
        let mut graph = ImportGraph::new();
        let def = self.resolve_imports(def, self.base_dir.as_deref(), &key, &mut graph)?;
        Edimap::compile(def)
    }

    fn resolve_imports(
        &self,
        mut def: EdimapDef,
        dir: Option<&Path>,
        key: &str,
        graph: &mut ImportGraph,
    ) -> Result<EdimapDef> {
        if def.imports.is_empty() {
            return Ok(def);
        }

        let mut imported = HashMap::new();
        for import in &def.imports {
            let path = match dir {
                Some(d) => d.join(&import.resource),
                None => PathBuf::from(&import.resource),
            };
            graph.add_edge(key, resource_key(&path))?;
            debug!("Importing {:?} as {}", path, import.namespace);
            let model = self.load_def(&path, graph)?;
            imported.insert(import.namespace.clone(), model);
        }

        resolve_segrefs(&mut def, &imported)?;
        Ok(def)
    }
}

/// Import graph key for a resource; spellings of the same file share one key
fn resource_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn parse_json(json: &str) -> Result<EdimapDef> {
    serde_json::from_str(json).map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))
}

fn parse_yaml(yaml: &str) -> Result<EdimapDef> {
    serde_yaml::from_str(yaml).map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))
}

fn is_model_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "json" | "yaml" | "yml"))
}
