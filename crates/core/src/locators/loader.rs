use crate::error::{HarvestError, Result};
use crate::locators::parser::LocatorParser;
use crate::locators::roles::LocatorSet;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Loader for named locator files layered over the built-in set
///
/// `load("forum")` looks for `forum.txt` in the standard directory and then
/// the custom directory. Each file found is overlaid on the built-in
/// locators, so custom expressions are tried first.
#[derive(Debug, Clone)]
pub struct LocatorLoader {
    /// Custom locator directory path
    custom_dir: Option<PathBuf>,
    /// Standard locator directory path
    standard_dir: Option<PathBuf>,
    /// Loaded set cache
    cache: HashMap<String, LocatorSet>,
}

impl LocatorLoader {
    /// Create a loader with no directories (only built-in locators)
    pub fn new() -> Self {
        Self { custom_dir: None, standard_dir: None, cache: HashMap::new() }
    }

    /// Load the locator set called `name`
    ///
    /// Returns the built-in set unchanged when no file with that name exists.
    pub fn load(&mut self, name: &str) -> Result<LocatorSet> {
        if let Some(set) = self.cache.get(name) {
            return Ok(set.clone());
        }

        let mut set = LocatorSet::builtin();
        for file_path in self.find_locator_files(name) {
            let overlay = LocatorParser::parse_file(&file_path)?;
            tracing::debug!(path = %file_path.display(), version = overlay.version, "Loaded locator file");
            set.merge(&overlay);
        }

        self.cache.insert(name.to_string(), set.clone());
        Ok(set)
    }

    /// Load an explicit locator file, overlaid on the built-in set
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<LocatorSet> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(HarvestError::FileNotFound(path.to_path_buf()));
        }

        let mut set = LocatorSet::builtin();
        set.merge(&LocatorParser::parse_file(path)?);
        Ok(set)
    }

    /// Files for `name` in overlay order: standard first, custom last
    fn find_locator_files(&self, name: &str) -> Vec<PathBuf> {
        let file_name = format!("{}.txt", name);

        [&self.standard_dir, &self.custom_dir]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(&file_name))
            .filter(|path| path.exists())
            .collect()
    }

    /// Clear the locator cache
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Builder for LocatorLoader
#[derive(Debug)]
pub struct LocatorLoaderBuilder {
    custom_dir: Option<PathBuf>,
    standard_dir: Option<PathBuf>,
}

impl LocatorLoaderBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self { custom_dir: None, standard_dir: None }
    }

    /// Set custom locator directory
    pub fn custom_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.custom_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set standard locator directory
    pub fn standard_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.standard_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Build the LocatorLoader
    pub fn build(self) -> LocatorLoader {
        LocatorLoader { custom_dir: self.custom_dir, standard_dir: self.standard_dir, cache: HashMap::new() }
    }
}

impl Default for LocatorLoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for LocatorLoader {
    fn default() -> Self {
        let mut builder = LocatorLoaderBuilder::new();

        if let Some(custom_dir) = Self::default_custom_dir() {
            builder = builder.custom_dir(custom_dir);
        }

        let standard_dir = PathBuf::from("locators");
        if standard_dir.exists() {
            builder = builder.standard_dir(standard_dir);
        }

        builder.build()
    }
}

impl LocatorLoader {
    /// Get default custom locator directory (~/.config/feedharvest/locators)
    fn default_custom_dir() -> Option<PathBuf> {
        let config_dir = dirs::home_dir()?.join(".config").join("feedharvest").join("locators");
        let _ = fs::create_dir_all(&config_dir);
        Some(config_dir)
    }
}
