//! Shader sources keyed by logical name
//!
//! The host hands the core raw shader text; the library is where it lands.
//! Sources are opaque here, the device decides whether they compile.

use std::collections::HashMap;

use crate::error::{GfxError, Result};
use crate::gfx::shaders::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};

/// Name of the bundled vertex shader in [`ShaderLibrary::with_defaults`]
pub const DEFAULT_VERTEX_KEY: &str = "vs";
/// Name of the bundled fragment shader in [`ShaderLibrary::with_defaults`]
pub const DEFAULT_FRAGMENT_KEY: &str = "fs";

#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    sources: HashMap<String, String>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A library holding the bundled vertex-color program under `"vs"` and `"fs"`.
    pub fn with_defaults() -> Self {
        let mut library = Self::new();
        library.insert(DEFAULT_VERTEX_KEY, DEFAULT_VERTEX_SHADER);
        library.insert(DEFAULT_FRAGMENT_KEY, DEFAULT_FRAGMENT_SHADER);
        library
    }

    /// Registers `source` under `name`, replacing any previous source.
    pub fn insert(&mut self, name: &str, source: impl Into<String>) {
        self.sources.insert(name.to_string(), source.into());
    }

    pub fn get(&self, name: &str) -> Result<&str> {
        self.sources
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| GfxError::MissingShaderSource {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
