use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::settings::Settings;

/// Text handed back by an [`Includer`], named for diagnostics and for
/// resolving includes nested inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub text: String,
}

/// Resolves `#include "path"` directives. `stream_name` is the name of the
/// stream containing the directive.
pub trait Includer {
    fn include(&self, stream_name: &str, path: &str) -> io::Result<Source>;
}

/// Refuses every include.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncluder;

impl Includer for NoIncluder {
    fn include(&self, _stream_name: &str, path: &str) -> io::Result<Source> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("includes are disabled, cannot include \"{}\"", path),
        ))
    }
}

/// Reads includes from the file system, first relative to the including
/// stream's directory and then from each search path in turn.
#[derive(Debug, Clone, Default)]
pub struct FileIncluder {
    search_paths: Vec<PathBuf>,
}

impl FileIncluder {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.include_paths.clone())
    }
    fn candidates(&self, stream_name: &str, path: &str) -> Vec<PathBuf> {
        let requested = Path::new(path);
        if requested.is_absolute() {
            return vec![requested.to_path_buf()];
        }
        let base = Path::new(stream_name)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        std::iter::once(base)
            .chain(self.search_paths.iter().cloned())
            .map(|directory| directory.join(requested))
            .collect()
    }
}

impl Includer for FileIncluder {
    fn include(&self, stream_name: &str, path: &str) -> io::Result<Source> {
        for candidate in self.candidates(stream_name, path) {
            if candidate.is_file() {
                debug!(from = stream_name, path = %candidate.display(), "including file");
                return Ok(Source {
                    name: candidate.to_string_lossy().into_owned(),
                    text: fs::read_to_string(&candidate)?,
                });
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no file \"{}\" relative to \"{}\" or the search paths", path, stream_name),
        ))
    }
}

/// Serves includes from an in-memory table, keyed by the requested path.
#[derive(Debug, Clone, Default)]
pub struct MemoryIncluder {
    sources: HashMap<String, String>,
}

impl MemoryIncluder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(path.into(), text.into());
    }
}

impl Includer for MemoryIncluder {
    fn include(&self, _stream_name: &str, path: &str) -> io::Result<Source> {
        match self.sources.get(path) {
            Some(text) => Ok(Source {
                name: path.to_owned(),
                text: text.clone(),
            }),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no source registered as \"{}\"", path),
            )),
        }
    }
}
