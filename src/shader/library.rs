//! Named shader source fragments and `#include <name>` expansion.

use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    data_structures::ResourceId,
    error::{Error, Result},
};

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#include\s+<([a-zA-Z0-9_-]+)>").expect("include pattern is valid")
});

/// A named mapping of reusable shader source.
///
/// Lookups fall back to linked libraries in link order. Includes found in a
/// fragment resolve against the library that fragment came from.
#[derive(Debug)]
pub struct ShaderLibrary {
    id: ResourceId,
    bindings: HashMap<String, String>,
    links: Vec<Rc<ShaderLibrary>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::with_links(Vec::new())
    }

    pub fn with_links(links: Vec<Rc<ShaderLibrary>>) -> Self {
        Self {
            id: ResourceId::next(),
            bindings: HashMap::new(),
            links,
        }
    }

    pub fn set(&mut self, name: &str, source: &str) {
        self.bindings.insert(name.to_string(), source.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.bindings.remove(name).is_some()
    }

    pub fn link(&mut self, library: Rc<ShaderLibrary>) {
        self.links.push(library);
    }

    /// Finds `name` here or in a linked library, returning the owning library too.
    pub fn resolve(&self, name: &str) -> Option<(&ShaderLibrary, &str)> {
        if let Some(source) = self.bindings.get(name) {
            return Some((self, source));
        }
        self.links.iter().find_map(|link| link.resolve(name))
    }

    /// Expands every `#include <name>` in `source`, recursively.
    ///
    /// Each library and name pair expands once per call. Later occurrences
    /// become empty, which also breaks include cycles. A name that cannot be
    /// resolved is a configuration error.
    pub fn replace_includes(&self, source: &str) -> Result<String> {
        let mut included = HashSet::new();
        self.expand(source, &mut included)
    }

    fn expand(&self, source: &str, included: &mut HashSet<(ResourceId, String)>) -> Result<String> {
        let mut expanded = String::with_capacity(source.len());
        let mut last = 0;
        for captures in INCLUDE.captures_iter(source) {
            let (Some(directive), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            expanded.push_str(&source[last..directive.start()]);
            last = directive.end();

            let name = name.as_str();
            let (location, fragment) = self.resolve(name).ok_or_else(|| {
                Error::configuration(format!("could not find \"{}\" in shader library", name))
            })?;
            if included.insert((location.id, name.to_string())) {
                expanded.push_str(&location.expand(fragment, included)?);
            } else {
                log::trace!("skipping repeated include <{}>", name);
            }
        }
        expanded.push_str(&source[last..]);
        Ok(expanded)
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}
