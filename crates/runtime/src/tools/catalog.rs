//! Snapshot of the tools a provider advertises.

use std::collections::HashMap;

use crate::model::ToolSpec;
use crate::tools::ToolError;

/// Immutable, name-indexed set of tool specs.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    specs: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Build a catalog, rejecting duplicate names.
    pub fn new(specs: Vec<ToolSpec>) -> Result<Self, ToolError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.clone(), position).is_some() {
                return Err(ToolError::Protocol(format!(
                    "provider advertised tool '{}' twice",
                    spec.name
                )));
            }
        }
        Ok(Self { specs, index })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&position| &self.specs[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Specs in the order the provider listed them.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
