//! Static module registry.
//!
//! # Responsibility
//! - Map logical ids to `(resource_locator, export_name)` pairs.
//! - Reject invalid or conflicting declarations at startup.
//!
//! # Invariants
//! - Every logical id maps to exactly one descriptor for the registry lifetime.
//! - The registry is immutable once handed to a loader.

mod descriptor;

pub use descriptor::{DescriptorValidationError, ModuleDescriptor};

use log::{debug, error};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// In-process registry of loadable view modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    entries: BTreeMap<String, ModuleDescriptor>,
    locator_index: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from descriptors, failing on the first invalid one.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = ModuleDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Registers one descriptor after validation.
    pub fn register(&mut self, descriptor: ModuleDescriptor) -> Result<(), RegistryError> {
        if let Err(err) = descriptor.validate() {
            error!(
                "event=module_register module=registry status=error logical_id={} error={}",
                descriptor.logical_id, err
            );
            return Err(RegistryError::InvalidDescriptor(err));
        }
        if self.entries.contains_key(&descriptor.logical_id) {
            return Err(RegistryError::DuplicateLogicalId(descriptor.logical_id));
        }

        self.locator_index
            .entry(descriptor.resource_locator.clone())
            .or_default()
            .insert(descriptor.logical_id.clone());
        debug!(
            "event=module_register module=registry status=ok logical_id={} locator={} export={}",
            descriptor.logical_id, descriptor.resource_locator, descriptor.export_name
        );
        self.entries.insert(descriptor.logical_id.clone(), descriptor);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, logical_id: &str) -> Option<&ModuleDescriptor> {
        self.entries.get(logical_id)
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.entries.contains_key(logical_id)
    }

    /// Returns sorted logical ids.
    pub fn logical_ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Returns every logical id served by one resource locator.
    pub fn logical_ids_for_locator(&self, resource_locator: &str) -> Vec<&str> {
        let Some(ids) = self.locator_index.get(resource_locator) else {
            return vec![];
        };
        ids.iter().map(String::as_str).collect()
    }
}

/// Registry construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidDescriptor(DescriptorValidationError),
    DuplicateLogicalId(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDescriptor(err) => write!(f, "invalid module descriptor: {err}"),
            Self::DuplicateLogicalId(value) => {
                write!(f, "module logical id already registered: {value}")
            }
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDescriptor(err) => Some(err),
            Self::DuplicateLogicalId(_) => None,
        }
    }
}
