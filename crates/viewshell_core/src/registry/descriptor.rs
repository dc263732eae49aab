//! Module descriptor declaration and validation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static EXPORT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid export name regex"));

/// Static, compiled-in description of one loadable view module.
///
/// Descriptors are never mutated after the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleDescriptor {
    /// Stable capability name used by navigation, e.g. `account-management`.
    pub logical_id: String,
    /// Address the module code is fetched from, e.g. `/mod/accounts.bundle`.
    pub resource_locator: String,
    /// Symbol the loaded resource publishes its constructor under.
    pub export_name: String,
}

impl ModuleDescriptor {
    pub fn new(
        logical_id: impl Into<String>,
        resource_locator: impl Into<String>,
        export_name: impl Into<String>,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_locator: resource_locator.into(),
            export_name: export_name.into(),
        }
    }

    /// Validates declaration-level descriptor invariants.
    pub fn validate(&self) -> Result<(), DescriptorValidationError> {
        if self.logical_id.trim().is_empty() {
            return Err(DescriptorValidationError::EmptyLogicalId);
        }
        if !is_valid_logical_id(&self.logical_id) {
            return Err(DescriptorValidationError::InvalidLogicalId(
                self.logical_id.clone(),
            ));
        }

        if self.resource_locator.trim().is_empty() {
            return Err(DescriptorValidationError::EmptyResourceLocator);
        }
        if self.resource_locator.chars().any(char::is_whitespace) {
            return Err(DescriptorValidationError::InvalidResourceLocator(
                self.resource_locator.clone(),
            ));
        }

        if self.export_name.is_empty() {
            return Err(DescriptorValidationError::EmptyExportName);
        }
        if !EXPORT_NAME_RE.is_match(&self.export_name) {
            return Err(DescriptorValidationError::InvalidExportName(
                self.export_name.clone(),
            ));
        }
        Ok(())
    }
}

fn is_valid_logical_id(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }

    let mut prev_separator = false;
    for c in chars {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            prev_separator = false;
        } else if matches!(c, '.' | '_' | '-') && !prev_separator {
            prev_separator = true;
        } else {
            return false;
        }
    }
    !prev_separator
}

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorValidationError {
    EmptyLogicalId,
    InvalidLogicalId(String),
    EmptyResourceLocator,
    InvalidResourceLocator(String),
    EmptyExportName,
    InvalidExportName(String),
}

impl Display for DescriptorValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyLogicalId => write!(f, "module logical id must not be empty"),
            Self::InvalidLogicalId(value) => write!(f, "module logical id is invalid: {value}"),
            Self::EmptyResourceLocator => write!(f, "module resource locator must not be empty"),
            Self::InvalidResourceLocator(value) => {
                write!(f, "module resource locator contains whitespace: {value}")
            }
            Self::EmptyExportName => write!(f, "module export name must not be empty"),
            Self::InvalidExportName(value) => {
                write!(f, "module export name is not an identifier: {value}")
            }
        }
    }
}

impl Error for DescriptorValidationError {}
