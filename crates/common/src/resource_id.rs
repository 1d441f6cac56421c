//! Azure Resource Manager resource IDs
//!
//! An ARM ID is a slash-delimited list of key/value pairs:
//!
//! ```text
//! /subscriptions/<sub>/resourceGroups/<rg>/providers/<namespace>/<type>/<name>[/<type>/<name>...]
//! ```
//!
//! [`ResourceId::parse`] splits it into the well-known parts and keeps every
//! remaining pair in [`ResourceId::path`]. Typed IDs then pop the segments
//! they need and call [`ResourceId::validate_no_empty_segments`] to reject
//! anything left over.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// The path of an ID without its query string and at most one leading and
/// one trailing slash; any further slash leaves an empty segment behind.
fn id_path(input: &str) -> &str {
    let path = input.split('?').next().unwrap_or_default();
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// A parsed, untyped resource ID
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider: String,
    pub path: HashMap<String, String>,
}

impl ResourceId {
    /// Parse an ARM ID into its components.
    ///
    /// Empty keys are rejected here. Empty values are kept so that
    /// [`validate_no_empty_segments`](Self::validate_no_empty_segments)
    /// can report them against the original input.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidResourceId {
            input: input.to_string(),
            reason,
        };

        if !input.starts_with('/') {
            return Err(invalid("ID must be an absolute path".to_string()));
        }

        let path = id_path(input);
        if path.is_empty() {
            return Err(invalid("ID has no path segments".to_string()));
        }

        let components: Vec<&str> = path.split('/').collect();
        if components.len() % 2 != 0 {
            return Err(invalid(format!(
                "the number of path segments is not divisible by 2 in {:?}",
                path
            )));
        }

        let mut subscription_id = String::new();
        let mut provider = String::new();
        let mut map = HashMap::with_capacity(components.len() / 2);

        for pair in components.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() {
                return Err(invalid(format!("key cannot be empty (value {:?})", value)));
            }

            match key {
                "subscriptions" if subscription_id.is_empty() => subscription_id = value.to_string(),
                "providers" if provider.is_empty() => provider = value.to_string(),
                _ => {
                    map.insert(key.to_string(), value.to_string());
                }
            }
        }

        if subscription_id.is_empty() {
            return Err(invalid(format!("no subscription ID found in {:?}", path)));
        }

        // Some APIs hand back a lower-cased resource group key
        let resource_group = map
            .remove("resourceGroups")
            .or_else(|| map.remove("resourcegroups"))
            .ok_or_else(|| invalid(format!("no resource group name found in {:?}", path)))?;

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path: map,
        })
    }

    /// Remove and return the value stored under `key`.
    pub fn pop_segment(&mut self, key: &str) -> Result<String> {
        self.path
            .remove(key)
            .ok_or_else(|| Error::MissingSegment(key.to_string()))
    }

    /// Reject IDs with empty segments or with segments nobody popped.
    pub fn validate_no_empty_segments(&self, source: &str) -> Result<()> {
        if id_path(source).split('/').any(str::is_empty)
            || self.subscription_id.is_empty()
            || self.resource_group.is_empty()
            || self.path.values().any(String::is_empty)
        {
            return Err(Error::EmptySegment(source.to_string()));
        }

        if !self.path.is_empty() {
            let mut remaining: Vec<String> = self.path.keys().cloned().collect();
            remaining.sort();
            return Err(Error::UnexpectedSegments {
                id: source.to_string(),
                remaining,
            });
        }

        Ok(())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )?;
        if !self.provider.is_empty() {
            write!(f, "/providers/{}", self.provider)?;
        }
        let mut keys: Vec<&String> = self.path.keys().collect();
        keys.sort();
        for key in keys {
            write!(f, "/{}/{}", key, self.path[key])?;
        }
        Ok(())
    }
}
