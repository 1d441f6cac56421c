//! Attribute validators
//!
//! Validators follow the single-field callback shape of the schema
//! framework: they receive the raw value and its attribute key and return
//! collected warnings and errors instead of failing fast.

use std::fmt;
use std::sync::Arc;

use azurerm_common::{Error, ResourceId};

use crate::state::DynamicValue;

/// Collected outcome of validating one or more attributes
#[derive(Debug, Default)]
pub struct Validation {
    pub warnings: Vec<String>,
    pub errors: Vec<Error>,
}

impl Validation {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(err: Error) -> Self {
        Self {
            warnings: vec![],
            errors: vec![err],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: Validation) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    /// Error messages, mostly useful for diagnostics and assertions
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// Shared validator callback
#[derive(Clone)]
pub struct ValidateFunc(Arc<dyn Fn(&DynamicValue, &str) -> Validation + Send + Sync>);

impl ValidateFunc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&DynamicValue, &str) -> Validation + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: &DynamicValue, key: &str) -> Validation {
        (self.0)(value, key)
    }
}

impl fmt::Debug for ValidateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidateFunc")
    }
}

fn expect_string<'a>(value: &'a DynamicValue, key: &str) -> Result<&'a str, Validation> {
    value.as_string().ok_or_else(|| {
        Validation::error(Error::attribute(key, format!("expected type of {:?} to be string", key)))
    })
}

/// Accept only strings from `valid`
pub fn string_in_slice(valid: &[&str], ignore_case: bool) -> ValidateFunc {
    let valid: Vec<String> = valid.iter().map(|s| s.to_string()).collect();
    ValidateFunc::new(move |value, key| {
        let v = match expect_string(value, key) {
            Ok(v) => v,
            Err(validation) => return validation,
        };

        let found = valid.iter().any(|candidate| {
            if ignore_case {
                candidate.eq_ignore_ascii_case(v)
            } else {
                candidate == v
            }
        });

        if found {
            Validation::ok()
        } else {
            Validation::error(Error::attribute(
                key,
                format!("expected {} to be one of {:?}, got {}", key, valid, v),
            ))
        }
    })
}

/// Accept integers in `min..=max`
pub fn int_between(min: i64, max: i64) -> ValidateFunc {
    ValidateFunc::new(move |value, key| {
        let Some(v) = value.as_i64() else {
            return Validation::error(Error::attribute(
                key,
                format!("expected type of {:?} to be integer", key),
            ));
        };

        if v < min || v > max {
            return Validation::error(Error::attribute(
                key,
                format!("expected {} to be in the range ({} - {}), got {}", key, min, max, v),
            ));
        }
        Validation::ok()
    })
}

/// Accept any parseable resource ID; empty strings are left to `required`
pub fn validate_resource_id() -> ValidateFunc {
    ValidateFunc::new(|value, key| {
        let v = match expect_string(value, key) {
            Ok(v) => v,
            Err(validation) => return validation,
        };

        if v.is_empty() {
            return Validation::ok();
        }

        match ResourceId::parse(v) {
            Ok(_) => Validation::ok(),
            Err(e) => Validation::error(Error::attribute(
                key,
                format!("Can not parse {:?} as a resource id: {}", key, e),
            )),
        }
    })
}
