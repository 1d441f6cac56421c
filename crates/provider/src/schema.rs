//! Resource schema descriptions
//!
//! A schema describes the attribute bag a resource accepts. It is used to
//! validate configuration and to fill in defaults before the bag is
//! expanded into an API payload.

use std::collections::BTreeMap;

use azurerm_common::Error;

use crate::state::DynamicValue;
use crate::validation::{ValidateFunc, Validation};

/// Attribute value types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Int,
    Bool,
    List,
}

impl ValueType {
    fn matches(&self, value: &DynamicValue) -> bool {
        match self {
            ValueType::String => value.as_string().is_some(),
            ValueType::Int => value.as_i64().is_some(),
            ValueType::Bool => value.as_bool().is_some(),
            ValueType::List => value.as_list().is_some(),
        }
    }
}

/// Nested element type of a list attribute
#[derive(Debug, Clone)]
pub enum Elem {
    Value(ValueType),
    Block(Block),
}

/// Single attribute description
#[derive(Debug, Clone)]
pub struct Attribute {
    pub value_type: ValueType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub max_items: Option<usize>,
    pub default: Option<DynamicValue>,
    pub elem: Option<Elem>,
    pub validate: Option<ValidateFunc>,
}

impl Attribute {
    fn new(value_type: ValueType, required: bool) -> Self {
        Self {
            value_type,
            required,
            optional: !required,
            computed: false,
            force_new: false,
            max_items: None,
            default: None,
            elem: None,
            validate: None,
        }
    }

    pub fn required(value_type: ValueType) -> Self {
        Self::new(value_type, true)
    }

    pub fn optional(value_type: ValueType) -> Self {
        Self::new(value_type, false)
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn default_value(mut self, value: impl Into<DynamicValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn elem(mut self, elem: Elem) -> Self {
        self.elem = Some(elem);
        self
    }

    pub fn block(self, block: Block) -> Self {
        self.elem(Elem::Block(block))
    }

    pub fn validate(mut self, f: ValidateFunc) -> Self {
        self.validate = Some(f);
        self
    }

    fn validate_value(&self, value: &DynamicValue, path: &str) -> Validation {
        if !self.value_type.matches(value) {
            return Validation::error(Error::attribute(
                path,
                format!("expected a {:?} value", self.value_type),
            ));
        }

        let mut result = Validation::ok();
        if let Some(validate) = &self.validate {
            result.merge(validate.call(value, path));
        }

        if let Some(items) = value.as_list() {
            if let Some(max) = self.max_items {
                if items.len() > max {
                    result.merge(Validation::error(Error::attribute(
                        path,
                        format!("attribute supports {} item maximum, config has {} declared", max, items.len()),
                    )));
                }
            }

            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                match &self.elem {
                    Some(Elem::Block(block)) => result.merge(block.validate_at(item, &item_path)),
                    Some(Elem::Value(value_type)) if !value_type.matches(item) => {
                        result.merge(Validation::error(Error::attribute(
                            &item_path,
                            format!("expected a {:?} value", value_type),
                        )));
                    }
                    _ => {}
                }
            }
        }

        result
    }
}

/// A set of named attributes
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: BTreeMap<String, Attribute>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    /// Validate a configuration object against this block
    pub fn validate(&self, config: &DynamicValue) -> Validation {
        self.validate_at(config, "")
    }

    fn validate_at(&self, config: &DynamicValue, prefix: &str) -> Validation {
        let mut result = Validation::ok();

        if config.as_map().is_none() {
            result.merge(Validation::error(Error::attribute(
                if prefix.is_empty() { "<root>" } else { prefix },
                "expected an object",
            )));
            return result;
        }

        for (name, attribute) in &self.attributes {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", prefix, name)
            };

            match config.get(name) {
                None | Some(DynamicValue::Null) => {
                    if attribute.required {
                        result.merge(Validation::error(Error::attribute(
                            &path,
                            "The argument is required, but no definition was found.",
                        )));
                    }
                }
                Some(DynamicValue::List(items)) if items.is_empty() && attribute.required => {
                    result.merge(Validation::error(Error::attribute(
                        &path,
                        "At least 1 block is required.",
                    )));
                }
                Some(value) => result.merge(attribute.validate_value(value, &path)),
            }
        }

        result
    }

    /// Fill declared defaults for attributes the configuration left unset
    pub fn apply_defaults(&self, config: &mut DynamicValue) {
        for (name, attribute) in &self.attributes {
            let current = config.get(name).cloned().unwrap_or_default();

            if current.is_null() {
                if let Some(default) = &attribute.default {
                    config.set(name.as_str(), default.clone());
                }
                continue;
            }

            if let (Some(Elem::Block(block)), DynamicValue::List(items)) = (&attribute.elem, current) {
                let items = items
                    .into_iter()
                    .map(|mut item| {
                        block.apply_defaults(&mut item);
                        item
                    })
                    .collect();
                config.set(name.as_str(), DynamicValue::List(items));
            }
        }
    }

    /// Attributes whose change forces a new resource
    pub fn force_new_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for (name, attribute) in &self.attributes {
            if attribute.force_new {
                paths.push(name.clone());
            }
            if let Some(Elem::Block(block)) = &attribute.elem {
                paths.extend(
                    block
                        .force_new_paths()
                        .into_iter()
                        .map(|nested| format!("{}.{}", name, nested)),
                );
            }
        }
        paths
    }
}

/// A versioned resource schema
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}
