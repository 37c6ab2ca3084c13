//! Registry of host record schemas for `JSON(...)` columns.
//!
//! There is no reflection here: callers describe their record types with a
//! builder, mapping each readable property to a JSON path and a ClickHouse
//! type (or to another registered schema for nested records). The registry
//! validates on insertion and is owned by the client, never process-global.

use crate::types::{
    Type,
    TypeRef,
};
use crate::{
    Error,
    Result,
};
use std::collections::{
    HashMap,
    HashSet,
};
use std::str::FromStr;
use std::sync::{
    Arc,
    RwLock,
};

/// How JSON column values travel on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonMode {
    /// Binary typed-path encoding.
    #[default]
    Binary,
    /// JSON rendered as a plain string; adds the corresponding
    /// `*_json_as_string` server setting to the query string.
    String,
    /// No JSON handling.
    None,
}

impl FromStr for JsonMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(JsonMode::Binary),
            "string" => Ok(JsonMode::String),
            "none" => Ok(JsonMode::None),
            other => Err(Error::Config(format!(
                "unknown JSON mode '{}'",
                other
            ))),
        }
    }
}

/// How one property of a registered record maps into a JSON column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPropertyKind {
    /// A scalar property with a parsed ClickHouse type.
    Scalar(TypeRef),
    /// A nested record, referencing another registered schema by name.
    Nested(String),
    /// Excluded from the mapping.
    Ignored,
}

/// One property of a registered record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonProperty {
    /// Property name on the host record.
    pub name: String,
    /// JSON path the property maps to.
    pub json_path: String,
    /// The property's mapping.
    pub kind: JsonPropertyKind,
}

/// A validated record schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonSchema {
    /// The host record type identifier.
    pub type_name: String,
    /// The properties, in declaration order.
    pub properties: Vec<JsonProperty>,
}

impl JsonSchema {
    /// The `(property name, json path)` mapping exposed to the codec.
    pub fn path_of(&self, property: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == property && p.kind != JsonPropertyKind::Ignored)
            .map(|p| p.json_path.as_str())
    }
}

/// Builder describing one host record type.
#[derive(Debug, Clone)]
pub struct JsonSchemaBuilder {
    type_name: String,
    properties: Vec<RawProperty>,
}

#[derive(Debug, Clone)]
struct RawProperty {
    name: String,
    json_path: Option<String>,
    type_str: Option<String>,
    nested: Option<String>,
    ignored: bool,
}

impl JsonSchemaBuilder {
    /// Starts a schema for the given host type identifier.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), properties: Vec::new() }
    }

    /// Adds a scalar property whose JSON path equals its name.
    pub fn property(
        self,
        name: impl Into<String>,
        type_str: impl Into<String>,
    ) -> Self {
        let name = name.into();
        self.push(RawProperty {
            name,
            json_path: None,
            type_str: Some(type_str.into()),
            nested: None,
            ignored: false,
        })
    }

    /// Adds a scalar property at an explicit JSON path.
    pub fn property_at(
        self,
        name: impl Into<String>,
        json_path: impl Into<String>,
        type_str: impl Into<String>,
    ) -> Self {
        self.push(RawProperty {
            name: name.into(),
            json_path: Some(json_path.into()),
            type_str: Some(type_str.into()),
            nested: None,
            ignored: false,
        })
    }

    /// Adds a nested record property referencing another registered schema.
    pub fn nested(
        self,
        name: impl Into<String>,
        schema_name: impl Into<String>,
    ) -> Self {
        self.push(RawProperty {
            name: name.into(),
            json_path: None,
            type_str: None,
            nested: Some(schema_name.into()),
            ignored: false,
        })
    }

    /// Marks a property as excluded.
    pub fn ignore(self, name: impl Into<String>) -> Self {
        self.push(RawProperty {
            name: name.into(),
            json_path: None,
            type_str: None,
            nested: None,
            ignored: true,
        })
    }

    fn push(mut self, property: RawProperty) -> Self {
        self.properties.push(property);
        self
    }
}

/// Client-owned registry of record schemas.
#[derive(Debug, Default)]
pub struct JsonRegistry {
    schemas: RwLock<HashMap<String, Arc<JsonSchema>>>,
}

impl JsonRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a schema.
    ///
    /// Registration is idempotent: re-registering a structurally identical
    /// schema is a no-op, re-registering a different shape under the same
    /// name is an error. Nested references must resolve to already
    /// registered schemas; reference chains that reach back to the schema
    /// being registered are cycles.
    pub fn register(&self, builder: JsonSchemaBuilder) -> Result<()> {
        let schema = self.validate(builder)?;

        let mut schemas = self.schemas.write().expect("registry poisoned");
        if let Some(existing) = schemas.get(&schema.type_name) {
            if **existing == schema {
                return Ok(());
            }
            return Err(Error::Config(format!(
                "'{}' is already registered with a different shape",
                schema.type_name
            )));
        }
        schemas.insert(schema.type_name.clone(), Arc::new(schema));
        Ok(())
    }

    /// True when the type identifier has been registered.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.schemas
            .read()
            .expect("registry poisoned")
            .contains_key(type_name)
    }

    /// Looks up a registered schema.
    pub fn get(&self, type_name: &str) -> Option<Arc<JsonSchema>> {
        self.schemas
            .read()
            .expect("registry poisoned")
            .get(type_name)
            .cloned()
    }

    fn validate(&self, builder: JsonSchemaBuilder) -> Result<JsonSchema> {
        let JsonSchemaBuilder { type_name, properties } = builder;
        let mut seen_paths = HashSet::new();
        let mut validated = Vec::with_capacity(properties.len());

        for property in properties {
            let RawProperty { name, json_path, type_str, nested, ignored } =
                property;
            let json_path = json_path.unwrap_or_else(|| name.clone());

            let kind = if ignored {
                JsonPropertyKind::Ignored
            } else if let Some(schema_name) = nested {
                self.check_reference(&type_name, &schema_name)?;
                JsonPropertyKind::Nested(schema_name)
            } else if let Some(type_str) = type_str {
                let parsed = Type::parse(&type_str).map_err(|e| {
                    Error::Config(format!(
                        "property '{}' of '{}' has no ClickHouse mapping: {}",
                        name, type_name, e
                    ))
                })?;
                JsonPropertyKind::Scalar(parsed)
            } else {
                return Err(Error::Config(format!(
                    "property '{}' of '{}' has neither a type nor a nested \
                     schema",
                    name, type_name
                )));
            };

            if kind != JsonPropertyKind::Ignored
                && !seen_paths.insert(json_path.clone())
            {
                return Err(Error::Config(format!(
                    "two properties of '{}' share the json path '{}'",
                    type_name, json_path
                )));
            }

            validated.push(JsonProperty { name, json_path, kind });
        }

        Ok(JsonSchema { type_name, properties: validated })
    }

    /// Walks nested references with a visiting set, rejecting unknown
    /// schemas and reference chains that lead back to `root`. A schema
    /// reached twice over different paths is fine and walked once.
    fn check_reference(&self, root: &str, reference: &str) -> Result<()> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![reference.to_string()];

        while let Some(current) = stack.pop() {
            if current == root {
                return Err(Error::Config(format!(
                    "nested reference cycle back to '{}' via '{}'",
                    root, reference
                )));
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            let schema = self.get(&current).ok_or_else(|| {
                Error::Config(format!(
                    "nested schema '{}' of '{}' is not registered",
                    current, root
                ))
            })?;
            for property in &schema.properties {
                if let JsonPropertyKind::Nested(next) = &property.kind {
                    stack.push(next.clone());
                }
            }
        }
        Ok(())
    }
}
