//! Schema validation gate
//!
//! Activity and actor documents are checked against JSON Schema (Draft
//! 2020-12) documents compiled into the binary. Cross-document references of
//! the form `{"$ref": "schema:..."}` are resolved through a [`SchemaRegistry`]
//! and inlined before compilation, so a compiled [`SchemaValidator`] never
//! touches the network or the filesystem.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::error::AppError;

pub const ACTIVITY_SCHEMA: &str = "schema:activity";
pub const ACTOR_SCHEMA: &str = "schema:actor";
pub const KNOWN_ACTIVITY_TYPES_SCHEMA: &str = "schema:known-activity-types";

/// Types the node may send.
pub const OUTBOUND_ACTIVITY_TYPES: [&str; 5] = ["Follow", "Accept", "Reject", "Undo", "Create"];

/// Types the node acts on when they arrive at its inbox.
pub const INBOUND_ACTIVITY_TYPES: [&str; 3] = ["Follow", "Undo", "Create"];

const REF_PREFIX: &str = "schema:";

/// A document did not match its schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Logical schema URI -> schema document
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    documents: HashMap<String, Value>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the documents shipped in `schemas/`.
    pub fn bundled() -> Result<Self, AppError> {
        let mut registry = Self::new();
        for (name, source) in [
            ("activity", include_str!("../../schemas/activity-schema.json")),
            ("actor", include_str!("../../schemas/actor-schema.json")),
        ] {
            let document: Value = serde_json::from_str(source)
                .map_err(|e| AppError::Config(format!("Invalid {name} schema: {e}")))?;
            registry.register(document)?;
        }
        Ok(registry)
    }

    /// Register a document under its own `$id`.
    pub fn register(&mut self, document: Value) -> Result<(), AppError> {
        let id = document
            .get("$id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Config("Schema document has no $id".to_string()))?
            .to_string();
        self.documents.insert(id, document);
        Ok(())
    }

    /// Add or replace the document served for `uri`.
    pub fn with_resource(mut self, uri: impl Into<String>, document: Value) -> Self {
        self.documents.insert(uri.into(), document);
        self
    }

    pub fn get(&self, uri: &str) -> Option<&Value> {
        self.documents.get(uri)
    }

    /// The document for `root` with every registry reference inlined.
    pub fn bundle(&self, root: &str) -> Result<Value, AppError> {
        let document = self
            .get(root)
            .ok_or_else(|| AppError::Config(format!("Unknown schema: {root}")))?;
        let mut stack = vec![root.to_string()];
        self.inline_refs(document, &mut stack)
    }

    fn inline_refs(&self, node: &Value, stack: &mut Vec<String>) -> Result<Value, AppError> {
        match node {
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                let mut inlined = None;

                for (key, value) in map {
                    match (key.as_str(), value.as_str()) {
                        ("$ref", Some(target)) if target.starts_with(REF_PREFIX) => {
                            inlined = Some(self.resolve_ref(target, stack)?);
                        }
                        _ => {
                            out.insert(key.clone(), self.inline_refs(value, stack)?);
                        }
                    }
                }

                // `$ref` may sit next to other keywords; `allOf` keeps both.
                if let Some(target) = inlined {
                    match out.get_mut("allOf") {
                        Some(Value::Array(all_of)) => all_of.push(target),
                        _ => {
                            out.insert("allOf".to_string(), Value::Array(vec![target]));
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.inline_refs(item, stack))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve_ref(&self, target: &str, stack: &mut Vec<String>) -> Result<Value, AppError> {
        if stack.iter().any(|uri| uri == target) {
            return Err(AppError::Config(format!(
                "Cyclic schema reference: {} -> {target}",
                stack.join(" -> ")
            )));
        }
        let document = self
            .get(target)
            .ok_or_else(|| AppError::Config(format!("Unresolvable schema reference: {target}")))?;

        stack.push(target.to_string());
        let resolved = self.inline_refs(document, stack);
        stack.pop();

        let mut resolved = resolved?;
        if let Value::Object(map) = &mut resolved {
            map.remove("$id");
            map.remove("$schema");
        }
        Ok(resolved)
    }
}

/// `schema:known-activity-types` for the given allowed set.
pub fn known_activity_types<I, S>(allowed: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let allowed: BTreeSet<String> = allowed
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect();
    let options: Vec<Value> = allowed.iter().map(|name| json!({ "const": name })).collect();

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": KNOWN_ACTIVITY_TYPES_SCHEMA,
        "oneOf": options,
    })
}

/// Compiled, immutable validator for one root schema.
pub struct SchemaValidator {
    root: String,
    validator: jsonschema::Validator,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Bundle `root` from `registry` and compile it with format assertions on.
    pub fn compile(registry: &SchemaRegistry, root: &str) -> Result<Self, AppError> {
        let schema = registry.bundle(root)?;
        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|e| AppError::Config(format!("Failed to compile {root}: {e}")))?;

        Ok(Self {
            root: root.to_string(),
            validator,
        })
    }

    /// Reports the first violation found.
    pub fn validate(&self, instance: &Value) -> Result<(), ValidationError> {
        match self.validator.iter_errors(instance).next() {
            None => Ok(()),
            Some(error) => {
                let path = error.instance_path.to_string();
                let location = if path.is_empty() { "/" } else { path.as_str() };
                Err(ValidationError::new(format!(
                    "{} does not match {}: {error} at {location}",
                    describe(instance),
                    self.root
                )))
            }
        }
    }
}

fn describe(instance: &Value) -> String {
    match instance.get("type").and_then(Value::as_str) {
        Some(kind) => format!("{kind} activity"),
        None => "document".to_string(),
    }
}

/// Validator for activities whose `type` is one of `allowed`.
pub fn activity_validator<I, S>(allowed: I) -> Result<SchemaValidator, AppError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let registry = SchemaRegistry::bundled()?
        .with_resource(KNOWN_ACTIVITY_TYPES_SCHEMA, known_activity_types(allowed));
    SchemaValidator::compile(&registry, ACTIVITY_SCHEMA)
}

/// Validator for remote actor profiles.
pub fn actor_validator() -> Result<SchemaValidator, AppError> {
    SchemaValidator::compile(&SchemaRegistry::bundled()?, ACTOR_SCHEMA)
}
