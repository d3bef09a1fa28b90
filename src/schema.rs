use crate::group_collection::GroupCollection;
use crate::store::StoreManifest;
use anyhow::{anyhow, Context, Result};
use jsonschema::JSONSchema;
use schemars::schema_for;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub fn corpus_schema() -> Result<Value> {
    serde_json::to_value(schema_for!(GroupCollection)).context("Failed to serialize corpus schema")
}

pub fn manifest_schema() -> Result<Value> {
    serde_json::to_value(schema_for!(StoreManifest)).context("Failed to serialize manifest schema")
}

/// Writes every JSON schema of the project files into `schema_dir`
pub fn generate_schemas(schema_dir: &Path, schema_version: &str) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(schema_dir)
        .with_context(|| format!("Failed to create schema directory: {:?}", schema_dir))?;

    let mut written = Vec::new();
    for (name, schema) in [("corpus", corpus_schema()?), ("manifest", manifest_schema()?)] {
        let path = schema_dir.join(format!("{}-{}.json", name, schema_version));
        fs::write(&path, serde_json::to_string_pretty(&schema)?)
            .with_context(|| format!("Failed to write schema: {:?}", path))?;
        written.push(path);
    }

    Ok(written)
}

/// Validates `json` against `schema`, reporting every violation at once
pub fn validate_json(json: &Value, schema: &Value) -> Result<()> {
    let compiled = JSONSchema::compile(schema).map_err(|e| anyhow!("Failed to compile schema: {}", e))?;

    let error_msgs: Vec<String> = match compiled.validate(json) {
        Ok(()) => return Ok(()),
        Err(errors) => errors.map(|e| format!("{} at {}", e, e.instance_path)).collect(),
    };

    Err(anyhow!("Validation error: {}", error_msgs.join("; ")))
}
