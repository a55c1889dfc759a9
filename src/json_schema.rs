//! JSON Schema generation for CLI output types.
//!
//! Every command that supports --json output has its schema registered
//! here, exported through the `schema` subcommand so downstream tooling can
//! validate what it parses.

use schemars::{schema_for, Schema};
use std::collections::BTreeMap;

/// Returns all JSON schemas for commands that support --json output.
/// Uses BTreeMap for deterministic ordering (important for diffable output).
pub fn all_schemas() -> BTreeMap<&'static str, Schema> {
    let mut schemas = BTreeMap::new();

    schemas.insert("deploy", schema_for!(crate::cmd::deploy::DeployJsonOutput));

    schemas.insert(
        "extract",
        schema_for!(crate::cmd::extract::ExtractJsonOutput),
    );

    schemas.insert(
        "preprocess",
        schema_for!(crate::cmd::preprocess::PreprocessJsonOutput),
    );

    schemas
}

/// Generate a single schema by command name.
pub fn get_schema(command: &str) -> Option<Schema> {
    all_schemas().remove(command)
}

/// List all available schema names.
pub fn schema_names() -> Vec<&'static str> {
    all_schemas().keys().copied().collect()
}
