//! Naming conversions and identifier hygiene
//!
//! Provides the case conversions behind [`NamingPolicy`] plus validation and
//! quoting helpers for identifiers that end up in rendered statements.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid identifier regex"));

/// Convert a camelCase (or PascalCase) name to snake_case.
///
/// Already-snake_case input passes through unchanged, so the conversion is
/// safe to apply to caller-supplied field names of either shape.
pub fn snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert a snake_case name to camelCase.
pub fn camel_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Naming conversion applied when mapping declared field/type names to
/// column/table names.
///
/// Resolution order for a column is: explicit override > alias > the active
/// policy's conversion of the declared name (see `PolicyResolver`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Identity: names are used exactly as declared
    #[default]
    Default,
    /// camelCase declarations map to snake_case columns
    CamelCaseToSnakeCase,
    /// snake_case declarations map to camelCase columns
    SnakeCaseToCamelCase,
}

impl NamingPolicy {
    /// Apply this policy's conversion to a declared name
    pub fn convert(&self, name: &str) -> String {
        match self {
            NamingPolicy::Default => name.to_string(),
            NamingPolicy::CamelCaseToSnakeCase => snake_case(name),
            NamingPolicy::SnakeCaseToCamelCase => camel_case(name),
        }
    }
}

/// Quote an identifier, escaping embedded double quotes by doubling them
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Validate a column or table name.
///
/// Must start with a lowercase letter and contain only lowercase letters,
/// numbers, and underscores. Returns the crate's configuration error so the
/// failure surfaces at registration time, not query time.
pub fn validate_identifier(name: &str) -> crate::error::Result<()> {
    if name.is_empty() {
        return Err(crate::error::MappingError::configuration(
            "Identifier cannot be empty",
        ));
    }
    if !IDENTIFIER_RE.is_match(name) {
        return Err(crate::error::MappingError::configuration(format!(
            "Identifier '{}' is invalid. Must start with a lowercase letter and contain only lowercase letters, numbers, and underscores.",
            name
        )));
    }
    Ok(())
}
