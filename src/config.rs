//! Configuration for the mapping layer
//!
//! All configuration is carried by explicit objects handed to the resolver and
//! compiler constructors at startup. There is no process-wide lookup, so tests
//! can run distinct configurations side by side.

use crate::naming::NamingPolicy;
use crate::policy::{LogicDeleteValueKind, ValidationPolicy};

/// Global mapping configuration
///
/// Per-field and per-entity declarations override these values through the
/// policy cascade (field > entity > global); this object is the terminal
/// fallback and always carries a concrete value.
#[derive(Debug, Clone)]
pub struct MappingConfig {
    /// Whether resolved column/table names are double-quoted
    pub force_quote: bool,
    /// Data-center id for the identifier generator, 0..=31
    pub data_center_id: u8,
    /// Worker id for the identifier generator, 0..=31
    pub worker_id: u8,
    /// Naming conversion applied to declared field/type names
    pub naming_policy: NamingPolicy,
    /// Validation applied to fields with no more specific declaration
    pub validation_policy: ValidationPolicy,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            force_quote: false,
            data_center_id: 0,
            worker_id: 0,
            naming_policy: NamingPolicy::Default,
            validation_policy: ValidationPolicy::NotChecked,
        }
    }
}

impl MappingConfig {
    /// Create a new configuration builder
    pub fn builder() -> MappingConfigBuilder {
        MappingConfigBuilder::new()
    }
}

/// Builder for [`MappingConfig`]
#[derive(Debug)]
pub struct MappingConfigBuilder {
    config: MappingConfig,
}

impl MappingConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MappingConfig::default(),
        }
    }

    /// Enable or disable identifier quoting (default: false)
    pub fn force_quote(mut self, enabled: bool) -> Self {
        self.config.force_quote = enabled;
        self
    }

    /// Set the data-center id (default: 0)
    pub fn data_center_id(mut self, id: u8) -> Self {
        self.config.data_center_id = id;
        self
    }

    /// Set the worker id (default: 0)
    pub fn worker_id(mut self, id: u8) -> Self {
        self.config.worker_id = id;
        self
    }

    /// Set the naming policy (default: identity)
    pub fn naming_policy(mut self, policy: NamingPolicy) -> Self {
        self.config.naming_policy = policy;
        self
    }

    /// Set the global validation policy (default: not checked)
    pub fn validation_policy(mut self, policy: ValidationPolicy) -> Self {
        self.config.validation_policy = policy;
        self
    }

    pub fn build(self) -> MappingConfig {
        self.config
    }
}

impl Default for MappingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Global logic-delete (soft delete) configuration
///
/// Entities may declare their own logic-delete field, which overrides this
/// configuration for that entity. The raw `delete_value` / `undelete_value`
/// strings are consumed by the [`LogicDeleteValueKind::UseConfig`] kind and
/// run through a value handler before use.
#[derive(Debug, Clone)]
pub struct LogicDeleteConfig {
    /// Whether logic delete is enabled globally
    pub enable: bool,
    /// Column marking deletion for entities without their own declaration
    pub field: String,
    /// How marker values are produced
    pub value_kind: LogicDeleteValueKind,
    /// Raw "deleted" marker, used by the `UseConfig` kind
    pub delete_value: String,
    /// Raw "not deleted" marker, used by the `UseConfig` kind
    pub undelete_value: String,
    /// Named handler converting the raw strings, when registered
    pub value_handler: Option<String>,
}

impl LogicDeleteConfig {
    /// Disabled configuration with no field
    pub fn empty() -> Self {
        Self {
            enable: false,
            field: String::new(),
            value_kind: LogicDeleteValueKind::Number,
            delete_value: String::new(),
            undelete_value: String::new(),
            value_handler: None,
        }
    }

    /// Enabled configuration for `field` using the given value kind
    pub fn enabled(field: impl Into<String>, value_kind: LogicDeleteValueKind) -> Self {
        Self {
            enable: true,
            field: field.into(),
            value_kind,
            delete_value: String::new(),
            undelete_value: String::new(),
            value_handler: None,
        }
    }

    /// Set the raw marker values consumed by the `UseConfig` kind
    pub fn with_values(
        mut self,
        delete_value: impl Into<String>,
        undelete_value: impl Into<String>,
    ) -> Self {
        self.delete_value = delete_value.into();
        self.undelete_value = undelete_value.into();
        self
    }

    /// Route raw marker values through a named handler
    pub fn with_value_handler(mut self, handler: impl Into<String>) -> Self {
        self.value_handler = Some(handler.into());
        self
    }
}

impl Default for LogicDeleteConfig {
    fn default() -> Self {
        Self::empty()
    }
}
