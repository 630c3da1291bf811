//! Cascading policy resolution
//!
//! Every mapping decision (does this field get validated, what column does it
//! land in, how is a logic delete marked) can be declared at three levels:
//! on the field, on the entity, or in the global configuration. The
//! [`PolicyResolver`] walks that cascade, most specific first, and always
//! bottoms out at a concrete global value. The `Default` variants on
//! [`ValidationPolicy`] and per-field tags are transparent sentinels: they
//! mean "nothing declared here, keep walking".
//!
//! Resolved columns and handler-converted marker values are memoized in
//! read-through caches. Entity shapes are fixed at registration time, so the
//! caches are never invalidated.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{LogicDeleteConfig, MappingConfig};
use crate::datetime::{epoch_datetime, format_datetime, DATE_FORMAT};
use crate::error::{MappingError, Result};
use crate::meta::EntityRegistry;
use crate::naming::quote_identifier;

/// Name of the identity value handler, always registered
pub const DEFAULT_VALUE_HANDLER: &str = "default";
/// Name of the current-timestamp value handler, always registered
pub const CURRENT_TIMESTAMP_HANDLER: &str = "current_timestamp";

/// Field validation applied before a value participates in a statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationPolicy {
    /// Nothing declared at this level; resolution falls through
    #[default]
    Default,
    /// Accept any value, including null
    NotChecked,
    /// Reject null
    NotNull,
    /// Reject null and empty strings/arrays/objects
    NotEmpty,
}

impl ValidationPolicy {
    /// Whether a value passes this policy
    ///
    /// `Default` behaves like `NotChecked` when asked directly; the resolver
    /// normally replaces it with a concrete policy before this is called.
    pub fn is_effective(&self, value: Option<&Value>) -> bool {
        match self {
            ValidationPolicy::Default | ValidationPolicy::NotChecked => true,
            ValidationPolicy::NotNull => matches!(value, Some(v) if !v.is_null()),
            ValidationPolicy::NotEmpty => match value {
                Some(Value::String(s)) => !s.is_empty(),
                Some(Value::Array(a)) => !a.is_empty(),
                Some(Value::Object(o)) => !o.is_empty(),
                Some(v) => !v.is_null(),
                None => false,
            },
        }
    }
}

/// How logic-delete marker values are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicDeleteValueKind {
    /// Deleted = 1, not deleted = 0
    Number,
    /// Deleted = true, not deleted = false
    Boolean,
    /// Deleted = today, not deleted = the epoch date
    Date,
    /// Deleted = now, not deleted = the epoch datetime
    DateTime,
    /// Raw strings from the global configuration, run through its handler
    UseConfig,
    /// Raw strings from the field's own tag, run through its handlers
    Custom,
}

/// Which side of the logic-delete marker is wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMarker {
    Deleted,
    Undeleted,
}

/// Converts a raw configured marker string into a predicate value
pub trait ValueHandler: Send + Sync {
    fn convert(&self, raw: &str) -> Value;
}

/// Identity handler: the raw string is the value
#[derive(Debug, Default)]
pub struct DefaultValueHandler;

impl ValueHandler for DefaultValueHandler {
    fn convert(&self, raw: &str) -> Value {
        Value::String(raw.to_string())
    }
}

/// Expands the `CURRENT_TIMESTAMP` placeholder to the wall clock
///
/// Converted values are memoized per raw string by the resolver, so the
/// expansion happens once per process, at first use.
#[derive(Debug, Default)]
pub struct CurrentTimestampHandler;

impl ValueHandler for CurrentTimestampHandler {
    fn convert(&self, raw: &str) -> Value {
        if raw == "CURRENT_TIMESTAMP" {
            Value::String(format_datetime(Utc::now().naive_utc()))
        } else {
            Value::String(raw.to_string())
        }
    }
}

/// Walks the field > entity > global cascade for validation, naming, and
/// logic-delete decisions
pub struct PolicyResolver {
    config: MappingConfig,
    logic_delete: LogicDeleteConfig,
    registry: Arc<EntityRegistry>,
    column_cache: RwLock<HashMap<String, String>>,
    table_cache: RwLock<HashMap<String, String>>,
    handlers: RwLock<HashMap<String, Arc<dyn ValueHandler>>>,
    handler_values: RwLock<HashMap<String, Value>>,
}

impl PolicyResolver {
    pub fn new(
        config: MappingConfig,
        logic_delete: LogicDeleteConfig,
        registry: Arc<EntityRegistry>,
    ) -> Self {
        let mut handlers: HashMap<String, Arc<dyn ValueHandler>> = HashMap::new();
        handlers.insert(DEFAULT_VALUE_HANDLER.to_string(), Arc::new(DefaultValueHandler));
        handlers.insert(
            CURRENT_TIMESTAMP_HANDLER.to_string(),
            Arc::new(CurrentTimestampHandler),
        );
        Self {
            config,
            logic_delete,
            registry,
            column_cache: RwLock::new(HashMap::new()),
            table_cache: RwLock::new(HashMap::new()),
            handlers: RwLock::new(handlers),
            handler_values: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// Register a named value handler, replacing any previous registration
    pub fn register_value_handler(&self, name: impl Into<String>, handler: Arc<dyn ValueHandler>) {
        self.handlers
            .write()
            .expect("handler table lock poisoned")
            .insert(name.into(), handler);
    }

    /// Resolve the validation policy for one field
    ///
    /// Field declaration wins over entity declaration wins over global
    /// configuration; `Default` at any level falls through to the next.
    /// Unregistered entities and undeclared fields resolve to the global
    /// policy.
    pub fn resolve_validation(&self, entity: &str, field: &str) -> ValidationPolicy {
        if let Some(metadata) = self.registry.get(entity) {
            if let Some(descriptor) = metadata.field(field) {
                if descriptor.validation != ValidationPolicy::Default {
                    return descriptor.validation;
                }
            }
            if metadata.validation != ValidationPolicy::Default {
                return metadata.validation;
            }
        }
        self.config.validation_policy
    }

    /// Resolve the column name for one field
    ///
    /// Explicit column override > alias > the naming policy's conversion of
    /// the declared name. Memoized per `entity#field`; quoted when
    /// `force_quote` is set.
    pub fn resolve_column(&self, entity: &str, field: &str) -> String {
        let key = format!("{}#{}", entity, field);
        if let Some(column) = self
            .column_cache
            .read()
            .expect("column cache lock poisoned")
            .get(&key)
        {
            return column.clone();
        }

        let mut column = None;
        if let Some(metadata) = self.registry.get(entity) {
            if let Some(descriptor) = metadata.field(field) {
                column = descriptor.column.clone().or_else(|| descriptor.alias.clone());
            }
        }
        let mut column = column.unwrap_or_else(|| self.config.naming_policy.convert(field));
        if self.config.force_quote {
            column = quote_identifier(&column);
        }

        self.column_cache
            .write()
            .expect("column cache lock poisoned")
            .insert(key, column.clone());
        column
    }

    /// Resolve the table name for one entity
    ///
    /// Explicit table override > alias > the naming policy's conversion of
    /// the entity name. Memoized per entity; quoted when `force_quote` is
    /// set.
    pub fn resolve_table(&self, entity: &str) -> String {
        if let Some(table) = self
            .table_cache
            .read()
            .expect("table cache lock poisoned")
            .get(entity)
        {
            return table.clone();
        }

        let mut table = self
            .registry
            .get(entity)
            .and_then(|metadata| metadata.table.clone().or_else(|| metadata.alias.clone()))
            .unwrap_or_else(|| self.config.naming_policy.convert(entity));
        if self.config.force_quote {
            table = quote_identifier(&table);
        }

        self.table_cache
            .write()
            .expect("table cache lock poisoned")
            .insert(entity.to_string(), table.clone());
        table
    }

    /// Whether logic delete applies to this entity
    ///
    /// A declared field tag's own `enable` flag wins either way; without a
    /// declaration the global switch and field decide.
    pub fn is_logic_delete_enabled(&self, entity: &str) -> bool {
        if let Some(metadata) = self.registry.get(entity) {
            if let Some(descriptor) = metadata.logic_delete_field() {
                if let Some(tag) = &descriptor.logic_delete {
                    return tag.enable;
                }
            }
        }
        self.logic_delete.enable && !self.logic_delete.field.is_empty()
    }

    /// Resolve the logic-delete column and the marker value for one side
    ///
    /// The field-level tag overrides the global configuration. Errs when
    /// neither declares a logic-delete field.
    pub fn logic_delete_column(&self, entity: &str, marker: DeleteMarker) -> Result<(String, Value)> {
        let metadata = self.registry.get(entity);
        let tagged = metadata
            .as_ref()
            .and_then(|m| m.logic_delete_field())
            .and_then(|d| d.logic_delete.as_ref().map(|tag| (d.name.clone(), tag.clone())));

        let (field, value) = match tagged {
            Some((field, tag)) => {
                let value = match tag.value_kind {
                    LogicDeleteValueKind::Custom => {
                        let (raw, handler) = match marker {
                            DeleteMarker::Deleted => (&tag.delete_value, &tag.delete_value_handler),
                            DeleteMarker::Undeleted => {
                                (&tag.undelete_value, &tag.undelete_value_handler)
                            }
                        };
                        self.handler_value(handler.as_deref(), raw)?
                    }
                    kind => self.marker_value(kind, marker)?,
                };
                (field, value)
            }
            None => {
                if self.logic_delete.field.is_empty() {
                    return Err(MappingError::configuration(format!(
                        "no logic delete field declared for entity '{}'",
                        entity
                    )));
                }
                let value = self.marker_value(self.logic_delete.value_kind, marker)?;
                (self.logic_delete.field.clone(), value)
            }
        };

        Ok((self.resolve_column(entity, &field), value))
    }

    /// Marker value for the non-custom kinds
    fn marker_value(&self, kind: LogicDeleteValueKind, marker: DeleteMarker) -> Result<Value> {
        let deleted = marker == DeleteMarker::Deleted;
        let value = match kind {
            LogicDeleteValueKind::Number => json!(if deleted { 1 } else { 0 }),
            LogicDeleteValueKind::Boolean => json!(deleted),
            LogicDeleteValueKind::Date => {
                let day = if deleted {
                    Utc::now().naive_utc().date()
                } else {
                    epoch_datetime().date()
                };
                Value::String(day.format(DATE_FORMAT).to_string())
            }
            LogicDeleteValueKind::DateTime => {
                let at = if deleted {
                    Utc::now().naive_utc()
                } else {
                    epoch_datetime()
                };
                Value::String(format_datetime(at))
            }
            LogicDeleteValueKind::UseConfig => {
                let raw = if deleted {
                    &self.logic_delete.delete_value
                } else {
                    &self.logic_delete.undelete_value
                };
                self.handler_value(self.logic_delete.value_handler.as_deref(), raw)?
            }
            LogicDeleteValueKind::Custom => {
                return Err(MappingError::configuration(
                    "CUSTOM logic delete values require a field-level tag",
                ));
            }
        };
        Ok(value)
    }

    /// Run a raw marker string through its handler, memoized per raw string
    fn handler_value(&self, handler: Option<&str>, raw: &str) -> Result<Value> {
        let name = handler.unwrap_or(DEFAULT_VALUE_HANDLER);
        let key = format!("{}:{}", name, raw);
        if let Some(value) = self
            .handler_values
            .read()
            .expect("handler value cache lock poisoned")
            .get(&key)
        {
            return Ok(value.clone());
        }

        let handler = self
            .handlers
            .read()
            .expect("handler table lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| {
                MappingError::configuration(format!("value handler '{}' is not registered", name))
            })?;
        let value = handler.convert(raw);

        self.handler_values
            .write()
            .expect("handler value cache lock poisoned")
            .insert(key, value.clone());
        Ok(value)
    }
}
