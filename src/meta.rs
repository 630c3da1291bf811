//! Entity metadata provider
//!
//! The integrating persistence layer describes its entities here once, at
//! startup, using plain declarations: field lists, column overrides, the
//! identifier flag, validation tags, and logic-delete tags. The rest of the
//! crate reads entity shape exclusively through this registry; nothing
//! inspects runtime type information.
//!
//! The registry also owns the enum-code tables used by ENUM predicate
//! preprocessing. Code lookup is deliberately soft: an unrecognized variant
//! name degrades to the `UNKNOWN` entry's code (0 when absent) instead of
//! failing the query.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};
use crate::policy::{LogicDeleteValueKind, ValidationPolicy};

/// Variant name every enum table may carry as its lookup fallback
pub const UNKNOWN_ENUM_NAME: &str = "UNKNOWN";

/// Logic-delete declaration on a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicDeleteTag {
    /// Per-entity switch; overrides the global enable flag either way
    #[serde(default = "default_enable")]
    pub enable: bool,
    /// How the deleted/undeleted marker values are produced
    #[serde(rename = "valueKind")]
    pub value_kind: LogicDeleteValueKind,
    /// Raw "deleted" marker, used by the `Custom` kind
    #[serde(rename = "deleteValue", default)]
    pub delete_value: String,
    /// Raw "not deleted" marker, used by the `Custom` kind
    #[serde(rename = "undeleteValue", default)]
    pub undelete_value: String,
    /// Named handler for the raw "deleted" marker
    #[serde(rename = "deleteValueHandler", skip_serializing_if = "Option::is_none")]
    pub delete_value_handler: Option<String>,
    /// Named handler for the raw "not deleted" marker
    #[serde(
        rename = "undeleteValueHandler",
        skip_serializing_if = "Option::is_none"
    )]
    pub undelete_value_handler: Option<String>,
}

fn default_enable() -> bool {
    true
}

impl LogicDeleteTag {
    pub fn new(value_kind: LogicDeleteValueKind) -> Self {
        Self {
            enable: true,
            value_kind,
            delete_value: String::new(),
            undelete_value: String::new(),
            delete_value_handler: None,
            undelete_value_handler: None,
        }
    }

    /// Declare the field but switch logic delete off for this entity
    pub fn disabled(mut self) -> Self {
        self.enable = false;
        self
    }

    /// Set the raw marker values consumed by the `Custom` kind
    pub fn with_values(
        mut self,
        delete_value: impl Into<String>,
        undelete_value: impl Into<String>,
    ) -> Self {
        self.delete_value = delete_value.into();
        self.undelete_value = undelete_value.into();
        self
    }

    /// Route both raw markers through named handlers
    pub fn with_handlers(
        mut self,
        delete_handler: impl Into<String>,
        undelete_handler: impl Into<String>,
    ) -> Self {
        self.delete_value_handler = Some(delete_handler.into());
        self.undelete_value_handler = Some(undelete_handler.into());
        self
    }
}

/// One declared field of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Declared (logical) field name
    pub name: String,
    /// Explicit column name; wins over alias and naming conversion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Column alias; wins over naming conversion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Whether this field is the entity's identifier
    #[serde(rename = "isId", default)]
    pub is_id: bool,
    /// Field-level validation; `Default` falls through to the entity level
    #[serde(default)]
    pub validation: ValidationPolicy,
    /// Logic-delete declaration, at most one per entity
    #[serde(rename = "logicDelete", skip_serializing_if = "Option::is_none")]
    pub logic_delete: Option<LogicDeleteTag>,
    /// Enum type name for ENUM predicate preprocessing
    #[serde(rename = "enumType", skip_serializing_if = "Option::is_none")]
    pub enum_type: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            alias: None,
            is_id: false,
            validation: ValidationPolicy::Default,
            logic_delete: None,
            enum_type: None,
        }
    }

    /// Mark as the identifier field
    pub fn id(mut self) -> Self {
        self.is_id = true;
        self
    }

    /// Set an explicit column name
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Set a column alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the field-level validation policy
    pub fn validation(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }

    /// Attach a logic-delete declaration
    pub fn logic_delete(mut self, tag: LogicDeleteTag) -> Self {
        self.logic_delete = Some(tag);
        self
    }

    /// Declare the field as an enum of the named type
    pub fn enum_type(mut self, enum_type: impl Into<String>) -> Self {
        self.enum_type = Some(enum_type.into());
        self
    }
}

/// Declared shape of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name, the registry key
    pub name: String,
    /// Explicit table name; wins over alias and naming conversion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Table alias; wins over naming conversion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Entity-level validation; `Default` falls through to the global config
    #[serde(default)]
    pub validation: ValidationPolicy,
    pub fields: Vec<FieldDescriptor>,
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            table: None,
            alias: None,
            validation: ValidationPolicy::Default,
            fields,
        }
    }

    /// Set an explicit table name
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Set a table alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the entity-level validation policy
    pub fn validation(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }

    /// Look up a declared field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The identifier field, when declared
    pub fn id_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.is_id)
    }

    /// The field carrying a logic-delete tag, when declared
    pub fn logic_delete_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.logic_delete.is_some())
    }
}

/// Registry of entity shapes and enum-code tables
///
/// Populated at startup, read-mostly afterwards. Entries are keyed by the
/// entity/enum name strings fixed at registration time.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: RwLock<HashMap<String, Arc<EntityMetadata>>>,
    enums: RwLock<HashMap<String, HashMap<String, i32>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity shape, replacing any previous registration
    pub fn register(&self, entity: EntityMetadata) -> Result<Arc<EntityMetadata>> {
        if entity.name.is_empty() {
            return Err(MappingError::configuration("entity name cannot be empty"));
        }
        tracing::debug!(entity = %entity.name, fields = entity.fields.len(), "registering entity");
        let entity = Arc::new(entity);
        self.entities
            .write()
            .expect("entity registry lock poisoned")
            .insert(entity.name.clone(), Arc::clone(&entity));
        Ok(entity)
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntityMetadata>> {
        self.entities
            .read()
            .expect("entity registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Look up an entity, erring when it was never registered
    pub fn require(&self, name: &str) -> Result<Arc<EntityMetadata>> {
        self.get(name)
            .ok_or_else(|| MappingError::entity_not_found(name))
    }

    /// Register the code table of one enum type
    pub fn register_enum<N, I>(&self, enum_type: impl Into<String>, codes: I)
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, i32)>,
    {
        let table: HashMap<String, i32> = codes.into_iter().map(|(n, c)| (n.into(), c)).collect();
        self.enums
            .write()
            .expect("enum table lock poisoned")
            .insert(enum_type.into(), table);
    }

    /// Translate an enum variant name to its code
    ///
    /// Unrecognized names (and unregistered types) fall back to the `UNKNOWN`
    /// entry's code, or 0: best-effort degradation, never an error.
    pub fn enum_code(&self, enum_type: &str, name: &str) -> i32 {
        let enums = self.enums.read().expect("enum table lock poisoned");
        let Some(table) = enums.get(enum_type) else {
            return 0;
        };
        table
            .get(name)
            .or_else(|| table.get(UNKNOWN_ENUM_NAME))
            .copied()
            .unwrap_or(0)
    }
}
