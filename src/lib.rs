//! # seeker-mapping
//!
//! A relational-mapping extension layer.
//!
//! This crate sits between an application and its persistence engine and
//! provides the mapping decisions the engine itself does not make: compiling
//! caller-facing search requests into criteria expressions, resolving the
//! column/validation/logic-delete policy cascade, rewriting operations
//! through a plugin chain, and generating distributed entity identifiers.
//! It never talks to a database; compiled criteria, sort terms, page
//! windows, and update assignments are plain data for the engine to render.
//!
//! ## Features
//!
//! - **Dynamic Search DSL**: Ordered field-level probes (rule + synapse +
//!   extension) fold into a composable criteria tree plus sort and page
//! - **Policy Cascade**: Field-level declarations override entity-level
//!   declarations override global configuration, for validation, naming,
//!   and logic delete
//! - **Plugin Chain**: Cross-cutting rewrites of in-flight criteria or
//!   update assignments, executed exactly once per operation
//! - **Logic Delete**: Built-in plugin turning deletes into marker updates
//!   and filtering deleted rows out of query results
//! - **Distributed Ids**: Clock-aware snowflake generator with bounded
//!   rollback tolerance, plus string and UUID forms
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use seeker_mapping::{
//!     EntityMetadata, EntityRegistry, FieldDescriptor, LogicDeleteConfig,
//!     LogicDeleteTag, LogicDeleteValueKind, MappingConfig, NamingPolicy,
//!     PolicyResolver, Seeker, SeekerCompiler,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Describe entities once, at startup
//!     let registry = Arc::new(EntityRegistry::new());
//!     registry.register(EntityMetadata::new(
//!         "Order",
//!         vec![
//!             FieldDescriptor::new("id").id(),
//!             FieldDescriptor::new("orderNo"),
//!             FieldDescriptor::new("deletedTime")
//!                 .logic_delete(LogicDeleteTag::new(LogicDeleteValueKind::DateTime)),
//!         ],
//!     ))?;
//!
//!     let resolver = Arc::new(PolicyResolver::new(
//!         MappingConfig::builder()
//!             .naming_policy(NamingPolicy::CamelCaseToSnakeCase)
//!             .build(),
//!         LogicDeleteConfig::empty(),
//!         registry,
//!     ));
//!
//!     // Compile a caller-supplied search request
//!     let compiler = SeekerCompiler::new(resolver);
//!     let seeker = Seeker::new().eq("orderNo", serde_json::json!("A-100"));
//!     let compiled = compiler.compile("Order", &seeker)?;
//!
//!     assert_eq!(compiled.page.limit, 10);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod criteria;
pub mod datetime;
pub mod error;
pub mod meta;
pub mod naming;
pub mod page;
pub mod plugin;
pub mod policy;
pub mod seeker;
pub mod snowflake;

// Re-export main types for convenience
pub use config::{LogicDeleteConfig, MappingConfig, MappingConfigBuilder};
pub use criteria::{Combinator, Comparator, Criteria, CriteriaStep, Update};
pub use error::{MappingError, Result};
pub use meta::{EntityMetadata, EntityRegistry, FieldDescriptor, LogicDeleteTag};
pub use naming::{quote_identifier, validate_identifier, NamingPolicy};
pub use page::{PageRequest, PageWindow, Pagination};
pub use plugin::{
    LogicDeletePlugin, OperationPlugin, PluginChain, PluginContext, PluginResult, PluginStage,
    LOGIC_DELETE_PLUGIN,
};
pub use policy::{
    DeleteMarker, LogicDeleteValueKind, PolicyResolver, ValidationPolicy, ValueHandler,
};
pub use seeker::{
    CompiledQuery, Extend, Probe, Rule, Seeker, SeekerCompiler, SortDirection, SortOrder, Sorter,
    Synapse,
};
pub use snowflake::{
    recover_timestamp, Clock, IdGenerator, Snowflake, SnowflakeGenerator,
    SnowflakeStringGenerator, SystemClock, UuidGenerator,
};
