//! Operation plugin chain
//!
//! Plugins rewrite an in-flight operation exactly once: the integrating layer
//! wraps the operation's criteria or update assignments in a
//! [`PluginContext`], runs it through the chain, and takes the rewritten
//! payload back out. A context is single-shot; executing it twice is an
//! error, which keeps a rewrite from compounding when an operation is retried
//! through the same context by mistake.
//!
//! The built-in [`LogicDeletePlugin`] turns hard deletes into marker updates
//! and keeps logically deleted rows out of query results.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::criteria::{Criteria, Update};
use crate::error::{MappingError, Result};
use crate::meta::EntityMetadata;
use crate::policy::{DeleteMarker, PolicyResolver};

/// Which payload the operation carries at this stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStage {
    Criteria,
    Update,
}

/// A rewritten payload produced by a plugin
#[derive(Debug, Clone, PartialEq)]
pub enum PluginResult {
    Criteria(Criteria),
    Update(Update),
}

/// One operation's pass through the chain
///
/// Carries the target entity, the stage, the previous plugin's result, and,
/// after execution, this plugin's result.
#[derive(Debug, Clone)]
pub struct PluginContext {
    entity: Arc<EntityMetadata>,
    stage: PluginStage,
    enabled: bool,
    executed: bool,
    last_result: Option<PluginResult>,
    result: Option<PluginResult>,
}

impl PluginContext {
    pub fn new(entity: Arc<EntityMetadata>, stage: PluginStage) -> Self {
        Self {
            entity,
            stage,
            enabled: true,
            executed: false,
            last_result: None,
            result: None,
        }
    }

    /// Seed the context with the payload produced before this plugin runs
    pub fn with_last_result(mut self, result: PluginResult) -> Self {
        self.last_result = Some(result);
        self
    }

    /// Mark the context disabled; plugins pass it through untouched
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn entity(&self) -> &Arc<EntityMetadata> {
        &self.entity
    }

    pub fn stage(&self) -> PluginStage {
        self.stage
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn last_result(&self) -> Option<&PluginResult> {
        self.last_result.as_ref()
    }

    /// The criteria carried in from the previous step, or the empty expression
    pub fn last_criteria(&self) -> Criteria {
        match &self.last_result {
            Some(PluginResult::Criteria(criteria)) => criteria.clone(),
            _ => Criteria::empty(),
        }
    }

    /// Run the plugin's rewrite, assigning the single result
    ///
    /// Errs when the context was already executed.
    pub fn execute<F>(mut self, f: F) -> Result<Self>
    where
        F: FnOnce(&Self) -> Result<PluginResult>,
    {
        if self.executed {
            return Err(MappingError::plugin(
                "plugin context has already been executed",
            ));
        }
        let result = f(&self)?;
        self.executed = true;
        self.result = Some(result);
        Ok(self)
    }

    /// The plugin's result; empty unless the context was executed
    pub fn take_result(self) -> Option<PluginResult> {
        if self.executed { self.result } else { None }
    }

    pub fn take_criteria(self) -> Option<Criteria> {
        match self.take_result() {
            Some(PluginResult::Criteria(criteria)) => Some(criteria),
            _ => None,
        }
    }

    pub fn take_update(self) -> Option<Update> {
        match self.take_result() {
            Some(PluginResult::Update(update)) => Some(update),
            _ => None,
        }
    }
}

/// A cross-cutting rewrite of in-flight operations
pub trait OperationPlugin: Send + Sync {
    /// Plugin group, for diagnostics
    fn group(&self) -> &str;

    /// Unique name the chain keys this plugin by
    fn name(&self) -> &str;

    /// Rewrite the context; a disabled context must pass through untouched
    fn apply(&self, ctx: PluginContext) -> Result<PluginContext>;
}

/// Registered plugins keyed by name
#[derive(Default)]
pub struct PluginChain {
    plugins: RwLock<HashMap<String, Arc<dyn OperationPlugin>>>,
}

impl PluginChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, replacing any previous one of the same name
    pub fn add_plugin(&self, plugin: Arc<dyn OperationPlugin>) {
        tracing::debug!(plugin = plugin.name(), group = plugin.group(), "registering plugin");
        self.plugins
            .write()
            .expect("plugin table lock poisoned")
            .insert(plugin.name().to_string(), plugin);
    }

    pub fn remove_plugin(&self, name: &str) {
        self.plugins
            .write()
            .expect("plugin table lock poisoned")
            .remove(name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OperationPlugin>> {
        self.plugins
            .read()
            .expect("plugin table lock poisoned")
            .get(name)
            .cloned()
    }

    /// Run one named plugin over the context
    ///
    /// Plugin failures propagate uncaught; an unregistered name is an error.
    pub fn run(&self, name: &str, ctx: PluginContext) -> Result<PluginContext> {
        let plugin = self
            .get(name)
            .ok_or_else(|| MappingError::plugin(format!("plugin '{}' is not registered", name)))?;
        if !ctx.is_enabled() {
            return Ok(ctx);
        }
        tracing::debug!(plugin = name, entity = %ctx.entity().name, "running plugin");
        plugin.apply(ctx)
    }
}

/// Name the built-in logic-delete plugin registers under
pub const LOGIC_DELETE_PLUGIN: &str = "logic_delete";

/// Rewrites deletes into marker updates and filters deleted rows from queries
///
/// At the `Update` stage the incoming assignments are replaced with the single
/// "mark deleted" assignment. At the `Criteria` stage an `AND column =
/// undeleted` condition is appended to the incoming expression when logic
/// delete is enabled for the entity; otherwise the expression passes through
/// unchanged.
pub struct LogicDeletePlugin {
    resolver: Arc<PolicyResolver>,
}

impl LogicDeletePlugin {
    pub fn new(resolver: Arc<PolicyResolver>) -> Self {
        Self { resolver }
    }
}

impl OperationPlugin for LogicDeletePlugin {
    fn group(&self) -> &str {
        "CRITERIA"
    }

    fn name(&self) -> &str {
        LOGIC_DELETE_PLUGIN
    }

    fn apply(&self, ctx: PluginContext) -> Result<PluginContext> {
        if !ctx.is_enabled() {
            return Ok(ctx);
        }
        let entity = ctx.entity().name.clone();
        match ctx.stage() {
            PluginStage::Update => {
                let (column, value) = self
                    .resolver
                    .logic_delete_column(&entity, DeleteMarker::Deleted)?;
                ctx.execute(|_| Ok(PluginResult::Update(Update::of(column, value))))
            }
            PluginStage::Criteria => {
                if !self.resolver.is_logic_delete_enabled(&entity) {
                    let previous = ctx.last_criteria();
                    return ctx.execute(|_| Ok(PluginResult::Criteria(previous)));
                }
                let (column, value) = self
                    .resolver
                    .logic_delete_column(&entity, DeleteMarker::Undeleted)?;
                let previous = ctx.last_criteria();
                let rewritten = if previous.is_empty() {
                    Criteria::column(column).is(value)
                } else {
                    previous.and(column).is(value)
                };
                ctx.execute(|_| Ok(PluginResult::Criteria(rewritten)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogicDeleteConfig, MappingConfig};
    use crate::meta::{EntityRegistry, FieldDescriptor, LogicDeleteTag};
    use crate::naming::NamingPolicy;
    use crate::policy::LogicDeleteValueKind;
    use serde_json::json;

    fn setup() -> (Arc<PolicyResolver>, Arc<EntityMetadata>) {
        let registry = Arc::new(EntityRegistry::new());
        let entity = registry
            .register(EntityMetadata::new(
                "Order",
                vec![
                    FieldDescriptor::new("id").id(),
                    FieldDescriptor::new("orderNo"),
                    FieldDescriptor::new("deletedTime")
                        .logic_delete(LogicDeleteTag::new(LogicDeleteValueKind::DateTime)),
                ],
            ))
            .unwrap();
        let resolver = Arc::new(PolicyResolver::new(
            MappingConfig::builder()
                .naming_policy(NamingPolicy::CamelCaseToSnakeCase)
                .build(),
            LogicDeleteConfig::empty(),
            registry,
        ));
        (resolver, entity)
    }

    // =========================================================================
    // PluginContext Tests
    // =========================================================================

    #[test]
    fn test_execute_assigns_result_once() {
        let (_, entity) = setup();
        let ctx = PluginContext::new(entity, PluginStage::Criteria);
        let ctx = ctx
            .execute(|_| Ok(PluginResult::Criteria(Criteria::empty())))
            .unwrap();
        assert!(ctx.is_executed());
        assert!(ctx
            .execute(|_| Ok(PluginResult::Criteria(Criteria::empty())))
            .is_err());
    }

    #[test]
    fn test_take_result_empty_when_not_executed() {
        let (_, entity) = setup();
        let ctx = PluginContext::new(entity, PluginStage::Criteria);
        assert!(ctx.take_result().is_none());
    }

    #[test]
    fn test_last_criteria_defaults_to_empty() {
        let (_, entity) = setup();
        let ctx = PluginContext::new(entity.clone(), PluginStage::Criteria);
        assert!(ctx.last_criteria().is_empty());

        let seeded = PluginContext::new(entity, PluginStage::Criteria)
            .with_last_result(PluginResult::Criteria(Criteria::column("a").is(json!(1))));
        assert_eq!(seeded.last_criteria().len(), 1);
    }

    // =========================================================================
    // LogicDeletePlugin Tests
    // =========================================================================

    #[test]
    fn test_criteria_stage_appends_undeleted_condition() {
        let (resolver, entity) = setup();
        let plugin = LogicDeletePlugin::new(resolver);
        let ctx = PluginContext::new(entity, PluginStage::Criteria)
            .with_last_result(PluginResult::Criteria(
                Criteria::column("order_no").is(json!("A-1")),
            ));
        let criteria = plugin.apply(ctx).unwrap().take_criteria().unwrap();
        assert_eq!(
            criteria,
            Criteria::column("order_no")
                .is(json!("A-1"))
                .and("deleted_time")
                .is(json!("1970-01-01 00:00:00"))
        );
    }

    #[test]
    fn test_criteria_stage_from_empty() {
        let (resolver, entity) = setup();
        let plugin = LogicDeletePlugin::new(resolver);
        let ctx = PluginContext::new(entity, PluginStage::Criteria);
        let criteria = plugin.apply(ctx).unwrap().take_criteria().unwrap();
        assert_eq!(
            criteria,
            Criteria::column("deleted_time").is(json!("1970-01-01 00:00:00"))
        );
    }

    #[test]
    fn test_update_stage_replaces_assignments() {
        let (resolver, entity) = setup();
        let plugin = LogicDeletePlugin::new(resolver);
        let ctx = PluginContext::new(entity, PluginStage::Update);
        let update = plugin.apply(ctx).unwrap().take_update().unwrap();
        let assignments = update.assignments();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].0, "deleted_time");
        // Marker is the wall clock, not the epoch
        assert_ne!(assignments[0].1, json!("1970-01-01 00:00:00"));
    }

    #[test]
    fn test_pass_through_when_entity_not_enabled() {
        let registry = Arc::new(EntityRegistry::new());
        let entity = registry
            .register(EntityMetadata::new(
                "Audit",
                vec![FieldDescriptor::new("id").id()],
            ))
            .unwrap();
        let resolver = Arc::new(PolicyResolver::new(
            MappingConfig::default(),
            LogicDeleteConfig::empty(),
            registry,
        ));
        let plugin = LogicDeletePlugin::new(resolver);
        let original = Criteria::column("id").is(json!(7));
        let ctx = PluginContext::new(entity, PluginStage::Criteria)
            .with_last_result(PluginResult::Criteria(original.clone()));
        let criteria = plugin.apply(ctx).unwrap().take_criteria().unwrap();
        assert_eq!(criteria, original);
    }

    #[test]
    fn test_disabled_context_passes_through() {
        let (resolver, entity) = setup();
        let plugin = LogicDeletePlugin::new(resolver);
        let ctx = PluginContext::new(entity, PluginStage::Criteria).disabled();
        let ctx = plugin.apply(ctx).unwrap();
        assert!(!ctx.is_executed());
        assert!(ctx.take_result().is_none());
    }

    // =========================================================================
    // PluginChain Tests
    // =========================================================================

    #[test]
    fn test_chain_add_get_remove() {
        let (resolver, _) = setup();
        let chain = PluginChain::new();
        chain.add_plugin(Arc::new(LogicDeletePlugin::new(resolver)));
        assert!(chain.get(LOGIC_DELETE_PLUGIN).is_some());
        chain.remove_plugin(LOGIC_DELETE_PLUGIN);
        assert!(chain.get(LOGIC_DELETE_PLUGIN).is_none());
    }

    #[test]
    fn test_chain_run() {
        let (resolver, entity) = setup();
        let chain = PluginChain::new();
        chain.add_plugin(Arc::new(LogicDeletePlugin::new(resolver)));
        let ctx = PluginContext::new(entity, PluginStage::Criteria);
        let ctx = chain.run(LOGIC_DELETE_PLUGIN, ctx).unwrap();
        assert!(ctx.is_executed());
    }

    #[test]
    fn test_chain_unknown_plugin_errors() {
        let (_, entity) = setup();
        let chain = PluginChain::new();
        let ctx = PluginContext::new(entity, PluginStage::Criteria);
        assert!(chain.run("missing", ctx).is_err());
    }
}
