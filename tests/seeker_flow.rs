//! End-to-end flow: register entities, compile search requests, run the
//! logic-delete plugin over the compiled criteria, and generate ids.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use seeker_mapping::{
    Comparator, Criteria, EntityMetadata, EntityRegistry, Extend, FieldDescriptor, IdGenerator,
    LogicDeleteConfig, LogicDeletePlugin, LogicDeleteTag, LogicDeleteValueKind, MappingConfig,
    NamingPolicy, PageRequest, PluginChain, PluginContext, PluginResult, PluginStage,
    PolicyResolver, Probe, Rule, Seeker, SeekerCompiler, SnowflakeGenerator, SortDirection,
    Synapse, ValidationPolicy, LOGIC_DELETE_PLUGIN,
};
use serde_json::json;

fn build_resolver() -> (Arc<PolicyResolver>, Arc<EntityMetadata>) {
    let registry = Arc::new(EntityRegistry::new());
    let order = registry
        .register(EntityMetadata::new(
            "Order",
            vec![
                FieldDescriptor::new("id").id(),
                FieldDescriptor::new("orderNo").validation(ValidationPolicy::NotEmpty),
                FieldDescriptor::new("status").enum_type("OrderStatus"),
                FieldDescriptor::new("createdAt"),
                FieldDescriptor::new("deletedTime")
                    .logic_delete(LogicDeleteTag::new(LogicDeleteValueKind::DateTime)),
            ],
        ))
        .expect("register Order");
    registry.register_enum("OrderStatus", [("UNKNOWN", 0), ("PENDING", 1), ("SHIPPED", 2)]);

    let resolver = Arc::new(PolicyResolver::new(
        MappingConfig::builder()
            .naming_policy(NamingPolicy::CamelCaseToSnakeCase)
            .build(),
        LogicDeleteConfig::empty(),
        registry,
    ));
    (resolver, order)
}

// =============================================================================
// Compile + Plugin Flow Tests
// =============================================================================

#[test]
fn test_select_gains_undeleted_condition() {
    let (resolver, order) = build_resolver();
    let compiler = SeekerCompiler::new(Arc::clone(&resolver));

    let seeker = Seeker::new()
        .eq("orderNo", json!("A-100"))
        .add_probe(
            Probe::new("createdAt")
                .value(json!("2024-01-01"))
                .extend(Extend::Date),
        )
        .with_page(PageRequest::of(3, 20));
    let compiled = compiler.compile("Order", &seeker).expect("compile");

    let chain = PluginChain::new();
    chain.add_plugin(Arc::new(LogicDeletePlugin::new(Arc::clone(&resolver))));
    let ctx = PluginContext::new(order, PluginStage::Criteria)
        .with_last_result(PluginResult::Criteria(compiled.criteria));
    let criteria = chain
        .run(LOGIC_DELETE_PLUGIN, ctx)
        .expect("run plugin")
        .take_criteria()
        .expect("criteria result");

    // Exactly the caller's two conditions plus the injected marker condition
    assert_eq!(
        criteria,
        Criteria::column("order_no")
            .is(json!("A-100"))
            .and("created_at")
            .between(json!("2024-01-01 00:00:00"), json!("2024-01-01 23:59:59"))
            .and("deleted_time")
            .is(json!("1970-01-01 00:00:00"))
    );

    assert_eq!(compiled.page.offset, 40);
    assert_eq!(compiled.page.limit, 20);
    assert_eq!(compiled.page.current_page(), 3);
}

#[test]
fn test_delete_becomes_marker_update() {
    let (resolver, order) = build_resolver();
    let chain = PluginChain::new();
    chain.add_plugin(Arc::new(LogicDeletePlugin::new(resolver)));

    let ctx = PluginContext::new(order, PluginStage::Update);
    let update = chain
        .run(LOGIC_DELETE_PLUGIN, ctx)
        .expect("run plugin")
        .take_update()
        .expect("update result");

    let assignments = update.assignments();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].0, "deleted_time");
    let marker = assignments[0].1.as_str().expect("datetime marker");
    assert!(marker.starts_with("20"), "marker should be now, got {}", marker);
}

#[test]
fn test_compile_mixes_synapses_and_extensions() {
    let (resolver, _) = build_resolver();
    let compiler = SeekerCompiler::new(resolver);

    let seeker = Seeker::new()
        .add_probe(Probe::new("status").value(json!("PENDING")).extend(Extend::Enum))
        .add_probe(
            Probe::new("status")
                .value(json!("SHIPPED"))
                .extend(Extend::Enum)
                .synapse(Synapse::Or),
        )
        .add_probe(Probe::new("ignored").extend(Extend::Skip))
        .add_probe(
            Probe::new("createdAt")
                .value(json!(["2024-01-01", "2024-01-31 12:00:00"]))
                .rule(Rule::Between)
                .extend(Extend::Date),
        );
    let compiled = compiler.compile("Order", &seeker).expect("compile");

    assert_eq!(
        compiled.criteria,
        Criteria::column("status")
            .is(json!(1))
            .or("status")
            .is(json!(2))
            .and("created_at")
            .between(json!("2024-01-01 00:00:00"), json!("2024-01-31 12:00:00"))
    );
}

#[test]
fn test_query_probes_survive_validation_policies() {
    let (resolver, _) = build_resolver();
    let compiler = SeekerCompiler::new(resolver);

    // orderNo is NotEmpty at the field level, but validation gates persisted
    // values, not query predicates: the empty string compiles as a
    // comparison and the null probe takes its IS NULL fallback
    let seeker = Seeker::new()
        .eq("orderNo", json!(""))
        .add_probe(Probe::new("createdAt"))
        .add_probe(Probe::new("status").value(json!("PENDING")).extend(Extend::Enum));
    let compiled = compiler.compile("Order", &seeker).expect("compile");

    assert_eq!(
        compiled.criteria,
        Criteria::column("order_no")
            .is(json!(""))
            .and("created_at")
            .is_null()
            .and("status")
            .is(json!(1))
    );
}

#[test]
fn test_default_sort_and_explicit_sort() {
    let (resolver, _) = build_resolver();
    let compiler = SeekerCompiler::new(resolver);

    let unsorted = compiler.compile("Order", &Seeker::new()).expect("compile");
    assert_eq!(unsorted.sort.len(), 1);
    assert_eq!(unsorted.sort[0].column, "id");
    assert_eq!(unsorted.sort[0].direction, SortDirection::Desc);

    let sorted = compiler
        .compile(
            "Order",
            &Seeker::new().set_sorter("createdAt", SortDirection::Asc),
        )
        .expect("compile");
    assert_eq!(sorted.sort[0].column, "created_at");
    assert_eq!(sorted.sort[0].direction, SortDirection::Asc);
}

#[test]
fn test_eq_null_compiles_to_is_null() {
    let (resolver, _) = build_resolver();
    let compiler = SeekerCompiler::new(resolver);

    let seeker = Seeker::new().add_probe(Probe::new("createdAt"));
    let compiled = compiler.compile("Order", &seeker).expect("compile");
    match compiled.criteria {
        Criteria::Condition { comparator, value, .. } => {
            assert_eq!(comparator, Comparator::IsNull);
            assert!(value.is_none());
        }
        Criteria::Empty => panic!("expected a condition"),
    }
}

#[test]
fn test_seeker_round_trips_through_json() {
    let (resolver, _) = build_resolver();
    let compiler = SeekerCompiler::new(resolver);

    // The shape a caller would post over the wire
    let seeker: Seeker = serde_json::from_value(json!({
        "probes": [
            {"field": "orderNo", "value": "A-100"},
            {"field": "createdAt", "value": "2024-01-01", "rule": "GE", "extend": "DATE"}
        ],
        "sorters": [{"field": "createdAt", "direction": "DESC"}],
        "page": {"pageNumber": 2, "pageSize": 50, "needCount": false}
    }))
    .expect("deserialize seeker");

    let compiled = compiler.compile("Order", &seeker).expect("compile");
    assert_eq!(
        compiled.criteria,
        Criteria::column("order_no")
            .is(json!("A-100"))
            .and("created_at")
            .greater_than_or_equals(json!("2024-01-01 00:00:00"))
    );
    assert_eq!(compiled.page.offset, 50);
    assert!(!compiled.page.need_count);
}

// =============================================================================
// Identifier Tests
// =============================================================================

#[test]
fn test_generated_ids_are_unique_across_workers() {
    let a = SnowflakeGenerator::new(0, 1).expect("generator");
    let b = SnowflakeGenerator::new(0, 2).expect("generator");

    let mut ids = std::collections::HashSet::new();
    for _ in 0..10_000 {
        assert!(ids.insert(a.generate().expect("id")));
        assert!(ids.insert(b.generate().expect("id")));
    }
}

#[test]
fn test_effective_id_gates_insert() {
    let generator = SnowflakeGenerator::new(0, 0).expect("generator");
    // A zero id means "not yet persisted"; a generated id is effective
    assert!(!generator.is_effective(&0));
    let id = generator.generate().expect("id");
    assert!(generator.is_effective(&id));
}
