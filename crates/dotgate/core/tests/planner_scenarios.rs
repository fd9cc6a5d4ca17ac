// End to end planning scenarios: analyze a query document, plan it against a
// small catalog and check the shape of the resulting operator tree.
use dotgate_common::{ErrorKind, PlannerError};
use dotgate_core::planner::{PhysicalOperator, QueryPlanner, RouteOpcode, describe};
use dotgate_core::query::{LeftJoinSpec, Lock, QuerySpec, SelectSpec, Statement, TableRef, UnionSpec, analyze};
use dotgate_core::semantics::Expr;
use dotgate_core::{PlannerConfig, VSchemaCatalog};

const VSCHEMA: &str = r#"{
    "keyspaces": {
        "main": {
            "tables": {
                "unsharded_a": {},
                "unsharded_b": {},
                "main_ref": { "type": "reference" },
                "seq": { "type": "sequence" }
            }
        },
        "other": {
            "sharded": true,
            "vindexes": { "other_index": { "type": "hash" } },
            "tables": {
                "other_t": { "column_vindexes": [{ "column": "id", "name": "other_index" }] }
            }
        },
        "user": {
            "sharded": true,
            "vindexes": {
                "user_index": { "type": "hash" },
                "music_index": { "type": "hash" },
                "name_lookup": { "type": "lookup" }
            },
            "tables": {
                "user": {
                    "column_vindexes": [
                        { "column": "id", "name": "user_index" },
                        { "column": "name", "name": "name_lookup" }
                    ]
                },
                "user_extra": { "column_vindexes": [{ "column": "user_id", "name": "user_index" }] },
                "music": { "column_vindexes": [{ "column": "id", "name": "music_index" }] },
                "ref_country": { "type": "reference" },
                "pinned_t": { "pinned": "80" }
            }
        }
    },
    "routing_rules": [{ "from_table": "routed", "to_table": "user.user" }]
}"#;

fn catalog() -> VSchemaCatalog {
    VSchemaCatalog::from_json(VSCHEMA).expect("test vschema is valid")
}

fn select(from: Vec<TableRef>, predicates: Vec<Expr>) -> QuerySpec {
    QuerySpec::Select(SelectSpec {
        from,
        predicates,
        columns: vec!["1".into()],
        ..Default::default()
    })
}

fn columns(spec: QuerySpec, n: usize) -> QuerySpec {
    match spec {
        QuerySpec::Select(mut select) => {
            select.columns = (0..n).map(|i| format!("c{i}")).collect();
            QuerySpec::Select(select)
        }
        other => other,
    }
}

fn union(distinct: bool, arms: Vec<QuerySpec>) -> QuerySpec {
    QuerySpec::Union(UnionSpec {
        distinct,
        with: None,
        lock: Lock::None,
        arms,
    })
}

fn plan(spec: &QuerySpec) -> Result<PhysicalOperator, PlannerError> {
    let catalog = catalog();
    let statement: Statement = analyze(spec)?;
    Ok(QueryPlanner::new(&catalog).plan(&statement)?.expect("statement references tables"))
}

fn route_of(op: &PhysicalOperator) -> &dotgate_core::planner::Route {
    op.as_route().unwrap_or_else(|| panic!("expected a single route, got {op:?}"))
}

#[test]
fn test_unsharded_tables_without_predicates_fuse() {
    let op = plan(&select(vec![TableRef::new("unsharded_a"), TableRef::new("unsharded_b")], vec![])).unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::Unsharded);
    assert_eq!(route.keyspace.name, "main");
    assert_eq!(route.table_id().num_tables(), 2);
}

#[test]
fn test_same_unique_vindex_join_fuses_to_equal_unique() {
    let op = plan(&select(
        vec![TableRef::aliased("user", "u"), TableRef::aliased("user_extra", "ue")],
        vec![Expr::eq(Expr::col("u", "id"), Expr::col("ue", "user_id")), Expr::eq(Expr::col("u", "id"), Expr::int(5))],
    ))
    .unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::EqualUnique);
    assert_eq!(route.selected_vindex().unwrap().name, "user_index");
    assert_eq!(route.table_id().num_tables(), 2);
    assert_eq!(describe(&op).values, vec!["INT64(5)".to_string()]);
}

#[test]
fn test_same_unique_vindex_join_without_literal_scatters() {
    let op = plan(&select(
        vec![TableRef::aliased("user", "u"), TableRef::aliased("user_extra", "ue")],
        vec![Expr::eq(Expr::col("u", "id"), Expr::col("ue", "user_id"))],
    ))
    .unwrap();
    assert_eq!(route_of(&op).opcode, RouteOpcode::Scatter);
}

#[test]
fn test_different_vindexes_join_at_the_proxy() {
    let op = plan(&select(
        vec![TableRef::aliased("user", "u"), TableRef::aliased("music", "m")],
        vec![Expr::eq(Expr::col("u", "id"), Expr::col("m", "id")), Expr::eq(Expr::col("u", "id"), Expr::int(5))],
    ))
    .unwrap();
    let PhysicalOperator::ApplyJoin(join) = &op else {
        panic!("expected an apply join, got {op:?}");
    };
    assert_eq!(route_of(&join.lhs).opcode, RouteOpcode::EqualUnique);
    // The right side is narrowed by the value the left side binds.
    let rhs = route_of(&join.rhs);
    assert_eq!(rhs.opcode, RouteOpcode::EqualUnique);
    assert_eq!(rhs.selected_vindex().unwrap().name, "music_index");
    assert_eq!(rhs.vindex_expressions(), &[Expr::arg("u_id")]);
    assert_eq!(join.vars.get("u_id"), Some(&0));
    assert!(join.predicate.is_some());
}

#[test]
fn test_narrow_side_drives_the_join_in_any_from_order() {
    let predicates = vec![Expr::eq(Expr::col("m", "id"), Expr::int(5)), Expr::eq(Expr::col("u", "id"), Expr::col("m", "id"))];
    for from in [
        vec![TableRef::aliased("music", "m"), TableRef::aliased("user", "u")],
        vec![TableRef::aliased("user", "u"), TableRef::aliased("music", "m")],
    ] {
        let op = plan(&select(from, predicates.clone())).unwrap();
        let PhysicalOperator::ApplyJoin(join) = &op else {
            panic!("expected an apply join, got {op:?}");
        };
        assert_eq!(op.cost(), 2);
        assert_eq!(route_of(&join.lhs).selected_vindex().unwrap().name, "music_index");
        assert_eq!(route_of(&join.rhs).opcode, RouteOpcode::EqualUnique);
        assert_eq!(route_of(&join.rhs).vindex_expressions(), &[Expr::arg("m_id")]);
    }
}

#[test]
fn test_scatter_cross_join_is_never_fused() {
    let op = plan(&select(vec![TableRef::aliased("user", "u"), TableRef::aliased("music", "m")], vec![])).unwrap();
    let PhysicalOperator::ApplyJoin(join) = &op else {
        panic!("expected an apply join, got {op:?}");
    };
    assert!(join.vars.is_empty());
    assert!(op.routes().iter().all(|r| r.opcode == RouteOpcode::Scatter));
    assert_eq!(op.routes().len(), 2);
}

#[test]
fn test_union_column_count_mismatch_is_a_user_error() {
    let spec = union(
        true,
        vec![columns(select(vec![TableRef::new("user")], vec![]), 3), columns(select(vec![TableRef::new("user_extra")], vec![]), 4)],
    );
    let err = plan(&spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UserQuery);
    let PlannerError::Statement(stmt) = &err else {
        panic!("expected a statement error, got {err:?}");
    };
    assert_eq!(stmt.num, 1222);
    assert_eq!(stmt.state, "21000");
    assert!(err.to_string().starts_with("The used SELECT statements have a different number of columns"));
}

#[test]
fn test_reference_table_adopts_other_side() {
    let op = plan(&select(
        vec![TableRef::aliased("user", "u"), TableRef::aliased("ref_country", "c")],
        vec![Expr::eq(Expr::col("u", "id"), Expr::int(7))],
    ))
    .unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::EqualUnique);
    assert_eq!(route.keyspace.name, "user");
    assert_eq!(route.selected_vindex().unwrap().name, "user_index");
}

#[test]
fn test_reference_first_still_adopts_other_side() {
    let op = plan(&select(vec![TableRef::aliased("ref_country", "c"), TableRef::aliased("user", "u")], vec![])).unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::Scatter);
    assert_eq!(route.keyspace.name, "user");
}

#[test]
fn test_dual_fuses_with_any_keyspace() {
    let op = plan(&select(vec![TableRef::aliased("user", "u"), TableRef::new("dual")], vec![])).unwrap();
    let route = route_of(&op);
    assert_eq!(route.keyspace.name, "user");
    assert_eq!(route.opcode, RouteOpcode::Scatter);
}

#[test]
fn test_reference_in_other_keyspace_is_joined() {
    let op = plan(&select(vec![TableRef::aliased("user", "u"), TableRef::aliased("main_ref", "r")], vec![])).unwrap();
    assert!(matches!(op, PhysicalOperator::ApplyJoin(_)));
}

#[test]
fn test_pinned_table_routes_to_its_keyspace_id() {
    let op = plan(&select(vec![TableRef::new("pinned_t")], vec![])).unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::EqualUnique);
    assert_eq!(describe(&op).values, vec!["KEYSPACE_ID(80)".to_string()]);
}

#[test]
fn test_sequence_and_information_schema() {
    let op = plan(&select(vec![TableRef::new("seq")], vec![])).unwrap();
    assert_eq!(route_of(&op).opcode, RouteOpcode::Next);

    let op = plan(&select(
        vec![TableRef::new("tables").in_keyspace("information_schema"), TableRef::new("columns").in_keyspace("information_schema")],
        vec![],
    ))
    .unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::Dba);
    assert_eq!(route.table_id().num_tables(), 2);
}

#[test]
fn test_in_list_and_single_value_in() {
    let op = plan(&select(vec![TableRef::new("user")], vec![Expr::in_list(Expr::col("user", "id"), vec![Expr::int(1), Expr::int(2)])])).unwrap();
    assert_eq!(route_of(&op).opcode, RouteOpcode::In);

    let op = plan(&select(vec![TableRef::new("user")], vec![Expr::in_list(Expr::col("user", "id"), vec![Expr::int(1)])])).unwrap();
    assert_eq!(route_of(&op).opcode, RouteOpcode::EqualUnique);
}

#[test]
fn test_null_comparisons_need_no_shard() {
    let cases = vec![
        Expr::eq(Expr::col("user", "id"), Expr::Null),
        Expr::in_list(Expr::col("user", "id"), vec![Expr::Null]),
        Expr::compare(dotgate_core::semantics::ComparisonOp::NotIn, Expr::col("user", "id"), Expr::Tuple(vec![Expr::int(1), Expr::Null])),
    ];
    for predicate in cases {
        let op = plan(&select(vec![TableRef::new("user")], vec![predicate.clone()])).unwrap();
        assert_eq!(route_of(&op).opcode, RouteOpcode::None, "predicate {predicate}");
    }
}

#[test]
fn test_unique_vindex_beats_lookup_in_any_order() {
    let by_name = Expr::eq(Expr::col("user", "name"), Expr::string("ada"));
    let by_id = Expr::eq(Expr::col("user", "id"), Expr::int(1));

    let op = plan(&select(vec![TableRef::new("user")], vec![by_name.clone()])).unwrap();
    assert_eq!(route_of(&op).opcode, RouteOpcode::Equal);

    for predicates in [vec![by_name.clone(), by_id.clone()], vec![by_id.clone(), by_name.clone()]] {
        let op = plan(&select(vec![TableRef::new("user")], predicates)).unwrap();
        let route = route_of(&op);
        assert_eq!(route.opcode, RouteOpcode::EqualUnique);
        assert_eq!(route.selected_vindex().unwrap().name, "user_index");
    }
}

#[test]
fn test_equal_cost_options_keep_the_first() {
    let op = plan(&select(
        vec![TableRef::new("user")],
        vec![Expr::eq(Expr::col("user", "id"), Expr::int(1)), Expr::eq(Expr::col("user", "id"), Expr::int(2))],
    ))
    .unwrap();
    assert_eq!(route_of(&op).vindex_expressions(), &[Expr::int(1)]);
}

#[test]
fn test_left_join_on_shard_key_fuses() {
    let spec = QuerySpec::Select(SelectSpec {
        from: vec![TableRef::aliased("user", "u")],
        left_joins: vec![LeftJoinSpec {
            table: TableRef::aliased("user_extra", "ue"),
            on: vec![Expr::eq(Expr::col("u", "id"), Expr::col("ue", "user_id"))],
        }],
        columns: vec!["1".into()],
        ..Default::default()
    });
    let op = plan(&spec).unwrap();
    let route = route_of(&op);
    let PhysicalOperator::ApplyJoin(join) = route.source.as_ref() else {
        panic!("expected a join inside the route");
    };
    assert!(join.left_join);
}

fn left_join(outer: TableRef, predicates: Vec<Expr>, inner: TableRef, on: Vec<Expr>) -> QuerySpec {
    QuerySpec::Select(SelectSpec {
        from: vec![outer],
        predicates,
        left_joins: vec![LeftJoinSpec { table: inner, on }],
        columns: vec!["1".into()],
        ..Default::default()
    })
}

#[test]
fn test_left_join_condition_on_joined_table_keeps_every_shard() {
    let op = plan(&left_join(
        TableRef::aliased("user", "u"),
        vec![],
        TableRef::aliased("user_extra", "ue"),
        vec![Expr::eq(Expr::col("u", "id"), Expr::col("ue", "user_id")), Expr::eq(Expr::col("ue", "user_id"), Expr::int(5))],
    ))
    .unwrap();
    let route = route_of(&op);
    assert_eq!(route.table_id().num_tables(), 2);
    assert_eq!(route.opcode, RouteOpcode::Scatter);
    assert!(route.selected.is_none());
    // The condition still travels with the join inside the route.
    let PhysicalOperator::ApplyJoin(join) = route.source.as_ref() else {
        panic!("expected a join inside the route");
    };
    assert!(join.left_join);
    assert!(describe(&op).predicates.contains(&"ue.user_id = 5".to_string()));
}

#[test]
fn test_left_join_null_condition_keeps_outer_rows() {
    let op = plan(&left_join(
        TableRef::aliased("user", "u"),
        vec![],
        TableRef::aliased("user_extra", "ue"),
        vec![Expr::eq(Expr::col("u", "id"), Expr::col("ue", "user_id")), Expr::eq(Expr::col("ue", "user_id"), Expr::Null)],
    ))
    .unwrap();
    let route = route_of(&op);
    assert_eq!(route.table_id().num_tables(), 2);
    assert_eq!(route.opcode, RouteOpcode::Scatter);
}

#[test]
fn test_left_join_routes_by_the_outer_side() {
    let op = plan(&left_join(
        TableRef::aliased("user", "u"),
        vec![Expr::eq(Expr::col("u", "id"), Expr::int(5))],
        TableRef::aliased("user_extra", "ue"),
        vec![Expr::eq(Expr::col("u", "id"), Expr::col("ue", "user_id")), Expr::eq(Expr::col("ue", "user_id"), Expr::int(7))],
    ))
    .unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::EqualUnique);
    assert_eq!(describe(&op).values, vec!["INT64(5)".to_string()]);
}

#[test]
fn test_reference_outer_side_is_not_spread_over_shards() {
    let on = vec![Expr::eq(Expr::col("c", "id"), Expr::col("u", "country_id"))];
    let op = plan(&left_join(TableRef::aliased("ref_country", "c"), vec![], TableRef::aliased("user", "u"), on)).unwrap();
    let PhysicalOperator::ApplyJoin(join) = &op else {
        panic!("expected an apply join, got {op:?}");
    };
    assert!(join.left_join);
    assert_eq!(route_of(&join.lhs).opcode, RouteOpcode::Reference);
    assert_eq!(route_of(&join.rhs).opcode, RouteOpcode::Scatter);

    // The other way round the sharded side decides and the reference table rides along.
    let on = vec![Expr::eq(Expr::col("u", "country_id"), Expr::col("c", "id"))];
    let op = plan(&left_join(TableRef::aliased("user", "u"), vec![], TableRef::aliased("ref_country", "c"), on)).unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::Scatter);
    assert_eq!(route.table_id().num_tables(), 2);
}

#[test]
fn test_statement_without_tables_is_a_no_op() {
    let catalog = catalog();
    let statement = analyze(&select(vec![], vec![])).unwrap();
    assert_eq!(QueryPlanner::new(&catalog).plan(&statement), Ok(None));
}

#[test]
fn test_left_join_across_keyspaces_binds_outer_columns() {
    let spec = QuerySpec::Select(SelectSpec {
        from: vec![TableRef::aliased("user", "u")],
        left_joins: vec![LeftJoinSpec {
            table: TableRef::aliased("unsharded_a", "a"),
            on: vec![Expr::eq(Expr::col("u", "id"), Expr::col("a", "id"))],
        }],
        columns: vec!["1".into()],
        ..Default::default()
    });
    let op = plan(&spec).unwrap();
    let PhysicalOperator::ApplyJoin(join) = &op else {
        panic!("expected an apply join, got {op:?}");
    };
    assert!(join.left_join);
    assert!(join.vars.contains_key("u_id"));
}

#[test]
fn test_routing_rule_redirects_table() {
    let op = plan(&select(vec![TableRef::new("routed")], vec![Expr::eq(Expr::col("routed", "id"), Expr::int(3))])).unwrap();
    let route = route_of(&op);
    assert_eq!(route.keyspace.name, "user");
    assert_eq!(route.opcode, RouteOpcode::EqualUnique);
    let tables = op.table_ops();
    assert_eq!(tables[0].qtable.table.to_string(), "user.user");
    assert_eq!(tables[0].qtable.alias, "routed");
}

#[test]
fn test_lookup_failures_propagate() {
    let err = plan(&select(vec![TableRef::new("nope")], vec![])).unwrap_err();
    assert_eq!(err, PlannerError::TableNotFound("nope".into()));
    assert_eq!(err.kind(), ErrorKind::Lookup);
}

#[test]
fn test_planning_is_deterministic() {
    let spec = select(
        vec![
            TableRef::aliased("user", "u"),
            TableRef::aliased("music", "m"),
            TableRef::aliased("user_extra", "ue"),
            TableRef::aliased("unsharded_a", "a"),
        ],
        vec![
            Expr::eq(Expr::col("u", "id"), Expr::col("ue", "user_id")),
            Expr::eq(Expr::col("m", "id"), Expr::col("ue", "x")),
            Expr::eq(Expr::col("a", "id"), Expr::col("m", "y")),
        ],
    );
    let first = plan(&spec).unwrap();
    let second = plan(&spec).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.check_disjoint().unwrap().num_tables(), 4);
}

#[test]
fn test_constant_predicates_reach_the_plan() {
    let op = plan(&select(vec![TableRef::new("unsharded_a")], vec![Expr::eq(Expr::int(1), Expr::int(1))])).unwrap();
    assert_eq!(describe(&op).predicates, vec!["1 = 1".to_string()]);
}

#[test]
fn test_correlated_subquery_across_keyspaces_is_unsupported() {
    let catalog = catalog();
    let statement = analyze(&select(vec![TableRef::aliased("user", "u"), TableRef::aliased("other_t", "o")], vec![])).unwrap();
    let planner = QueryPlanner::new(&catalog);
    let op = planner.plan(&statement).unwrap().unwrap();
    let routes = op.routes();
    let (outer, inner) = (PhysicalOperator::Route(routes[0].clone()), PhysicalOperator::Route(routes[1].clone()));

    let predicates = vec![Expr::eq(Expr::col("u", "id"), Expr::col("o", "id"))];
    let err = planner.merge_correlated_subquery(&statement, &outer, &inner, &predicates).unwrap_err();
    assert_eq!(err, PlannerError::unsupported("cross-shard correlated subquery"));

    // The same pair in a join falls back to the proxy.
    let joined = plan(&select(vec![TableRef::aliased("user", "u"), TableRef::aliased("other_t", "o")], predicates)).unwrap();
    assert!(matches!(joined, PhysicalOperator::ApplyJoin(_)));
}

#[test]
fn test_union_of_unsharded_arms_is_one_route() {
    let spec = union(false, vec![select(vec![TableRef::new("unsharded_a")], vec![]), select(vec![TableRef::new("unsharded_b")], vec![])]);
    let op = plan(&spec).unwrap();
    let route = route_of(&op);
    assert_eq!(route.opcode, RouteOpcode::Unsharded);
    assert!(matches!(route.source.as_ref(), PhysicalOperator::Union(u) if u.sources.len() == 2 && !u.distinct));
}

#[test]
fn test_scatter_union_merges_only_without_distinct() {
    let arms = || vec![select(vec![TableRef::new("user")], vec![]), select(vec![TableRef::new("user_extra")], vec![])];

    let op = plan(&union(false, arms())).unwrap();
    assert_eq!(route_of(&op).opcode, RouteOpcode::Scatter);

    let op = plan(&union(true, arms())).unwrap();
    let PhysicalOperator::Union(concat) = &op else {
        panic!("expected a proxy union, got {op:?}");
    };
    assert!(concat.distinct);
    assert_eq!(concat.sources.len(), 2);
}

#[test]
fn test_union_on_same_shard_merges_with_distinct() {
    let arm = |table: &str, column: &str| select(vec![TableRef::new(table)], vec![Expr::eq(Expr::col(table, column), Expr::int(1))]);
    let op = plan(&union(true, vec![arm("user", "id"), arm("user_extra", "user_id")])).unwrap();
    assert_eq!(route_of(&op).opcode, RouteOpcode::EqualUnique);

    let op = plan(&union(true, vec![arm("user", "id"), arm("music", "id")])).unwrap();
    assert!(matches!(op, PhysicalOperator::Union(_)));
}

#[test]
fn test_union_arms_with_different_locks_stay_apart() {
    let mut locked = select(vec![TableRef::new("unsharded_a")], vec![]);
    if let QuerySpec::Select(select) = &mut locked {
        select.lock = Lock::ForUpdate;
    }
    let op = plan(&union(false, vec![locked, select(vec![TableRef::new("unsharded_b")], vec![])])).unwrap();
    let PhysicalOperator::Union(concat) = &op else {
        panic!("expected a proxy union, got {op:?}");
    };
    assert_eq!(concat.sources[0].as_route().unwrap().lock, Lock::ForUpdate);
    assert_eq!(concat.sources[1].as_route().unwrap().lock, Lock::None);
}

#[test]
fn test_union_merge_can_be_disabled() {
    let catalog = catalog();
    let spec = union(false, vec![select(vec![TableRef::new("unsharded_a")], vec![]), select(vec![TableRef::new("unsharded_b")], vec![])]);
    let statement = analyze(&spec).unwrap();
    let config = PlannerConfig {
        union_merge: false,
        ..Default::default()
    };
    let op = QueryPlanner::with_config(&catalog, config).plan(&statement).unwrap().unwrap();
    assert!(matches!(op, PhysicalOperator::Union(_)));
}

#[test]
fn test_unsupported_union_shapes() {
    let arms = || vec![select(vec![TableRef::new("user")], vec![]), select(vec![TableRef::new("user_extra")], vec![])];

    let with = QuerySpec::Union(UnionSpec {
        distinct: false,
        with: Some("cte".into()),
        lock: Lock::None,
        arms: arms(),
    });
    assert_eq!(plan(&with).unwrap_err(), PlannerError::unsupported("with expression in union statement"));

    let mut found_rows = arms();
    if let QuerySpec::Select(select) = &mut found_rows[0] {
        select.calc_found_rows = true;
    }
    assert_eq!(plan(&union(false, found_rows)).unwrap_err(), PlannerError::unsupported("SQL_CALC_FOUND_ROWS not supported with union"));
}

#[test]
fn test_explain_json() {
    let op = plan(&select(vec![TableRef::new("user")], vec![Expr::eq(Expr::col("user", "id"), Expr::int(1))])).unwrap();
    let json = serde_json::to_value(describe(&op)).unwrap();
    assert_eq!(json["operator_type"], "Route");
    assert_eq!(json["variant"], "EqualUnique");
    assert_eq!(json["keyspace"], "user");
    assert_eq!(json["vindex"], "user_index");
    assert_eq!(json["tables"][0], "user");
    assert!(describe(&op).to_string().starts_with("Route EqualUnique keyspace=user vindex=user_index"));
}

#[test]
fn test_cli_samples_plan() {
    let catalog = VSchemaCatalog::from_json(include_str!("../../cli/samples/vschema.json")).unwrap();
    let planner = QueryPlanner::new(&catalog);

    let join: QuerySpec = serde_json::from_str(include_str!("../../cli/samples/join_query.json")).unwrap();
    let op = planner.plan(&analyze(&join).unwrap()).unwrap().unwrap();
    let PhysicalOperator::ApplyJoin(apply) = &op else {
        panic!("expected an apply join, got {op:?}");
    };
    assert_eq!(route_of(&apply.lhs).opcode, RouteOpcode::EqualUnique);
    assert_eq!(route_of(&apply.lhs).table_id().num_tables(), 2);
    assert_eq!(route_of(&apply.rhs).opcode, RouteOpcode::Scatter);

    let union: QuerySpec = serde_json::from_str(include_str!("../../cli/samples/union_query.json")).unwrap();
    let op = planner.plan(&analyze(&union).unwrap()).unwrap().unwrap();
    assert_eq!(route_of(&op).opcode, RouteOpcode::EqualUnique);
}
