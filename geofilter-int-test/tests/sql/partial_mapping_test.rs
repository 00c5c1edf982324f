use geofilter::filter::{and, expression, function, literal, not, or, property, Filter, ValueReference};
use geofilter::sql::{
    build, AnsiDialect, PartialMappingPolicy, PostGisDialect, SortProperty, WhereBuilder,
};
use geofilter::{ErrorKind, GeoFilterResult};
use geofilter_int_test::test_util::{
    cleanup, create_test_context, project, run_test, sql_matches, TestContext,
};
use geofilter_spatial::FeatureXPathEvaluator;

/// Ids of the rows the database part of `filter` lets through.
fn superset(ctx: &TestContext, filter: &Filter) -> GeoFilterResult<Vec<String>> {
    let clause = build(
        &PostGisDialect,
        ctx.mapping(),
        filter,
        &[],
        PartialMappingPolicy::BestEffort,
    )?;
    Ok(ctx
        .features()
        .iter()
        .filter(|f| sql_matches(&clause.expression, &project(f)))
        .map(|f| f.id().to_string())
        .collect())
}

#[test]
fn test_strict_names_the_unmapped_reference() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter = or(vec![property("lanes").eq(2), property("surveyor").eq("Ada")]).into();
            let err = WhereBuilder::new(&PostGisDialect, ctx.mapping())
                .build(&filter, &[])
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::Unmappable("surveyor".to_string()));
            assert!(err.to_string().contains("surveyor"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_strict_rejects_functions() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter = expression(function("strlen", vec![])).gt(3).into();
            let err = WhereBuilder::new(&PostGisDialect, ctx.mapping())
                .build(&filter, &[])
                .unwrap_err();
            assert!(err.is_unmappable());
            assert_eq!(err.unmappable_reference(), Some("strlen()"));

            let name_length = function("strlen", vec![ValueReference::new("name").into()]);
            let filter: Filter = expression(name_length).gt(3).into();
            let err = WhereBuilder::new(&PostGisDialect, ctx.mapping())
                .build(&filter, &[])
                .unwrap_err();
            assert_eq!(err.unmappable_reference(), Some("name"));

            let surveyor_initial = function(
                "left",
                vec![ValueReference::new("surveyor").into(), literal(1)],
            );
            let filter: Filter = expression(surveyor_initial).eq("A").into();
            let err = WhereBuilder::new(&PostGisDialect, ctx.mapping())
                .build(&filter, &[])
                .unwrap_err();
            assert_eq!(err.unmappable_reference(), Some("surveyor"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_best_effort_returns_a_superset() {
    run_test(
        create_test_context,
        |ctx| {
            let filters: Vec<Filter> = vec![
                and(vec![property("lanes").eq(2), property("surveyor").eq("Ada")]).into(),
                or(vec![property("speed").gt(45), property("surveyor").eq("Grace")]).into(),
                not(and(vec![property("paved").eq(true), property("surveyor").eq("Ada")])).into(),
                property("surveyor").like("G*").into(),
            ];
            for filter in &filters {
                let exact = ctx.store().query(filter)?;
                let candidates = superset(&ctx, filter)?;
                for feature in &exact {
                    assert!(
                        candidates.contains(&feature.id().to_string()),
                        "{} missing from the candidates of {}",
                        feature.id(),
                        filter
                    );
                }

                let clause = build(
                    &PostGisDialect,
                    ctx.mapping(),
                    filter,
                    &[],
                    PartialMappingPolicy::BestEffort,
                )?;
                assert!(!clause.is_exact());
                let post = clause.post_filter.as_ref().map(|f| f.to_string());
                assert_eq!(post, Some(filter.to_string()));
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_best_effort_keeps_mapped_conjuncts() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter = and(vec![property("lanes").eq(2), property("surveyor").eq("Ada")]).into();
            let clause = WhereBuilder::new(&AnsiDialect, ctx.mapping())
                .with_policy(PartialMappingPolicy::BestEffort)
                .build(&filter, &[])?;
            assert_eq!(clause.where_sql, "\"roads\".\"lanes\" = ?");
            assert_eq!(clause.parameters.len(), 1);
            assert_eq!(superset(&ctx, &filter)?.len(), 5);

            let applied: Vec<String> = ctx
                .features()
                .iter()
                .filter(|f| sql_matches(&clause.expression, &project(f)))
                .filter(|f| {
                    clause
                        .post_filter
                        .as_ref()
                        .map(|post| post.evaluate(*f, &FeatureXPathEvaluator).unwrap_or(false))
                        .unwrap_or(true)
                })
                .map(|f| f.id().to_string())
                .collect();
            assert_eq!(applied, vec!["road.8", "road.10"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unmapped_sort_moves_to_post_sort() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter = property("paved").eq(true).into();
            let sort = vec![SortProperty::ascending("lanes"), SortProperty::descending("surveyor")];
            let clause = WhereBuilder::new(&PostGisDialect, ctx.mapping())
                .with_policy(PartialMappingPolicy::BestEffort)
                .build_with_sort_properties(&filter, &sort)?;
            assert!(clause.order_by.is_none());
            assert_eq!(clause.post_sort, sort);
            assert!(clause.post_filter.is_none());
            assert!(!clause.to_select(&PostGisDialect, &[], Some(3)).contains("LIMIT"));

            let mapped = WhereBuilder::new(&PostGisDialect, ctx.mapping())
                .build_with_sort_properties(&filter, &[SortProperty::descending("speed")])?;
            assert_eq!(mapped.order_by.as_deref(), Some("\"roads\".\"max_speed\" DESC"));
            assert!(mapped.to_select(&PostGisDialect, &[], Some(3)).ends_with("LIMIT 3"));

            let speeds: Vec<f64> = ctx
                .features()
                .iter()
                .filter(|f| sql_matches(&mapped.expression, &project(f)))
                .filter_map(|f| project(f).get("max_speed").and_then(|v| v.as_f64()))
                .collect();
            assert_eq!(speeds.len(), 8);
            Ok(())
        },
        cleanup,
    )
}
