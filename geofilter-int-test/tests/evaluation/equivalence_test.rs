use geofilter::filter::{and, ids, not, or, property, Filter};
use geofilter::geometry::{Coordinate, Geometry};
use geofilter::sql::{PartialMappingPolicy, PostGisDialect, WhereBuilder};
use geofilter::GeoFilterResult;
use geofilter_int_test::test_util::{
    cleanup, create_context, create_rtree_test_context, create_test_context, project, random_operator,
    random_roads, run_test, sql_matches, TestContext,
};
use geofilter_spatial::{Feature, FeatureXPathEvaluator, IndexKind};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Ids the store returns for `filter`.
fn store_ids(ctx: &TestContext, filter: &Filter) -> GeoFilterResult<Vec<String>> {
    Ok(ctx
        .store()
        .query(filter)?
        .iter()
        .map(|f| f.id().to_string())
        .collect())
}

/// Ids a database would return for the compiled clause, after the post
/// filter is applied.
fn sql_ids(ctx: &TestContext, filter: &Filter, policy: PartialMappingPolicy) -> GeoFilterResult<Vec<String>> {
    let clause = WhereBuilder::new(&PostGisDialect, ctx.mapping())
        .with_policy(policy)
        .build(filter, &[])?;
    let mut result = Vec::new();
    for feature in ctx.features() {
        if !sql_matches(&clause.expression, &project(feature)) {
            continue;
        }
        let keep = match &clause.post_filter {
            Some(post) => post.evaluate(feature, &FeatureXPathEvaluator)?,
            None => true,
        };
        if keep {
            result.push(feature.id().to_string());
        }
    }
    Ok(result)
}

fn assert_equivalent(ctx: &TestContext, filter: &Filter) -> GeoFilterResult<()> {
    let expected = store_ids(ctx, filter)?;
    let actual = sql_ids(ctx, filter, PartialMappingPolicy::Strict)?;
    assert_eq!(actual, expected, "filter {}", filter);
    Ok(())
}

fn names(features: &[Feature]) -> Vec<String> {
    features
        .iter()
        .filter_map(|f| f.property("name"))
        .filter_map(|values| match values.first() {
            Some(geofilter_spatial::PropertyValue::Value(value)) => value.as_text(),
            _ => None,
        })
        .collect()
}

#[test]
fn test_comparisons_agree() {
    run_test(
        create_test_context,
        |ctx| {
            let filters: Vec<Filter> = vec![
                property("name").eq("Main Street").into(),
                property("name").ignore_case().eq("MAIN STREET").into(),
                property("lanes").ge(2).into(),
                property("speed").lt(30).into(),
                property("speed").between(20, 40).into(),
                property("paved").eq(false).into(),
                property("name").is_null().into(),
            ];
            for filter in &filters {
                assert_equivalent(&ctx, filter)?;
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_case_insensitive_equality() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter = property("name").ignore_case().eq("MAIN STREET").into();
            let found = ctx.store().query(&filter)?;
            assert_eq!(names(&found), vec!["Main Street", "main street"]);
            assert_equivalent(&ctx, &filter)
        },
        cleanup,
    )
}

#[test]
fn test_like_patterns_agree() {
    run_test(
        create_test_context,
        |ctx| {
            let cases = vec![
                (property("name").like("Main*"), vec!["Main Street", "Main Road"]),
                (
                    property("name").ignore_case().like("main s*"),
                    vec!["Main Street", "main street"],
                ),
                (property("name").like("50%*"), vec!["50% Hill"]),
                (property("name").like("Quay_*"), vec!["Quay_Side"]),
                (property("name").like("?i*"), vec!["High Street", "Mill Lane", "Ring Road"]),
            ];
            for (op, expected) in cases {
                let filter: Filter = op.into();
                let found = ctx.store().query(&filter)?;
                assert_eq!(names(&found), expected, "filter {}", filter);
                assert_equivalent(&ctx, &filter)?;
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_spatial_operators_agree() {
    run_test(
        create_rtree_test_context,
        |ctx| {
            let area = Geometry::envelope_of(15.0, 0.0, 65.0, 45.0);
            let filters: Vec<Filter> = vec![
                property("geometry").bbox(area.clone()).into(),
                property("geometry").intersects(area.clone()).into(),
                property("geometry").within(area.clone()).into(),
                property("geometry").contains(Geometry::point(21.0, 30.0)).into(),
                property("geometry").disjoint(area.clone()).into(),
                property("geometry").equals(Geometry::envelope_of(40.0, 40.0, 60.0, 42.0)).into(),
                property("geometry").overlaps(area.clone()).into(),
                property("geometry").dwithin(Geometry::point(50.0, 45.0), 5.0).into(),
                property("geometry").beyond(Geometry::point(50.0, 45.0), 5.0).into(),
            ];
            for filter in &filters {
                assert_equivalent(&ctx, filter)?;
            }

            let found = store_ids(&ctx, &filters[2])?;
            assert_eq!(found, vec!["road.3".to_string()]);
            assert_eq!(store_ids(&ctx, &filters[5])?, vec!["road.3".to_string()]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_spatial_operators_agree_on_shared_edges() {
    run_test(
        create_rtree_test_context,
        |ctx| {
            // shares the x = 22 edge with Main Road only
            let beside = Geometry::envelope_of(22.0, 0.0, 30.0, 8.0);
            let filters: Vec<Filter> = vec![
                property("geometry").bbox(beside.clone()).into(),
                property("geometry").intersects(beside.clone()).into(),
                property("geometry").within(beside.clone()).into(),
                property("geometry").contains(beside.clone()).into(),
                property("geometry").disjoint(beside.clone()).into(),
                property("geometry").overlaps(beside.clone()).into(),
                property("geometry").dwithin(beside.clone(), 0.0).into(),
                property("geometry").beyond(beside.clone(), 0.0).into(),
            ];
            for filter in &filters {
                assert_equivalent(&ctx, filter)?;
            }

            assert_eq!(store_ids(&ctx, &filters[5])?, vec!["road.2".to_string()]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_spatial_operators_agree_on_non_rectangular_literal() {
    run_test(
        create_test_context,
        |ctx| {
            // High Street lies outside the triangle but inside its bounding box
            let triangle = Geometry::polygon(vec![
                Coordinate::new(10.0, 0.0),
                Coordinate::new(70.0, 0.0),
                Coordinate::new(10.0, 60.0),
                Coordinate::new(10.0, 0.0),
            ]);
            let filters: Vec<Filter> = vec![
                property("geometry").intersects(triangle.clone()).into(),
                property("geometry").within(triangle.clone()).into(),
                property("geometry").contains(triangle.clone()).into(),
                property("geometry").disjoint(triangle.clone()).into(),
                property("geometry").overlaps(triangle.clone()).into(),
                property("geometry").dwithin(triangle.clone(), 3.0).into(),
                property("geometry").beyond(triangle.clone(), 3.0).into(),
            ];
            for filter in &filters {
                assert_equivalent(&ctx, filter)?;
            }

            let within = store_ids(&ctx, &filters[1])?;
            assert!(within.contains(&"road.3".to_string()));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_touches_is_left_to_the_post_filter() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter = property("geometry")
                .touches(Geometry::envelope_of(60.0, 42.0, 70.0, 50.0))
                .into();
            let err = WhereBuilder::new(&PostGisDialect, ctx.mapping())
                .build(&filter, &[])
                .unwrap_err();
            assert_eq!(err.unmappable_reference(), Some("geometry"));

            let expected = store_ids(&ctx, &filter)?;
            assert_eq!(expected, vec!["road.3".to_string()]);
            assert_eq!(sql_ids(&ctx, &filter, PartialMappingPolicy::BestEffort)?, expected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_logical_combinations_agree() {
    run_test(
        create_test_context,
        |ctx| {
            let filters: Vec<Filter> = vec![
                and(vec![property("lanes").eq(2), property("paved").eq(true)]).into(),
                or(vec![property("lanes").gt(3), property("name").like("*Lane")]).into(),
                not(property("lanes").eq(2)).into(),
                not(or(vec![
                    property("speed").ge(50),
                    property("geometry").bbox(Geometry::envelope_of(0.0, 0.0, 10.0, 10.0)),
                ]))
                .into(),
            ];
            for filter in &filters {
                assert_equivalent(&ctx, filter)?;
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_id_filter_agrees() {
    run_test(
        create_test_context,
        |ctx| {
            let filter = ids(["road.2", "road.7", "road.42"]);
            assert_eq!(store_ids(&ctx, &filter)?, vec!["road.2", "road.7"]);
            assert_equivalent(&ctx, &filter)?;

            let none = ids(Vec::<String>::new());
            assert!(store_ids(&ctx, &none)?.is_empty());
            assert_equivalent(&ctx, &none)
        },
        cleanup,
    )
}

#[test]
fn test_unmapped_property_with_best_effort() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter = and(vec![
                property("lanes").eq(2),
                property("surveyor").eq("Ada"),
            ])
            .into();
            let expected = store_ids(&ctx, &filter)?;
            assert_eq!(expected, vec!["road.8", "road.10"]);
            assert_eq!(sql_ids(&ctx, &filter, PartialMappingPolicy::BestEffort)?, expected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_random_filters_agree() {
    let mut rng = StdRng::seed_from_u64(7);
    let features = random_roads(&mut rng, 200);
    for kind in [IndexKind::QuadTree, IndexKind::RTree] {
        let features = features.clone();
        run_test(
            move || create_context(kind, features.clone()),
            |ctx| {
                let mut rng = StdRng::seed_from_u64(11);
                for _ in 0..150 {
                    let filter: Filter = random_operator(&mut rng, 3).into();
                    assert_equivalent(&ctx, &filter)?;
                }
                Ok(())
            },
            cleanup,
        );
    }
}
