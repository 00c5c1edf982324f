use geofilter::filter::{and, ids, not, property, Filter};
use geofilter::geometry::{Envelope, Geometry};
use geofilter::GeoFilterResult;
use geofilter_int_test::test_util::{
    cleanup, create_rtree_test_context, create_test_context, road, run_test, TestContext,
};
use geofilter_spatial::{Feature, PropertyValue, SpatialError};

fn ids_of(features: &[Feature]) -> Vec<&str> {
    features.iter().map(|f| f.id()).collect()
}

fn query_ids(ctx: &TestContext, filter: Filter) -> GeoFilterResult<Vec<String>> {
    Ok(ctx
        .store()
        .query(&filter)?
        .iter()
        .map(|f| f.id().to_string())
        .collect())
}

#[test]
fn test_spatial_query_narrows_through_the_index() {
    for before in [create_test_context, create_rtree_test_context] {
        run_test(
            before,
            |ctx| {
                let filter: Filter = and(vec![
                    property("geometry").bbox(Geometry::envelope_of(0.0, 0.0, 25.0, 25.0)),
                    property("paved").eq(true),
                ])
                .into();
                assert_eq!(query_ids(&ctx, filter)?, vec!["road.1", "road.2", "road.9"]);

                let hits = ctx.store().query_envelope(&Envelope::new(0.0, 0.0, 25.0, 25.0));
                assert_eq!(hits, vec!["road.1", "road.2", "road.9"]);
                Ok(())
            },
            cleanup,
        );
    }
}

#[test]
fn test_negated_spatial_query_scans_everything() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter =
                not(property("geometry").intersects(Geometry::envelope_of(0.0, 0.0, 25.0, 25.0))).into();
            assert_eq!(
                query_ids(&ctx, filter)?,
                vec!["road.3", "road.4", "road.5", "road.6", "road.7", "road.8", "road.10"]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_id_query_keeps_insertion_order() {
    run_test(
        create_test_context,
        |ctx| {
            let found = ctx.store().query(&ids(["road.9", "road.1", "road.5"]))?;
            assert_eq!(ids_of(&found), vec!["road.1", "road.5", "road.9"]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_replacing_a_feature_moves_it_in_the_index() {
    run_test(
        create_rtree_test_context,
        |ctx| {
            let store = ctx.store();
            let moved = road(1, "Main Street", 2, 30.0, true, Geometry::point(99.0, 99.0));
            store.insert(moved)?;
            assert_eq!(store.len(), ctx.features().len());

            let corner: Filter = property("geometry")
                .bbox(Geometry::envelope_of(95.0, 95.0, 100.0, 100.0))
                .into();
            assert_eq!(query_ids(&ctx, corner)?, vec!["road.1"]);
            assert!(!store
                .query_envelope(&Envelope::new(1.0, 1.0, 2.0, 2.0))
                .contains(&"road.1".to_string()));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_feature_is_found_through_any_of_its_geometries() {
    for before in [create_test_context, create_rtree_test_context] {
        run_test(
            before,
            |ctx| {
                let store = ctx.store();
                let mut depot = road(11, "Depot Row", 1, 10.0, false, Geometry::point(1.0, 1.0));
                depot.add_property("geometry", PropertyValue::Value(Geometry::point(97.0, 97.0).into()));
                store.insert(depot)?;

                let corner: Filter = property("geometry")
                    .bbox(Geometry::envelope_of(95.0, 95.0, 100.0, 100.0))
                    .into();
                assert_eq!(query_ids(&ctx, corner)?, vec!["road.11"]);

                let origin: Filter = property("geometry")
                    .bbox(Geometry::envelope_of(0.0, 0.0, 1.5, 1.5))
                    .into();
                assert_eq!(query_ids(&ctx, origin)?, vec!["road.1", "road.11"]);
                Ok(())
            },
            cleanup,
        );
    }
}

#[test]
fn test_feature_outside_the_domain_is_rejected() {
    run_test(
        create_test_context,
        |ctx| {
            let store = ctx.store();
            let outside = road(1, "Main Street", 2, 30.0, true, Geometry::point(500.0, 500.0));
            let err = store.insert(outside).unwrap_err();
            assert!(matches!(err, SpatialError::OutOfDomain(_)));

            // the original road is still indexed where it was
            let hits = store.query_envelope(&Envelope::new(1.0, 1.0, 2.0, 2.0));
            assert_eq!(hits, vec!["road.1"]);
            assert_eq!(store.get("road.1").map(|f| f.id().to_string()), Some("road.1".to_string()));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove_and_clear() {
    run_test(
        create_test_context,
        |ctx| {
            let store = ctx.store();
            assert!(store.remove("road.2"));
            assert!(!store.remove("road.2"));
            assert_eq!(store.len(), 9);

            let filter: Filter = property("name").like("Main*").into();
            assert_eq!(query_ids(&ctx, filter)?, vec!["road.1"]);

            store.clear();
            assert!(store.is_empty());
            assert!(store.query_envelope(&Envelope::new(0.0, 0.0, 100.0, 100.0)).is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_filter_is_reported() {
    run_test(
        create_test_context,
        |ctx| {
            let filter: Filter = and(vec![property("lanes").eq(2)]).into();
            let err = ctx.store().query(&filter).unwrap_err();
            let err: geofilter::GeoFilterError = err.into();
            assert_eq!(err.kind(), &geofilter::ErrorKind::InvalidFilter);
            Ok(())
        },
        cleanup,
    )
}
