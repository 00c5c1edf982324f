use geofilter::geometry::Envelope;
use geofilter_int_test::test_util::{random_roads, world};
use geofilter_spatial::{Feature, IndexConfig, IndexKind, RTree, SpatialIndex, SpatialIndexEntry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn envelope_of(feature: &Feature) -> Envelope {
    feature
        .geometry("geometry")
        .and_then(|g| g.envelope().ok())
        .expect("road without geometry")
}

fn linear_scan(features: &[Feature], query: &Envelope) -> Vec<String> {
    let mut ids: Vec<String> = features
        .iter()
        .filter(|f| envelope_of(f).intersects(query))
        .map(|f| f.id().to_string())
        .collect();
    ids.sort();
    ids
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

fn random_query<R: Rng>(rng: &mut R) -> Envelope {
    let x = rng.random_range(-10.0..100.0);
    let y = rng.random_range(-10.0..100.0);
    Envelope::new(x, y, x + rng.random_range(0.0..30.0), y + rng.random_range(0.0..30.0))
}

#[test]
fn test_indexes_agree_with_linear_scan() {
    let mut rng = StdRng::seed_from_u64(21);
    let features = random_roads(&mut rng, 500);

    for kind in [IndexKind::QuadTree, IndexKind::RTree] {
        let index = IndexConfig::new(kind, world())
            .split_threshold(4)
            .max_entries(6)
            .build::<String>()
            .expect("valid config");
        for feature in &features {
            assert!(index.insert(envelope_of(feature), feature.id().to_string()));
        }
        assert_eq!(index.size(), features.len());

        for _ in 0..200 {
            let query = random_query(&mut rng);
            assert_eq!(sorted(index.query(&query)), linear_scan(&features, &query), "{:?} {}", kind, query);
        }
    }
}

#[test]
fn test_indexes_agree_after_removals() {
    let mut rng = StdRng::seed_from_u64(22);
    let mut features = random_roads(&mut rng, 300);

    let quad = IndexConfig::quad_tree(world()).split_threshold(3).build::<String>().expect("valid config");
    let rtree = IndexConfig::r_tree(world()).max_entries(4).build::<String>().expect("valid config");
    for feature in &features {
        quad.insert(envelope_of(feature), feature.id().to_string());
        rtree.insert(envelope_of(feature), feature.id().to_string());
    }

    // drop every third road
    let removed: Vec<Feature> = features.iter().step_by(3).cloned().collect();
    for feature in &removed {
        assert!(quad.remove(&feature.id().to_string()));
        assert!(rtree.remove(&feature.id().to_string()));
    }
    features.retain(|f| !removed.iter().any(|r| r.id() == f.id()));
    assert_eq!(quad.size(), features.len());
    assert_eq!(rtree.size(), features.len());

    for _ in 0..100 {
        let query = random_query(&mut rng);
        let expected = linear_scan(&features, &query);
        assert_eq!(sorted(quad.query(&query)), expected);
        assert_eq!(sorted(rtree.query(&query)), expected);
    }
}

#[test]
fn test_bulk_loaded_rtree_matches_incremental() {
    let mut rng = StdRng::seed_from_u64(23);
    let features = random_roads(&mut rng, 1000);

    let incremental = RTree::new(world(), 8);
    for feature in &features {
        incremental.insert(envelope_of(feature), feature.id().to_string());
    }
    let bulk = RTree::bulk_load(
        world(),
        8,
        features
            .iter()
            .map(|f| SpatialIndexEntry::new(envelope_of(f), f.id().to_string())),
    );
    assert_eq!(bulk.size(), incremental.size());
    assert!(bulk.height() <= incremental.height());
    assert_eq!(bulk.bounds(), incremental.bounds());

    for _ in 0..100 {
        let query = random_query(&mut rng);
        assert_eq!(sorted(bulk.query(&query)), sorted(incremental.query(&query)));
    }
}

#[test]
fn test_whole_world_query_returns_everything() {
    let mut rng = StdRng::seed_from_u64(24);
    let features = random_roads(&mut rng, 100);
    let quad = IndexConfig::quad_tree(world()).split_threshold(2).build::<String>().expect("valid config");
    for feature in &features {
        quad.insert(envelope_of(feature), feature.id().to_string());
    }
    assert_eq!(quad.query(&world()).len(), 100);
    assert_eq!(sorted(quad.get_objects()), sorted(features.iter().map(|f| f.id().to_string()).collect()));
}
