use geofilter::filter::{property, Filter};
use geofilter::geometry::{Envelope, Geometry};
use geofilter_int_test::test_util::{cleanup, create_rtree_test_context, create_test_context, road, run_test};
use geofilter_spatial::{IndexConfig, SpatialIndex};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_multi_threaded_insert() {
    for before in [create_test_context, create_rtree_test_context] {
        run_test(
            before,
            |ctx| {
                let store = ctx.store();
                store.clear();

                let num_threads = 5;
                let inserts_per_thread = 40;
                let barrier = Arc::new(Barrier::new(num_threads));

                let mut handles = vec![];
                for thread_id in 0..num_threads {
                    let store = store.clone();
                    let barrier = Arc::clone(&barrier);
                    handles.push(thread::spawn(move || {
                        barrier.wait();
                        for i in 0..inserts_per_thread {
                            let fid = (thread_id * inserts_per_thread + i) as i64;
                            let x = (fid % 100) as f64;
                            let y = (fid / 100) as f64 * 10.0;
                            let feature = road(fid, "Side Street", 1, 20.0, true, Geometry::point(x, y));
                            store.insert(feature).expect("insert inside the domain");
                        }
                    }));
                }
                for handle in handles {
                    handle.join().expect("writer thread panicked");
                }

                assert_eq!(store.len(), num_threads * inserts_per_thread);
                let all = store.query_envelope(&Envelope::new(0.0, 0.0, 100.0, 100.0));
                assert_eq!(all.len(), num_threads * inserts_per_thread);
                Ok(())
            },
            cleanup,
        );
    }
}

#[test]
fn test_concurrent_read_and_write() {
    run_test(
        create_test_context,
        |ctx| {
            let store = ctx.store();
            let initial = store.len();
            let barrier = Arc::new(Barrier::new(3));

            let writer = {
                let store = store.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for fid in 100..200 {
                        let feature = road(fid, "New Road", 2, 30.0, true, Geometry::point(50.0, 50.0));
                        store.insert(feature).expect("insert inside the domain");
                    }
                })
            };

            let readers: Vec<_> = (0..2)
                .map(|_| {
                    let store = store.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        let filter: Filter = property("name").eq("Main Street").into();
                        for _ in 0..100 {
                            // the writer never touches the original roads
                            let found = store.query(&filter).expect("valid filter");
                            assert_eq!(found.len(), 1);
                            assert!(store.len() >= initial);
                        }
                    })
                })
                .collect();

            writer.join().expect("writer thread panicked");
            for reader in readers {
                reader.join().expect("reader thread panicked");
            }
            assert_eq!(store.len(), initial + 100);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_shared_index_across_threads() {
    let index: Arc<dyn SpatialIndex<u64>> = Arc::from(
        IndexConfig::r_tree(Envelope::new(0.0, 0.0, 100.0, 100.0))
            .max_entries(4)
            .build::<u64>()
            .expect("valid config"),
    );

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for i in 0..250u64 {
                    let v = t * 250 + i;
                    let x = (v % 100) as f64;
                    let y = (v / 10 % 100) as f64;
                    index.insert(Envelope::new(x, y, x + 0.5, y + 0.5), v);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("index thread panicked");
    }

    assert_eq!(index.size(), 1000);
    let mut all = index.get_objects();
    all.sort();
    assert_eq!(all, (0..1000).collect::<Vec<u64>>());
}
