use geofilter::filter::Filter;
use geofilter::sql::{PartialMappingPolicy, PostGisDialect, WhereBuilder, WhereClause};
use geofilter::GeoFilterResult;
use geofilter_int_test::test_util::{cleanup, create_test_context, random_operator, run_test, TestContext};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::thread;

fn compile(ctx: &TestContext, filter: &Filter) -> GeoFilterResult<WhereClause> {
    WhereBuilder::new(&PostGisDialect, ctx.mapping())
        .with_policy(PartialMappingPolicy::Strict)
        .build(filter, &[])
}

#[test]
fn test_same_filter_compiles_identically() {
    run_test(
        create_test_context,
        |ctx| {
            let mut rng = StdRng::seed_from_u64(3);
            for _ in 0..100 {
                let filter: Filter = random_operator(&mut rng, 4).into();
                let first = compile(&ctx, &filter)?;
                let second = compile(&ctx, &filter.clone())?;
                assert_eq!(first, second, "filter {}", filter);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_placeholders_match_parameters() {
    run_test(
        create_test_context,
        |ctx| {
            let mut rng = StdRng::seed_from_u64(5);
            for _ in 0..100 {
                let filter: Filter = random_operator(&mut rng, 4).into();
                let clause = compile(&ctx, &filter)?;
                let placeholders = clause.where_sql.matches('?').count();
                assert_eq!(placeholders, clause.parameters.len(), "{}", clause.where_sql);
                assert!(clause.is_exact());
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_compiles_identically_across_threads() {
    run_test(
        create_test_context,
        |ctx| {
            let mut rng = StdRng::seed_from_u64(9);
            let filters: Arc<Vec<Filter>> =
                Arc::new((0..50).map(|_| random_operator(&mut rng, 3).into()).collect());
            let expected: Vec<String> = filters
                .iter()
                .map(|f| compile(&ctx, f).map(|c| c.where_sql))
                .collect::<GeoFilterResult<_>>()?;

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let filters = Arc::clone(&filters);
                    let ctx = ctx.clone();
                    thread::spawn(move || {
                        filters
                            .iter()
                            .map(|f| compile(&ctx, f).map(|c| c.where_sql))
                            .collect::<GeoFilterResult<Vec<String>>>()
                    })
                })
                .collect();

            for handle in handles {
                let actual = handle.join().expect("compiler thread panicked")?;
                assert_eq!(actual, expected);
            }
            Ok(())
        },
        cleanup,
    )
}
