use geofilter::common::TypedValue;
use geofilter::errors::GeoFilterResult;
use geofilter::filter::{and, not, or, property, Operator};
use geofilter::geometry::{Envelope, Geometry};
use geofilter::sql::{SpatialSyntax, SqlComparison, SqlExpression, SqlType, TableMapping, TableName};
use geofilter_spatial::{Feature, IndexKind, MemoryFeatureStore, PropertyValue, StoreConfig};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Runs `test` against a context made by `before`, then tears the context
/// down with `after`. Failures panic with the full error chain.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> GeoFilterResult<()>,
    B: Fn() -> GeoFilterResult<TestContext>,
    A: Fn(TestContext) -> GeoFilterResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };
    let start = Instant::now();
    if let Err(e) = test(ctx.clone()) {
        panic!("Test failed: {:?}", e);
    }
    log::debug!("Test body finished in {:?}", start.elapsed());
    if let Err(e) = after(ctx) {
        panic!("After run failed: {:?}", e);
    }
}

pub fn cleanup(ctx: TestContext) -> GeoFilterResult<()> {
    ctx.store.clear();
    Ok(())
}

#[derive(Clone)]
pub struct TestContext {
    store: MemoryFeatureStore,
    features: Vec<Feature>,
    mapping: Arc<TableMapping>,
}

impl TestContext {
    pub fn new(store: MemoryFeatureStore, features: Vec<Feature>, mapping: TableMapping) -> Self {
        Self {
            store,
            features,
            mapping: Arc::new(mapping),
        }
    }

    pub fn store(&self) -> MemoryFeatureStore {
        self.store.clone()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    /// The relational projection of every feature, in insertion order.
    pub fn rows(&self) -> Vec<Row> {
        self.features.iter().map(project).collect()
    }
}

/// Domain of every road geometry.
pub fn world() -> Envelope {
    Envelope::new(0.0, 0.0, 100.0, 100.0)
}

pub fn create_test_context() -> GeoFilterResult<TestContext> {
    create_context(IndexKind::QuadTree, create_roads())
}

pub fn create_rtree_test_context() -> GeoFilterResult<TestContext> {
    create_context(IndexKind::RTree, create_roads())
}

pub fn create_context(kind: IndexKind, features: Vec<Feature>) -> GeoFilterResult<TestContext> {
    let config = StoreConfig::new(world())
        .index_kind(kind)
        .split_threshold(3)
        .max_entries(4);
    let store = MemoryFeatureStore::new(config)?;
    for feature in &features {
        store.insert(feature.clone())?;
    }
    Ok(TestContext::new(store, features, roads_mapping()))
}

/// The `roads` table: every property except `surveyor` has a column.
pub fn roads_mapping() -> TableMapping {
    TableMapping::new(TableName::new("roads"))
        .column("name", "name")
        .column("lanes", "lanes")
        .column("speed", "max_speed")
        .column("paved", "paved")
        .geometry_column("geometry", "geom", Some(4326))
        .id_column("fid", Some("road."))
}

const COLUMNS: [(&str, &str); 5] = [
    ("name", "name"),
    ("lanes", "lanes"),
    ("speed", "max_speed"),
    ("paved", "paved"),
    ("geometry", "geom"),
];

pub fn road(fid: i64, name: &str, lanes: i64, speed: f64, paved: bool, geometry: Geometry) -> Feature {
    Feature::new(&format!("road.{}", fid))
        .with_property("name", name)
        .with_property("lanes", lanes)
        .with_property("speed", speed)
        .with_property("paved", paved)
        .with_property("surveyor", if fid % 2 == 0 { "Ada" } else { "Grace" })
        .with_property("geometry", geometry)
}

pub fn create_roads() -> Vec<Feature> {
    vec![
        road(1, "Main Street", 2, 30.0, true, Geometry::envelope_of(1.0, 1.0, 20.0, 3.0)),
        road(2, "Main Road", 4, 50.0, true, Geometry::envelope_of(20.0, 0.0, 22.0, 60.0)),
        road(3, "High Street", 2, 30.0, true, Geometry::envelope_of(40.0, 40.0, 60.0, 42.0)),
        road(4, "Mill Lane", 1, 20.0, false, Geometry::envelope_of(70.0, 70.0, 71.0, 90.0)),
        road(5, "main street", 2, 25.0, true, Geometry::envelope_of(5.0, 80.0, 25.0, 82.0)),
        road(6, "Station Road", 3, 40.0, true, Geometry::envelope_of(60.0, 10.0, 95.0, 12.0)),
        road(7, "50% Hill", 1, 15.0, false, Geometry::point(50.0, 50.0)),
        road(8, "Quay_Side", 2, 20.0, true, Geometry::envelope_of(90.0, 0.0, 100.0, 5.0)),
        road(
            9,
            "Ring Road",
            6,
            80.0,
            true,
            Geometry::line_string(vec![
                geofilter::geometry::Coordinate::new(10.0, 10.0),
                geofilter::geometry::Coordinate::new(90.0, 10.0),
                geofilter::geometry::Coordinate::new(90.0, 90.0),
            ]),
        ),
        road(10, "Church Street", 2, 30.0, true, Geometry::envelope_of(30.0, 60.0, 32.0, 75.0)),
    ]
}

/// `count` roads with random attributes and small random boxes.
pub fn random_roads<R: Rng>(rng: &mut R, count: i64) -> Vec<Feature> {
    const NAMES: [&str; 6] = ["Main Street", "main road", "High Street", "Mill Lane", "Quay", "Park Avenue"];
    (1..=count)
        .map(|fid| {
            let x = rng.random_range(0.0..95.0);
            let y = rng.random_range(0.0..95.0);
            let w = rng.random_range(0.0..5.0);
            let h = rng.random_range(0.0..5.0);
            road(
                fid,
                NAMES[rng.random_range(0..NAMES.len())],
                rng.random_range(1..5),
                f64::from(rng.random_range(1..9i32) * 10),
                rng.random_bool(0.7),
                Geometry::envelope_of(x, y, x + w, y + h),
            )
        })
        .collect()
}

/// A random, fully mappable operator tree over the road properties.
pub fn random_operator<R: Rng>(rng: &mut R, depth: usize) -> Operator {
    if depth == 0 || rng.random_bool(0.4) {
        return random_leaf(rng);
    }
    match rng.random_range(0..3) {
        0 => and(vec![random_operator(rng, depth - 1), random_operator(rng, depth - 1)]),
        1 => or(vec![random_operator(rng, depth - 1), random_operator(rng, depth - 1)]),
        _ => not(random_operator(rng, depth - 1)),
    }
}

fn random_envelope<R: Rng>(rng: &mut R) -> Geometry {
    let x = rng.random_range(0.0..80.0);
    let y = rng.random_range(0.0..80.0);
    Geometry::envelope_of(x, y, x + rng.random_range(1.0..40.0), y + rng.random_range(1.0..40.0))
}

fn random_leaf<R: Rng>(rng: &mut R) -> Operator {
    let lanes = rng.random_range(0..6);
    match rng.random_range(0..17) {
        0 => property("name").eq("Main Street"),
        1 => property("name").ignore_case().eq("main street"),
        2 => property("name").like("Main*"),
        3 => property("name").ignore_case().like("*STREET"),
        4 => property("name").like("?i*"),
        5 => property("lanes").gt(lanes),
        6 => property("lanes").le(lanes),
        7 => property("lanes").between(lanes, lanes + 1),
        8 => property("speed").ne(rng.random_range(1..9) * 10),
        9 => property("paved").eq(rng.random_bool(0.5)),
        10 => property("geometry").bbox(random_envelope(rng)),
        11 => property("geometry").within(random_envelope(rng)),
        12 => property("geometry").dwithin(random_envelope(rng), rng.random_range(0.0..10.0)),
        13 => property("geometry").overlaps(random_envelope(rng)),
        14 => property("geometry").contains(random_envelope(rng)),
        15 => property("geometry").beyond(random_envelope(rng), rng.random_range(0.0..10.0)),
        _ => property("geometry").disjoint(random_envelope(rng)),
    }
}

/// A row of the `roads` table, keyed by column name.
pub type Row = HashMap<String, TypedValue>;

/// Projects a feature onto the columns of [`roads_mapping`].
pub fn project(feature: &Feature) -> Row {
    let mut row = Row::new();
    let fid = feature
        .id()
        .strip_prefix("road.")
        .and_then(|fid| fid.parse::<i64>().ok())
        .map(TypedValue::from)
        .unwrap_or(TypedValue::Null);
    row.insert("fid".to_string(), fid);

    for (property, column) in COLUMNS {
        let value = feature
            .property(property)
            .and_then(|values| values.first())
            .map(|value| match value {
                PropertyValue::Value(value) => value.clone(),
                PropertyValue::Nested(_) => TypedValue::Null,
            })
            .unwrap_or(TypedValue::Null);
        row.insert(column.to_string(), value);
    }
    row
}

/// Whether a database would return `row` for a where clause made of
/// `expression`, using SQL three-valued logic.
pub fn sql_matches(expression: &SqlExpression, row: &Row) -> bool {
    truth(expression, row) == Some(true)
}

fn truth(expression: &SqlExpression, row: &Row) -> Option<bool> {
    match expression {
        SqlExpression::True => Some(true),
        SqlExpression::Compare { op, left, right } => {
            let ordering = order(&value(left, row), &value(right, row))?;
            Some(match op {
                SqlComparison::Eq => ordering == Ordering::Equal,
                SqlComparison::Ne => ordering != Ordering::Equal,
                SqlComparison::Lt => ordering == Ordering::Less,
                SqlComparison::Gt => ordering == Ordering::Greater,
                SqlComparison::Le => ordering != Ordering::Greater,
                SqlComparison::Ge => ordering != Ordering::Less,
            })
        }
        SqlExpression::Between { expr, lower, upper } => {
            let v = value(expr, row);
            let above = order(&v, &value(lower, row))?;
            let below = order(&v, &value(upper, row))?;
            Some(above != Ordering::Less && below != Ordering::Greater)
        }
        SqlExpression::Like { expr, pattern } => {
            let text = value(expr, row).as_text()?;
            let pattern = value(pattern, row).as_text()?;
            let text: Vec<char> = text.chars().collect();
            let pattern: Vec<char> = pattern.chars().collect();
            Some(like_matches(&text, &pattern))
        }
        SqlExpression::IsNull(expr) => Some(value(expr, row).is_null()),
        SqlExpression::And(children) => {
            let mut result = Some(true);
            for child in children {
                match truth(child, row) {
                    Some(false) => return Some(false),
                    None => result = None,
                    Some(true) => {}
                }
            }
            result
        }
        SqlExpression::Or(children) => {
            let mut result = Some(false);
            for child in children {
                match truth(child, row) {
                    Some(true) => return Some(true),
                    None => result = None,
                    Some(false) => {}
                }
            }
            result
        }
        SqlExpression::Not(expr) => truth(expr, row).map(|b| !b),
        SqlExpression::Spatial {
            op,
            syntax,
            column,
            geometry,
        } => {
            let column = bounds(&value(column, row))?;
            let literal = bounds(&value(geometry, row))?;
            Some(match syntax {
                SpatialSyntax::BoxOperator(symbol) => box_operator(symbol, column, literal),
                SpatialSyntax::NegatedBoxOperator(symbol) => !box_operator(symbol, column, literal),
                SpatialSyntax::BoxOverlap {
                    intersects,
                    within,
                    contains,
                } => {
                    box_operator(intersects, column, literal)
                        && !box_operator(within, column, literal)
                        && !box_operator(contains, column, literal)
                }
                SpatialSyntax::EnvelopeDistance { negated, .. } => {
                    let within = box_distance(column, literal) <= op.distance()?;
                    within != *negated
                }
            })
        }
        SqlExpression::IdIn { id, ids } => {
            let id = value(id, row).as_text()?;
            Some(ids.contains(&id))
        }
        other => match value(other, row) {
            TypedValue::Bool(b) => Some(b),
            _ => None,
        },
    }
}

/// `[min_x, min_y, max_x, max_y]` of a geometry value; `None` for SQL NULL.
type Bounds = [f64; 4];

fn bounds(value: &TypedValue) -> Option<Bounds> {
    let envelope = value.as_geometry()?.envelope().ok()?;
    Some([envelope.min_x(), envelope.min_y(), envelope.max_x(), envelope.max_y()])
}

fn covers(outer: Bounds, inner: Bounds) -> bool {
    outer[0] <= inner[0] && outer[1] <= inner[1] && inner[2] <= outer[2] && inner[3] <= outer[3]
}

/// PostGIS box operators, with the column on the left.
fn box_operator(symbol: &str, column: Bounds, literal: Bounds) -> bool {
    match symbol {
        "&&" => {
            column[0] <= literal[2] && literal[0] <= column[2] && column[1] <= literal[3] && literal[1] <= column[3]
        }
        "@" => covers(literal, column),
        "~" => covers(column, literal),
        "~=" => column == literal,
        other => panic!("no box operator {}", other),
    }
}

/// Distance between two boxes, zero when they share a point.
fn box_distance(a: Bounds, b: Bounds) -> f64 {
    let dx = (b[0] - a[2]).max(a[0] - b[2]).max(0.0);
    let dy = (b[1] - a[3]).max(a[1] - b[3]).max(0.0);
    dx.hypot(dy)
}

fn order(left: &TypedValue, right: &TypedValue) -> Option<Ordering> {
    left.compare(right, true).ok().flatten()
}

fn value(expression: &SqlExpression, row: &Row) -> TypedValue {
    match expression {
        SqlExpression::Column { column, .. } => row.get(column).cloned().unwrap_or(TypedValue::Null),
        SqlExpression::Argument(value) => value.clone(),
        SqlExpression::GeometryArgument { geometry, .. } => TypedValue::from(geometry.clone()),
        SqlExpression::Concat(left, right) => match (value(left, row).as_text(), value(right, row).as_text()) {
            (Some(left), Some(right)) => TypedValue::from(left + &right),
            _ => TypedValue::Null,
        },
        SqlExpression::Cast(expr, sql_type) => {
            let v = value(expr, row);
            let cast = match sql_type {
                SqlType::Text => v.as_text().map(TypedValue::from),
                SqlType::Integer => v.as_f64().map(|f| TypedValue::from(f as i64)),
                SqlType::Double => v.as_f64().map(TypedValue::from),
                SqlType::Boolean => Some(v),
            };
            cast.unwrap_or(TypedValue::Null)
        }
        SqlExpression::CaseFold(expr) => match value(expr, row) {
            TypedValue::String(s) => TypedValue::from(s.to_lowercase()),
            other => other,
        },
        predicate => match truth(predicate, row) {
            Some(b) => TypedValue::from(b),
            None => TypedValue::Null,
        },
    }
}

/// SQL `LIKE` with `%`, `_` and backslash escapes.
fn like_matches(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('%', rest)) => (0..=text.len()).any(|skip| like_matches(&text[skip..], rest)),
        Some(('_', rest)) => !text.is_empty() && like_matches(&text[1..], rest),
        Some(('\\', rest)) => match rest.split_first() {
            Some((c, rest)) => text.first() == Some(c) && like_matches(&text[1..], rest),
            None => text.first() == Some(&'\\') && like_matches(&text[1..], rest),
        },
        Some((c, rest)) => text.first() == Some(c) && like_matches(&text[1..], rest),
    }
}
