//! A memory-backed feature store.
//!
//! Features are kept in insertion order next to a spatial index over one
//! geometry property. A query narrows the candidates through the index when
//! the filter implies a bounding box on that property and evaluates the
//! full filter on every candidate.

use geofilter::common::TypedValue;
use geofilter::errors::{ErrorKind, GeoFilterError, GeoFilterResult};
use geofilter::evaluator::{FilterEvaluator, XPathEvaluator};
use geofilter::filter::{extract_prefilter_envelope_for, Filter, PathStep, ValueReference};
use geofilter::geometry::{Envelope, Geometry};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::{SpatialError, SpatialResult};
use crate::index::{IndexConfig, IndexKind, SpatialIndex};

/// A property value of a [`Feature`]: a plain value or a nested feature.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Value(TypedValue),
    Nested(Feature),
}

/// An identified object with multi-valued, ordered properties.
///
/// ```rust
/// use geofilter::geometry::Geometry;
/// use geofilter_spatial::Feature;
///
/// let road = Feature::new("road.1")
///     .with_property("name", "Main Street")
///     .with_property("geometry", Geometry::point(1.0, 2.0));
/// assert_eq!(road.id(), "road.1");
/// assert!(road.geometry("geometry").is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: String,
    properties: IndexMap<String, Vec<PropertyValue>>,
}

impl Feature {
    pub fn new(id: &str) -> Self {
        Feature {
            id: id.to_string(),
            properties: IndexMap::new(),
        }
    }

    /// Appends a value to property `name`.
    pub fn with_property<V: Into<TypedValue>>(mut self, name: &str, value: V) -> Self {
        self.add_property(name, PropertyValue::Value(value.into()));
        self
    }

    /// Appends a nested feature to property `name`.
    pub fn with_nested(mut self, name: &str, feature: Feature) -> Self {
        self.add_property(name, PropertyValue::Nested(feature));
        self
    }

    pub fn add_property(&mut self, name: &str, value: PropertyValue) {
        self.properties.entry(name.to_string()).or_default().push(value);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn property(&self, name: &str) -> Option<&[PropertyValue]> {
        self.properties.get(name).map(Vec::as_slice)
    }

    pub fn properties(&self) -> &IndexMap<String, Vec<PropertyValue>> {
        &self.properties
    }

    /// The first geometry value of property `name`.
    pub fn geometry(&self, name: &str) -> Option<&Geometry> {
        self.geometries(name).into_iter().next()
    }

    /// Every geometry value of property `name`, in order.
    pub fn geometries(&self, name: &str) -> Vec<&Geometry> {
        self.property(name)
            .unwrap_or_default()
            .iter()
            .filter_map(|value| match value {
                PropertyValue::Value(value) => value.as_geometry(),
                PropertyValue::Nested(_) => None,
            })
            .collect()
    }

    /// Bounding box of all geometry values of property `name`, or `None`
    /// when it has none.
    pub fn envelope(&self, name: &str) -> GeoFilterResult<Option<Envelope>> {
        let mut envelope: Option<Envelope> = None;
        for geometry in self.geometries(name) {
            let next = geometry.envelope()?;
            envelope = Some(match envelope {
                Some(current) => current.union(&next),
                None => next,
            });
        }
        Ok(envelope)
    }
}

/// Resolves property paths against [`Feature`]s.
///
/// Child steps match property names by local name, `name[n]` picks the n-th
/// value, `@id` (in any namespace) yields the feature id. Unknown properties
/// resolve to a single `Null`; a nested feature at the end of a path has no
/// scalar value and resolves to `Null` as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureXPathEvaluator;

impl FeatureXPathEvaluator {
    fn child_values<'a>(
        feature: &'a Feature,
        name: &str,
        position: Option<usize>,
    ) -> Vec<&'a PropertyValue> {
        let values = match feature.property(name) {
            Some(values) => values,
            None => return Vec::new(),
        };
        match position {
            Some(position) => values.get(position - 1).into_iter().collect(),
            None => values.iter().collect(),
        }
    }
}

impl XPathEvaluator<Feature> for FeatureXPathEvaluator {
    fn eval(&self, context: &Feature, reference: &ValueReference) -> GeoFilterResult<Vec<TypedValue>> {
        let steps = reference.steps().map_err(|err| {
            GeoFilterError::new_with_cause(
                &format!("Cannot evaluate '{}' against a feature", reference),
                ErrorKind::EvaluationError,
                err,
            )
        })?;

        let mut features = vec![context];
        let mut values = Vec::new();
        let last = steps.len().saturating_sub(1);

        for (i, step) in steps.iter().enumerate() {
            match step {
                PathStep::Context => {
                    if i == last {
                        values.extend(features.iter().map(|f| TypedValue::from(f.id())));
                    }
                }
                PathStep::Attribute(name) => {
                    for feature in &features {
                        if name.local_name() == "id" {
                            values.push(TypedValue::from(feature.id()));
                        } else {
                            values.push(TypedValue::Null);
                        }
                    }
                }
                PathStep::Child { name, position } => {
                    let found: Vec<&PropertyValue> = features
                        .iter()
                        .copied()
                        .flat_map(|f| Self::child_values(f, name.local_name(), *position))
                        .collect();
                    if i == last {
                        values.extend(found.into_iter().map(|value| match value {
                            PropertyValue::Value(value) => value.clone(),
                            PropertyValue::Nested(_) => TypedValue::Null,
                        }));
                    } else {
                        features = found
                            .into_iter()
                            .filter_map(|value| match value {
                                PropertyValue::Nested(feature) => Some(feature),
                                PropertyValue::Value(_) => None,
                            })
                            .collect();
                    }
                }
            }
        }

        if values.is_empty() {
            values.push(TypedValue::Null);
        }
        Ok(values)
    }

    fn get_id(&self, context: &Feature) -> Option<String> {
        Some(context.id.clone())
    }
}

/// Builder-style configuration for a [`MemoryFeatureStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    geometry_property: String,
    index: IndexConfig,
}

impl StoreConfig {
    /// A quad-tree backed store over `root_envelope`, indexing the property
    /// `geometry`.
    pub fn new(root_envelope: Envelope) -> Self {
        StoreConfig {
            geometry_property: "geometry".to_string(),
            index: IndexConfig::quad_tree(root_envelope),
        }
    }

    pub fn geometry_property(mut self, name: &str) -> Self {
        self.geometry_property = name.to_string();
        self
    }

    pub fn index_kind(mut self, kind: IndexKind) -> Self {
        self.index = self.index.kind(kind);
        self
    }

    pub fn split_threshold(mut self, split_threshold: usize) -> Self {
        self.index = self.index.split_threshold(split_threshold);
        self
    }

    pub fn max_entries(mut self, max_entries: usize) -> Self {
        self.index = self.index.max_entries(max_entries);
        self
    }

    pub fn index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn get_geometry_property(&self) -> &str {
        &self.geometry_property
    }

    pub fn get_index(&self) -> &IndexConfig {
        &self.index
    }
}

/// Features in memory, queried with filters.
///
/// Handles are cheap to clone and share the same store.
///
/// ```rust
/// use geofilter::filter::{property, Filter};
/// use geofilter::geometry::{Envelope, Geometry};
/// use geofilter_spatial::{Feature, MemoryFeatureStore, StoreConfig};
///
/// let store = MemoryFeatureStore::new(StoreConfig::new(Envelope::new(0.0, 0.0, 100.0, 100.0))).unwrap();
/// store.insert(Feature::new("a").with_property("geometry", Geometry::point(1.0, 1.0))).unwrap();
/// store.insert(Feature::new("b").with_property("geometry", Geometry::point(50.0, 50.0))).unwrap();
///
/// let filter: Filter = property("geometry")
///     .bbox(Geometry::envelope_of(0.0, 0.0, 10.0, 10.0))
///     .into();
/// let found = store.query(&filter).unwrap();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].id(), "a");
/// ```
#[derive(Clone)]
pub struct MemoryFeatureStore {
    inner: Arc<MemoryFeatureStoreInner>,
}

struct MemoryFeatureStoreInner {
    config: StoreConfig,
    features: RwLock<IndexMap<String, Feature>>,
    index: Box<dyn SpatialIndex<String>>,
    evaluator: FilterEvaluator,
}

impl MemoryFeatureStore {
    pub fn new(config: StoreConfig) -> SpatialResult<Self> {
        Self::with_evaluator(config, FilterEvaluator::new())
    }

    /// A store that evaluates filters with `evaluator`, e.g. one carrying
    /// custom functions.
    pub fn with_evaluator(config: StoreConfig, evaluator: FilterEvaluator) -> SpatialResult<Self> {
        let index = config.index.build::<String>()?;
        Ok(MemoryFeatureStore {
            inner: Arc::new(MemoryFeatureStoreInner {
                config,
                features: RwLock::new(IndexMap::new()),
                index,
                evaluator,
            }),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Adds `feature`, replacing a stored feature with the same id in place.
    ///
    /// Fails when the feature's geometry is invalid or falls outside the
    /// index domain; the store is unchanged in that case.
    pub fn insert(&self, feature: Feature) -> SpatialResult<()> {
        let geometry_property = &self.inner.config.geometry_property;
        let envelope = feature.envelope(geometry_property)?;

        let mut features = self.inner.features.write();
        let previous = features
            .get(feature.id())
            .map(|old| old.envelope(geometry_property).ok().flatten());
        if previous.is_some() {
            self.inner.index.remove(&feature.id);
        }
        if let Some(envelope) = envelope {
            if !self.inner.index.insert(envelope, feature.id.clone()) {
                log::error!("Feature '{}' lies outside the index domain", feature.id);
                if let Some(Some(old_envelope)) = previous {
                    self.inner.index.insert(old_envelope, feature.id.clone());
                }
                return Err(SpatialError::OutOfDomain(envelope.to_string()));
            }
        }
        log::debug!("Stored feature '{}'", feature.id);
        features.insert(feature.id.clone(), feature);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut features = self.inner.features.write();
        match features.shift_remove(id) {
            Some(_) => {
                self.inner.index.remove(&id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<Feature> {
        self.inner.features.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.features.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut features = self.inner.features.write();
        features.clear();
        self.inner.index.clear();
    }

    /// Every stored feature matching `filter`, in insertion order.
    pub fn query(&self, filter: &Filter) -> SpatialResult<Vec<Feature>> {
        filter.validate()?;
        let features = self.inner.features.read();

        let candidates: Option<HashSet<String>> =
            extract_prefilter_envelope_for(filter, &self.inner.config.geometry_property).map(|envelope| {
                log::debug!("Narrowing candidates to {}", envelope);
                self.inner.index.query(&envelope).into_iter().collect()
            });

        let mut results = Vec::new();
        for (id, feature) in features.iter() {
            if let Some(candidates) = &candidates {
                if !candidates.contains(id) {
                    continue;
                }
            }
            if self.inner.evaluator.evaluate(filter, feature, &FeatureXPathEvaluator)? {
                results.push(feature.clone());
            }
        }
        Ok(results)
    }

    /// Ids of features whose indexed envelope intersects `envelope`.
    pub fn query_envelope(&self, envelope: &Envelope) -> Vec<String> {
        let features = self.inner.features.read();
        let hits: HashSet<String> = self.inner.index.query(envelope).into_iter().collect();
        features.keys().filter(|id| hits.contains(*id)).cloned().collect()
    }
}
