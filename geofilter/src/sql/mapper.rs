use indexmap::IndexMap;
use std::fmt::{Display, Formatter};

use crate::filter::ValueReference;

/// A possibly schema-qualified table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(name: &str) -> Self {
        TableName {
            schema: None,
            name: name.to_string(),
        }
    }

    pub fn with_schema(schema: &str, name: &str) -> Self {
        TableName {
            schema: Some(schema.to_string()),
            name: name.to_string(),
        }
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnKind {
    #[default]
    Primitive,
    /// A geometry column stored in the given spatial reference system
    Geometry { srid: Option<i32> },
}

impl ColumnKind {
    pub fn is_geometry(&self) -> bool {
        matches!(self, ColumnKind::Geometry { .. })
    }
}

/// Where a property lives in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNameMapping {
    pub table: TableName,
    pub column: String,
    pub kind: ColumnKind,
}

/// Where feature identifiers live. A feature id is `prefix` followed by the
/// column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMapping {
    pub table: TableName,
    pub column: String,
    pub prefix: Option<String>,
}

/// Resolves filter property references to database columns.
pub trait PropertyNameMapper: Send + Sync {
    /// The column for `reference`, or `None` when it cannot be pushed to SQL.
    fn map_property(&self, reference: &ValueReference) -> Option<PropertyNameMapping>;

    /// The identifier column, if identifiers are stored.
    fn map_id(&self) -> Option<IdMapping>;
}

/// Mapper for features stored in a single table.
///
/// Properties are looked up by their path text first, then by the local
/// part of their resolved name, so `app:name` maps through an entry for
/// `name`.
///
/// ```rust
/// use geofilter::sql::{PropertyNameMapper, TableMapping, TableName};
/// use geofilter::filter::ValueReference;
///
/// let mapping = TableMapping::new(TableName::new("roads"))
///     .column("name", "road_name")
///     .geometry_column("geom", "the_geom", Some(4326))
///     .id_column("fid", Some("road."));
///
/// let column = mapping.map_property(&ValueReference::new("name")).unwrap();
/// assert_eq!(column.column, "road_name");
/// assert!(mapping.map_property(&ValueReference::new("lanes")).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TableMapping {
    table: TableName,
    columns: IndexMap<String, (String, ColumnKind)>,
    id: Option<(String, Option<String>)>,
}

impl TableMapping {
    pub fn new(table: TableName) -> Self {
        TableMapping {
            table,
            columns: IndexMap::new(),
            id: None,
        }
    }

    pub fn column(mut self, property: &str, column: &str) -> Self {
        self.columns
            .insert(property.to_string(), (column.to_string(), ColumnKind::Primitive));
        self
    }

    pub fn geometry_column(mut self, property: &str, column: &str, srid: Option<i32>) -> Self {
        self.columns.insert(
            property.to_string(),
            (column.to_string(), ColumnKind::Geometry { srid }),
        );
        self
    }

    pub fn id_column(mut self, column: &str, prefix: Option<&str>) -> Self {
        self.id = Some((column.to_string(), prefix.map(str::to_string)));
        self
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    fn mapping(&self, column: &str, kind: ColumnKind) -> PropertyNameMapping {
        PropertyNameMapping {
            table: self.table.clone(),
            column: column.to_string(),
            kind,
        }
    }
}

impl PropertyNameMapper for TableMapping {
    fn map_property(&self, reference: &ValueReference) -> Option<PropertyNameMapping> {
        if let Some((column, kind)) = self.columns.get(reference.text()) {
            return Some(self.mapping(column, *kind));
        }
        let name = reference.resolved_name()?;
        self.columns
            .get(name.local_name())
            .map(|(column, kind)| self.mapping(column, *kind))
    }

    fn map_id(&self) -> Option<IdMapping> {
        self.id.as_ref().map(|(column, prefix)| IdMapping {
            table: self.table.clone(),
            column: column.clone(),
            prefix: prefix.clone(),
        })
    }
}
