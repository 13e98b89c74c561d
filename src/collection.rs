use crate::error::CollectionError;
use crate::value::AttributeValue;
use geo::Geometry;
use std::collections::HashSet;
use std::fmt;

// Coordinate reference system tag of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs(String);

const WGS84_ALIASES: &[&str] = &[
    "epsg:4326",
    "ogc:crs84",
    "urn:ogc:def:crs:ogc:1.3:crs84",
    "urn:ogc:def:crs:ogc::crs84",
    "urn:ogc:def:crs:epsg::4326",
    "urn:ogc:def:crs:epsg:6.6:4326",
    "http://www.opengis.net/def/crs/ogc/1.3/crs84",
    "http://www.opengis.net/def/crs/epsg/0/4326",
];

impl Crs {
    pub fn new(definition: impl Into<String>) -> Self {
        Crs(definition.into().trim().to_string())
    }

    // Geographic longitude/latitude on WGS84, the reference of the pipeline.
    pub fn wgs84() -> Self {
        Crs("EPSG:4326".to_string())
    }

    pub fn definition(&self) -> &str {
        &self.0
    }

    pub fn is_wgs84(&self) -> bool {
        let lower = self.0.to_ascii_lowercase();
        WGS84_ALIASES.contains(&lower.as_str())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::wgs84()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // WKT definitions are long, keep messages readable
        if self.0.chars().count() > 48 {
            let head: String = self.0.chars().take(47).collect();
            write!(f, "{head}…")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<Geometry<f64>>,
    pub values: Vec<AttributeValue>,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>, values: Vec<AttributeValue>) -> Self {
        Feature { geometry, values }
    }
}

// An ordered set of features sharing one schema and one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    crs: Crs,
    columns: Vec<String>,
    features: Vec<Feature>,
}

impl FeatureCollection {
    // Builds a collection, checking that column names are unique and that
    // every feature carries one value per column.
    pub fn new(
        crs: Crs,
        columns: Vec<String>,
        features: Vec<Feature>,
    ) -> Result<Self, CollectionError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(CollectionError::DuplicateColumn(column.clone()));
            }
        }
        for (index, feature) in features.iter().enumerate() {
            if feature.values.len() != columns.len() {
                return Err(CollectionError::RowArity {
                    index,
                    expected: columns.len(),
                    found: feature.values.len(),
                });
            }
        }
        Ok(FeatureCollection {
            crs,
            columns,
            features,
        })
    }

    pub fn empty(crs: Crs, columns: Vec<String>) -> Result<Self, CollectionError> {
        Self::new(crs, columns, Vec::new())
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&AttributeValue> {
        let index = self.column_index(column)?;
        self.features.get(row).map(|f| &f.values[index])
    }

    pub fn column_values<'a>(
        &'a self,
        column: &str,
    ) -> Option<impl Iterator<Item = &'a AttributeValue> + 'a> {
        let index = self.column_index(column)?;
        Some(self.features.iter().map(move |f| &f.values[index]))
    }

    pub fn count_without_geometry(&self) -> usize {
        self.features.iter().filter(|f| f.geometry.is_none()).count()
    }

    // Replaces the CRS tag and the geometries in one step, keeping
    // attributes untouched. Used by reprojection.
    pub(crate) fn with_geometries(
        self,
        crs: Crs,
        geometries: Vec<Option<Geometry<f64>>>,
    ) -> FeatureCollection {
        debug_assert_eq!(geometries.len(), self.features.len());
        let features = self
            .features
            .into_iter()
            .zip(geometries)
            .map(|(feature, geometry)| Feature::new(geometry, feature.values))
            .collect();
        FeatureCollection {
            crs,
            columns: self.columns,
            features,
        }
    }
}
