mod attribute;
mod spatial;

pub use attribute::attribute_join;
pub use spatial::{spatial_join, INDEX_RIGHT};

use crate::collection::FeatureCollection;
use crate::error::JoinError;
use log::{info, warn};
use std::fmt;
use std::str::FromStr;

// Topological relation a left geometry must have with a right geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Intersects,
    Contains,
    Within,
    Touches,
    Crosses,
}

impl Predicate {
    pub const ALL: [Predicate; 5] = [
        Predicate::Intersects,
        Predicate::Contains,
        Predicate::Within,
        Predicate::Touches,
        Predicate::Crosses,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Predicate::Intersects => "intersects",
            Predicate::Contains => "contains",
            Predicate::Within => "within",
            Predicate::Touches => "touches",
            Predicate::Crosses => "crosses",
        }
    }
}

impl FromStr for Predicate {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Predicate::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| JoinError::UnknownPredicate(s.to_string()))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Which left rows a spatial join keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialHow {
    // Every left row, unmatched ones once with empty right attributes.
    #[default]
    Left,
    // Only left rows with at least one match.
    Inner,
}

impl FromStr for SpatialHow {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(SpatialHow::Left),
            "inner" => Ok(SpatialHow::Inner),
            _ => Err(JoinError::UnknownJoinType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeHow {
    #[default]
    Left,
    Right,
    Inner,
    Outer,
}

impl MergeHow {
    pub fn name(&self) -> &'static str {
        match self {
            MergeHow::Left => "left",
            MergeHow::Right => "right",
            MergeHow::Inner => "inner",
            MergeHow::Outer => "outer",
        }
    }
}

impl FromStr for MergeHow {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(MergeHow::Left),
            "right" => Ok(MergeHow::Right),
            "inner" => Ok(MergeHow::Inner),
            "outer" => Ok(MergeHow::Outer),
            _ => Err(JoinError::UnknownJoinType(s.to_string())),
        }
    }
}

impl fmt::Display for MergeHow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinSpec {
    Spatial {
        predicate: Predicate,
        how: SpatialHow,
    },
    Attribute {
        left_key: String,
        right_key: String,
        how: MergeHow,
    },
}

impl JoinSpec {
    pub fn spatial(predicate: Predicate) -> Self {
        JoinSpec::Spatial {
            predicate,
            how: SpatialHow::Left,
        }
    }

    pub fn attribute(left_key: impl Into<String>, right_key: impl Into<String>, how: MergeHow) -> Self {
        JoinSpec::Attribute {
            left_key: left_key.into(),
            right_key: right_key.into(),
            how,
        }
    }
}

// Suffixes appended to column names present on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suffixes {
    pub left: String,
    pub right: String,
}

impl Suffixes {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Suffixes {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn spatial() -> Self {
        Suffixes::new("_left", "_right")
    }

    pub fn attribute() -> Self {
        Suffixes::new("_x", "_y")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    pub spatial_suffixes: Suffixes,
    pub attribute_suffixes: Suffixes,
}

impl Default for JoinOptions {
    fn default() -> Self {
        JoinOptions {
            spatial_suffixes: Suffixes::spatial(),
            attribute_suffixes: Suffixes::attribute(),
        }
    }
}

// A join result together with what the caller should be told about it.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub collection: FeatureCollection,
    pub rows_without_geometry: usize,
    pub warnings: Vec<String>,
}

impl JoinOutcome {
    pub fn rows(&self) -> usize {
        self.collection.len()
    }
}

pub fn join(left: &FeatureCollection, right: &FeatureCollection, spec: &JoinSpec) -> Result<JoinOutcome, JoinError> {
    join_with(left, right, spec, &JoinOptions::default())
}

pub fn join_with(
    left: &FeatureCollection,
    right: &FeatureCollection,
    spec: &JoinSpec,
    options: &JoinOptions,
) -> Result<JoinOutcome, JoinError> {
    let collection = match spec {
        JoinSpec::Spatial { predicate, how } => {
            spatial_join(left, right, *predicate, *how, &options.spatial_suffixes)?
        }
        JoinSpec::Attribute {
            left_key,
            right_key,
            how,
        } => attribute_join(left, right, left_key, right_key, *how, &options.attribute_suffixes)?,
    };

    let mut warnings = Vec::new();
    let rows_without_geometry = collection.count_without_geometry();
    if rows_without_geometry > 0 {
        let message = format!(
            "{} of {} result rows have no geometry",
            rows_without_geometry,
            collection.len()
        );
        warn!("{}", message);
        warnings.push(message);
    }
    if collection.is_empty() {
        warn!("Join produced no rows");
    }

    info!(
        "Joined {} x {} features into {} rows",
        left.len(),
        right.len(),
        collection.len()
    );
    Ok(JoinOutcome {
        collection,
        rows_without_geometry,
        warnings,
    })
}

// Output names for the left and right columns of a merge. Names present
// on both sides receive the respective suffix.
pub(crate) fn merged_columns(left: &[String], right: &[String], suffixes: &Suffixes) -> (Vec<String>, Vec<String>) {
    let rename = |name: &String, other: &[String], suffix: &str| {
        if other.contains(name) {
            format!("{name}{suffix}")
        } else {
            name.clone()
        }
    };
    let left_names = left.iter().map(|n| rename(n, right, &suffixes.left)).collect();
    let right_names = right.iter().map(|n| rename(n, left, &suffixes.right)).collect();
    (left_names, right_names)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::collection::{Crs, Feature, FeatureCollection};
    use crate::value::AttributeValue;
    use geo::{polygon, Geometry};

    pub fn unit_square(x: f64, y: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + 1.0, y: y),
            (x: x + 1.0, y: y + 1.0),
            (x: x, y: y + 1.0),
            (x: x, y: y),
        ])
    }

    pub fn collection(columns: &[&str], rows: Vec<(Option<Geometry<f64>>, Vec<AttributeValue>)>) -> FeatureCollection {
        FeatureCollection::new(
            Crs::wgs84(),
            columns.iter().map(|c| c.to_string()).collect(),
            rows.into_iter().map(|(g, v)| Feature::new(g, v)).collect(),
        )
        .unwrap()
    }
}
