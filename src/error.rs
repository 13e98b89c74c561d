use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CollectionError {
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("feature {index} has {found} values, schema has {expected} columns")]
    RowArity {
        index: usize,
        expected: usize,
        found: usize,
    },
}

// Errors raised while loading an uploaded dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file format '{0}' (expected .zip, .geojson or .json)")]
    UnsupportedFormat(String),

    #[error("failed to read '{file}': {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{file}' is not a readable zip archive: {source}")]
    Archive {
        file: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("'{0}' does not contain a .shp file")]
    MissingShapefile(String),

    #[error("corrupt shapefile in '{file}': {message}")]
    Shapefile { file: String, message: String },

    #[error("invalid GeoJSON in '{file}': {source}")]
    GeoJson {
        file: String,
        #[source]
        source: geojson::Error,
    },

    #[error("cannot reproject '{file}' from {crs}: {message}")]
    Projection {
        file: String,
        crs: String,
        message: String,
    },

    #[error("inconsistent attributes in '{file}': {source}")]
    Schema {
        file: String,
        #[source]
        source: CollectionError,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum JoinError {
    #[error("key column '{key}' does not exist in the {side} dataset")]
    InvalidKey { side: Side, key: String },

    #[error("the {0} dataset has not been loaded")]
    MissingInput(Side),

    #[error("the {side} dataset already has a column named '{column}', which a spatial join adds")]
    ReservedColumn { side: Side, column: String },

    #[error("unknown spatial predicate '{0}'")]
    UnknownPredicate(String),

    #[error("unknown join type '{0}'")]
    UnknownJoinType(String),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to serialize GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum GeojoinError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Join(#[from] JoinError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

pub type Result<T> = std::result::Result<T, GeojoinError>;
