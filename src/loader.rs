use crate::collection::{Crs, Feature, FeatureCollection};
use crate::crs::normalize_to_wgs84;
use crate::error::LoadError;
use crate::value::AttributeValue;
use geo::Geometry;
use geojson::{GeoJson, JsonObject};
use log::{debug, info};
use shapefile::dbase::{self, FieldValue};
use shapefile::{Shape, ShapeReader};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    // A zip archive holding a Shapefile and its companion files.
    ZippedShapefile,
    GeoJson,
}

impl InputFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(OsStr::to_str)?
            .to_ascii_lowercase();
        match extension.as_str() {
            "zip" => Some(InputFormat::ZippedShapefile),
            "geojson" | "json" => Some(InputFormat::GeoJson),
            _ => None,
        }
    }
}

// Attributes and geometries as read from a source, before a CRS is settled.
struct RawLayer {
    crs: Option<Crs>,
    columns: Vec<String>,
    features: Vec<Feature>,
}

// Loads an uploaded dataset.
pub fn load_dataset(name: &str, bytes: &[u8]) -> Result<FeatureCollection, LoadError> {
    let format = InputFormat::from_file_name(name)
        .ok_or_else(|| LoadError::UnsupportedFormat(name.to_string()))?;

    let workdir = tempfile::tempdir().map_err(|source| io_error(name, source))?;
    let file_name = Path::new(name)
        .file_name()
        .unwrap_or_else(|| OsStr::new("upload"));
    let path = workdir.path().join(file_name);
    fs::write(&path, bytes).map_err(|source| io_error(name, source))?;

    let layer = match format {
        InputFormat::ZippedShapefile => read_zipped_shapefile(&path, workdir.path(), name)?,
        InputFormat::GeoJson => read_geojson(&path, name)?,
    };

    let crs = layer.crs.unwrap_or_else(|| {
        debug!("{} declares no CRS, assuming EPSG:4326", name);
        Crs::wgs84()
    });
    let collection = FeatureCollection::new(crs, layer.columns, layer.features).map_err(|source| {
        LoadError::Schema {
            file: name.to_string(),
            source,
        }
    })?;

    let collection = normalize_to_wgs84(collection, name).map_err(|e| LoadError::Projection {
        file: name.to_string(),
        crs: e.crs,
        message: e.message,
    })?;

    info!(
        "Loaded {} features with {} attributes from {}",
        collection.len(),
        collection.columns().len(),
        name
    );
    Ok(collection)
}

pub fn load_path(path: &Path) -> Result<FeatureCollection, LoadError> {
    let name = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or_default()
        .to_string();
    let bytes = fs::read(path).map_err(|source| io_error(&name, source))?;
    load_dataset(&name, &bytes)
}

fn io_error(name: &str, source: std::io::Error) -> LoadError {
    LoadError::Io {
        file: name.to_string(),
        source,
    }
}

fn read_geojson(path: &Path, name: &str) -> Result<RawLayer, LoadError> {
    let file = File::open(path).map_err(|source| io_error(name, source))?;
    let geojson_error = |source: geojson::Error| LoadError::GeoJson {
        file: name.to_string(),
        source,
    };

    let geojson = GeoJson::from_reader(BufReader::new(file)).map_err(|e| geojson_error(e.into()))?;
    let (features, foreign_members) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(feature) => (vec![feature], None),
        GeoJson::Geometry(geometry) => (
            vec![geojson::Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            None,
        ),
    };

    // union of property names, in the order they are first seen
    let mut columns: Vec<String> = Vec::new();
    for feature in &features {
        for key in feature.properties.iter().flat_map(|p| p.keys()) {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut rows = Vec::with_capacity(features.len());
    for feature in features {
        let values = columns
            .iter()
            .map(|column| {
                feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get(column))
                    .map(AttributeValue::from)
                    .unwrap_or(AttributeValue::Null)
            })
            .collect();
        let geometry = feature
            .geometry
            .map(Geometry::<f64>::try_from)
            .transpose()
            .map_err(geojson_error)?;
        rows.push(Feature::new(geometry, values));
    }

    Ok(RawLayer {
        crs: foreign_members.as_ref().and_then(legacy_crs),
        columns,
        features: rows,
    })
}

// Reads the pre-RFC 7946 `crs` member, e.g.
// `{"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}}`.
fn legacy_crs(members: &JsonObject) -> Option<Crs> {
    members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(Crs::new)
}

fn read_zipped_shapefile(archive_path: &Path, workdir: &Path, name: &str) -> Result<RawLayer, LoadError> {
    let archive_error = |source| LoadError::Archive {
        file: name.to_string(),
        source,
    };
    let shapefile_error = |message: String| LoadError::Shapefile {
        file: name.to_string(),
        message,
    };

    let file = File::open(archive_path).map_err(|source| io_error(name, source))?;
    let mut archive = ZipArchive::new(file).map_err(archive_error)?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(archive_error)?;
        if let Some(path) = entry.enclosed_name() {
            if !is_metadata_entry(path) {
                entries.push(path.to_path_buf());
            }
        }
    }
    entries.sort();

    let target = workdir.join("extracted");
    archive.extract(&target).map_err(archive_error)?;

    let shp = entries
        .iter()
        .find(|entry| has_extension(entry, "shp"))
        .ok_or_else(|| LoadError::MissingShapefile(name.to_string()))?;
    debug!("Reading {} from {}", shp.display(), name);

    let shapes = ShapeReader::from_path(target.join(shp))
        .and_then(|reader| reader.read())
        .map_err(|e| shapefile_error(e.to_string()))?;

    let (columns, records) = match companion(&entries, shp, "dbf") {
        Some(dbf) => read_dbf(&target.join(dbf)).map_err(|e| shapefile_error(e.to_string()))?,
        None => {
            debug!("{} has no .dbf, loading geometries only", name);
            (Vec::new(), vec![Some(Vec::new()); shapes.len()])
        }
    };
    if records.len() != shapes.len() {
        return Err(shapefile_error(format!(
            "{} shapes but {} attribute records",
            shapes.len(),
            records.len()
        )));
    }

    let mut features = Vec::with_capacity(shapes.len());
    let mut deleted = 0usize;
    for (shape, values) in shapes.into_iter().zip(records) {
        // records flagged as deleted drop their shape too
        let Some(values) = values else {
            deleted += 1;
            continue;
        };
        let geometry = match shape {
            Shape::NullShape => None,
            shape => Some(Geometry::<f64>::try_from(shape).map_err(|e| shapefile_error(e.to_string()))?),
        };
        features.push(Feature::new(geometry, values));
    }
    if deleted > 0 {
        debug!("Skipped {} deleted records in {}", deleted, name);
    }

    let crs = match companion(&entries, shp, "prj") {
        Some(prj) => {
            let wkt = fs::read_to_string(target.join(prj)).map_err(|source| io_error(name, source))?;
            Some(wkt).filter(|w| !w.trim().is_empty()).map(Crs::new)
        }
        None => None,
    };

    Ok(RawLayer {
        crs,
        columns,
        features,
    })
}

// One entry per record, None for records flagged as deleted.
fn read_dbf(path: &Path) -> Result<(Vec<String>, Vec<Option<Vec<AttributeValue>>>), dbase::Error> {
    let mut table = dbase::File::open_read_only(path)?;
    let columns: Vec<String> = table
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .filter(|name| name != "DeletionFlag")
        .collect();

    let mut rows = Vec::with_capacity(table.num_records());
    for index in 0..table.num_records() {
        let Some(mut record) = table.record(index) else {
            break;
        };
        if record.is_deleted()? {
            rows.push(None);
            continue;
        }
        let record = record.read()?;
        rows.push(Some(
            columns
                .iter()
                .map(|column| match record.get(column) {
                    Some(value) => field_value(column, value),
                    None => AttributeValue::Null,
                })
                .collect(),
        ));
    }
    Ok((columns, rows))
}

fn field_value(column: &str, value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(v) => v.clone().into(),
        FieldValue::Memo(v) => v.clone().into(),
        FieldValue::Numeric(v) => (*v).into(),
        FieldValue::Float(v) => v.map(f64::from).into(),
        FieldValue::Logical(v) => (*v).into(),
        FieldValue::Integer(v) => (*v).into(),
        FieldValue::Double(v) => (*v).into(),
        FieldValue::Currency(v) => (*v).into(),
        FieldValue::Date(Some(date)) => {
            format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day()).into()
        }
        FieldValue::Date(None) => AttributeValue::Null,
        FieldValue::DateTime(datetime) => {
            let (date, time) = (datetime.date(), datetime.time());
            format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
                date.year(),
                date.month(),
                date.day(),
                time.hours(),
                time.minutes(),
                time.seconds()
            )
            .into()
        }
        #[allow(unreachable_patterns)]
        other => {
            debug!("Unsupported dBase value in column {}: {:?}", column, other);
            AttributeValue::Null
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

// Finds the file next to `shp` with the same stem and the given extension.
fn companion<'a>(entries: &'a [PathBuf], shp: &Path, extension: &str) -> Option<&'a PathBuf> {
    let stem = shp.with_extension("");
    entries
        .iter()
        .find(|entry| has_extension(entry, extension) && entry.with_extension("") == stem)
}

// Resource forks and folders added by macOS archivers.
fn is_metadata_entry(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == "__MACOSX")
        || path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|n| n.starts_with("._"))
}
