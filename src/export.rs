use crate::collection::FeatureCollection;
use crate::error::ExportError;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection as GeoJsonCollection, Geometry as GeoJsonGeometry, JsonObject};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const RESULT_FILE_NAME: &str = "spatial_join_result.geojson";
pub const CONTENT_TYPE: &str = "application/json";

// A serialized result, ready to be offered as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: String,
    pub body: String,
}

fn to_geojson(collection: &FeatureCollection) -> GeoJsonCollection {
    let features = collection
        .features()
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let properties: JsonObject = collection
                .columns()
                .iter()
                .zip(&feature.values)
                .map(|(column, value)| (column.clone(), value.to_json()))
                .collect();
            Feature {
                bbox: None,
                geometry: feature
                    .geometry
                    .as_ref()
                    .map(|g| GeoJsonGeometry::new(geojson::Value::from(g))),
                id: Some(Id::String(index.to_string())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    GeoJsonCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

// Serializes `collection` as an RFC 7946 FeatureCollection document.
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String, ExportError> {
    Ok(serde_json::to_string(&to_geojson(collection))?)
}

pub fn export_artifact(collection: &FeatureCollection) -> Result<ExportArtifact, ExportError> {
    Ok(ExportArtifact {
        file_name: RESULT_FILE_NAME.to_string(),
        content_type: CONTENT_TYPE.to_string(),
        body: to_geojson_string(collection)?,
    })
}

pub fn write_geojson(collection: &FeatureCollection, output_path: &Path) -> Result<(), ExportError> {
    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &to_geojson(collection))?;
    writer.flush()?;
    info!("Wrote {} features to {}", collection.len(), output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{Crs, Feature as Row};
    use crate::value::AttributeValue;
    use geo::{point, Geometry};
    use serde_json::{json, Value};

    #[test]
    fn empty_collection_is_a_valid_document() {
        let fc = FeatureCollection::empty(Crs::wgs84(), vec!["a".into()]).unwrap();
        let text = to_geojson_string(&fc).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"type": "FeatureCollection", "features": []}));
    }

    #[test]
    fn writes_properties_in_schema_order() {
        let fc = FeatureCollection::new(
            Crs::wgs84(),
            vec!["zeta".into(), "alpha".into(), "n".into()],
            vec![
                Row::new(
                    Some(Geometry::Point(point!(x: 1.5, y: 2.0))),
                    vec!["z".into(), AttributeValue::Null, AttributeValue::Float(f64::NAN)],
                ),
                Row::new(None, vec!["y".into(), true.into(), AttributeValue::Int(3)]),
            ],
        )
        .unwrap();
        let text = to_geojson_string(&fc).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();

        let first = &parsed["features"][0];
        assert_eq!(first["id"], json!("0"));
        assert_eq!(first["type"], json!("Feature"));
        assert_eq!(first["geometry"], json!({"type": "Point", "coordinates": [1.5, 2.0]}));
        assert_eq!(first["properties"], json!({"zeta": "z", "alpha": null, "n": null}));
        let keys: Vec<&String> = first["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "n"]);

        let second = &parsed["features"][1];
        assert_eq!(second["geometry"], Value::Null);
        assert_eq!(second["properties"], json!({"zeta": "y", "alpha": true, "n": 3}));
    }

    #[test]
    fn artifact_carries_download_metadata() {
        let fc = FeatureCollection::empty(Crs::wgs84(), Vec::new()).unwrap();
        let artifact = export_artifact(&fc).unwrap();
        assert_eq!(artifact.file_name, "spatial_join_result.geojson");
        assert_eq!(artifact.content_type, "application/json");
        assert!(artifact.body.contains("FeatureCollection"));
    }

    #[test]
    fn writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULT_FILE_NAME);
        let fc = FeatureCollection::empty(Crs::wgs84(), Vec::new()).unwrap();
        write_geojson(&fc, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, to_geojson_string(&fc).unwrap());
    }
}
