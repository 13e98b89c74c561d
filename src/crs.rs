use crate::collection::{Crs, FeatureCollection};
use geo::{Geometry, MapCoords};
use log::debug;
use proj::Proj;

// Reprojects `collection` to EPSG:4326. Collections already there come back
// unchanged, so normalizing twice is a no-op.
pub fn normalize_to_wgs84(
    collection: FeatureCollection,
    source: &str,
) -> Result<FeatureCollection, ProjectionFailure> {
    if collection.crs().is_wgs84() {
        return Ok(collection);
    }

    let from = collection.crs().clone();
    debug!("Reprojecting {} features of {} from {}", collection.len(), source, from);

    let proj = Proj::new_known_crs(from.definition(), "EPSG:4326", None)
        .map_err(|e| ProjectionFailure::new(&from, e.to_string()))?;

    let geometries = collection
        .features()
        .iter()
        .map(|feature| {
            feature
                .geometry
                .as_ref()
                .map(|geometry| reproject(geometry, &proj))
                .transpose()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProjectionFailure::new(&from, e.to_string()))?;

    Ok(collection.with_geometries(Crs::wgs84(), geometries))
}

fn reproject(geometry: &Geometry<f64>, proj: &Proj) -> Result<Geometry<f64>, proj::ProjError> {
    geometry.try_map_coords(|coord| proj.convert(coord))
}

// A reprojection that PROJ refused, with the CRS it started from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionFailure {
    pub crs: String,
    pub message: String,
}

impl ProjectionFailure {
    fn new(crs: &Crs, message: String) -> Self {
        ProjectionFailure {
            crs: crs.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Feature;
    use crate::value::AttributeValue;
    use approx::assert_relative_eq;
    use geo::point;

    fn single_point(crs: Crs, x: f64, y: f64) -> FeatureCollection {
        FeatureCollection::new(
            crs,
            vec!["name".into()],
            vec![Feature::new(
                Some(Geometry::Point(point!(x: x, y: y))),
                vec![AttributeValue::from("p")],
            )],
        )
        .unwrap()
    }

    #[test]
    fn wgs84_is_left_untouched() {
        let fc = single_point(Crs::wgs84(), 13.4, 52.5);
        let normalized = normalize_to_wgs84(fc.clone(), "a.geojson").unwrap();
        assert_eq!(normalized, fc);
    }

    #[test]
    fn web_mercator_is_reprojected() {
        let fc = single_point(Crs::new("EPSG:3857"), 1_113_194.908, 6_446_275.841);
        let normalized = normalize_to_wgs84(fc, "a.geojson").unwrap();
        assert!(normalized.crs().is_wgs84());

        let Some(Geometry::Point(p)) = &normalized.features()[0].geometry else {
            panic!("expected a point");
        };
        assert_relative_eq!(p.x(), 10.0, epsilon = 1e-5);
        assert_relative_eq!(p.y(), 50.0, epsilon = 1e-5);
        assert_eq!(normalized.value(0, "name"), Some(&AttributeValue::from("p")));

        // a second pass does not move anything
        let again = normalize_to_wgs84(normalized.clone(), "a.geojson").unwrap();
        assert_eq!(again, normalized);
    }

    #[test]
    fn unknown_crs_is_an_error() {
        let fc = single_point(Crs::new("EPSG:999999"), 0.0, 0.0);
        let err = normalize_to_wgs84(fc, "a.geojson").unwrap_err();
        assert_eq!(err.crs, "EPSG:999999");
    }
}
