use crate::collection::FeatureCollection;
use geo::{Centroid, Geometry};
use std::fmt;

// The first rows of a collection plus where a map of it should be centred.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub geometry_types: Vec<&'static str>,
    pub total_rows: usize,
    // Mean of the feature centroids as (longitude, latitude).
    pub center: Option<(f64, f64)>,
}

pub fn preview(collection: &FeatureCollection, rows: usize) -> Preview {
    let head = &collection.features()[..rows.min(collection.len())];
    Preview {
        columns: collection.columns().to_vec(),
        rows: head
            .iter()
            .map(|f| f.values.iter().map(ToString::to_string).collect())
            .collect(),
        geometry_types: head
            .iter()
            .map(|f| f.geometry.as_ref().map(geometry_type).unwrap_or("null"))
            .collect(),
        total_rows: collection.len(),
        center: mean_centroid(collection),
    }
}

fn mean_centroid(collection: &FeatureCollection) -> Option<(f64, f64)> {
    let centroids: Vec<_> = collection
        .features()
        .iter()
        .filter_map(|f| f.geometry.as_ref()?.centroid())
        .collect();
    if centroids.is_empty() {
        return None;
    }
    let n = centroids.len() as f64;
    let (sx, sy) = centroids
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x(), sy + p.y()));
    Some((sx / n, sy / n))
}

pub fn geometry_type(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "LineString",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Polygon",
        Geometry::Triangle(_) => "Polygon",
    }
}

fn write_row<'a>(f: &mut fmt::Formatter<'_>, cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    writeln!(f, "{}", padded.join(" | ").trim_end())
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut header: Vec<&str> = vec!["geometry"];
        header.extend(self.columns.iter().map(String::as_str));

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for (row, kind) in self.rows.iter().zip(&self.geometry_types) {
            widths[0] = widths[0].max(kind.len());
            for (i, cell) in row.iter().enumerate() {
                widths[i + 1] = widths[i + 1].max(cell.chars().count());
            }
        }

        write_row(f, header.iter().copied(), &widths)?;
        writeln!(
            f,
            "{}",
            widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
        )?;
        for (row, kind) in self.rows.iter().zip(&self.geometry_types) {
            write_row(f, std::iter::once(*kind).chain(row.iter().map(String::as_str)), &widths)?;
        }

        write!(f, "{} of {} rows", self.rows.len(), self.total_rows)?;
        if let Some((lon, lat)) = self.center {
            write!(f, ", centred at {lon:.5}, {lat:.5}")?;
        }
        writeln!(f)
    }
}
