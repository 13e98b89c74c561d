use super::{merged_columns, Predicate, SpatialHow, Suffixes};
use crate::collection::{Feature, FeatureCollection};
use crate::error::{JoinError, Side};
use crate::value::AttributeValue;
use geo::coordinate_position::CoordPos;
use geo::dimensions::{Dimensions, HasDimensions};
use geo::{BoundingRect, Geometry, Rect, Relate};
use log::debug;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

// Column holding the row position of the matched right feature.
pub const INDEX_RIGHT: &str = "index_right";

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

impl Predicate {
    // Evaluates `self(left, right)` on the DE-9IM matrix of the pair.
    pub fn evaluate(&self, left: &Geometry<f64>, right: &Geometry<f64>) -> bool {
        let matrix = left.relate(right);
        match self {
            Predicate::Intersects => matrix.is_intersects(),
            Predicate::Contains => matrix.is_contains(),
            Predicate::Within => matrix.is_within(),
            Predicate::Touches => {
                let meets = |l, r| matrix.get(l, r) != Dimensions::Empty;
                !meets(CoordPos::Inside, CoordPos::Inside)
                    && (meets(CoordPos::Inside, CoordPos::OnBoundary)
                        || meets(CoordPos::OnBoundary, CoordPos::Inside)
                        || meets(CoordPos::OnBoundary, CoordPos::OnBoundary))
            }
            Predicate::Crosses => {
                let interiors = matrix.get(CoordPos::Inside, CoordPos::Inside);
                let (dl, dr) = (rank(left.dimensions()), rank(right.dimensions()));
                if dl < dr {
                    interiors != Dimensions::Empty
                        && matrix.get(CoordPos::Inside, CoordPos::Outside) != Dimensions::Empty
                } else if dl > dr {
                    interiors != Dimensions::Empty
                        && matrix.get(CoordPos::Outside, CoordPos::Inside) != Dimensions::Empty
                } else if dl == 1 {
                    interiors == Dimensions::ZeroDimensional
                } else {
                    false
                }
            }
        }
    }
}

fn rank(dimensions: Dimensions) -> u8 {
    match dimensions {
        Dimensions::Empty => 0,
        Dimensions::ZeroDimensional => 0,
        Dimensions::OneDimensional => 1,
        Dimensions::TwoDimensional => 2,
    }
}

fn envelope(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

// Joins every left feature with the right features its geometry relates
// to under `predicate`.
pub fn spatial_join(
    left: &FeatureCollection,
    right: &FeatureCollection,
    predicate: Predicate,
    how: SpatialHow,
    suffixes: &Suffixes,
) -> Result<FeatureCollection, JoinError> {
    for (side, collection) in [(Side::Left, left), (Side::Right, right)] {
        if collection.has_column(INDEX_RIGHT) {
            return Err(JoinError::ReservedColumn {
                side,
                column: INDEX_RIGHT.to_string(),
            });
        }
    }

    let (left_names, right_names) = merged_columns(left.columns(), right.columns(), suffixes);
    let mut columns = left_names;
    columns.push(INDEX_RIGHT.to_string());
    columns.extend(right_names);

    let tree: RTree<IndexedEnvelope> = RTree::bulk_load(
        right
            .features()
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| {
                let rect = feature.geometry.as_ref()?.bounding_rect()?;
                Some(GeomWithData::new(
                    Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                    index,
                ))
            })
            .collect(),
    );

    let right_width = right.columns().len();
    let mut features = Vec::with_capacity(left.len());
    let mut candidates_tested = 0usize;

    for feature in left.features() {
        let matches: Vec<usize> = match &feature.geometry {
            Some(geometry) => {
                let mut candidates: Vec<usize> = match geometry.bounding_rect() {
                    Some(rect) => tree
                        .locate_in_envelope_intersecting(&envelope(rect))
                        .map(|candidate| candidate.data)
                        .collect(),
                    None => Vec::new(),
                };
                candidates.sort_unstable();
                candidates_tested += candidates.len();
                candidates
                    .into_iter()
                    .filter(|&index| {
                        right.features()[index]
                            .geometry
                            .as_ref()
                            .is_some_and(|other| predicate.evaluate(geometry, other))
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        if matches.is_empty() {
            if how == SpatialHow::Left {
                let mut values = feature.values.clone();
                values.extend(std::iter::repeat(AttributeValue::Null).take(right_width + 1));
                features.push(Feature::new(feature.geometry.clone(), values));
            }
            continue;
        }

        for index in matches {
            let mut values = feature.values.clone();
            values.push(AttributeValue::Int(index as i64));
            values.extend(right.features()[index].values.iter().cloned());
            features.push(Feature::new(feature.geometry.clone(), values));
        }
    }

    debug!(
        "Spatial join '{}' tested {} candidate pairs out of {}",
        predicate,
        candidates_tested,
        left.len() * right.len()
    );
    Ok(FeatureCollection::new(left.crs().clone(), columns, features)?)
}
