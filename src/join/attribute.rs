use super::{merged_columns, MergeHow, Suffixes};
use crate::collection::{Feature, FeatureCollection};
use crate::error::{JoinError, Side};
use crate::value::{AttributeValue, JoinKey};
use std::collections::HashMap;

static NULL_KEY: AttributeValue = AttributeValue::Null;

// Row positions grouped by key value, each group in collection order.
fn key_index(collection: &FeatureCollection, key: usize) -> HashMap<JoinKey, Vec<usize>> {
    let mut index: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for (row, feature) in collection.features().iter().enumerate() {
        if let Some(k) = feature.values[key].join_key() {
            index.entry(k).or_default().push(row);
        }
    }
    index
}

// Relational merge of `left` and `right` on `left[left_key] == right[right_key]`.
// Only the left geometry is kept. Outer rows are sorted by key, null keys last.
pub fn attribute_join(
    left: &FeatureCollection,
    right: &FeatureCollection,
    left_key: &str,
    right_key: &str,
    how: MergeHow,
    suffixes: &Suffixes,
) -> Result<FeatureCollection, JoinError> {
    let lk = left.column_index(left_key).ok_or_else(|| JoinError::InvalidKey {
        side: Side::Left,
        key: left_key.to_string(),
    })?;
    let rk = right.column_index(right_key).ok_or_else(|| JoinError::InvalidKey {
        side: Side::Right,
        key: right_key.to_string(),
    })?;

    let shared_key = left_key == right_key;
    let right_kept: Vec<usize> = (0..right.columns().len())
        .filter(|&c| !(shared_key && c == rk))
        .collect();
    let right_kept_names: Vec<String> = right_kept.iter().map(|&c| right.columns()[c].clone()).collect();
    let (mut columns, right_names) = merged_columns(left.columns(), &right_kept_names, suffixes);
    columns.extend(right_names);

    let row = |l: Option<usize>, r: Option<usize>| -> Feature {
        let mut values = match l {
            Some(i) => left.features()[i].values.clone(),
            None => vec![AttributeValue::Null; left.columns().len()],
        };
        match r {
            Some(j) => {
                let source = &right.features()[j].values;
                if shared_key && l.is_none() {
                    values[lk] = source[rk].clone();
                }
                values.extend(right_kept.iter().map(|&c| source[c].clone()));
            }
            None => values.extend(std::iter::repeat(AttributeValue::Null).take(right_kept.len())),
        }
        let geometry = l.and_then(|i| left.features()[i].geometry.clone());
        Feature::new(geometry, values)
    };

    // (left row, right row) pairs in output order
    let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
    match how {
        MergeHow::Inner | MergeHow::Left | MergeHow::Outer => {
            let index = key_index(right, rk);
            let mut right_matched = vec![false; right.len()];
            for (i, feature) in left.features().iter().enumerate() {
                let matches = feature.values[lk].join_key().and_then(|k| index.get(&k));
                match matches {
                    Some(rows) => {
                        for &j in rows {
                            right_matched[j] = true;
                            pairs.push((Some(i), Some(j)));
                        }
                    }
                    None if how != MergeHow::Inner => pairs.push((Some(i), None)),
                    None => {}
                }
            }
            if how == MergeHow::Outer {
                for (j, matched) in right_matched.into_iter().enumerate() {
                    if !matched {
                        pairs.push((None, Some(j)));
                    }
                }
                // stable, so rows sharing a key keep their left then right order
                let key = |pair: &(Option<usize>, Option<usize>)| match *pair {
                    (Some(i), _) => &left.features()[i].values[lk],
                    (None, Some(j)) => &right.features()[j].values[rk],
                    (None, None) => &NULL_KEY,
                };
                pairs.sort_by(|a, b| key(a).key_cmp(key(b)));
            }
        }
        MergeHow::Right => {
            let index = key_index(left, lk);
            for (j, feature) in right.features().iter().enumerate() {
                match feature.values[rk].join_key().and_then(|k| index.get(&k)) {
                    Some(rows) => pairs.extend(rows.iter().map(|&i| (Some(i), Some(j)))),
                    None => pairs.push((None, Some(j))),
                }
            }
        }
    }

    let features = pairs.into_iter().map(|(l, r)| row(l, r)).collect();
    Ok(FeatureCollection::new(left.crs().clone(), columns, features)?)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use geo::{point, Geometry};

    fn parcels() -> FeatureCollection {
        collection(
            &["key", "area"],
            vec![
                (Some(unit_square(0.0, 0.0)), vec!["A".into(), 1.5.into()]),
                (Some(unit_square(1.0, 0.0)), vec!["B".into(), 2.5.into()]),
                (Some(unit_square(2.0, 0.0)), vec!["C".into(), 3.5.into()]),
            ],
        )
    }

    fn owners() -> FeatureCollection {
        collection(
            &["key", "owner"],
            vec![
                (Some(Geometry::Point(point!(x: 9.0, y: 9.0))), vec!["B".into(), "Ada".into()]),
                (Some(Geometry::Point(point!(x: 8.0, y: 8.0))), vec!["D".into(), "Grace".into()]),
            ],
        )
    }

    fn keys(fc: &FeatureCollection, column: &str) -> Vec<String> {
        fc.column_values(column).unwrap().map(|v| v.to_string()).collect()
    }

    fn join(how: MergeHow) -> FeatureCollection {
        attribute_join(&parcels(), &owners(), "key", "key", how, &Suffixes::attribute()).unwrap()
    }

    #[test]
    fn inner_keeps_only_common_keys() {
        let result = join(MergeHow::Inner);
        assert_eq!(result.columns(), ["key", "area", "owner"]);
        assert_eq!(keys(&result, "key"), ["B"]);
        assert_eq!(result.value(0, "owner"), Some(&AttributeValue::from("Ada")));
        // the left geometry survives, the right one is dropped
        assert_eq!(result.features()[0].geometry, Some(unit_square(1.0, 0.0)));
    }

    #[test]
    fn left_keeps_every_left_row() {
        let result = join(MergeHow::Left);
        assert_eq!(keys(&result, "key"), ["A", "B", "C"]);
        assert_eq!(keys(&result, "owner"), ["null", "Ada", "null"]);
        assert_eq!(result.count_without_geometry(), 0);
    }

    #[test]
    fn right_keeps_every_right_row_without_left_geometry() {
        let result = join(MergeHow::Right);
        assert_eq!(keys(&result, "key"), ["B", "D"]);
        assert_eq!(keys(&result, "area"), ["2.5", "null"]);
        assert!(result.features()[0].geometry.is_some());
        assert!(result.features()[1].geometry.is_none());
    }

    #[test]
    fn outer_sorts_rows_by_key() {
        let result = join(MergeHow::Outer);
        assert_eq!(keys(&result, "key"), ["A", "B", "C", "D"]);
        assert_eq!(keys(&result, "owner"), ["null", "Ada", "null", "Grace"]);
        assert_eq!(result.count_without_geometry(), 1);

        let right = collection(
            &["key", "owner"],
            vec![
                (None, vec!["C".into(), "x".into()]),
                (None, vec!["0".into(), "y".into()]),
                (None, vec!["C".into(), "z".into()]),
            ],
        );
        let result = attribute_join(&parcels(), &right, "key", "key", MergeHow::Outer, &Suffixes::attribute()).unwrap();
        assert_eq!(keys(&result, "key"), ["0", "A", "B", "C", "C"]);
        assert_eq!(keys(&result, "owner"), ["y", "null", "null", "x", "z"]);
        assert_eq!(keys(&result, "area"), ["null", "1.5", "2.5", "3.5", "3.5"]);
        assert!(result.features()[0].geometry.is_none());
    }

    #[test]
    fn outer_puts_null_keys_last() {
        let left = collection(&["id"], vec![(None, vec![AttributeValue::Null]), (None, vec![AttributeValue::Int(2)])]);
        let right = collection(&["id"], vec![(None, vec![AttributeValue::Int(1)])]);
        let result = attribute_join(&left, &right, "id", "id", MergeHow::Outer, &Suffixes::attribute()).unwrap();
        assert_eq!(keys(&result, "id"), ["1", "2", "null"]);
    }

    #[test]
    fn distinct_key_names_keep_both_columns() {
        let right = collection(
            &["code", "key"],
            vec![(None, vec!["C".into(), "other".into()])],
        );
        let result =
            attribute_join(&parcels(), &right, "key", "code", MergeHow::Inner, &Suffixes::attribute()).unwrap();
        assert_eq!(result.columns(), ["key_x", "area", "code", "key_y"]);
        assert_eq!(keys(&result, "key_x"), ["C"]);
        assert_eq!(keys(&result, "key_y"), ["other"]);
    }

    #[test]
    fn duplicate_keys_multiply_rows() {
        let right = collection(
            &["key", "owner"],
            vec![
                (None, vec!["A".into(), "x".into()]),
                (None, vec!["A".into(), "y".into()]),
            ],
        );
        let result = attribute_join(&parcels(), &right, "key", "key", MergeHow::Left, &Suffixes::attribute()).unwrap();
        assert_eq!(keys(&result, "owner"), ["x", "y", "null", "null"]);
    }

    #[test]
    fn numeric_keys_match_across_int_and_float() {
        let left = collection(&["id"], vec![(None, vec![AttributeValue::Int(7)])]);
        let right = collection(&["ref"], vec![(None, vec![AttributeValue::Float(7.0)])]);
        let result = attribute_join(&left, &right, "id", "ref", MergeHow::Inner, &Suffixes::attribute()).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn large_integer_keys_match_exactly() {
        let left = collection(&["id"], vec![(None, vec![AttributeValue::Int(9_007_199_254_740_993)])]);
        let right = collection(&["id"], vec![(None, vec![AttributeValue::Int(9_007_199_254_740_992)])]);
        let result = attribute_join(&left, &right, "id", "id", MergeHow::Inner, &Suffixes::attribute()).unwrap();
        assert!(result.is_empty());

        let right = collection(&["id"], vec![(None, vec![AttributeValue::Int(9_007_199_254_740_993)])]);
        let result = attribute_join(&left, &right, "id", "id", MergeHow::Inner, &Suffixes::attribute()).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn null_keys_never_match() {
        let left = collection(&["id"], vec![(None, vec![AttributeValue::Null])]);
        let right = collection(&["id"], vec![(None, vec![AttributeValue::Null])]);
        let result = attribute_join(&left, &right, "id", "id", MergeHow::Inner, &Suffixes::attribute()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn missing_key_names_the_column() {
        let err = attribute_join(&parcels(), &owners(), "key", "parcel_id", MergeHow::Inner, &Suffixes::attribute())
            .unwrap_err();
        assert_eq!(
            err,
            JoinError::InvalidKey {
                side: Side::Right,
                key: "parcel_id".into()
            }
        );
        assert!(err.to_string().contains("parcel_id"));

        let err = attribute_join(&parcels(), &owners(), "nope", "key", MergeHow::Left, &Suffixes::attribute())
            .unwrap_err();
        assert!(matches!(err, JoinError::InvalidKey { side: Side::Left, .. }));
    }
}
