//! Reassembly of histograms split across sibling directories.
//!
//! Some producers write one logical histogram as several fragments, one per
//! top-level directory (`dirA.hist`, `dirB.hist`, ...). [`merge`] joins the
//! fragments sharing a name suffix, in key order, either along a new leading
//! axis or along an existing one.

use std::collections::BTreeMap;

use ndarray::{ArrayViewD, Axis};
use rootstrap_engine::{Edges, Extracted};

/// Error raised when fragments cannot be merged.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum MergeError {
    #[display("no fragment named '*.{name}'")]
    NoFragments {
        #[error(not(source))]
        name: String,
    },
    #[display("fragment '{key}' has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[display("cannot merge along axis {axis} of a {ndim}-dimensional histogram")]
    AxisOutOfRange { axis: usize, ndim: usize },
    #[display("cannot assemble merged array: {_0}")]
    Assemble(ndarray::ShapeError),
}

/// Merges every fragment keyed `"<prefix>.<name>"`.
///
/// - `target_axis == None`: fragments are stacked along a new leading axis whose edges
///   are `0, 1, ..., k` for `k` fragments.
/// - `target_axis == Some(axis)`: fragments are concatenated along `axis`. Their
///   boundaries along that axis are joined, dropping the shared boundary between
///   neighbours; if neighbours do not touch, index boundaries `0..=len` are used instead.
///
/// All fragments must agree in shape outside the target axis. Edges of the other axes
/// are taken from the first fragment.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
///
/// use ndarray::arr1;
/// use rootstrap_engine::{Edges, Extracted};
/// use rootstrap_io::merge::merge;
///
/// let fragments = ["dirA", "dirB", "dirC"]
///     .into_iter()
///     .map(|dir| {
///         let fragment = Extracted::new(arr1(&[1.0, 2.0]).into_dyn(), Edges::from_shape(&[2]));
///         (format!("{dir}.hist"), fragment)
///     })
///     .collect::<BTreeMap<_, _>>();
///
/// let merged = merge(&fragments, "hist", None).unwrap();
/// assert_eq!(merged.values.shape(), &[3, 2]);
/// assert_eq!(merged.edges.axis(0), Some(&[0.0, 1.0, 2.0, 3.0][..]));
/// ```
pub fn merge(
    fragments: &BTreeMap<String, Extracted>,
    name: &str,
    target_axis: Option<usize>,
) -> Result<Extracted, MergeError> {
    let selected = fragments
        .iter()
        .filter(|(key, _)| {
            key.strip_suffix(name)
                .and_then(|prefix| prefix.strip_suffix('.'))
                .is_some_and(|prefix| !prefix.is_empty())
        })
        .collect::<Vec<_>>();
    let Some(&(_, first)) = selected.first() else {
        return Err(MergeError::NoFragments {
            name: name.to_owned(),
        });
    };

    let ndim = first.values.ndim();
    if let Some(axis) = target_axis
        && axis >= ndim
    {
        return Err(MergeError::AxisOutOfRange { axis, ndim });
    }
    for &(key, fragment) in &selected[1..] {
        let matches = first
            .values
            .shape()
            .iter()
            .zip(fragment.values.shape())
            .enumerate()
            .all(|(axis, (a, b))| Some(axis) == target_axis || a == b);
        if fragment.values.ndim() != ndim || !matches {
            return Err(MergeError::ShapeMismatch {
                key: key.clone(),
                expected: first.values.shape().to_vec(),
                found: fragment.values.shape().to_vec(),
            });
        }
    }

    let views = selected
        .iter()
        .map(|(_, fragment)| fragment.values.view())
        .collect::<Vec<ArrayViewD<'_, f64>>>();
    match target_axis {
        None => {
            let values = ndarray::stack(Axis(0), &views).map_err(MergeError::Assemble)?;
            let edges = first
                .edges
                .with_axis_inserted(0, Edges::index_axis(selected.len()));
            Ok(Extracted::new(values, edges))
        }
        Some(axis) => {
            let values = ndarray::concatenate(Axis(axis), &views).map_err(MergeError::Assemble)?;
            let boundaries = join_boundaries(
                selected
                    .iter()
                    .map(|(_, f)| f.edges.axis(axis).unwrap_or(&[])),
            )
            .unwrap_or_else(|| Edges::index_axis(values.len_of(Axis(axis))));
            let edges = first.edges.with_axis_replaced(axis, boundaries);
            Ok(Extracted::new(values, edges))
        }
    }
}

/// Joins contiguous boundary sequences; `None` if two neighbours do not share a boundary.
fn join_boundaries<'a, I>(parts: I) -> Option<Vec<f64>>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut joined: Vec<f64> = vec![];
    for part in parts {
        match (joined.last(), part.split_first()) {
            (None, _) => joined.extend_from_slice(part),
            (Some(last), Some((first, rest))) if last == first => joined.extend_from_slice(rest),
            _ => return None,
        }
    }
    Some(joined)
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;

    fn keyed(entries: Vec<(&str, Extracted)>) -> BTreeMap<String, Extracted> {
        entries
            .into_iter()
            .map(|(key, fragment)| (key.to_owned(), fragment))
            .collect()
    }

    fn one_d(values: &[f64], boundaries: &[f64]) -> Extracted {
        Extracted::new(
            arr1(values).into_dyn(),
            Edges::new(vec![boundaries.to_vec()]),
        )
    }

    #[test]
    fn test_stack_along_new_axis() {
        let fragments = keyed(vec![
            ("dirC.hist", one_d(&[5.0, 6.0], &[0.0, 1.0, 2.0])),
            ("dirA.hist", one_d(&[1.0, 2.0], &[0.0, 1.0, 2.0])),
            ("dirB.hist", one_d(&[3.0, 4.0], &[0.0, 1.0, 2.0])),
            ("dirA.other", one_d(&[9.0], &[0.0, 1.0])),
        ]);
        let merged = merge(&fragments, "hist", None).unwrap();
        assert_eq!(
            merged.values,
            arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn()
        );
        assert_eq!(
            merged.edges,
            Edges::new(vec![vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 2.0]])
        );
    }

    #[test]
    fn test_concatenate_contiguous_edges() {
        let fragments = keyed(vec![
            ("low.pt", one_d(&[1.0, 2.0], &[0.0, 0.5, 1.0])),
            ("high.pt", one_d(&[3.0], &[1.0, 2.0])),
        ]);
        // key order: "high" < "low"
        let merged = merge(&fragments, "pt", Some(0)).unwrap();
        assert_eq!(merged.values, arr1(&[3.0, 1.0, 2.0]).into_dyn());
        // 2.0 -> 0.0 is not contiguous
        assert_eq!(merged.edges, Edges::new(vec![vec![0.0, 1.0, 2.0, 3.0]]));

        let fragments = fragments_in_order();
        let merged = merge(&fragments, "pt", Some(0)).unwrap();
        assert_eq!(merged.values, arr1(&[1.0, 2.0, 3.0]).into_dyn());
        assert_eq!(merged.edges, Edges::new(vec![vec![0.0, 0.5, 1.0, 2.0]]));
    }

    fn fragments_in_order() -> BTreeMap<String, Extracted> {
        keyed(vec![
            ("a_low.pt", one_d(&[1.0, 2.0], &[0.0, 0.5, 1.0])),
            ("b_high.pt", one_d(&[3.0], &[1.0, 2.0])),
        ])
    }

    #[test]
    fn test_concatenate_inner_axis() {
        let a = Extracted::new(arr2(&[[1.0], [2.0]]).into_dyn(), Edges::from_shape(&[2, 1]));
        let b = Extracted::new(
            arr2(&[[3.0, 4.0], [5.0, 6.0]]).into_dyn(),
            Edges::new(vec![vec![0.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]]),
        );
        let merged = merge(&keyed(vec![("a.h", a), ("b.h", b)]), "h", Some(1)).unwrap();
        assert_eq!(
            merged.values,
            arr2(&[[1.0, 3.0, 4.0], [2.0, 5.0, 6.0]]).into_dyn()
        );
        assert_eq!(
            merged.edges,
            Edges::new(vec![vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0, 3.0]])
        );
    }

    #[test]
    fn test_shape_mismatch_outside_target_axis() {
        let fragments = keyed(vec![
            ("a.h", one_d(&[1.0, 2.0], &[0.0, 1.0, 2.0])),
            ("b.h", one_d(&[3.0], &[0.0, 1.0])),
        ]);
        let err = merge(&fragments, "h", None).unwrap_err();
        assert_eq!(
            err,
            MergeError::ShapeMismatch {
                key: "b.h".to_owned(),
                expected: vec![2],
                found: vec![1],
            }
        );
        assert!(merge(&fragments, "h", Some(0)).is_ok());
    }

    #[test]
    fn test_no_fragments_and_bad_axis() {
        let fragments = keyed(vec![("hist", one_d(&[1.0], &[0.0, 1.0]))]);
        assert!(matches!(
            merge(&fragments, "hist", None),
            Err(MergeError::NoFragments { .. })
        ));

        let fragments = keyed(vec![("a.hist", one_d(&[1.0], &[0.0, 1.0]))]);
        assert_eq!(
            merge(&fragments, "hist", Some(1)).unwrap_err(),
            MergeError::AxisOutOfRange { axis: 1, ndim: 1 }
        );
    }
}
