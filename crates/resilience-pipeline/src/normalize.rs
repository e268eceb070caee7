//! Min-max metric normalization
//!
//! ```text
//! norm(x) = (x − min) / (max − min)
//! ```
//!
//! Computed over every present value of the current batch. A constant
//! column has no spread to scale by, so its raw values pass through.

/// Min-max normalize a column, keeping missing entries missing
pub fn min_max(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present = values.iter().flatten().copied().filter(|v| v.is_finite());

    let bounds = present.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    });

    let Some((min, max)) = bounds else {
        return vec![None; values.len()];
    };

    let span = max - min;
    values
        .iter()
        .map(|v| {
            v.filter(|x| x.is_finite())
                .map(|x| if span > 0.0 { (x - min) / span } else { x })
        })
        .collect()
}

/// Mean of the present values, `None` when nothing is present
pub fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// `1 − x` for a vulnerability-style component
pub fn complement(value: Option<f64>) -> Option<f64> {
    value.map(|v| 1.0 - v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_min_max_basic() {
        let out = min_max(&[Some(2.0), Some(4.0), Some(6.0)]);
        assert_eq!(out, vec![Some(0.0), Some(0.5), Some(1.0)]);
    }

    #[test]
    fn test_constant_column_passes_through() {
        let out = min_max(&[Some(0.25), Some(0.25), None]);
        assert_eq!(out, vec![Some(0.25), Some(0.25), None]);
    }

    #[test]
    fn test_missing_excluded_from_bounds() {
        let out = min_max(&[Some(1.0), None, Some(3.0)]);
        assert_eq!(out, vec![Some(0.0), None, Some(1.0)]);
    }

    #[test]
    fn test_all_missing() {
        assert_eq!(min_max(&[None, None]), vec![None, None]);
        assert!(min_max(&[]).is_empty());
    }

    #[test]
    fn test_mean_present_skips_missing() {
        let mean = mean_present(&[Some(0.2), None, Some(0.4)]).unwrap();
        assert!((mean - 0.3).abs() < 1e-12);
        assert_eq!(mean_present(&[None, None]), None);
    }

    #[test]
    fn test_complement() {
        assert_eq!(complement(Some(0.25)), Some(0.75));
        assert_eq!(complement(None), None);
    }

    proptest! {
        #[test]
        fn prop_non_degenerate_spans_unit_interval(
            values in prop::collection::vec(-1.0e6f64..1.0e6, 2..64)
        ) {
            let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assume!(hi > lo);

            let input: Vec<Option<f64>> = values.iter().map(|v| Some(*v)).collect();
            let out: Vec<f64> = min_max(&input).into_iter().flatten().collect();

            prop_assert_eq!(out.len(), values.len());
            let out_lo = out.iter().cloned().fold(f64::INFINITY, f64::min);
            let out_hi = out.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(out_lo, 0.0);
            prop_assert_eq!(out_hi, 1.0);
            prop_assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
        }

        #[test]
        fn prop_constant_column_is_identity(value in -1.0e6f64..1.0e6, len in 1usize..32) {
            let input = vec![Some(value); len];
            let out = min_max(&input);
            prop_assert_eq!(out, input);
        }
    }
}
