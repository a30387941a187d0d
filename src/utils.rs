//! Numeric helpers shared by both solvers.

use ordered_float::NotNan;

/// Index of the highest value. Ties go to the first occurrence, NaN entries
/// are ignored.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| NotNan::new(*v).ok().map(|v| (i, v)))
        .fold(None, |best: Option<(usize, NotNan<f64>)>, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Highest value, `None` for an empty (or all NaN) slice.
pub fn max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .filter_map(|v| NotNan::new(*v).ok())
        .max()
        .map(NotNan::into_inner)
}
