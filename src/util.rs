/// Asserts that a numerical value is in the provided interval `[a,b]` and panics
/// with a helpful message if not
///
/// ### Example
/// ```should_panic
/// # use signal_rl::assert_interval;
/// let epsilon = 2.0;
/// assert_interval!(epsilon, 0.0, 1.0);
/// ```
/// This will panic with the message "Invalid value for \`epsilon\`. Must be in the interval \[0, 1\]."
#[macro_export]
macro_rules! assert_interval {
    ($var:expr, $a:expr, $b:expr) => {
        assert!(
            $var >= $a && $var <= $b,
            "Invalid value for `{}`. Must be in the interval [{}, {}].",
            stringify!($var),
            $a,
            $b,
        );
    };
}

/// Index of the largest value in `values`, lowest index on ties
///
/// **Panics** if `values` is empty
pub(crate) fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
        .expect("`values` is not empty")
}

/// Largest value in `values`, or `0.0` when empty
pub(crate) fn max_value(values: &[f32]) -> f32 {
    values
        .iter()
        .copied()
        .max_by(|a, b| a.total_cmp(b))
        .unwrap_or(0.0)
}
