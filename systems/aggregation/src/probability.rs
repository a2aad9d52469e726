/// Share of `total` carried by `weight`, expressed as a percentage.
///
/// Returns `None` when the total is not positive, since no meaningful share
/// exists for an empty or weightless pool.
#[must_use]
pub fn relative_probability(weight: f64, total: f64) -> Option<f64> {
    (total > 0.0).then(|| weight / total * 100.0)
}

/// Percentage a new prize would carry once `copies` prizes of `weight` join a
/// pool whose weights currently sum to `total`. Returns zero when the combined
/// pool would be weightless.
#[must_use]
pub fn preview_relative_probability(total: f64, weight: f64, copies: u64) -> f64 {
    let denominator = total + weight * copies as f64;
    if denominator > 0.0 {
        weight / denominator * 100.0
    } else {
        0.0
    }
}

/// Formats `value` with at most `digits` decimals, dropping trailing zeros and
/// a dangling decimal point.
#[must_use]
pub fn format_fixed_trimmed(value: f64, digits: usize) -> String {
    let fixed = format!("{value:.digits$}");
    let trimmed = if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.')
    } else {
        fixed.as_str()
    };
    match trimmed {
        "-0" => "0".to_owned(),
        other => other.to_owned(),
    }
}
