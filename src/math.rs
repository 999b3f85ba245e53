use itertools::izip;

#[inline]
pub(crate) fn logaddexp(a: f64, b: f64) -> f64 {
    if a == b {
        return a + 2f64.ln();
    }
    let diff = a - b;
    if diff > 0. {
        a + (-diff).exp().ln_1p()
    } else if diff < 0. {
        b + diff.exp().ln_1p()
    } else {
        // diff is NAN
        diff
    }
}

/// Stable `log(sum(exp(vals)))`. `-inf` entries drop out instead of
/// poisoning the sum, so zero-mass categories are handled.
pub(crate) fn logsumexp(vals: &[f64]) -> f64 {
    vals.iter()
        .fold(f64::NEG_INFINITY, |acc, &x| logaddexp(acc, x))
}

/// Writes the softmax of `vals` into `out`.
pub(crate) fn softmax(vals: &[f64], out: &mut [f64]) {
    assert!(vals.len() == out.len());
    let norm = logsumexp(vals);
    izip!(vals, out.iter_mut()).for_each(|(&val, out)| {
        *out = (val - norm).exp();
    });
}
