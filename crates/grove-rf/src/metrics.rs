//! Scoring functions shared by `score` and out-of-bag evaluation.

use crate::error::RfError;

fn check_pair_len(n_true: usize, n_pred: usize) -> Result<(), RfError> {
    if n_true == 0 {
        return Err(RfError::EmptyDataset);
    }
    if n_true != n_pred {
        return Err(RfError::TargetLengthMismatch {
            n_rows: n_pred,
            n_targets: n_true,
        });
    }
    Ok(())
}

/// Coefficient of determination, `1 - Σ(y - ŷ)² / Σ(y - ȳ)²`.
///
/// When every `y_true` is identical the denominator is zero; the score is
/// then 1.0 for an exact fit and 0.0 otherwise.
///
/// # Errors
///
/// [`RfError::EmptyDataset`] for empty input, [`RfError::TargetLengthMismatch`]
/// when the slices differ in length.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64, RfError> {
    check_pair_len(y_true.len(), y_pred.len())?;

    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean) * (t - mean)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Fraction of rows whose predicted label equals the true label.
///
/// # Errors
///
/// [`RfError::EmptyDataset`] for empty input, [`RfError::TargetLengthMismatch`]
/// when the slices differ in length.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64, RfError> {
    check_pair_len(y_true.len(), y_pred.len())?;
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}
