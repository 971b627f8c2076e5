use crate::config::{WEEKLY_FOURIER_ORDER, YEARLY_FOURIER_ORDER};
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

const WEEKLY_PERIOD: f64 = 7.0;
const YEARLY_PERIOD: f64 = 365.25;
/// Ridge penalty on the non-intercept coefficients. Keeps the normal
/// equations well-conditioned on short or flat series.
const RIDGE_LAMBDA: f64 = 1e-4;

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("need at least {need} observations to fit, got {have}")]
    TooFewObservations { have: usize, need: usize },
    #[error("dates and values differ in length ({dates} vs {values})")]
    DimensionMismatch { dates: usize, values: usize },
    #[error("normal equations are singular")]
    Singular,
    #[error("fit produced non-finite coefficients")]
    NonFinite,
}

/// Additive contributions of one prediction: `trend + weekly + yearly`.
#[derive(Clone, Copy, Debug)]
pub struct ComponentValues {
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
}

impl ComponentValues {
    pub fn total(&self) -> f64 {
        self.trend + self.weekly + self.yearly
    }
}

// --- 1. Model ---
// Additive regression on calendar features: a linear trend over normalized
// time plus Fourier terms for the weekly and yearly cycles. Fit once per
// render cycle, evaluated for any calendar date in or beyond the sample.
pub struct SeasonalModel {
    coeffs: Vec<f64>,
    origin: NaiveDate,
    time_scale_days: f64,
    residual_sigma: f64,
    n_observations: usize,
}

fn feature_count() -> usize {
    2 + 2 * WEEKLY_FOURIER_ORDER + 2 * YEARLY_FOURIER_ORDER
}

fn features(date: NaiveDate, origin: NaiveDate, time_scale_days: f64) -> Vec<f64> {
    let mut row = Vec::with_capacity(feature_count());
    row.push(1.0);
    row.push((date - origin).num_days() as f64 / time_scale_days);

    let day_of_week = date.weekday().num_days_from_monday() as f64;
    for k in 1..=WEEKLY_FOURIER_ORDER {
        let angle = 2.0 * std::f64::consts::PI * k as f64 * day_of_week / WEEKLY_PERIOD;
        row.push(angle.sin());
        row.push(angle.cos());
    }

    let day_of_year = date.ordinal0() as f64;
    for k in 1..=YEARLY_FOURIER_ORDER {
        let angle = 2.0 * std::f64::consts::PI * k as f64 * day_of_year / YEARLY_PERIOD;
        row.push(angle.sin());
        row.push(angle.cos());
    }

    row
}

impl SeasonalModel {
    /// Fits the model by ridge-regularized least squares on the normal
    /// equations, solved with a Cholesky factorization.
    pub fn fit(dates: &[NaiveDate], values: &[f64]) -> Result<Self, FitError> {
        if dates.len() != values.len() {
            return Err(FitError::DimensionMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        let p = feature_count();
        // One more observation than coefficients, so sigma stays defined.
        let need = p + 1;
        if dates.len() < need {
            return Err(FitError::TooFewObservations {
                have: dates.len(),
                need,
            });
        }

        let origin = dates[0];
        let span_days = (dates[dates.len() - 1] - origin).num_days();
        let time_scale_days = (span_days.max(1)) as f64;

        // Accumulate X'X and X'y without materializing the design matrix.
        let mut xtx = vec![vec![0.0f64; p]; p];
        let mut xty = vec![0.0f64; p];
        for (&date, &y) in dates.iter().zip(values.iter()) {
            let row = features(date, origin, time_scale_days);
            for i in 0..p {
                xty[i] += row[i] * y;
                for j in i..p {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                xtx[i][j] = xtx[j][i];
            }
        }
        // Penalize everything but the intercept.
        for (i, diag) in xtx.iter_mut().enumerate().skip(1) {
            diag[i] += RIDGE_LAMBDA * dates.len() as f64;
        }

        let coeffs = cholesky_solve(&xtx, &xty).ok_or(FitError::Singular)?;
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(FitError::NonFinite);
        }

        let mut model = Self {
            coeffs,
            origin,
            time_scale_days,
            residual_sigma: 0.0,
            n_observations: dates.len(),
        };

        let dof = (dates.len() - p).max(1) as f64;
        let sse: f64 = dates
            .iter()
            .zip(values.iter())
            .map(|(&date, &y)| {
                let err = y - model.predict(date);
                err * err
            })
            .sum();
        model.residual_sigma = (sse / dof).sqrt();
        if !model.residual_sigma.is_finite() {
            return Err(FitError::NonFinite);
        }

        Ok(model)
    }

    /// Splits a prediction into its additive parts. The intercept belongs to
    /// the trend component.
    pub fn components(&self, date: NaiveDate) -> ComponentValues {
        let row = features(date, self.origin, self.time_scale_days);
        let dot = |lo: usize, hi: usize| -> f64 {
            (lo..hi).map(|i| self.coeffs[i] * row[i]).sum()
        };
        let weekly_end = 2 + 2 * WEEKLY_FOURIER_ORDER;
        ComponentValues {
            trend: dot(0, 2),
            weekly: dot(2, weekly_end),
            yearly: dot(weekly_end, feature_count()),
        }
    }

    pub fn predict(&self, date: NaiveDate) -> f64 {
        self.components(date).total()
    }

    /// In-sample residual standard deviation.
    pub fn residual_sigma(&self) -> f64 {
        self.residual_sigma
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }
}

// --- 2. Solver ---
/// Solves `a * x = b` for a symmetric positive-definite `a`.
fn cholesky_solve(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = a.len();
    let mut l = vec![vec![0.0f64; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Forward substitution: L y = b.
    let mut y = vec![0.0f64; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i][k] * y[k];
        }
        y[i] = sum / l[i][i];
    }

    // Back substitution: L' x = y.
    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in i + 1..n {
            sum -= l[k][i] * x[k];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn daily_dates(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[test]
    fn test_cholesky_solves_known_system() {
        // [[4,2],[2,3]] x = [10, 9]  =>  x = [1.5, 2]
        let a = vec![vec![4.0, 2.0], vec![2.0, 3.0]];
        let b = vec![10.0, 9.0];
        let x = cholesky_solve(&a, &b).unwrap();
        assert!((x[0] - 1.5).abs() < 1e-9);
        assert!((x[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(cholesky_solve(&a, &[1.0, 1.0]).is_none());
    }

    #[test]
    fn test_fit_recovers_linear_trend() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = daily_dates(start, 500);
        let values: Vec<f64> = (0..500).map(|i| 1_000.0 + 2.5 * i as f64).collect();

        let model = SeasonalModel::fit(&dates, &values).unwrap();
        for &probe in &[0usize, 250, 499] {
            let expected = 1_000.0 + 2.5 * probe as f64;
            let got = model.predict(dates[probe]);
            assert!(
                (got - expected).abs() < expected * 0.01,
                "probe {}: expected ~{}, got {}",
                probe,
                expected,
                got
            );
        }
        // A clean line leaves almost no residual.
        assert!(model.residual_sigma() < 5.0);
    }

    #[test]
    fn test_fit_recovers_weekly_cycle() {
        let start = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let dates = daily_dates(start, 420);
        let values: Vec<f64> = dates
            .iter()
            .map(|d| {
                let dow = d.weekday().num_days_from_monday() as f64;
                100.0 + 10.0 * (2.0 * std::f64::consts::PI * dow / 7.0).sin()
            })
            .collect();

        let model = SeasonalModel::fit(&dates, &values).unwrap();
        for (i, &date) in dates.iter().enumerate().take(28) {
            assert!(
                (model.predict(date) - values[i]).abs() < 1.0,
                "day {} diverged",
                i
            );
        }
        // The swing must live in the weekly component, not the trend.
        let monday = model.components(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        let wednesday = model.components(NaiveDate::from_ymd_opt(2021, 3, 3).unwrap());
        assert!((wednesday.weekly - monday.weekly).abs() > 1.0);
    }

    #[test]
    fn test_components_sum_to_prediction() {
        let start = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
        let dates = daily_dates(start, 400);
        let values: Vec<f64> = (0..400).map(|i| 50.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64).collect();
        let model = SeasonalModel::fit(&dates, &values).unwrap();

        let future = start + Duration::days(1_000);
        let parts = model.components(future);
        assert!((parts.total() - model.predict(future)).abs() < 1e-9);
    }

    #[test]
    fn test_fit_rejects_tiny_sample() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = daily_dates(start, 5);
        let values = vec![1.0; 5];
        assert!(matches!(
            SeasonalModel::fit(&dates, &values),
            Err(FitError::TooFewObservations { .. })
        ));
    }

    #[test]
    fn test_fit_rejects_mismatched_input() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = daily_dates(start, 400);
        let values = vec![1.0; 399];
        assert!(matches!(
            SeasonalModel::fit(&dates, &values),
            Err(FitError::DimensionMismatch { .. })
        ));
    }
}
