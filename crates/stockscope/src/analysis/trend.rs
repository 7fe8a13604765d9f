//! Linear trend of a price series
//!
//! Ordinary least squares of value against its 0-based position. Direction is
//! the sign of the slope. A slope of exactly 0.0 only comes out of a perfectly
//! flat fitted line (e.g. a constant series); it is reported as `Flat` without
//! any tolerance band.

use crate::error::{Result, ScopeError};
use crate::models::PriceSeries;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of points that define a line
pub const MIN_TREND_POINTS: usize = 2;

/// Slope-sign classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            TrendDirection::Up
        } else if slope < 0.0 {
            TrendDirection::Down
        } else {
            TrendDirection::Flat
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TrendDirection::Up => "upward",
            TrendDirection::Down => "downward",
            TrendDirection::Flat => "flat",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrendDirection::Up => "Up",
            TrendDirection::Down => "Down",
            TrendDirection::Flat => "Flat",
        })
    }
}

/// Fitted line over a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub slope: f64,
    pub intercept: f64,
    pub direction: TrendDirection,
    /// `slope * i + intercept` for every input position
    pub fitted_values: Vec<f64>,
    /// Coefficient of determination; 0.0 when the series has no variance
    pub r_squared: f64,
}

/// Fit a line to `series` against x = 0..n-1
pub fn fit(series: &[f64]) -> Result<TrendResult> {
    let n = series.len();
    if n < MIN_TREND_POINTS {
        return Err(ScopeError::InsufficientData {
            required: MIN_TREND_POINTS,
            actual: n,
        });
    }
    if let Some(pos) = series.iter().position(|v| !v.is_finite()) {
        return Err(ScopeError::InvalidData(format!(
            "non-finite value {} at position {pos}",
            series[pos]
        )));
    }

    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = series.iter().sum::<f64>() / nf;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    let mut ss_yy = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = y - y_mean;
        ss_xy += dx * dy;
        ss_xx += dx * dx;
        ss_yy += dy * dy;
    }

    // ss_xx > 0 for n >= 2
    let slope = ss_xy / ss_xx;
    let intercept = y_mean - slope * x_mean;
    let r_squared = if ss_yy > 0.0 {
        (ss_xy * ss_xy) / (ss_xx * ss_yy)
    } else {
        0.0
    };

    let fitted_values = (0..n).map(|i| slope * i as f64 + intercept).collect();

    Ok(TrendResult {
        slope,
        intercept,
        direction: TrendDirection::from_slope(slope),
        fitted_values,
        r_squared,
    })
}

/// Fit a line to the closing prices of a series
pub fn fit_prices(prices: &PriceSeries) -> Result<TrendResult> {
    fit(&prices.closes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_increasing_series() {
        let trend = fit(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(trend.slope, 1.0);
        assert_eq!(trend.intercept, 1.0);
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.fitted_values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((trend.r_squared - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_flat_series() {
        let trend = fit(&[5.0, 5.0, 5.0, 5.0]).unwrap();
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.intercept, 5.0);
        assert_eq!(trend.direction, TrendDirection::Flat);
        assert_eq!(trend.r_squared, 0.0);
    }

    #[test]
    fn test_fit_decreasing_series() {
        let trend = fit(&[10.0, 8.0, 9.0, 4.0]).unwrap();
        assert!(trend.slope < 0.0);
        assert_eq!(trend.direction, TrendDirection::Down);
        assert_eq!(trend.fitted_values.len(), 4);
    }

    #[test]
    fn test_fit_insufficient_data() {
        for series in [&[][..], &[42.0][..]] {
            match fit(series) {
                Err(ScopeError::InsufficientData { required, actual }) => {
                    assert_eq!(required, 2);
                    assert_eq!(actual, series.len());
                }
                other => panic!("expected InsufficientData, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_fit_two_points() {
        let trend = fit(&[3.0, 1.0]).unwrap();
        assert_eq!(trend.slope, -2.0);
        assert_eq!(trend.intercept, 3.0);
    }

    #[test]
    fn test_fit_rejects_nan() {
        assert!(matches!(
            fit(&[1.0, f64::NAN, 3.0]),
            Err(ScopeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_fit_is_reproducible() {
        let series: Vec<f64> = (0..500)
            .map(|i| (i as f64 * 0.37).sin() * 10.0 + i as f64 * 0.1)
            .collect();
        let a = fit(&series).unwrap();
        let b = fit(&series).unwrap();
        assert_eq!(a.slope.to_bits(), b.slope.to_bits());
        assert_eq!(a.intercept.to_bits(), b.intercept.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_direction_from_slope() {
        assert_eq!(TrendDirection::from_slope(1e-12), TrendDirection::Up);
        assert_eq!(TrendDirection::from_slope(-1e-12), TrendDirection::Down);
        assert_eq!(TrendDirection::from_slope(0.0), TrendDirection::Flat);
        assert_eq!(TrendDirection::from_slope(-0.0), TrendDirection::Flat);
    }
}
