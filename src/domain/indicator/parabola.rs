//! Rolling least-squares quadratic fit of close over n bars.
//!
//! Fits y = a·x² + b·x + c with x = 0..n-1 (x = n-1 is the current bar) and
//! reports curvature (2a), slope at the current bar (2a(n-1) + b) and the
//! fitted current value. Needs n >= 3; warmup is n - 1 bars.

use crate::domain::bar::Bar;
use crate::domain::indicator::{valued_series, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_parabola(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period < 3 {
        return IndicatorSeries::empty(IndicatorType::Parabola(period));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let out = (0..bars.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let (a, b, c) = fit_quadratic(&closes[i + 1 - period..=i])?;
            let x = (period - 1) as f64;
            Some(IndicatorValue::Parabola {
                curvature: 2.0 * a,
                slope: 2.0 * a * x + b,
                fitted: a * x * x + b * x + c,
            })
        })
        .collect();

    valued_series(
        bars,
        IndicatorType::Parabola(period),
        out,
        IndicatorValue::Parabola {
            curvature: 0.0,
            slope: 0.0,
            fitted: 0.0,
        },
    )
}

/// Solve the 3x3 normal equations by Cramer's rule. `None` when singular.
fn fit_quadratic(ys: &[f64]) -> Option<(f64, f64, f64)> {
    let mut s = [0.0f64; 5];
    let mut t = [0.0f64; 3];
    for (j, &y) in ys.iter().enumerate() {
        let x = j as f64;
        let mut xp = 1.0;
        for k in 0..5 {
            s[k] += xp;
            if k < 3 {
                t[k] += xp * y;
            }
            xp *= x;
        }
    }
    // | s4 s3 s2 | |a|   |t2|
    // | s3 s2 s1 | |b| = |t1|
    // | s2 s1 s0 | |c|   |t0|
    let m = [[s[4], s[3], s[2]], [s[3], s[2], s[1]], [s[2], s[1], s[0]]];
    let rhs = [t[2], t[1], t[0]];

    let det = det3(&m);
    if det.abs() < 1e-12 {
        return None;
    }
    let mut solution = [0.0; 3];
    for (col, slot) in solution.iter_mut().enumerate() {
        let mut mc = m;
        for row in 0..3 {
            mc[row][col] = rhs[row];
        }
        *slot = det3(&mc) / det;
    }
    Some((solution[0], solution[1], solution[2]))
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}
