//! Average Directional Index with +DI / -DI (Wilder).
//!
//! +DM = up move when it exceeds the down move and is positive, -DM mirrored.
//! +DI = 100 × smoothed(+DM) / smoothed(TR), DX = 100 × |+DI - -DI| / (+DI + -DI),
//! ADX = Wilder average of DX. Warmup: 2n - 1 bars.

use crate::domain::bar::Bar;
use crate::domain::indicator::{valued_series, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::indicator_helpers::{over_valid, true_ranges, wilder};

pub fn calculate_adx(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.len() < 2 {
        return valued_series(
            bars,
            IndicatorType::Adx(period),
            vec![None; bars.len()],
            placeholder(),
        );
    }

    let tr = true_ranges(bars);
    let mut plus_dm = Vec::with_capacity(bars.len() - 1);
    let mut minus_dm = Vec::with_capacity(bars.len() - 1);
    for pair in bars.windows(2) {
        let up = pair[1].high - pair[0].high;
        let down = pair[0].low - pair[1].low;
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
    }

    let tr_smooth = wilder(&tr[1..], period);
    let plus_smooth = wilder(&plus_dm, period);
    let minus_smooth = wilder(&minus_dm, period);

    let mut di: Vec<Option<(f64, f64)>> = vec![None];
    let mut dx: Vec<Option<f64>> = vec![None];
    for k in 0..plus_dm.len() {
        let pair = match (tr_smooth[k], plus_smooth[k], minus_smooth[k]) {
            (Some(t), Some(p), Some(m)) if t > 0.0 => Some((100.0 * p / t, 100.0 * m / t)),
            (Some(_), Some(_), Some(_)) => Some((0.0, 0.0)),
            _ => None,
        };
        di.push(pair);
        dx.push(pair.map(|(p, m)| {
            let sum = p + m;
            if sum > 0.0 { 100.0 * (p - m).abs() / sum } else { 0.0 }
        }));
    }
    let adx = over_valid(&dx, period, wilder);

    let out = di
        .into_iter()
        .zip(adx)
        .map(|(di, adx)| {
            let ((plus_di, minus_di), adx) = (di?, adx?);
            Some(IndicatorValue::Adx {
                adx,
                plus_di,
                minus_di,
            })
        })
        .collect();

    valued_series(bars, IndicatorType::Adx(period), out, placeholder())
}

fn placeholder() -> IndicatorValue {
    IndicatorValue::Adx {
        adx: 0.0,
        plus_di: 0.0,
        minus_di: 0.0,
    }
}
