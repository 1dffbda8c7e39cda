//! # Clamper モジュール
//!
//! 値の変化率を考慮した平滑クランプを提供します。
//!
//! 単純に値を上下限で切り詰めるのではなく、現在の変化率で`smooth_time`秒先まで
//! 外挿した予測値が上下限を超える場合にのみ、その時点でちょうど上下限に到達する
//! 変化率へ置き換えます。これにより上下限へは漸近的に近づきます。
//! `smooth_time`が大きいほど早く・穏やかに補正されます。
//!
//! 戻り値はすべて`(値, クランプされたか)`の組です。

/// 上下限の両方を平滑クランプ
pub fn smooth_clamp_min_max(
    prev: f64,
    next: f64,
    min: f64,
    max: f64,
    dt: f64,
    smooth_time: f64,
) -> (f64, bool) {
    let slope = (next - prev) / dt;
    let predicted = prev + slope * smooth_time;

    if predicted > max {
        let slope = (max - prev) / smooth_time;
        (prev + slope * dt, true)
    } else if predicted < min {
        let slope = (min - prev) / smooth_time;
        (prev + slope * dt, true)
    } else {
        (next, false)
    }
}

/// 上限のみ平滑クランプし、下限はハードクランプ
///
/// 水平へ即座に戻す必要がある傾きなど、下限側を緩和してはならない値に使用します。
pub fn smooth_clamp_max(
    prev: f64,
    next: f64,
    min: f64,
    max: f64,
    dt: f64,
    smooth_time: f64,
) -> (f64, bool) {
    let slope = (next - prev) / dt;
    let predicted = prev + slope * smooth_time;

    if predicted > max {
        let slope = (max - prev) / smooth_time;
        (prev + slope * dt, true)
    } else if next < min {
        (min, true)
    } else {
        (next, false)
    }
}

/// 角度（度）の平滑クランプ
///
/// 0〜360度で表現された角度を(-180, 180]に写してから`smooth_clamp_min_max`に委譲します。
/// `prev`と`next`が±180度の境界を挟んで大きく離れている場合は扱えないため、
/// 1ティックあたりの回転量は小さく保つ必要があります。
pub fn smooth_clamp_angle_min_max(
    prev: f64,
    next: f64,
    min: f64,
    max: f64,
    dt: f64,
    smooth_time: f64,
) -> (f64, bool) {
    smooth_clamp_min_max(signed_angle(prev), signed_angle(next), min, max, dt, smooth_time)
}

fn signed_angle(angle_deg: f64) -> f64 {
    if angle_deg > 180.0 {
        angle_deg - 360.0
    } else {
        angle_deg
    }
}

/// [-limit, limit]への対称ハードクランプ（limit == 0 は制限なし）
pub fn constrain(value: f64, limit: f64) -> (f64, bool) {
    if limit == 0.0 || value.abs() <= limit {
        (value, false)
    } else {
        (value.clamp(-limit, limit), true)
    }
}
