use std::ops::{Add, Div, Mul, Sub};

/// 正規化時にゼロベクトルとみなす長さの閾値
pub const NORMALIZE_EPSILON: f64 = 1e-5;

/// 2次元平面上の点・ベクトル
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2D {
    pub x: f64, // m
    pub y: f64, // m
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// ベクトルの長さ
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// 単位ベクトル
    ///
    /// 長さが閾値以下の場合はゼロベクトルを返すため、NaNは発生しません。
    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag > NORMALIZE_EPSILON {
            *self / mag
        } else {
            Self::ZERO
        }
    }

    /// 2点間の距離
    pub fn distance(&self, other: &Vector2D) -> f64 {
        (*other - *self).magnitude()
    }
}

impl Add for Vector2D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vector2D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

// ゼロ除算は呼び出し側の契約違反（IEEEの無限大/NaNがそのまま返る）
impl Div<f64> for Vector2D {
    type Output = Self;

    fn div(self, scalar: f64) -> Self::Output {
        Self::new(self.x / scalar, self.y / scalar)
    }
}

/// 2次元の位置と方位
///
/// 方位は度単位で、0度が+y軸方向、時計回り（+x方向）が正です。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform2D {
    pub position: Vector2D,
    /// 方位（度）
    pub rotation: f64,
}

impl Transform2D {
    pub fn new(x: f64, y: f64, rotation: f64) -> Self {
        Self {
            position: Vector2D::new(x, y),
            rotation,
        }
    }

    pub fn from_position(position: Vector2D, rotation: f64) -> Self {
        Self { position, rotation }
    }

    /// 位置を平行移動
    pub fn translate(&mut self, translation: Vector2D) {
        self.position = self.position + translation;
    }

    /// 指定位置を向くように方位を設定
    pub fn look_at(&mut self, target: Vector2D) {
        self.rotation = Self::heading_towards(self.position, target);
    }

    /// `from`から`to`を向く方位（度、(-180, 180]）
    ///
    /// 0度が+y軸のため、atan2の引数は(dy, dx)ではなく(dx, dy)の順になります。
    pub fn heading_towards(from: Vector2D, to: Vector2D) -> f64 {
        let direction = to - from;
        direction.x.atan2(direction.y).to_degrees()
    }
}

/// 単位換算定数
pub mod constants {
    pub const METERS_PER_KM: f64 = 1000.0;
    pub const SECONDS_PER_HOUR: f64 = 60.0 * 60.0;
    /// km/h → m/s
    pub const KMH_TO_MPS: f64 = METERS_PER_KM / SECONDS_PER_HOUR;
    /// m/s → km/h
    pub const MPS_TO_KMH: f64 = SECONDS_PER_HOUR / METERS_PER_KM;
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 角度を-180度〜180度の範囲に正規化
    pub fn normalize_angle(angle_deg: f64) -> f64 {
        let mut normalized = angle_deg % 360.0;
        if normalized > 180.0 {
            normalized -= 360.0;
        } else if normalized <= -180.0 {
            normalized += 360.0;
        }
        normalized
    }

    /// 角度を0度〜360度の範囲に正規化
    pub fn wrap_360(angle_deg: f64) -> f64 {
        let wrapped = angle_deg.rem_euclid(360.0);
        // rem_euclidは-0.0近傍で360.0を返しうる
        if wrapped >= 360.0 { 0.0 } else { wrapped }
    }

    /// 2つの角度の差を計算（-180度〜180度の範囲）
    pub fn angle_difference(from_deg: f64, to_deg: f64) -> f64 {
        normalize_angle(to_deg - from_deg)
    }

    /// 最短の弧に沿った角度の線形補間（結果は0度〜360度）
    pub fn lerp_angle(from_deg: f64, to_deg: f64, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        wrap_360(from_deg + angle_difference(from_deg, to_deg) * t)
    }
}
