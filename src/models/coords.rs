use std::ops::{Add, Mul, Sub};

use crate::models::common::Vector2D;

/// ホスト側（Y軸が上）の3次元座標
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3D {
    pub x: f64, // m
    pub y: f64, // m (altitude)
    pub z: f64, // m
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 3次元距離を計算
    pub fn distance(&self, other: &Point3D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    /// 線形補間（tは0〜1に制限）
    pub fn lerp(&self, target: &Point3D, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        *self + (*target - *self) * t
    }
}

impl Add for Point3D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Point3D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Point3D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// 2次元平面座標を指定高度の3次元座標へ射影
///
/// 平面の(x, y)はホストの(x, z)に対応します。
pub fn project(v: Vector2D, altitude: f64) -> Point3D {
    Point3D::new(v.x, altitude, v.y)
}

/// 地表（高度0）への射影
pub fn project_ground(v: Vector2D) -> Point3D {
    project(v, 0.0)
}

/// 3次元座標から2次元平面座標への逆射影（高度は捨てる）
pub fn unproject(p: Point3D) -> Vector2D {
    Vector2D::new(p.x, p.z)
}
