use tracing::{debug_span, trace};

use crate::models::{
    clamper,
    common::{Vector2D, math_utils},
    coords::{self, Point3D},
    traits::{IAgent, IMovable, IWaypointReceiver},
    unit::{Unit, UnitConfig},
};

/// オイラー角（度、0〜360）
///
/// `x`がピッチ、`y`がヨー、`z`がロールです。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EulerAngles {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: math_utils::wrap_360(x),
            y: math_utils::wrap_360(y),
            z: math_utils::wrap_360(z),
        }
    }
}

/// ホスト側ボディの姿勢
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyPose {
    pub position: Point3D,
    pub euler: EulerAngles,
}

/// ボディ追従パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorConfig {
    /// 位置・姿勢の追従率（1/s）。1ティックの補間係数は follow_rate * dt
    pub follow_rate: f64,
    /// ピッチ・ロールの上限（度）
    pub max_tilt_deg: f64,
    /// ピッチ・ロールの平滑化時間（秒）
    pub tilt_smooth_time_s: f64,
    /// 初期高度からの上昇上限（m）。Noneなら高度は制限しない
    pub max_climb_m: Option<f64>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            follow_rate: 10.0,
            max_tilt_deg: 35.0,
            tilt_smooth_time_s: 0.25,
            max_climb_m: None,
        }
    }
}

/// ユニットをホスト側のボディに結び付けるナビゲーター
///
/// 毎ティック`Unit`を更新し、その2次元の結果を3次元へ射影してボディを
/// 追従させます。ヨーはユニットの方位、ピッチ・ロールは外乱に対して
/// 平滑クランプで±`max_tilt_deg`以内に保ちます。
#[derive(Debug, Clone)]
pub struct UnitNavigator {
    id: String,
    unit: Unit,
    config: NavigatorConfig,
    body: BodyPose,
    prev_euler: EulerAngles,
    prev_altitude: f64,
    base_altitude: f64,
}

impl UnitNavigator {
    /// ボディの初期姿勢からナビゲーターを生成
    ///
    /// ユニットの初期位置はボディ位置の逆射影、初期方位はボディのヨーです。
    pub fn new(
        id: String,
        unit_config: UnitConfig,
        config: NavigatorConfig,
        body: BodyPose,
    ) -> Self {
        let plane = coords::unproject(body.position);
        let unit = Unit::new(unit_config, plane.x, plane.y, body.euler.y);

        Self {
            id,
            unit,
            config,
            body,
            prev_euler: body.euler,
            prev_altitude: body.position.y,
            base_altitude: body.position.y,
        }
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn body(&self) -> BodyPose {
        self.body
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// ホスト座標でのウェイポイント追加
    pub fn add_waypoint_3d(&mut self, point: Point3D, additive: bool) {
        self.unit.add_waypoint(coords::unproject(point), additive);
    }

    /// 経路を地表へ射影したもの（表示用）
    pub fn route_3d(&self) -> Vec<Point3D> {
        self.unit
            .route()
            .into_iter()
            .map(coords::project_ground)
            .collect()
    }

    /// 外乱（物理エンジンによる押し出しや傾き）をボディへ加える
    pub fn disturb(&mut self, position_delta: Point3D, euler_delta: EulerAngles) {
        self.body.position = self.body.position + position_delta;
        self.body.euler = EulerAngles::new(
            self.body.euler.x + euler_delta.x,
            self.body.euler.y + euler_delta.y,
            self.body.euler.z + euler_delta.z,
        );
    }

    /// 固定時間刻みでの更新
    pub fn fixed_update(&mut self, dt: f64) {
        let _span = debug_span!("unit", id = %self.id).entered();

        self.unit.update(dt);
        if !(dt > 0.0 && dt.is_finite()) {
            return;
        }

        let t = (self.config.follow_rate * dt).min(1.0);

        // 高度は外部（ボディ）の値を維持し、平面位置のみユニットに追従
        let altitude = self.constrain_altitude(dt);
        let target = coords::project(self.unit.position(), altitude);
        self.body.position = self.body.position.lerp(&target, t);
        self.body.position.y = altitude;

        let angles = self.body.euler;
        let (pitch, pitch_clamped) = clamper::smooth_clamp_angle_min_max(
            self.prev_euler.x,
            angles.x,
            -self.config.max_tilt_deg,
            self.config.max_tilt_deg,
            dt,
            self.config.tilt_smooth_time_s,
        );
        let (roll, roll_clamped) = clamper::smooth_clamp_angle_min_max(
            self.prev_euler.z,
            angles.z,
            -self.config.max_tilt_deg,
            self.config.max_tilt_deg,
            dt,
            self.config.tilt_smooth_time_s,
        );
        if pitch_clamped || roll_clamped {
            trace!("傾き制限: pitch={:.2} roll={:.2}", pitch, roll);
        }

        // ピッチ・ロールはクランプ結果をそのまま、ヨーのみ補間
        let yaw = math_utils::lerp_angle(self.body.euler.y, self.unit.heading(), t);
        self.body.euler = EulerAngles::new(pitch, yaw, roll);
        self.prev_euler = self.body.euler;
    }

    /// 初期高度を下限（ハード）、初期高度 + max_climb_m を上限（平滑）として高度を制限
    fn constrain_altitude(&mut self, dt: f64) -> f64 {
        let current = self.body.position.y;
        let altitude = match self.config.max_climb_m {
            None => current,
            Some(max_climb) => {
                let (altitude, _) = clamper::smooth_clamp_max(
                    self.prev_altitude,
                    current,
                    self.base_altitude,
                    self.base_altitude + max_climb,
                    dt,
                    self.config.tilt_smooth_time_s,
                );
                altitude
            }
        };
        self.prev_altitude = altitude;
        altitude
    }
}

impl IAgent for UnitNavigator {
    fn tick(&mut self, dt: f64) {
        self.fixed_update(dt);
    }

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn is_active(&self) -> bool {
        !self.unit.is_stopped()
    }
}

impl IMovable for UnitNavigator {
    fn get_position(&self) -> Vector2D {
        self.unit.position()
    }

    fn get_heading(&self) -> f64 {
        self.unit.heading()
    }

    fn get_destination(&self) -> Vector2D {
        self.unit.destination()
    }
}

impl IWaypointReceiver for UnitNavigator {
    fn add_waypoint(&mut self, point: Vector2D, additive: bool) {
        self.unit.add_waypoint(point, additive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.02;

    fn unit_config() -> UnitConfig {
        UnitConfig {
            max_speed: 10.0,
            accelerate_time: 1.0,
            decelerate_time: 1.0,
            waypoint_arrival_tolerance: 0.1,
            max_angular_speed: None,
        }
    }

    fn navigator(config: NavigatorConfig, altitude: f64) -> UnitNavigator {
        let body = BodyPose {
            position: Point3D::new(0.0, altitude, 0.0),
            euler: EulerAngles::default(),
        };
        UnitNavigator::new("U001".to_string(), unit_config(), config, body)
    }

    #[test]
    fn test_body_follows_unit_on_plane() {
        let mut nav = navigator(NavigatorConfig::default(), 2.0);
        nav.add_waypoint_3d(Point3D::new(20.0, 99.0, 10.0), false);
        assert_eq!(nav.unit().destination(), Vector2D::new(20.0, 10.0));
        assert_eq!(nav.route_3d(), vec![Point3D::new(20.0, 0.0, 10.0)]);

        for _ in 0..3000 {
            nav.fixed_update(DT);
        }
        assert!(nav.unit().is_stopped());

        let body = nav.body();
        assert!((body.position.x - 20.0).abs() < 0.1);
        assert!((body.position.z - 10.0).abs() < 0.1);
        assert_eq!(body.position.y, 2.0);

        // ヨーはユニットの方位（0〜360表現）
        let heading = math_utils::wrap_360(nav.unit().heading());
        assert!(math_utils::angle_difference(body.euler.y, heading).abs() < 1e-3);
    }

    #[test]
    fn test_tilt_disturbance_is_limited() {
        let mut nav = navigator(NavigatorConfig::default(), 0.0);
        for _ in 0..200 {
            nav.disturb(Point3D::default(), EulerAngles::new(5.0, 0.0, -5.0));
            nav.fixed_update(DT);
            let pitch = math_utils::normalize_angle(nav.body().euler.x);
            let roll = math_utils::normalize_angle(nav.body().euler.z);
            assert!(pitch.abs() <= 35.0 + 1e-9, "pitch {}", pitch);
            assert!(roll.abs() <= 35.0 + 1e-9, "roll {}", roll);
        }
    }

    #[test]
    fn test_altitude_is_limited() {
        let config = NavigatorConfig {
            max_climb_m: Some(1.0),
            ..NavigatorConfig::default()
        };
        let mut nav = navigator(config, 5.0);

        for _ in 0..100 {
            nav.disturb(Point3D::new(0.0, 0.5, 0.0), EulerAngles::default());
            nav.fixed_update(DT);
            assert!(nav.body().position.y <= 6.0 + 1e-9);
        }

        // 下限はハードクランプ
        nav.disturb(Point3D::new(0.0, -10.0, 0.0), EulerAngles::default());
        nav.fixed_update(DT);
        assert_eq!(nav.body().position.y, 5.0);
    }

    #[test]
    fn test_agent_interface() {
        let mut nav = navigator(NavigatorConfig::default(), 0.0);
        assert_eq!(nav.get_id(), "U001");
        assert!(!nav.is_active());

        IWaypointReceiver::add_waypoint(&mut nav, Vector2D::new(0.0, 5.0), false);
        assert!(nav.is_active());
        assert_eq!(nav.get_destination(), Vector2D::new(0.0, 5.0));

        nav.tick(DT);
        assert!(nav.get_position().y > 0.0);
    }
}
