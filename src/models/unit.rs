use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::models::{
    clamper,
    common::{NORMALIZE_EPSILON, Transform2D, Vector2D, math_utils},
    traits::{IMovable, IWaypointReceiver},
};

/// ユニットの運動パラメータ
///
/// 生成後は変更されません。加速・減速時間は、一定加速度で0から最大速度まで
/// 変化するのに要する秒数です。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConfig {
    /// 最大速度（m/s）
    pub max_speed: f64,
    /// 最大速度までの加速時間（秒）
    pub accelerate_time: f64,
    /// 最大速度からの減速時間（秒）
    pub decelerate_time: f64,
    /// ウェイポイント到達判定距離（m）
    pub waypoint_arrival_tolerance: f64,
    /// 最大旋回角速度（deg/s）。Noneの場合は即座に目的地を向く
    pub max_angular_speed: Option<f64>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            max_speed: 60.0,
            accelerate_time: 3.0,
            decelerate_time: 1.5,
            waypoint_arrival_tolerance: 1.0,
            max_angular_speed: None,
        }
    }
}

/// 運動パラメータの検証エラー
#[derive(Debug, Error, PartialEq)]
pub enum UnitConfigError {
    #[error("{field} must be positive and finite (got {value})")]
    NotPositive { field: &'static str, value: f64 },
}

impl UnitConfig {
    /// 全パラメータが正の有限値であることを検証
    pub fn validate(&self) -> Result<(), UnitConfigError> {
        let mut fields = vec![
            ("max_speed", self.max_speed),
            ("accelerate_time", self.accelerate_time),
            ("decelerate_time", self.decelerate_time),
            ("waypoint_arrival_tolerance", self.waypoint_arrival_tolerance),
        ];
        if let Some(w) = self.max_angular_speed {
            fields.push(("max_angular_speed", w));
        }

        for (field, value) in fields {
            if !(value > 0.0 && value.is_finite()) {
                return Err(UnitConfigError::NotPositive { field, value });
            }
        }
        Ok(())
    }
}

/// ユニットの運動状態
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitState {
    /// 停止中（経路は空）
    Stopped,
    /// 目的地へ加速・巡航中
    Driving,
    /// 目的地へ減速中。遷移時点の距離と速度を基準に比例減速する
    Stopping { from_distance: f64, from_speed: f64 },
}

impl UnitState {
    pub fn name(&self) -> &'static str {
        match self {
            UnitState::Stopped => "Stopped",
            UnitState::Driving => "Driving",
            UnitState::Stopping { .. } => "Stopping",
        }
    }
}

/// ウェイポイント追従ユニット
///
/// 先頭のウェイポイントへ向けて加速し、最大速度で巡航し、停止距離に入ったら
/// 比例減速して到達判定距離内で停止します。経路が残っていれば次の
/// ウェイポイントへ進みます。
///
/// 速度は前ティックとの位置差分から求めるため、`update`には一定の`dt`を
/// 与える必要があります。
#[derive(Debug, Clone)]
pub struct Unit {
    config: UnitConfig,
    transform: Transform2D,
    /// 前ティック更新前の姿勢（速度推定用）
    prev_transform: Transform2D,
    waypoints: VecDeque<Vector2D>,
    state: UnitState,
    /// 直前ティックの実移動速度（m/s）
    speed: f64,
    /// 到達したウェイポイント数
    arrivals: u32,
}

impl Unit {
    /// 初期姿勢を指定してユニットを生成
    pub fn new(config: UnitConfig, x: f64, y: f64, rotation: f64) -> Self {
        let mut unit = Self {
            config,
            transform: Transform2D::default(),
            prev_transform: Transform2D::default(),
            waypoints: VecDeque::new(),
            state: UnitState::Stopped,
            speed: 0.0,
            arrivals: 0,
        };
        unit.teleport(Transform2D::new(x, y, rotation));
        unit
    }

    /// 姿勢を即座に設定（前ティックの姿勢も同じにするため速度は0になる）
    pub fn teleport(&mut self, transform: Transform2D) {
        let transform = Transform2D::from_position(
            transform.position,
            math_utils::normalize_angle(transform.rotation),
        );
        self.transform = transform;
        self.prev_transform = transform;
        self.speed = 0.0;
    }

    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    pub fn position(&self) -> Vector2D {
        self.transform.position
    }

    /// 方位（度、(-180, 180]）
    pub fn heading(&self) -> f64 {
        self.transform.rotation
    }

    pub fn transform(&self) -> Transform2D {
        self.transform
    }

    /// 現在の目的地（経路が空なら現在位置）
    pub fn destination(&self) -> Vector2D {
        self.waypoints
            .front()
            .copied()
            .unwrap_or(self.transform.position)
    }

    /// 経路のスナップショット（表示用）
    pub fn route(&self) -> Vec<Vector2D> {
        self.waypoints.iter().copied().collect()
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == UnitState::Stopped
    }

    /// 直前ティックの移動速度（m/s）
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn arrivals(&self) -> u32 {
        self.arrivals
    }

    /// ウェイポイントの追加
    ///
    /// `additive`がfalseの場合は経路を置き換えます。経路長がちょうど1になった場合は
    /// Drivingへ遷移し、新しい先頭への追従をやり直します。
    pub fn add_waypoint(&mut self, point: Vector2D, additive: bool) {
        if !additive {
            self.waypoints.clear();
        }
        self.waypoints.push_back(point);
        trace!(
            "ウェイポイント追加: ({:.2}, {:.2}) additive={} 経路長={}",
            point.x,
            point.y,
            additive,
            self.waypoints.len()
        );

        if self.waypoints.len() == 1 {
            self.transition(UnitState::Driving);
        }
    }

    /// 経路を破棄して停止状態にする（その場で停止）
    pub fn clear_route(&mut self) {
        self.waypoints.clear();
        self.transition(UnitState::Stopped);
    }

    /// 1ティック分の更新
    ///
    /// `dt`が正の有限値でない場合は何もしません。
    pub fn update(&mut self, dt: f64) {
        if !(dt > 0.0 && dt.is_finite()) {
            warn!("不正な時間刻みのため更新をスキップ: dt={}", dt);
            return;
        }

        let current = self.transform;

        match self.state {
            UnitState::Stopped => {}
            UnitState::Driving => self.drive(dt),
            UnitState::Stopping {
                from_distance,
                from_speed,
            } => self.stop(dt, from_distance, from_speed),
        }

        self.speed = (self.transform.position - current.position).magnitude() / dt;
        self.prev_transform = current;
    }

    fn drive(&mut self, dt: f64) {
        let Some(destination) = self.active_destination() else {
            return;
        };

        let delta = destination - self.transform.position;
        let distance = delta.magnitude();

        // 後退差分による速度推定
        let current_speed =
            (self.transform.position - self.prev_transform.position).magnitude() / dt;

        // 等減速を仮定すると平均速度は現在速度の半分
        let distance_to_stop = self.config.decelerate_time * current_speed / 2.0;

        // 正規化できないほど近い場合も減速側の到達判定へ回す
        if distance <= distance_to_stop || distance <= NORMALIZE_EPSILON {
            self.transition(UnitState::Stopping {
                from_distance: distance,
                from_speed: current_speed,
            });
            self.stop(dt, distance, current_speed);
            return;
        }

        // accelerate_time秒で最大速度に達する1ティックあたりの増速量（dt一定が前提）
        let time_steps_to_max_speed = self.config.accelerate_time / dt;
        let max_acceleration = self.config.max_speed / time_steps_to_max_speed;
        let desired_speed = (current_speed + max_acceleration).min(self.config.max_speed);

        let target_heading = Transform2D::heading_towards(self.transform.position, destination);
        self.translate_towards(delta, distance, desired_speed * dt);
        self.turn_towards(target_heading, dt);
    }

    fn stop(&mut self, dt: f64, from_distance: f64, from_speed: f64) {
        let Some(destination) = self.active_destination() else {
            return;
        };

        let delta = destination - self.transform.position;
        let distance = delta.magnitude();

        // 方向が求まらない距離、または基準距離が0の場合は比例減速できないため到達扱い
        if distance < self.config.waypoint_arrival_tolerance
            || distance <= NORMALIZE_EPSILON
            || from_distance <= NORMALIZE_EPSILON
        {
            self.arrive();
        } else {
            // 残距離に比例して速度が0へ線形に落ちる
            let desired_speed = (distance / from_distance) * from_speed;
            self.translate_towards(delta, distance, desired_speed * dt);
        }
    }

    /// 目的地方向へ移動（1ティックの移動量は残距離を超えない）
    fn translate_towards(&mut self, delta: Vector2D, distance: f64, step_length: f64) {
        let direction = delta.normalized();
        let step = direction * step_length.min(distance);
        self.transform.translate(step);
    }

    fn turn_towards(&mut self, target_heading: f64, dt: f64) {
        self.transform.rotation = match self.config.max_angular_speed {
            None => target_heading,
            Some(max_angular_speed) => {
                let diff = math_utils::angle_difference(self.transform.rotation, target_heading);
                let (limited, _) = clamper::constrain(diff, max_angular_speed * dt);
                math_utils::normalize_angle(self.transform.rotation + limited)
            }
        };
    }

    fn arrive(&mut self) {
        let reached = self.waypoints.pop_front();
        self.arrivals += 1;
        if let Some(point) = reached {
            debug!(
                "ウェイポイント到達: ({:.2}, {:.2}) 残り{}点",
                point.x,
                point.y,
                self.waypoints.len()
            );
        }

        if self.waypoints.is_empty() {
            self.transition(UnitState::Stopped);
        } else {
            self.transition(UnitState::Driving);
        }
    }

    /// Driving/Stopping中の目的地。経路が空なら不変条件違反
    fn active_destination(&mut self) -> Option<Vector2D> {
        debug_assert!(
            !self.waypoints.is_empty(),
            "{} state with an empty route",
            self.state.name()
        );

        let front = self.waypoints.front().copied();
        if front.is_none() {
            error!("経路が空のまま{}状態になっています。停止します", self.state.name());
            self.transition(UnitState::Stopped);
        }
        front
    }

    fn transition(&mut self, next: UnitState) {
        if self.state.name() != next.name() {
            debug!("状態遷移: {} -> {}", self.state.name(), next.name());
        }
        self.state = next;
    }
}

impl IMovable for Unit {
    fn get_position(&self) -> Vector2D {
        self.position()
    }

    fn get_heading(&self) -> f64 {
        self.heading()
    }

    fn get_destination(&self) -> Vector2D {
        self.destination()
    }
}

impl IWaypointReceiver for Unit {
    fn add_waypoint(&mut self, point: Vector2D, additive: bool) {
        Unit::add_waypoint(self, point, additive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.02;

    fn scenario_config() -> UnitConfig {
        UnitConfig {
            max_speed: 10.0,
            accelerate_time: 1.0,
            decelerate_time: 1.0,
            waypoint_arrival_tolerance: 0.1,
            max_angular_speed: None,
        }
    }

    /// 停止するまで更新し、要したティック数を返す
    fn run_until_stopped(unit: &mut Unit, max_ticks: usize) -> usize {
        for tick in 1..=max_ticks {
            unit.update(DT);
            if unit.is_stopped() {
                return tick;
            }
        }
        panic!("unit did not stop within {} ticks", max_ticks);
    }

    #[test]
    fn test_idle_unit_does_not_move() {
        let mut unit = Unit::new(scenario_config(), 3.0, -2.0, 45.0);
        for _ in 0..100 {
            unit.update(DT);
        }
        assert_eq!(unit.position(), Vector2D::new(3.0, -2.0));
        assert_eq!(unit.heading(), 45.0);
        assert_eq!(unit.state(), UnitState::Stopped);
        assert_eq!(unit.destination(), unit.position());
        assert!(unit.route().is_empty());
    }

    #[test]
    fn test_initial_heading_is_normalized() {
        let unit = Unit::new(scenario_config(), 0.0, 0.0, 270.0);
        assert!((unit.heading() + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_concrete_drive_to_waypoint() {
        let mut unit = Unit::new(scenario_config(), 0.0, 0.0, 0.0);
        let waypoint = Vector2D::new(100.0, 0.0);

        unit.add_waypoint(waypoint, false);
        assert_eq!(unit.state(), UnitState::Driving);
        assert_eq!(unit.destination(), waypoint);

        // 1ティックあたり 10 * 0.02 / 1 = 0.2 m/s ずつ加速
        for _ in 0..25 {
            unit.update(DT);
        }
        assert!((unit.speed() - 5.0).abs() < 1e-6, "speed {}", unit.speed());
        for _ in 0..25 {
            unit.update(DT);
        }
        assert!((unit.speed() - 10.0).abs() < 1e-6, "speed {}", unit.speed());
        assert!((unit.heading() - 90.0).abs() < 1e-9);

        // 巡航速度は最大速度を超えない
        for _ in 0..100 {
            unit.update(DT);
            assert!(unit.speed() <= 10.0 + 1e-9);
        }

        let mut saw_stopping = false;
        for _ in 0..2000 {
            unit.update(DT);
            if let UnitState::Stopping { from_distance, from_speed } = unit.state() {
                if !saw_stopping {
                    // 停止距離 = 1 * 10 / 2 = 5m で減速開始
                    assert!(from_distance <= 5.0 + 1e-9);
                    assert!(from_distance > 4.5);
                    assert!((from_speed - 10.0).abs() < 1e-6);
                }
                saw_stopping = true;
            }
            if unit.is_stopped() {
                break;
            }
        }

        assert!(saw_stopping);
        assert_eq!(unit.state(), UnitState::Stopped);
        assert!(unit.position().distance(&waypoint) < 0.1);
        assert_eq!(unit.arrivals(), 1);
        assert!(unit.route().is_empty());
    }

    #[test]
    fn test_arrival_convergence_for_various_distances() {
        for &distance in &[0.05, 0.5, 3.0, 17.0, 250.0] {
            for &max_speed in &[1.0, 10.0, 40.0] {
                let config = UnitConfig {
                    max_speed,
                    ..scenario_config()
                };
                let mut unit = Unit::new(config, 0.0, 0.0, 0.0);
                let waypoint = Vector2D::new(distance * 0.6, -distance * 0.8);
                unit.add_waypoint(waypoint, false);
                run_until_stopped(&mut unit, 100_000);
                assert!(
                    unit.position().distance(&waypoint) < config.waypoint_arrival_tolerance,
                    "distance {} max_speed {}",
                    distance,
                    max_speed
                );
            }
        }
    }

    #[test]
    fn test_no_overshoot() {
        let config = UnitConfig {
            max_speed: 50.0,
            accelerate_time: 0.1,
            decelerate_time: 0.1,
            waypoint_arrival_tolerance: 0.01,
            max_angular_speed: None,
        };
        let mut unit = Unit::new(config, 0.0, 0.0, 0.0);
        unit.add_waypoint(Vector2D::new(3.0, 4.0), false);
        unit.add_waypoint(Vector2D::new(-2.0, 1.0), true);

        for _ in 0..10_000 {
            let before = unit.position();
            let remaining = before.distance(&unit.destination());
            unit.update(DT);
            let step = before.distance(&unit.position());
            assert!(step <= remaining + 1e-9, "step {} > remaining {}", step, remaining);
            if unit.is_stopped() {
                break;
            }
        }
        assert!(unit.is_stopped());
        assert_eq!(unit.arrivals(), 2);
    }

    #[test]
    fn test_deceleration_is_monotonic() {
        let mut unit = Unit::new(scenario_config(), 0.0, 0.0, 0.0);
        unit.add_waypoint(Vector2D::new(0.0, 40.0), false);

        let mut last_speed: Option<f64> = None;
        for _ in 0..5000 {
            unit.update(DT);
            match unit.state() {
                UnitState::Stopping { .. } => {
                    if let Some(prev) = last_speed {
                        assert!(unit.speed() <= prev + 1e-9);
                    }
                    last_speed = Some(unit.speed());
                }
                UnitState::Stopped => break,
                UnitState::Driving => {}
            }
        }
        assert!(last_speed.is_some());
        assert!(unit.is_stopped());
    }

    #[test]
    fn test_additive_and_replace() {
        let mut unit = Unit::new(scenario_config(), 0.0, 0.0, 0.0);
        let p1 = Vector2D::new(10.0, 0.0);
        let p2 = Vector2D::new(10.0, 10.0);
        let p3 = Vector2D::new(-5.0, 0.0);

        unit.add_waypoint(p1, false);
        unit.add_waypoint(p2, true);
        assert_eq!(unit.route(), vec![p1, p2]);
        assert_eq!(unit.destination(), p1);

        unit.add_waypoint(p3, false);
        assert_eq!(unit.route(), vec![p3]);
        assert_eq!(unit.destination(), p3);
        assert_eq!(unit.state(), UnitState::Driving);
    }

    #[test]
    fn test_replace_while_stopping_restarts_driving() {
        let mut unit = Unit::new(scenario_config(), 0.0, 0.0, 0.0);
        unit.add_waypoint(Vector2D::new(20.0, 0.0), false);
        while !matches!(unit.state(), UnitState::Stopping { .. }) {
            unit.update(DT);
        }

        unit.add_waypoint(Vector2D::new(20.0, 50.0), false);
        assert_eq!(unit.state(), UnitState::Driving);
        run_until_stopped(&mut unit, 10_000);
        assert!(unit.position().distance(&Vector2D::new(20.0, 50.0)) < 0.1);
    }

    #[test]
    fn test_follows_route_in_order() {
        let mut unit = Unit::new(scenario_config(), 0.0, 0.0, 0.0);
        let route = [
            Vector2D::new(10.0, 0.0),
            Vector2D::new(10.0, 10.0),
            Vector2D::new(0.0, 10.0),
        ];
        unit.add_waypoint(route[0], false);
        for p in &route[1..] {
            unit.add_waypoint(*p, true);
        }

        let mut reached = Vec::new();
        for _ in 0..20_000 {
            let before = unit.route().len();
            unit.update(DT);
            if unit.route().len() < before {
                reached.push(unit.position());
            }
            if unit.is_stopped() {
                break;
            }
        }

        assert_eq!(reached.len(), 3);
        for (pos, expected) in reached.iter().zip(route.iter()) {
            assert!(pos.distance(expected) < 0.1);
        }
        assert_eq!(unit.arrivals(), 3);
    }

    #[test]
    fn test_waypoint_at_current_position_stops_immediately() {
        let mut unit = Unit::new(scenario_config(), 5.0, 5.0, 30.0);
        unit.add_waypoint(Vector2D::new(5.0, 5.0), false);
        unit.update(DT);
        assert!(unit.is_stopped());
        assert_eq!(unit.position(), Vector2D::new(5.0, 5.0));
        assert_eq!(unit.heading(), 30.0);
        assert_eq!(unit.arrivals(), 1);
    }

    #[test]
    fn test_waypoint_closer_than_normalize_epsilon_arrives() {
        let mut unit = Unit::new(scenario_config(), 0.0, 0.0, 0.0);
        unit.add_waypoint(Vector2D::new(5e-6, 0.0), false);
        let ticks = run_until_stopped(&mut unit, 10);
        assert_eq!(ticks, 1);
        assert_eq!(unit.arrivals(), 1);
        assert!(unit.route().is_empty());
    }

    #[test]
    fn test_tiny_tolerance_still_arrives() {
        let config = UnitConfig {
            waypoint_arrival_tolerance: 1e-6,
            ..scenario_config()
        };
        assert!(config.validate().is_ok());

        let mut unit = Unit::new(config, 0.0, 0.0, 0.0);
        let waypoint = Vector2D::new(10.0, 0.0);
        unit.add_waypoint(waypoint, false);
        run_until_stopped(&mut unit, 100_000);
        assert!(unit.position().distance(&waypoint) <= NORMALIZE_EPSILON);
        assert_eq!(unit.arrivals(), 1);
    }

    #[test]
    fn test_degenerate_dt_is_ignored() {
        let mut unit = Unit::new(scenario_config(), 0.0, 0.0, 0.0);
        unit.add_waypoint(Vector2D::new(10.0, 0.0), false);
        for _ in 0..10 {
            unit.update(DT);
        }
        let before = unit.position();
        let speed = unit.speed();

        unit.update(0.0);
        unit.update(-DT);
        unit.update(f64::NAN);
        assert_eq!(unit.position(), before);
        assert_eq!(unit.speed(), speed);
        assert!(unit.position().x.is_finite());

        // 通常の更新は引き続き加速する
        unit.update(DT);
        assert!(unit.speed() > speed);
    }

    #[test]
    fn test_heading_turn_rate_limit() {
        let config = UnitConfig {
            max_angular_speed: Some(90.0),
            ..scenario_config()
        };
        let mut unit = Unit::new(config, 0.0, 0.0, 0.0);
        unit.add_waypoint(Vector2D::new(0.0, -100.0), false);

        unit.update(0.1);
        assert!((unit.heading().abs() - 9.0).abs() < 1e-9, "heading {}", unit.heading());

        for _ in 0..19 {
            unit.update(0.1);
        }
        assert!((unit.heading().abs() - 180.0).abs() < 1e-9, "heading {}", unit.heading());
    }

    #[test]
    fn test_clear_route_stops_in_place() {
        let mut unit = Unit::new(scenario_config(), 0.0, 0.0, 0.0);
        unit.add_waypoint(Vector2D::new(10.0, 0.0), false);
        for _ in 0..10 {
            unit.update(DT);
        }
        let here = unit.position();
        unit.clear_route();
        unit.update(DT);
        assert!(unit.is_stopped());
        assert_eq!(unit.position(), here);
        assert_eq!(unit.destination(), here);
    }

    #[test]
    fn test_config_validation() {
        assert!(scenario_config().validate().is_ok());

        let bad = UnitConfig {
            accelerate_time: 0.0,
            ..scenario_config()
        };
        assert_eq!(
            bad.validate(),
            Err(UnitConfigError::NotPositive {
                field: "accelerate_time",
                value: 0.0
            })
        );

        let bad = UnitConfig {
            max_angular_speed: Some(-1.0),
            ..scenario_config()
        };
        assert!(bad.validate().is_err());
    }
}
