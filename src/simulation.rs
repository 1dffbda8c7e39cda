//! # Simulation モジュール
//!
//! ユニット群を固定時間刻みで進めるシミュレーションエンジンを提供します。
//!
//! 各時間刻みにおいて、以下の順序で処理が実行されます：
//!
//! 1. **指示配送**: 発令時刻に達した移動指示を、選択したユニットへ配送
//! 2. **ユニット更新**: 全ナビゲーターの`fixed_update`（運動状態機械とボディ追従）
//! 3. **時刻更新**: 現在時刻とステップ数を進める
//!
//! ## 使用例
//!
//! ```no_run
//! use unitnav::scenario::ScenarioConfig;
//! use unitnav::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/simple_drive.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! let report = engine.run();
//! println!("{} steps", report.steps);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::controller::{self, Selection, WaypointEvent};
use crate::models::{
    common::Vector2D,
    coords::{self, Point3D},
    navigator::{BodyPose, EulerAngles, UnitNavigator},
    traits::IAgent,
    unit::UnitState,
};
use crate::scenario::{OrderConfig, ScenarioConfig, ScenarioError};

/// シミュレーション実行時エラー
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// ユニットごとの最終状態
#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub id: String,
    pub position: Vector2D,
    pub heading_deg: f64,
    pub state: UnitState,
    pub arrivals: u32,
    /// ボディのホスト座標（Y軸が高度）
    pub body_position: Point3D,
}

/// シミュレーション結果
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub steps: u64,
    pub time_s: f64,
    pub units: Vec<UnitReport>,
}

impl SimulationReport {
    pub fn unit(&self, id: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.id == id)
    }

    /// 結果の概要を表示
    pub fn print_summary(&self) {
        println!("=== シミュレーション結果 ===");
        println!("経過時間: {:.2}秒 ({}ステップ)", self.time_s, self.steps);
        for unit in &self.units {
            println!(
                "  {}: 位置 ({:.3}, {:.3}) 方位 {:.1}° 状態 {} 到達 {}点",
                unit.id,
                unit.position.x,
                unit.position.y,
                unit.heading_deg,
                unit.state.name(),
                unit.arrivals
            );
            println!(
                "      ボディ ({:.3}, {:.3}, {:.3})",
                unit.body_position.x, unit.body_position.y, unit.body_position.z
            );
        }
    }
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,

    pub navigators: Vec<UnitNavigator>,
    pub selection: Selection,
    /// 未配送の指示（発令時刻順）
    pending_orders: Vec<OrderConfig>,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let dt = scenario.sim.dt_s;
        let max_time = scenario.sim.t_max_s;

        Self {
            current_time: 0.0,
            dt,
            max_time,
            step_count: 0,
            navigators: Vec::new(),
            selection: Selection::new(),
            pending_orders: Vec::new(),
            scenario_config: scenario,
            verbose_level,
        }
    }

    pub fn initialize(&mut self) -> Result<(), SimulationError> {
        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        self.scenario_config.validate()?;
        self.initialize_units()?;
        self.initialize_orders();

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  ユニット: {}機", self.navigators.len());
            info!("  移動指示: {}件", self.pending_orders.len());
        }

        Ok(())
    }

    fn initialize_units(&mut self) -> Result<(), SimulationError> {
        self.navigators.clear();

        for unit_config in &self.scenario_config.units {
            let body = BodyPose {
                position: coords::project(unit_config.position.into(), unit_config.altitude_m),
                euler: EulerAngles::new(0.0, unit_config.heading_deg, 0.0),
            };

            let navigator = UnitNavigator::new(
                unit_config.id.clone(),
                unit_config.kinematics.to_unit_config()?,
                (&unit_config.navigator).into(),
                body,
            );

            if self.verbose_level > 1 {
                debug!(
                    "ユニット初期化: {} (位置: {:.1}, {:.1})",
                    unit_config.id, unit_config.position.x_m, unit_config.position.y_m
                );
            }

            self.navigators.push(navigator);
        }

        Ok(())
    }

    /// 指示の参照先はシナリオ検証で確認済み
    fn initialize_orders(&mut self) {
        let mut orders = self.scenario_config.orders.clone();
        // 同時刻の指示はファイル記載順を維持
        orders.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        self.pending_orders = orders;
    }

    /// 全ユニットが停止し、未配送の指示もない
    pub fn is_idle(&self) -> bool {
        self.pending_orders.is_empty() && self.navigators.iter().all(|n| !n.is_active())
    }

    pub fn run(&mut self) -> SimulationReport {
        info!("=== シミュレーション実行開始 ===");

        while self.current_time < self.max_time {
            self.step();

            if self.verbose_level > 2 {
                trace!("時刻: {:.2}秒 (ステップ: {})", self.current_time, self.step_count);
            }

            if self.step_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                let moving = self.navigators.iter().filter(|n| n.is_active()).count();
                info!(
                    "進行状況: {:.1}% ({:.1}/{:.1}秒) 移動中: {}機",
                    progress, self.current_time, self.max_time, moving
                );
            }

            if self.scenario_config.sim.stop_when_idle && self.is_idle() {
                info!("全ユニットが停止したため終了します");
                break;
            }
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.2}秒", self.current_time);
        info!("総ステップ数: {}", self.step_count);

        self.report()
    }

    pub fn step(&mut self) {
        self.dispatch_orders();
        self.process_units();

        self.step_count += 1;
        self.current_time = self.step_count as f64 * self.dt;
    }

    fn dispatch_orders(&mut self) {
        // 浮動小数点の累積誤差で発令が1ティック遅れないよう半刻みの余裕を持たせる
        let horizon = self.current_time + self.dt * 0.5;
        let due = self
            .pending_orders
            .iter()
            .take_while(|o| o.time_s < horizon)
            .count();

        for order in self.pending_orders.drain(..due) {
            self.selection.replace(&order.units);
            let event = WaypointEvent::new(order.point.into(), order.additive);
            let delivered = controller::dispatch(&self.selection, event, &mut self.navigators);

            if self.verbose_level > 0 {
                info!(
                    "{:.2}秒: 移動指示 ({:.1}, {:.1}) を{}機へ配送",
                    self.current_time, order.point.x_m, order.point.y_m, delivered
                );
            }
        }
    }

    fn process_units(&mut self) {
        for navigator in &mut self.navigators {
            navigator.tick(self.dt);
        }
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            steps: self.step_count,
            time_s: self.current_time,
            units: self
                .navigators
                .iter()
                .map(|n| UnitReport {
                    id: n.get_id(),
                    position: n.unit().position(),
                    heading_deg: n.unit().heading(),
                    state: n.unit().state(),
                    arrivals: n.unit().arrivals(),
                    body_position: n.body().position,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Position2D;

    #[test]
    fn test_demo_scenario_arrives() {
        let mut engine = SimulationEngine::new(ScenarioConfig::demo(), 0);
        engine.initialize().unwrap();
        let report = engine.run();

        let unit = report.unit("U001").unwrap();
        assert_eq!(unit.state, UnitState::Stopped);
        assert_eq!(unit.arrivals, 1);
        assert!(unit.position.distance(&Vector2D::new(100.0, 0.0)) < 0.1);
        // ボディはユニットの投影位置へ追従している
        let expected_body = coords::project(unit.position, 0.0);
        assert!(unit.body_position.distance(&expected_body) < 0.5);
        // 早期終了している
        assert!(report.time_s < 60.0);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_orders_are_dispatched_at_their_time() {
        let mut scenario = ScenarioConfig::demo();
        scenario.orders[0].time_s = 1.0;
        scenario.orders.push(OrderConfig {
            time_s: 1.0,
            units: vec!["U001".to_string()],
            point: Position2D { x_m: 100.0, y_m: 10.0 },
            additive: true,
        });

        let mut engine = SimulationEngine::new(scenario, 0);
        engine.initialize().unwrap();

        // 1秒までは停止したまま
        for _ in 0..50 {
            engine.step();
        }
        assert!(engine.navigators[0].unit().is_stopped());
        assert!(!engine.is_idle());

        engine.step();
        assert_eq!(
            engine.navigators[0].unit().route(),
            vec![Vector2D::new(100.0, 0.0), Vector2D::new(100.0, 10.0)]
        );

        let report = engine.run();
        let unit = report.unit("U001").unwrap();
        assert_eq!(unit.arrivals, 2);
        assert!(unit.position.distance(&Vector2D::new(100.0, 10.0)) < 0.1);
    }

    #[test]
    fn test_runs_to_time_limit_when_not_stopping_idle() {
        let mut scenario = ScenarioConfig::demo();
        scenario.sim.stop_when_idle = false;
        scenario.sim.t_max_s = 2.0;
        scenario.orders.clear();

        let mut engine = SimulationEngine::new(scenario, 0);
        engine.initialize().unwrap();
        let report = engine.run();
        assert!((100..=101).contains(&report.steps), "steps {}", report.steps);
        assert_eq!(report.unit("U001").unwrap().position, Vector2D::ZERO);
    }

    #[test]
    fn test_unknown_unit_in_order_is_rejected() {
        let mut scenario = ScenarioConfig::demo();
        scenario.orders[0].units = vec!["U404".to_string()];

        let mut engine = SimulationEngine::new(scenario, 0);
        let result = engine.initialize();
        assert!(
            matches!(
                result,
                Err(SimulationError::Scenario(ScenarioError::ValidationError(ref msg))) if msg.contains("U404")
            ),
            "{:?}",
            result
        );
        assert!(engine.pending_orders.is_empty());
    }
}
