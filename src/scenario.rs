use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{
    common::{Vector2D, constants},
    navigator::NavigatorConfig,
    unit::{UnitConfig, UnitConfigError},
};

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    /// 全ユニット停止かつ未実行の指示なしで早期終了するか
    #[serde(default = "default_true")]
    pub stop_when_idle: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Position2D {
    pub x_m: f64,
    pub y_m: f64,
}

impl From<Position2D> for Vector2D {
    fn from(p: Position2D) -> Self {
        Vector2D::new(p.x_m, p.y_m)
    }
}

/// ユニットの運動性能設定
///
/// 速度は`max_speed_mps`と`max_speed_kmh`のどちらか一方で指定します。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KinematicsConfig {
    #[serde(default)]
    pub max_speed_mps: Option<f64>,
    #[serde(default)]
    pub max_speed_kmh: Option<f64>,
    pub accelerate_time_s: f64,
    pub decelerate_time_s: f64,
    pub arrival_tolerance_m: f64,
    #[serde(default)]
    pub max_angular_speed_deg_s: Option<f64>,
}

impl KinematicsConfig {
    /// 最大速度（m/s）
    pub fn max_speed_mps(&self) -> Result<f64, ScenarioError> {
        match (self.max_speed_mps, self.max_speed_kmh) {
            (Some(mps), None) => Ok(mps),
            (None, Some(kmh)) => Ok(kmh * constants::KMH_TO_MPS),
            _ => Err(ScenarioError::ValidationError(
                "exactly one of max_speed_mps / max_speed_kmh must be given".to_string(),
            )),
        }
    }

    pub fn to_unit_config(&self) -> Result<UnitConfig, ScenarioError> {
        let config = UnitConfig {
            max_speed: self.max_speed_mps()?,
            accelerate_time: self.accelerate_time_s,
            decelerate_time: self.decelerate_time_s,
            waypoint_arrival_tolerance: self.arrival_tolerance_m,
            max_angular_speed: self.max_angular_speed_deg_s,
        };
        config.validate()?;
        Ok(config)
    }
}

/// ボディ追従設定（省略時は既定値）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NavigatorSettings {
    #[serde(default = "default_follow_rate")]
    pub follow_rate: f64,
    #[serde(default = "default_max_tilt_deg")]
    pub max_tilt_deg: f64,
    #[serde(default = "default_tilt_smooth_time_s")]
    pub tilt_smooth_time_s: f64,
    #[serde(default)]
    pub max_climb_m: Option<f64>,
}

fn default_follow_rate() -> f64 {
    NavigatorConfig::default().follow_rate
}

fn default_max_tilt_deg() -> f64 {
    NavigatorConfig::default().max_tilt_deg
}

fn default_tilt_smooth_time_s() -> f64 {
    NavigatorConfig::default().tilt_smooth_time_s
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        let config = NavigatorConfig::default();
        Self {
            follow_rate: config.follow_rate,
            max_tilt_deg: config.max_tilt_deg,
            tilt_smooth_time_s: config.tilt_smooth_time_s,
            max_climb_m: config.max_climb_m,
        }
    }
}

impl From<&NavigatorSettings> for NavigatorConfig {
    fn from(s: &NavigatorSettings) -> Self {
        NavigatorConfig {
            follow_rate: s.follow_rate,
            max_tilt_deg: s.max_tilt_deg,
            tilt_smooth_time_s: s.tilt_smooth_time_s,
            max_climb_m: s.max_climb_m,
        }
    }
}

/// ユニット設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnitSpawnConfig {
    pub id: String,
    pub position: Position2D,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default)]
    pub altitude_m: f64,
    pub kinematics: KinematicsConfig,
    #[serde(default)]
    pub navigator: NavigatorSettings,
}

/// 時刻指定の移動指示
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderConfig {
    pub time_s: f64,
    pub units: Vec<String>,
    pub point: Position2D,
    #[serde(default)]
    pub additive: bool,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub units: Vec<UnitSpawnConfig>,
    #[serde(default)]
    pub orders: Vec<OrderConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        // ファイル読み込み
        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        // YAML解析
        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        // 基本的な検証
        config.validate()?;

        Ok(config)
    }

    /// 組み込みのデモシナリオ
    ///
    /// 最大速度10m/s、加減速時間1秒、到達判定0.1m、Δt=0.02秒で、原点から(100, 0)へ移動します。
    pub fn demo() -> Self {
        Self {
            meta: ScenarioMeta {
                version: "1.0".to_string(),
                name: "demo".to_string(),
                description: "単一ユニットの加速・巡航・減速デモ".to_string(),
            },
            sim: SimulationConfig {
                dt_s: 0.02,
                t_max_s: 60.0,
                stop_when_idle: true,
            },
            units: vec![UnitSpawnConfig {
                id: "U001".to_string(),
                position: Position2D { x_m: 0.0, y_m: 0.0 },
                heading_deg: 0.0,
                altitude_m: 0.0,
                kinematics: KinematicsConfig {
                    max_speed_mps: Some(10.0),
                    max_speed_kmh: None,
                    accelerate_time_s: 1.0,
                    decelerate_time_s: 1.0,
                    arrival_tolerance_m: 0.1,
                    max_angular_speed_deg_s: None,
                },
                navigator: NavigatorSettings::default(),
            }],
            orders: vec![OrderConfig {
                time_s: 0.0,
                units: vec!["U001".to_string()],
                point: Position2D { x_m: 100.0, y_m: 0.0 },
                additive: false,
            }],
        }
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        // 時間設定の検証
        if !(self.sim.dt_s > 0.0 && self.sim.dt_s.is_finite()) {
            return Err(ScenarioError::ValidationError("dt_s must be positive".to_string()));
        }
        if !(self.sim.t_max_s > 0.0 && self.sim.t_max_s.is_finite()) {
            return Err(ScenarioError::ValidationError("t_max_s must be positive".to_string()));
        }

        // ユニットIDと運動性能の検証
        let mut ids = HashSet::new();
        for unit in &self.units {
            if unit.id.is_empty() {
                return Err(ScenarioError::ValidationError("unit id must not be empty".to_string()));
            }
            if !ids.insert(unit.id.as_str()) {
                return Err(ScenarioError::ValidationError(format!(
                    "duplicate unit id {}",
                    unit.id
                )));
            }
            unit.kinematics
                .to_unit_config()
                .map_err(|e| ScenarioError::UnitError(unit.id.clone(), Box::new(e)))?;
        }

        // 指示の検証
        for (index, order) in self.orders.iter().enumerate() {
            if !(order.time_s >= 0.0 && order.time_s < self.sim.t_max_s) {
                return Err(ScenarioError::ValidationError(format!(
                    "order #{} time {} outside [0, {})",
                    index + 1,
                    order.time_s,
                    self.sim.t_max_s
                )));
            }
            if let Some(unknown) = order.units.iter().find(|id| !ids.contains(id.as_str())) {
                return Err(ScenarioError::ValidationError(format!(
                    "order #{} references unknown unit {}",
                    index + 1,
                    unknown
                )));
            }
        }

        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒 ({:.1}分)", self.sim.t_max_s, self.sim.t_max_s / 60.0);
        println!("停止時に早期終了: {}", if self.sim.stop_when_idle { "はい" } else { "いいえ" });
        println!();

        println!("=== ユニット ===");
        println!("ユニット数: {}", self.units.len());
        for unit in &self.units {
            let speed = unit.kinematics.max_speed_mps().unwrap_or(f64::NAN);
            println!(
                "  {}: 位置 ({:.1}, {:.1}) 方位 {:.1}° 最大速度 {:.1}m/s ({:.1}km/h)",
                unit.id,
                unit.position.x_m,
                unit.position.y_m,
                unit.heading_deg,
                speed,
                speed * constants::MPS_TO_KMH
            );
        }
        println!();

        println!("=== 移動指示 ===");
        println!("指示数: {}", self.orders.len());
        for order in &self.orders {
            println!(
                "  {:.1}秒: {} → ({:.1}, {:.1}){}",
                order.time_s,
                order.units.join(", "),
                order.point.x_m,
                order.point.y_m,
                if order.additive { " [追加]" } else { "" }
            );
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    ValidationError(String),
    #[error("ユニット {0} の設定エラー: {1}")]
    UnitError(String, #[source] Box<ScenarioError>),
    #[error(transparent)]
    Kinematics(#[from] UnitConfigError),
}
