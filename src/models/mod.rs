// 基本的なデータ型と数学ユーティリティ
pub mod common;

// 平滑クランプ
pub mod clamper;

// 2次元平面とホスト3次元空間の座標変換
pub mod coords;

// エージェントの基本インターフェース（trait）定義
pub mod traits;

// ウェイポイント追従の運動状態機械
pub mod unit;

// ユニットとホスト側ボディの結合
pub mod navigator;

// 便利な re-export
pub use common::*;
pub use coords::{Point3D, project, project_ground, unproject};
pub use navigator::{BodyPose, EulerAngles, NavigatorConfig, UnitNavigator};
pub use traits::*;
pub use unit::{Unit, UnitConfig, UnitConfigError, UnitState};
