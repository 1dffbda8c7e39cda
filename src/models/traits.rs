use crate::models::common::Vector2D;

/// シミュレーションで毎ティック更新されるエージェントの基本インターフェース
pub trait IAgent {
    /// 1ティックの処理実行
    fn tick(&mut self, dt: f64);

    /// エージェントIDの取得
    fn get_id(&self) -> String;

    /// エージェントが移動中かどうか
    fn is_active(&self) -> bool;
}

/// 平面上を移動するエージェントのインターフェース
pub trait IMovable {
    /// 現在位置の取得
    fn get_position(&self) -> Vector2D;

    /// 現在方位の取得（度）
    fn get_heading(&self) -> f64;

    /// 現在の目的地の取得（停止中は現在位置）
    fn get_destination(&self) -> Vector2D;
}

/// ウェイポイント指示を受け付けるインターフェース
pub trait IWaypointReceiver {
    /// ウェイポイントの追加（additive == false の場合は経路を置き換え）
    fn add_waypoint(&mut self, point: Vector2D, additive: bool);
}
