//! # Controller モジュール
//!
//! ユニットへの移動指示（ウェイポイントイベント）と選択状態を扱います。
//!
//! 選択状態はプロセス全体で共有せず、呼び出し側が`Selection`を明示的に
//! 保持して渡します。

use tracing::debug;

use crate::models::{common::Vector2D, traits::{IAgent, IWaypointReceiver}};

/// ウェイポイント指示
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaypointEvent {
    pub point: Vector2D,
    /// trueなら経路に追加、falseなら経路を置き換え
    pub additive: bool,
}

impl WaypointEvent {
    pub fn new(point: Vector2D, additive: bool) -> Self {
        Self { point, additive }
    }
}

/// 選択中のユニットID（選択順を保持）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// ユニットを選択。`multiselect`がfalseなら既存の選択を解除してから選択する
    pub fn select(&mut self, id: &str, multiselect: bool) {
        if !multiselect {
            self.ids.clear();
        }
        if !self.contains(id) {
            self.ids.push(id.to_string());
        }
    }

    /// 選択を指定IDの集合で置き換え
    pub fn replace<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ids.clear();
        for id in ids {
            self.select(id.as_ref(), true);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// 選択中の全エージェントへウェイポイント指示を配送し、受け取った数を返す
pub fn dispatch<A>(selection: &Selection, event: WaypointEvent, agents: &mut [A]) -> usize
where
    A: IAgent + IWaypointReceiver,
{
    let mut delivered = 0;
    for agent in agents.iter_mut() {
        if selection.contains(&agent.get_id()) {
            agent.add_waypoint(event.point, event.additive);
            delivered += 1;
        }
    }

    debug!(
        "移動指示 ({:.1}, {:.1}) additive={} → {}機",
        event.point.x, event.point.y, event.additive, delivered
    );
    delivered
}
