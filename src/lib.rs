//! # unitnav
//!
//! 俯瞰型ユニット操作シミュレーションの移動・航法コアです。
//!
//! 現在位置・方位とウェイポイント列から、固定時間刻みごとにユニットの新しい位置と
//! 方位を計算します。加速・巡航・減速の状態遷移（Stopped / Driving / Stopping）と、
//! 旋回率や傾きを物理的な範囲に保つための平滑クランプを提供します。

pub mod controller;
pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;
