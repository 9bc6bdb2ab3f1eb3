//! # Shore Bridge
//!
//! CAN 总线与台式程控电源之间的实时转换桥。
//!
//! 三个常驻循环通过共享状态快照协作：
//!
//! - **CAN 桥接循环**（[`pipeline::can_loop`]）：入站控制请求帧解码为
//!   设定值，固定 100 ms 周期把最新实测遥测编码为出站帧
//! - **仪器调度循环**（[`pipeline::instrument_loop`]）：去抖地把设定值
//!   变化下发到仪器，固定 500 ms 周期回读遥测
//! - **遥测报告循环**（[`pipeline::info_loop`]）：按可调周期打印
//!   计数器与实测值摘要
//!
//! [`ShoreBridge`] 负责启动与有界关停（安全停机指令发两次 →
//! 依次置停止标志 → 限时 join）。
//!
//! ## 共享状态
//!
//! [`BridgeContext`] 是唯一被多个时间线写入的对象：设定值标量用
//! 原子存储（各字段独立更新），实测遥测 + 状态位用 `ArcSwap`
//! 整体换入，读者永远不会看到撕裂的快照。两个硬件句柄各自被
//! 一个循环独占，I/O 本身无须加锁。

mod bridge;
mod context;
mod error;
pub mod pipeline;

pub use bridge::ShoreBridge;
pub use context::{BridgeContext, BridgeCounters, MeasuredTelemetry, RequestedSetpoint};
pub use error::BridgeError;
pub use pipeline::{AbortRequest, TimingConfig, can_loop, info_loop, instrument_loop};
