//! # Shore CAN Adapter Layer
//!
//! CAN 硬件抽象层，提供统一的收发接口。
//!
//! 桥接核心只通过 [`CanAdapter`] trait 访问总线；Linux 下由
//! [`SocketCanAdapter`] 实现，测试中由 `mock` feature 提供的
//! [`mock::MockCanAdapter`] 实现。

use std::time::Duration;
use thiserror::Error;

// 重新导出协议层的帧类型
pub use shore_protocol::ShoreFrame;

#[cfg(target_os = "linux")]
pub mod socketcan;

#[cfg(target_os = "linux")]
pub use socketcan::SocketCanAdapter;

#[cfg(feature = "mock")]
pub mod mock;

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(String),
    /// 读超时（空总线的正常情况，可重试）
    #[error("Read timeout")]
    Timeout,
}

/// CAN 适配器统一接口
///
/// `receive` 必须是带超时的非阻塞语义：超时上界决定了桥接循环
/// 观察到停止信号的最大延迟，实现不得无限期阻塞。
pub trait CanAdapter: Send {
    /// 接收一帧（阻塞至帧到达或超时）
    ///
    /// # 错误
    /// - `CanError::Timeout`: 超时内无帧（可重试）
    /// - 其他：传输层故障，由调用方计数，不视为致命
    fn receive(&mut self) -> Result<ShoreFrame, CanError>;

    /// 发送一帧（Fire-and-Forget）
    fn send(&mut self, frame: ShoreFrame) -> Result<(), CanError>;

    /// 设置接收超时
    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<(), CanError>;
}
