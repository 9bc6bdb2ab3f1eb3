//! 桥接层错误类型定义

use shore_can::CanError;
use shore_instrument::InstrumentError;
use thiserror::Error;

/// 桥接层错误类型
#[derive(Error, Debug)]
pub enum BridgeError {
    /// CAN 传输层错误
    #[error("CAN transport error: {0}")]
    Can(#[from] CanError),

    /// 仪器驱动错误
    #[error("Instrument error: {0}")]
    Instrument(#[from] InstrumentError),

    /// 循环线程未在限时内退出
    #[error("Bridge loop '{0}' did not stop in time")]
    ThreadJoin(&'static str),
}
