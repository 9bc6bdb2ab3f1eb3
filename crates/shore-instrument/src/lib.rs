//! # Shore Instrument Driver
//!
//! 台式程控电源（Chroma 62000H 系列）驱动层。
//!
//! ## 模块
//!
//! - `scpi`: SCPI 文本传输层（串口实现 + trait 抽象）
//! - `chroma`: Chroma 62000H 命令/查询驱动
//! - `mock`（feature `mock`）: 测试用仪器替身
//!
//! 桥接核心只依赖 [`Instrument`] trait：设定值写入、安全停机
//! 和遥测查询。限值/保护配置等一次性初始化操作是
//! [`chroma::Chroma62000H`] 的固有方法，由上层在启动时调用。

pub mod chroma;
pub mod scpi;

#[cfg(feature = "mock")]
pub mod mock;

pub use chroma::Chroma62000H;
pub use scpi::{ScpiTransport, SerialTransport};

use shore_protocol::StatusFlags;
use thiserror::Error;

/// 仪器驱动错误类型
#[derive(Error, Debug)]
pub enum InstrumentError {
    /// 连接失败（设备未找到/未响应）
    #[error("Instrument not connected: {0}")]
    NotConnected(String),

    /// 串口层错误
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// IO 错误
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 查询响应超时
    #[error("Query timed out: {0}")]
    Timeout(String),

    /// 响应无法解析
    #[error("Invalid response to '{query}': {response:?}")]
    InvalidResponse { query: String, response: String },
}

/// 桥接核心使用的仪器操作集合
///
/// 每个写命令由驱动自带固定的沉降延迟（约 10 ms），
/// 对调用方仅表现为延迟。
pub trait Instrument: Send {
    /// 设置输出电压（V)
    fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError>;

    /// 设置输出电流（A)
    fn set_current(&mut self, amps: f64) -> Result<(), InstrumentError>;

    /// 使能输出
    fn enable_output(&mut self) -> Result<(), InstrumentError>;

    /// 关闭输出
    fn disable_output(&mut self) -> Result<(), InstrumentError>;

    /// 安全停机：中止当前动作并把电压/电流归零
    fn abort(&mut self) -> Result<(), InstrumentError>;

    /// 实测输出电压（V)
    fn measure_voltage(&mut self) -> Result<f64, InstrumentError>;

    /// 实测输出电流（A)
    fn measure_current(&mut self) -> Result<f64, InstrumentError>;

    /// 查询输出是否使能
    fn get_output_enabled(&mut self) -> Result<bool, InstrumentError>;

    /// 查询保护/故障状态快照
    fn fetch_status(&mut self) -> Result<StatusFlags, InstrumentError>;
}
