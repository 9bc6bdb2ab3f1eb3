//! # Shore Protocol
//!
//! 岸电充电器 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: CAN ID 常量定义
//! - `control`: 入站控制请求帧（0x618）解析
//! - `report`: 出站遥测帧（0x611）与状态帧（0x615）构建
//! - `status`: 仪器保护/故障状态位字段解码
//!
//! ## 字节序
//!
//! 总线上的数值均为 Motorola (MSB) 高位在前（大端字节序），
//! 定点分辨率为物理量的十分之一（wire = physical × 10）。

pub mod control;
pub mod ids;
pub mod report;
pub mod status;

pub use control::ControlRequest;
pub use report::{StatusReport, TelemetryReport};
pub use status::{OutputState, RegulationMode, StatusFlags};

use thiserror::Error;

/// 定点换算系数：总线原始值 = 物理量 × 10
pub const WIRE_SCALE: f64 = 10.0;

/// CAN 2.0 标准帧的统一抽象
///
/// 协议层和硬件层之间的中间抽象：适配层（SocketCAN/Mock）负责与
/// 具体后端帧类型互转，协议层只面对固定 8 字节的数据区。
///
/// # 设计特性
///
/// - **Copy trait**：零成本复制，适合周期性收发场景
/// - **固定 8 字节**：桥接协议的所有帧都是满长数据帧
/// - **`id == 0` 表示空读**：适配器空轮询产物，不计入任何计数器
/// - **`error_flags`**：读取时伴随的后端错误标志（0 表示无错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShoreFrame {
    /// CAN ID（标准帧，11 位）
    pub id: u32,
    /// 数据区（固定 8 字节，未使用的位置填 0xFF 哨兵值）
    pub data: [u8; 8],
    /// 后端错误标志（随读取返回，发送帧恒为 0）
    pub error_flags: u32,
}

impl ShoreFrame {
    /// 创建出站帧
    pub fn new(id: u32, data: [u8; 8]) -> Self {
        Self {
            id,
            data,
            error_flags: 0,
        }
    }

    /// 是否为空读帧（适配器空轮询产物，不是总线上的消息）
    pub fn is_idle(&self) -> bool {
        self.id == 0
    }
}

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 用错误的 CAN ID 调用了解码器
    #[error("Unexpected CAN ID 0x{id:X} (expected 0x{expected:X})")]
    UnexpectedId { id: u32, expected: u32 },
}

/// 大端读取 16 位无符号数
#[inline]
pub fn bytes_to_u16_be(hi: u8, lo: u8) -> u16 {
    u16::from_be_bytes([hi, lo])
}

/// 大端拆分 16 位无符号数
#[inline]
pub fn u16_to_bytes_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// 物理量编码为总线定点值（四舍五入，钳位到 u16 范围）
#[inline]
pub fn encode_deci(value: f64) -> u16 {
    (value * WIRE_SCALE).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// 总线定点值解码为物理量
#[inline]
pub fn decode_deci(raw: u16) -> f64 {
    f64::from(raw) / WIRE_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_frame_detection() {
        let idle = ShoreFrame {
            id: 0,
            data: [0; 8],
            error_flags: 0,
        };
        assert!(idle.is_idle());
        assert!(!ShoreFrame::new(0x618, [0xFF; 8]).is_idle());
    }

    #[test]
    fn test_deci_encode_rounds_to_nearest() {
        assert_eq!(encode_deci(5.0), 50);
        assert_eq!(encode_deci(48.34), 483);
        assert_eq!(encode_deci(48.36), 484);
    }

    #[test]
    fn test_deci_encode_clamps_to_wire_range() {
        assert_eq!(encode_deci(-3.0), 0);
        assert_eq!(encode_deci(1e9), u16::MAX);
    }

    #[test]
    fn test_be_helpers_round_trip() {
        let [hi, lo] = u16_to_bytes_be(0x012C);
        assert_eq!((hi, lo), (0x01, 0x2C));
        assert_eq!(bytes_to_u16_be(hi, lo), 0x012C);
    }
}
