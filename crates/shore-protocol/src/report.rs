//! 出站报告帧（0x611 遥测 / 0x615 状态）
//!
//! 两帧均以 100 ms 固定周期发送，与遥测是否变化无关，
//! 为总线消费者提供有界延迟的心跳。未上报的字节位置一律填
//! 0xFF 哨兵值，不允许残留上一帧的数据。

use crate::ids::{ID_STATUS_REPORT, ID_TELEMETRY_REPORT};
use crate::status::StatusFlags;
use crate::{ShoreFrame, bytes_to_u16_be, decode_deci, encode_deci, u16_to_bytes_be};

/// 遥测报告（0x611）
///
/// | 字节 | 含义 |
/// |------|------|
/// | 0–3 | 0xFF（仪器不提供对应量） |
/// | 4–5 | 实测电压 ×10（大端） |
/// | 6–7 | 实测电流 ×10（大端） |
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetryReport {
    /// 实测电压（V）
    pub voltage: f64,
    /// 实测电流（A）
    pub current: f64,
}

impl TelemetryReport {
    /// 编码为 CAN 帧
    pub fn to_frame(&self) -> ShoreFrame {
        let mut data = [0xFFu8; 8];
        data[4..6].copy_from_slice(&u16_to_bytes_be(encode_deci(self.voltage)));
        data[6..8].copy_from_slice(&u16_to_bytes_be(encode_deci(self.current)));
        ShoreFrame::new(ID_TELEMETRY_REPORT, data)
    }

    /// 从 CAN 帧解码（测试与总线消费者模拟使用）
    pub fn decode(frame: &ShoreFrame) -> Result<Self, crate::ProtocolError> {
        if frame.id != ID_TELEMETRY_REPORT {
            return Err(crate::ProtocolError::UnexpectedId {
                id: frame.id,
                expected: ID_TELEMETRY_REPORT,
            });
        }
        let d = &frame.data;
        Ok(Self {
            voltage: decode_deci(bytes_to_u16_be(d[4], d[5])),
            current: decode_deci(bytes_to_u16_be(d[6], d[7])),
        })
    }
}

/// byte0 位布局
const AC_FAULT_BIT: u8 = 0x80;
const READY_BIT: u8 = 0x40;
const OPP_BIT: u8 = 0x20;
const OVP_BIT: u8 = 0x10;

/// byte4 固定的"模块在位/健康"信号位（bit7/5/3）。
/// 当前协议中恒置位，不是真实的健康检查。
const MODULE_PRESENT_BITS: u8 = 0xA8;

/// 状态报告（0x615）
///
/// byte0 打包故障位，byte4 为固定在位信号，其余字节 0xFF。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub ac_fault: bool,
    /// 模块就绪位，当前协议中恒为真
    pub ready: bool,
    pub opp: bool,
    pub ovp: bool,
}

impl StatusReport {
    /// 从仪器状态快照构建
    pub fn from_flags(flags: &StatusFlags) -> Self {
        Self {
            ac_fault: flags.ac_fault,
            ready: true,
            opp: flags.opp,
            ovp: flags.ovp,
        }
    }

    /// 编码为 CAN 帧
    pub fn to_frame(&self) -> ShoreFrame {
        let mut data = [0xFFu8; 8];
        let mut b0 = 0u8;
        if self.ac_fault {
            b0 |= AC_FAULT_BIT;
        }
        if self.ready {
            b0 |= READY_BIT;
        }
        if self.opp {
            b0 |= OPP_BIT;
        }
        if self.ovp {
            b0 |= OVP_BIT;
        }
        data[0] = b0;
        data[4] = MODULE_PRESENT_BITS;
        ShoreFrame::new(ID_STATUS_REPORT, data)
    }

    /// 从 CAN 帧 byte0 解码（测试使用）
    pub fn decode(frame: &ShoreFrame) -> Result<Self, crate::ProtocolError> {
        if frame.id != ID_STATUS_REPORT {
            return Err(crate::ProtocolError::UnexpectedId {
                id: frame.id,
                expected: ID_STATUS_REPORT,
            });
        }
        let b0 = frame.data[0];
        Ok(Self {
            ac_fault: b0 & AC_FAULT_BIT != 0,
            ready: b0 & READY_BIT != 0,
            opp: b0 & OPP_BIT != 0,
            ovp: b0 & OVP_BIT != 0,
        })
    }
}
