//! 入站控制请求帧（0x618）
//!
//! 总线主控通过此帧下发充电请求：输出使能、最大交流侧电流、
//! 直流电压/电流设定值。数值为大端 16 位定点（×10）。

use crate::ids::ID_CONTROL_REQUEST;
use crate::{ProtocolError, ShoreFrame, bytes_to_u16_be, decode_deci, encode_deci, u16_to_bytes_be};

/// 输出使能位（byte0 bit7）
const ENABLE_BIT: u8 = 0x80;

/// 控制请求（0x618）
///
/// | 字节 | 含义 |
/// |------|------|
/// | 0 (bit7) | 输出使能 |
/// | 1–2 | 最大交流电流 ×10（大端） |
/// | 3–4 | 电压设定值 ×10（大端） |
/// | 5–6 | 电流设定值 ×10（大端） |
/// | 7 | 未使用（0xFF 哨兵） |
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlRequest {
    pub enable_output: bool,
    /// 最大交流侧输入电流（A）
    pub max_ac_current: f64,
    /// 直流电压设定值（V）
    pub voltage: f64,
    /// 直流电流设定值（A）
    pub current: f64,
}

impl ControlRequest {
    /// 从 CAN 帧解码
    ///
    /// # 错误
    /// - `ProtocolError::UnexpectedId`: 帧 ID 不是 0x618
    pub fn decode(frame: &ShoreFrame) -> Result<Self, ProtocolError> {
        if frame.id != ID_CONTROL_REQUEST {
            return Err(ProtocolError::UnexpectedId {
                id: frame.id,
                expected: ID_CONTROL_REQUEST,
            });
        }

        let d = &frame.data;
        Ok(Self {
            enable_output: d[0] & ENABLE_BIT != 0,
            max_ac_current: decode_deci(bytes_to_u16_be(d[1], d[2])),
            voltage: decode_deci(bytes_to_u16_be(d[3], d[4])),
            current: decode_deci(bytes_to_u16_be(d[5], d[6])),
        })
    }

    /// 编码为 CAN 帧（解码的精确逆操作，测试与对端模拟使用）
    pub fn to_frame(&self) -> ShoreFrame {
        let mut data = [0u8; 8];
        data[0] = if self.enable_output { ENABLE_BIT } else { 0 };
        data[1..3].copy_from_slice(&u16_to_bytes_be(encode_deci(self.max_ac_current)));
        data[3..5].copy_from_slice(&u16_to_bytes_be(encode_deci(self.voltage)));
        data[5..7].copy_from_slice(&u16_to_bytes_be(encode_deci(self.current)));
        data[7] = 0xFF;
        ShoreFrame::new(ID_CONTROL_REQUEST, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// 协议样例帧：0x618 解码
    #[test]
    fn test_decode_sample_frame() {
        let frame = ShoreFrame::new(
            ID_CONTROL_REQUEST,
            [0x80, 0x00, 0x32, 0x01, 0x2C, 0x00, 0x64, 0xFF],
        );
        let req = ControlRequest::decode(&frame).unwrap();
        assert!(req.enable_output);
        assert_eq!(req.max_ac_current, 5.0);
        assert_eq!(req.voltage, 30.0);
        assert_eq!(req.current, 10.0);
    }

    #[test]
    fn test_decode_disabled_output() {
        let frame = ShoreFrame::new(
            ID_CONTROL_REQUEST,
            [0x7F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF],
        );
        let req = ControlRequest::decode(&frame).unwrap();
        assert!(!req.enable_output, "only bit7 of byte0 is the enable bit");
    }

    #[test]
    fn test_decode_rejects_wrong_id() {
        let frame = ShoreFrame::new(0x619, [0; 8]);
        assert_eq!(
            ControlRequest::decode(&frame),
            Err(ProtocolError::UnexpectedId {
                id: 0x619,
                expected: ID_CONTROL_REQUEST
            })
        );
    }

    #[test]
    fn test_encode_sets_sentinel_byte() {
        let frame = ControlRequest::default().to_frame();
        assert_eq!(frame.id, ID_CONTROL_REQUEST);
        assert_eq!(frame.data[7], 0xFF);
    }

    proptest! {
        /// 定点 ×10/÷10 变换在一次往返后误差不超过 0.1（总线分辨率）
        #[test]
        fn prop_setpoints_round_trip_within_wire_resolution(
            enable in any::<bool>(),
            max_ac in 0.0..6553.5f64,
            voltage in 0.0..6553.5f64,
            current in 0.0..6553.5f64,
        ) {
            let req = ControlRequest {
                enable_output: enable,
                max_ac_current: max_ac,
                voltage,
                current,
            };
            let back = ControlRequest::decode(&req.to_frame()).unwrap();
            prop_assert_eq!(back.enable_output, enable);
            prop_assert!((back.max_ac_current - max_ac).abs() <= 0.1);
            prop_assert!((back.voltage - voltage).abs() <= 0.1);
            prop_assert!((back.current - current).abs() <= 0.1);
        }
    }
}
