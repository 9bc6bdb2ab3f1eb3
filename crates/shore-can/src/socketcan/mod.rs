//! SocketCAN CAN 适配器实现
//!
//! 基于 Linux 内核 SocketCAN 子系统。
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **波特率由系统工具配置**（`ip link set can0 type can bitrate …`），
//!   应用层无法从用户态核实，只能按配置假定并告警
//! - 打开前会检查接口存在且处于 UP 状态，但不会代为配置

use crate::{CanAdapter, CanError, ShoreFrame};
use socketcan::{BlockingCan, CanFrame, CanSocket, EmbeddedFrame, Frame, Socket, StandardId};
use std::io;
use std::time::Duration;
use tracing::{trace, warn};

mod interface_check;

use interface_check::check_interface_status;

/// 默认读超时。
/// 必须明显小于关停延迟上界，保证循环能及时观察到停止信号。
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// SocketCAN 适配器
///
/// # 示例
///
/// ```no_run
/// use shore_can::{CanAdapter, SocketCanAdapter};
/// use shore_protocol::ShoreFrame;
///
/// let mut adapter = SocketCanAdapter::new("can0", Some(500_000)).unwrap();
/// adapter.send(ShoreFrame::new(0x611, [0xFF; 8])).unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    /// 接口名称（如 "can0"）
    interface: String,
    /// 读超时（用于 receive）
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// 创建新的 SocketCAN 适配器
    ///
    /// 打开 socket 之前会检查接口是否存在且已启动（UP）。波特率在
    /// SocketCAN 下由系统工具配置，给定的 `expected_bitrate` 仅用于
    /// 提示性告警，不会阻止初始化（对应原 PCAN 后端"波特率不符仅
    /// 告警并继续"的路径）。
    ///
    /// # 错误
    /// - `CanError::Device`: 接口不存在、未启动或无法打开
    /// - `CanError::Io`: 系统调用失败
    pub fn new(interface: impl Into<String>, expected_bitrate: Option<u32>) -> Result<Self, CanError> {
        let interface = interface.into();

        match check_interface_status(&interface)? {
            true => {
                trace!("CAN interface '{}' is UP, proceeding", interface);
            },
            false => {
                return Err(CanError::Device(format!(
                    "CAN interface '{}' exists but is not UP. Start it first:\n  sudo ip link set up {}",
                    interface, interface
                )));
            },
        }

        if let Some(bitrate) = expected_bitrate {
            // 用户态无法读回内核的位定时配置；只能假定外部配置一致
            warn!(
                "Bitrate of '{}' cannot be verified from userspace; assuming {} bps as configured via ip link",
                interface, bitrate
            );
        }

        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(format!(
                "Failed to open CAN interface '{}': {}",
                interface, e
            ))
        })?;

        socket
            .set_read_timeout(DEFAULT_READ_TIMEOUT)
            .map_err(CanError::Io)?;

        trace!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket,
            interface,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 获取当前读超时
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl CanAdapter for SocketCanAdapter {
    /// 接收一帧
    ///
    /// 错误帧不丢弃：映射为 `id == 0` 且 `error_flags` 非零的帧，
    /// 由桥接层计数。数据帧不足 8 字节时低位补零。
    fn receive(&mut self) -> Result<ShoreFrame, CanError> {
        let can_frame = match self.socket.read_frame() {
            Ok(frame) => frame,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(CanError::Timeout);
            },
            Err(e) => return Err(CanError::Io(e)),
        };

        let shore_frame = match can_frame {
            CanFrame::Data(frame) => {
                // raw_id() 包含标志位；标准帧取低 11 位，扩展帧取低 29 位
                let id = if frame.is_extended() {
                    frame.raw_id() & 0x1FFF_FFFF
                } else {
                    frame.raw_id() & 0x7FF
                };
                let mut data = [0u8; 8];
                let payload = frame.data();
                let len = payload.len().min(8);
                data[..len].copy_from_slice(&payload[..len]);
                ShoreFrame {
                    id,
                    data,
                    error_flags: 0,
                }
            },
            CanFrame::Remote(_) => {
                // 本总线不使用远程帧，按空读处理
                ShoreFrame {
                    id: 0,
                    data: [0; 8],
                    error_flags: 0,
                }
            },
            CanFrame::Error(frame) => {
                let flags = frame.raw_id() & 0x1FFF_FFFF;
                trace!("CAN error frame on '{}': 0x{:X}", self.interface, flags);
                ShoreFrame {
                    id: 0,
                    data: [0; 8],
                    // 错误类别位至少保留一个非零标志
                    error_flags: if flags == 0 { 1 } else { flags },
                }
            },
        };

        Ok(shore_frame)
    }

    /// 发送一帧（Fire-and-Forget）
    fn send(&mut self, frame: ShoreFrame) -> Result<(), CanError> {
        let can_frame = StandardId::new(frame.id as u16)
            .and_then(|id| CanFrame::new(id, &frame.data))
            .ok_or_else(|| {
                CanError::Device(format!(
                    "Failed to create standard frame with ID 0x{:X}",
                    frame.id
                ))
            })?;

        self.socket.transmit(&can_frame).map_err(|e| {
            CanError::Io(io::Error::other(format!(
                "SocketCAN transmit error: {}",
                e
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:X}", frame.id);
        Ok(())
    }

    fn set_receive_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        self.socket.set_read_timeout(timeout).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }
}
