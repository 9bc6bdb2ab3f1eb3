//! SCPI 文本传输层
//!
//! 仪器协议是行式命令/查询文本：命令以 `\r\n` 结尾写出，
//! 查询响应以 `\n` 结尾读回。传输层只负责行收发，
//! 命令拼写与响应解析在 [`crate::chroma`]。

use crate::InstrumentError;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::trace;

/// 行式 SCPI 传输抽象
///
/// 串口之外的实现（测试替身、未来的 TCP 仪器）只需要实现这两个方法。
pub trait ScpiTransport: Send {
    /// 写出一条命令（不期待响应）
    fn write_line(&mut self, cmd: &str) -> Result<(), InstrumentError>;

    /// 写出一条查询并读回一行响应（去除行尾空白）
    fn query_line(&mut self, query: &str) -> Result<String, InstrumentError>;
}

/// 读响应的总期限
const RESPONSE_DEADLINE: Duration = Duration::from_millis(500);

/// 串口 SCPI 传输
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// 打开串口
    ///
    /// # 错误
    /// - `InstrumentError::Serial`: 端口不存在/被占用/参数不支持
    pub fn open(path: &str, baud: u32) -> Result<Self, InstrumentError> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(50))
            .open()?;
        trace!("Serial port '{}' opened at {} baud", path, baud);
        Ok(Self { port })
    }

    /// 逐字节读取直到换行或期限耗尽
    fn read_response(&mut self, query: &str) -> Result<String, InstrumentError> {
        let mut received = Vec::new();
        let mut byte = [0u8; 1];
        let deadline = Instant::now() + RESPONSE_DEADLINE;

        loop {
            if Instant::now() > deadline {
                if received.is_empty() {
                    return Err(InstrumentError::Timeout(query.to_string()));
                }
                break;
            }

            match self.port.read(&mut byte) {
                Ok(1) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    received.push(byte[0]);
                },
                Ok(_) => continue,
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(InstrumentError::Io(e)),
            }
        }

        Ok(String::from_utf8_lossy(&received).trim().to_string())
    }
}

impl ScpiTransport for SerialTransport {
    fn write_line(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        let framed = format!("{}\r\n", cmd);
        self.port.write_all(framed.as_bytes())?;
        trace!("SCPI >> {}", cmd);
        Ok(())
    }

    fn query_line(&mut self, query: &str) -> Result<String, InstrumentError> {
        self.write_line(query)?;
        let response = self.read_response(query)?;
        trace!("SCPI << {}", response);
        Ok(response)
    }
}
