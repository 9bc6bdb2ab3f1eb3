//! Chroma 62000H 系列程控电源驱动
//!
//! 命令/查询拼写遵循 62000H 编程手册。每个写命令后固定等待
//! 沉降延迟，仪器才能可靠接受下一条命令。

use crate::scpi::{ScpiTransport, SerialTransport};
use crate::{Instrument, InstrumentError};
use shore_protocol::{OutputState, RegulationMode, StatusFlags};
use std::time::Duration;
use tracing::{debug, trace};

// ==========================================
// SCPI 指令清单（集中管理）
// ==========================================
mod cmds {
    pub const IDN: &str = "*IDN?";
    pub const ABORT: &str = ":ABOR";
    pub const OUTPUT_ON: &str = ":CONF:OUTP ON";
    pub const OUTPUT_OFF: &str = ":CONF:OUTP OFF";
    pub const GET_OUTPUT: &str = ":CONF:OUTP?";
    pub const SET_VOLTAGE: &str = ":SOUR:VOLT";
    pub const GET_VOLTAGE: &str = ":SOUR:VOLT?";
    pub const SET_VOLT_LOW: &str = ":SOUR:VOLT:LIMIT:LOW";
    pub const GET_VOLT_LOW: &str = ":SOUR:VOLT:LIMIT:LOW?";
    pub const SET_VOLT_HIGH: &str = ":SOUR:VOLT:LIMIT:HIGH";
    pub const GET_VOLT_HIGH: &str = ":SOUR:VOLT:LIMIT:HIGH?";
    pub const SET_CURRENT: &str = ":SOUR:CURR";
    pub const GET_CURRENT: &str = ":SOUR:CURR?";
    pub const SET_CURR_LOW: &str = ":SOUR:CURR:LIMIT:LOW";
    pub const GET_CURR_LOW: &str = ":SOUR:CURR:LIMIT:LOW?";
    pub const SET_CURR_HIGH: &str = ":SOUR:CURR:LIMIT:HIGH";
    pub const GET_CURR_HIGH: &str = ":SOUR:CURR:LIMIT:HIGH?";
    pub const SET_OVP: &str = ":SOUR:VOLT:PROT:HIGH";
    pub const GET_OVP: &str = ":SOUR:VOLT:PROT:HIGH?";
    pub const SET_OCP: &str = ":SOUR:CURR:PROT:HIGH";
    pub const GET_OCP: &str = ":SOUR:CURR:PROT:HIGH?";
    pub const SET_OPP: &str = ":SOUR:POW:PROT:HIGH";
    pub const GET_OPP: &str = ":SOUR:POW:PROT:HIGH?";
    pub const MEAS_VOLTAGE: &str = ":MEAS:VOLT?";
    pub const MEAS_CURRENT: &str = ":MEAS:CURR?";
    pub const MEAS_POWER: &str = ":MEAS:POW?";
    pub const FETCH_STATUS: &str = ":FETC:STAT?";
}

/// 写命令后的固定沉降延迟
const SETTLE_DELAY: Duration = Duration::from_millis(10);

/// 设备量程（62000H 全系列上限，限值设置会钳位到此范围）
pub const MAX_POSSIBLE_VOLTAGE: f64 = 1000.0;
pub const MAX_POSSIBLE_CURRENT: f64 = 15.0;
pub const MAX_POSSIBLE_POWER: f64 = 15000.0;

/// 默认保护配置（上电时应用）
mod defaults {
    pub const MIN_VOLTAGE: f64 = 0.0;
    pub const MAX_VOLTAGE: f64 = 706.0;
    pub const MIN_CURRENT: f64 = 0.0;
    pub const MAX_CURRENT: f64 = 15.0;
    pub const OVP: f64 = 708.0;
    pub const OCP: f64 = 15.0;
    pub const OPP: f64 = 15000.0;
}

/// Chroma 62000H 驱动
///
/// 泛型于传输层：生产环境用 [`SerialTransport`]，测试注入脚本传输。
pub struct Chroma62000H<T: ScpiTransport> {
    transport: T,
    /// `*IDN?` 返回的设备标识
    identity: String,
}

impl Chroma62000H<SerialTransport> {
    /// 通过串口连接仪器
    ///
    /// 打开端口后立即以 `*IDN?` 验证对端确实在响应；
    /// 无响应视为未连接（初始化致命错误路径）。
    pub fn connect(path: &str, baud: u32) -> Result<Self, InstrumentError> {
        let transport = SerialTransport::open(path, baud)
            .map_err(|e| InstrumentError::NotConnected(format!("{}: {}", path, e)))?;
        Self::with_transport(transport)
    }
}

impl<T: ScpiTransport> Chroma62000H<T> {
    /// 用现成的传输层构建驱动（并验证 `*IDN?`）
    pub fn with_transport(mut transport: T) -> Result<Self, InstrumentError> {
        let identity = transport
            .query_line(cmds::IDN)
            .map_err(|e| InstrumentError::NotConnected(format!("no *IDN? response: {}", e)))?;
        debug!("Connected to instrument: {}", identity);
        Ok(Self {
            transport,
            identity,
        })
    }

    /// `*IDN?` 设备标识
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// 写命令 + 沉降延迟
    fn write_command(&mut self, cmd: &str) -> Result<(), InstrumentError> {
        self.transport.write_line(cmd)?;
        std::thread::sleep(SETTLE_DELAY);
        Ok(())
    }

    fn query_f64(&mut self, query: &str) -> Result<f64, InstrumentError> {
        let response = self.transport.query_line(query)?;
        response
            .trim()
            .parse()
            .map_err(|_| InstrumentError::InvalidResponse {
                query: query.to_string(),
                response,
            })
    }

    /// 设置电压限值（钳位到设备量程）
    pub fn set_voltage_limits(&mut self, min: f64, max: f64) -> Result<(), InstrumentError> {
        let min = min.max(0.0);
        let max = max.min(MAX_POSSIBLE_VOLTAGE);
        self.write_command(&format!("{} {}", cmds::SET_VOLT_LOW, min))?;
        self.write_command(&format!("{} {}", cmds::SET_VOLT_HIGH, max))
    }

    /// 设置电流限值（钳位到设备量程）
    pub fn set_current_limits(&mut self, min: f64, max: f64) -> Result<(), InstrumentError> {
        let min = min.max(0.0);
        let max = max.min(MAX_POSSIBLE_CURRENT);
        self.write_command(&format!("{} {}", cmds::SET_CURR_LOW, min))?;
        self.write_command(&format!("{} {}", cmds::SET_CURR_HIGH, max))
    }

    /// 设置过压保护点
    pub fn set_over_voltage_protection(&mut self, volts: f64) -> Result<(), InstrumentError> {
        self.write_command(&format!("{} {}", cmds::SET_OVP, volts))
    }

    /// 设置过流保护点
    pub fn set_over_current_protection(&mut self, amps: f64) -> Result<(), InstrumentError> {
        self.write_command(&format!("{} {}", cmds::SET_OCP, amps))
    }

    /// 设置过功率保护点
    pub fn set_over_power_protection(&mut self, watts: f64) -> Result<(), InstrumentError> {
        self.write_command(&format!("{} {}", cmds::SET_OPP, watts))
    }

    /// 应用默认保护配置并把设定值归零
    ///
    /// 限值 0–706 V / 0–15 A，OVP 708 V，OCP 15 A，OPP 15 kW。
    pub fn configure_default_protections(&mut self) -> Result<(), InstrumentError> {
        self.set_current_limits(defaults::MIN_CURRENT, defaults::MAX_CURRENT)?;
        self.set_voltage_limits(defaults::MIN_VOLTAGE, defaults::MAX_VOLTAGE)?;
        self.set_over_voltage_protection(defaults::OVP)?;
        self.set_over_current_protection(defaults::OCP)?;
        self.set_over_power_protection(defaults::OPP)?;
        self.set_voltage(0.0)?;
        self.set_current(0.0)
    }

    /// 查询电压限值（低，高）
    pub fn get_voltage_limits(&mut self) -> Result<(f64, f64), InstrumentError> {
        let low = self.query_f64(cmds::GET_VOLT_LOW)?;
        let high = self.query_f64(cmds::GET_VOLT_HIGH)?;
        Ok((low, high))
    }

    /// 查询电流限值（低，高）
    pub fn get_current_limits(&mut self) -> Result<(f64, f64), InstrumentError> {
        let low = self.query_f64(cmds::GET_CURR_LOW)?;
        let high = self.query_f64(cmds::GET_CURR_HIGH)?;
        Ok((low, high))
    }

    /// 查询过压保护点
    pub fn get_over_voltage_protection(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64(cmds::GET_OVP)
    }

    /// 查询过流保护点
    pub fn get_over_current_protection(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64(cmds::GET_OCP)
    }

    /// 查询过功率保护点
    pub fn get_over_power_protection(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64(cmds::GET_OPP)
    }

    /// 查询当前电压设定值（设定值，非实测）
    pub fn get_configured_voltage(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64(cmds::GET_VOLTAGE)
    }

    /// 查询当前电流设定值（设定值，非实测）
    pub fn get_configured_current(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64(cmds::GET_CURRENT)
    }

    /// 实测输出功率（W）
    pub fn measure_power(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64(cmds::MEAS_POWER)
    }
}

impl<T: ScpiTransport> Instrument for Chroma62000H<T> {
    fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        trace!("set voltage {} V", volts);
        self.write_command(&format!("{} {}", cmds::SET_VOLTAGE, volts))
    }

    fn set_current(&mut self, amps: f64) -> Result<(), InstrumentError> {
        trace!("set current {} A", amps);
        self.write_command(&format!("{} {}", cmds::SET_CURRENT, amps))
    }

    fn enable_output(&mut self) -> Result<(), InstrumentError> {
        self.write_command(cmds::OUTPUT_ON)
    }

    fn disable_output(&mut self) -> Result<(), InstrumentError> {
        self.write_command(cmds::OUTPUT_OFF)
    }

    /// 安全停机：`:ABOR` 后把设定值归零
    fn abort(&mut self) -> Result<(), InstrumentError> {
        self.write_command(cmds::ABORT)?;
        self.set_voltage(0.0)?;
        self.set_current(0.0)
    }

    fn measure_voltage(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64(cmds::MEAS_VOLTAGE)
    }

    fn measure_current(&mut self) -> Result<f64, InstrumentError> {
        self.query_f64(cmds::MEAS_CURRENT)
    }

    fn get_output_enabled(&mut self) -> Result<bool, InstrumentError> {
        let response = self.transport.query_line(cmds::GET_OUTPUT)?;
        Ok(response.trim().eq_ignore_ascii_case("ON"))
    }

    /// 查询并解码 `:FETC:STAT?`
    ///
    /// 响应为逗号分隔的四个参数：两个状态字、输出状态（ON/OFF）、
    /// 调节模式（CV/CC）。
    fn fetch_status(&mut self) -> Result<StatusFlags, InstrumentError> {
        let response = self.transport.query_line(cmds::FETCH_STATUS)?;
        parse_status_response(&response).ok_or_else(|| InstrumentError::InvalidResponse {
            query: cmds::FETCH_STATUS.to_string(),
            response,
        })
    }
}

/// 解析 `:FETC:STAT?` 的四参数响应
fn parse_status_response(response: &str) -> Option<StatusFlags> {
    let mut parts = response.split(',').map(str::trim);
    let word0: u16 = parts.next()?.parse().ok()?;
    let word1: u16 = parts.next()?.parse().ok()?;
    let output = parts.next()?;
    let mode = parts.next()?;

    let mut flags = StatusFlags::from_status_words(word0, word1);
    flags.output_state = if output.eq_ignore_ascii_case("ON") {
        OutputState::On
    } else {
        OutputState::Off
    };
    flags.mode = if mode.eq_ignore_ascii_case("CC") {
        RegulationMode::Cc
    } else {
        RegulationMode::Cv
    };
    Some(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// 脚本化传输：记录写出的命令，按序返回预置响应
    struct ScriptedTransport {
        written: Vec<String>,
        responses: VecDeque<&'static str>,
    }

    impl ScriptedTransport {
        fn new(responses: &[&'static str]) -> Self {
            Self {
                written: Vec::new(),
                responses: responses.iter().copied().collect(),
            }
        }
    }

    impl ScpiTransport for ScriptedTransport {
        fn write_line(&mut self, cmd: &str) -> Result<(), InstrumentError> {
            self.written.push(cmd.to_string());
            Ok(())
        }

        fn query_line(&mut self, query: &str) -> Result<String, InstrumentError> {
            self.written.push(query.to_string());
            self.responses
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| InstrumentError::Timeout(query.to_string()))
        }
    }

    fn chroma(responses: &[&'static str]) -> Chroma62000H<ScriptedTransport> {
        // 第一个响应固定为 *IDN?
        let mut all = vec!["CHROMA,62012P-600-8,000000,1.00"];
        all.extend_from_slice(responses);
        Chroma62000H::with_transport(ScriptedTransport::new(&all)).unwrap()
    }

    #[test]
    fn test_connect_requires_idn_response() {
        let result = Chroma62000H::with_transport(ScriptedTransport::new(&[]));
        assert!(matches!(result, Err(InstrumentError::NotConnected(_))));
    }

    #[test]
    fn test_setpoint_command_spelling() {
        let mut psu = chroma(&[]);
        psu.set_voltage(30.0).unwrap();
        psu.set_current(10.5).unwrap();
        let written = &psu.transport.written;
        assert_eq!(written[1], ":SOUR:VOLT 30");
        assert_eq!(written[2], ":SOUR:CURR 10.5");
    }

    #[test]
    fn test_abort_zeroes_setpoints() {
        let mut psu = chroma(&[]);
        psu.abort().unwrap();
        let written = &psu.transport.written;
        assert_eq!(
            &written[1..],
            &[":ABOR", ":SOUR:VOLT 0", ":SOUR:CURR 0"]
        );
    }

    #[test]
    fn test_limit_setters_clamp_to_device_range() {
        let mut psu = chroma(&[]);
        psu.set_voltage_limits(-5.0, 2000.0).unwrap();
        psu.set_current_limits(-1.0, 99.0).unwrap();
        let written = &psu.transport.written;
        assert_eq!(written[1], ":SOUR:VOLT:LIMIT:LOW 0");
        assert_eq!(written[2], ":SOUR:VOLT:LIMIT:HIGH 1000");
        assert_eq!(written[3], ":SOUR:CURR:LIMIT:LOW 0");
        assert_eq!(written[4], ":SOUR:CURR:LIMIT:HIGH 15");
    }

    #[test]
    fn test_limit_and_protection_getters() {
        let mut psu = chroma(&["0", "706", "0", "15", "708", "15", "15000"]);
        assert_eq!(psu.get_voltage_limits().unwrap(), (0.0, 706.0));
        assert_eq!(psu.get_current_limits().unwrap(), (0.0, 15.0));
        assert_eq!(psu.get_over_voltage_protection().unwrap(), 708.0);
        assert_eq!(psu.get_over_current_protection().unwrap(), 15.0);
        assert_eq!(psu.get_over_power_protection().unwrap(), 15000.0);
        assert_eq!(
            &psu.transport.written[1..],
            &[
                ":SOUR:VOLT:LIMIT:LOW?",
                ":SOUR:VOLT:LIMIT:HIGH?",
                ":SOUR:CURR:LIMIT:LOW?",
                ":SOUR:CURR:LIMIT:HIGH?",
                ":SOUR:VOLT:PROT:HIGH?",
                ":SOUR:CURR:PROT:HIGH?",
                ":SOUR:POW:PROT:HIGH?",
            ]
        );
    }

    #[test]
    fn test_configured_setpoint_getters() {
        let mut psu = chroma(&["30.00", "10.50"]);
        assert_eq!(psu.get_configured_voltage().unwrap(), 30.0);
        assert_eq!(psu.get_configured_current().unwrap(), 10.5);
        assert_eq!(psu.transport.written[1], ":SOUR:VOLT?");
        assert_eq!(psu.transport.written[2], ":SOUR:CURR?");
    }

    #[test]
    fn test_measurement_parsing() {
        let mut psu = chroma(&["48.30", "12.70", "ON"]);
        assert_eq!(psu.measure_voltage().unwrap(), 48.3);
        assert_eq!(psu.measure_current().unwrap(), 12.7);
        assert!(psu.get_output_enabled().unwrap());
    }

    #[test]
    fn test_garbage_measurement_is_invalid_response() {
        let mut psu = chroma(&["not-a-number"]);
        assert!(matches!(
            psu.measure_voltage(),
            Err(InstrumentError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_fetch_status_decodes_words_and_modes() {
        // word0 bit2 = OPP, word1 bit9 = AC fault
        let mut psu = chroma(&["4,512,ON,CC"]);
        let status = psu.fetch_status().unwrap();
        assert!(status.opp);
        assert!(status.ac_fault);
        assert!(!status.ovp);
        assert_eq!(status.output_state, OutputState::On);
        assert_eq!(status.mode, RegulationMode::Cc);
    }

    #[test]
    fn test_fetch_status_rejects_short_response() {
        let mut psu = chroma(&["4,512"]);
        assert!(matches!(
            psu.fetch_status(),
            Err(InstrumentError::InvalidResponse { .. })
        ));
    }
}
