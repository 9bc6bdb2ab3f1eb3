//! 测试用 Mock 仪器
//!
//! 记录桥接循环下发的每条命令，返回可配置的实测值。

use crate::{Instrument, InstrumentError};
use parking_lot::Mutex;
use shore_protocol::StatusFlags;
use std::sync::Arc;

/// 记录的仪器命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockCommand {
    SetVoltage(f64),
    SetCurrent(f64),
    EnableOutput,
    DisableOutput,
    Abort,
}

#[derive(Default)]
struct MockState {
    commands: Vec<MockCommand>,
    voltage: f64,
    current: f64,
    output_enabled: bool,
    status: StatusFlags,
    fail_writes: bool,
}

/// Mock 仪器的测试侧句柄
#[derive(Clone, Default)]
pub struct MockInstrumentHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockInstrumentHandle {
    /// 已下发命令的快照
    pub fn commands(&self) -> Vec<MockCommand> {
        self.state.lock().commands.clone()
    }

    /// 统计某类命令出现的次数
    pub fn count_aborts(&self) -> usize {
        self.state
            .lock()
            .commands
            .iter()
            .filter(|c| matches!(c, MockCommand::Abort))
            .count()
    }

    /// 配置之后的测量返回值
    pub fn set_measurements(&self, voltage: f64, current: f64, output_enabled: bool) {
        let mut state = self.state.lock();
        state.voltage = voltage;
        state.current = current;
        state.output_enabled = output_enabled;
    }

    /// 配置之后的状态查询返回值
    pub fn set_status(&self, status: StatusFlags) {
        self.state.lock().status = status;
    }

    /// 之后的写命令全部失败（模拟通信故障）
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }
}

/// Mock 仪器
pub struct MockInstrument {
    handle: MockInstrumentHandle,
}

impl MockInstrument {
    pub fn new() -> (Self, MockInstrumentHandle) {
        let handle = MockInstrumentHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }

    fn record(&self, command: MockCommand) -> Result<(), InstrumentError> {
        let mut state = self.handle.state.lock();
        if state.fail_writes {
            return Err(InstrumentError::Timeout("mock write failure".to_string()));
        }
        state.commands.push(command);
        Ok(())
    }
}

impl Instrument for MockInstrument {
    fn set_voltage(&mut self, volts: f64) -> Result<(), InstrumentError> {
        self.record(MockCommand::SetVoltage(volts))
    }

    fn set_current(&mut self, amps: f64) -> Result<(), InstrumentError> {
        self.record(MockCommand::SetCurrent(amps))
    }

    fn enable_output(&mut self) -> Result<(), InstrumentError> {
        self.record(MockCommand::EnableOutput)
    }

    fn disable_output(&mut self) -> Result<(), InstrumentError> {
        self.record(MockCommand::DisableOutput)
    }

    fn abort(&mut self) -> Result<(), InstrumentError> {
        self.record(MockCommand::Abort)
    }

    fn measure_voltage(&mut self) -> Result<f64, InstrumentError> {
        Ok(self.handle.state.lock().voltage)
    }

    fn measure_current(&mut self) -> Result<f64, InstrumentError> {
        Ok(self.handle.state.lock().current)
    }

    fn get_output_enabled(&mut self) -> Result<bool, InstrumentError> {
        Ok(self.handle.state.lock().output_enabled)
    }

    fn fetch_status(&mut self) -> Result<StatusFlags, InstrumentError> {
        Ok(self.handle.state.lock().status)
    }
}
