//! 桥接循环集成测试
//!
//! 用 Mock CAN 适配器 + Mock 仪器驱动真实的三循环桥，验证：
//! 1. 控制请求解码与去抖下发
//! 2. 空读帧/陌生 ID 的计数语义
//! 3. 周期性出站帧携带最新遥测
//! 4. 关停序列（两次安全停机指令 + 有界退出）
//! 5. 传输层故障只计数、不致命

use shore_bridge::{ShoreBridge, TimingConfig};
use shore_can::ShoreFrame;
use shore_can::mock::MockCanAdapter;
use shore_instrument::mock::{MockCommand, MockInstrument};
use shore_protocol::ids::{ID_STATUS_REPORT, ID_TELEMETRY_REPORT};
use shore_protocol::{ControlRequest, StatusFlags};
use std::thread::sleep;
use std::time::Duration;

/// 测试用快节奏时序（语义与默认配置一致，只是周期更短）
fn fast_config() -> TimingConfig {
    TimingConfig {
        can_tx_period_ms: 50,
        telemetry_fetch_period_ms: 50,
        idle_sleep_ms: 2,
    }
}

fn control_frame(enable: bool, voltage: f64, current: f64) -> ShoreFrame {
    ControlRequest {
        enable_output: enable,
        max_ac_current: 16.0,
        voltage,
        current,
    }
    .to_frame()
}

#[test]
fn test_control_request_applied_once_despite_repeats() {
    let (can, can_handle) = MockCanAdapter::new();
    let (instrument, psu_handle) = MockInstrument::new();

    // 同一请求连发 5 次：去抖要求每个字段至多一条命令
    can_handle.push_rx_repeated(control_frame(true, 30.0, 10.0), 5);

    let bridge = ShoreBridge::start(can, instrument, fast_config());
    let ctx = bridge.context();
    sleep(Duration::from_millis(200));
    bridge.shutdown().unwrap();

    assert_eq!(ctx.counters.messages_received(), 5);
    assert!(can_handle.rx_drained());

    let commands = psu_handle.commands();
    let set_voltages: Vec<_> = commands
        .iter()
        .filter(|c| matches!(c, MockCommand::SetVoltage(_)))
        .collect();
    let set_currents: Vec<_> = commands
        .iter()
        .filter(|c| matches!(c, MockCommand::SetCurrent(_)))
        .collect();
    let enables: Vec<_> = commands
        .iter()
        .filter(|c| matches!(c, MockCommand::EnableOutput))
        .collect();

    assert_eq!(set_voltages, vec![&MockCommand::SetVoltage(30.0)]);
    assert_eq!(set_currents, vec![&MockCommand::SetCurrent(10.0)]);
    assert_eq!(enables.len(), 1);
}

#[test]
fn test_changed_field_does_not_regenerate_other_commands() {
    let (can, can_handle) = MockCanAdapter::new();
    let (instrument, psu_handle) = MockInstrument::new();

    can_handle.push_rx(control_frame(true, 30.0, 10.0));

    let bridge = ShoreBridge::start(can, instrument, fast_config());
    sleep(Duration::from_millis(100));

    // 只改电压：不得重发电流/使能命令
    can_handle.push_rx(control_frame(true, 42.0, 10.0));
    sleep(Duration::from_millis(100));
    bridge.shutdown().unwrap();

    let commands = psu_handle.commands();
    let voltages: Vec<_> = commands
        .iter()
        .filter_map(|c| match c {
            MockCommand::SetVoltage(v) => Some(*v),
            _ => None,
        })
        .collect();
    assert_eq!(voltages, vec![30.0, 42.0]);
    assert_eq!(
        commands
            .iter()
            .filter(|c| matches!(c, MockCommand::SetCurrent(_)))
            .count(),
        1
    );
    assert_eq!(
        commands
            .iter()
            .filter(|c| matches!(c, MockCommand::EnableOutput))
            .count(),
        1
    );
}

#[test]
fn test_idle_frames_never_counted_nor_applied() {
    let (can, can_handle) = MockCanAdapter::new();
    let (instrument, psu_handle) = MockInstrument::new();

    // 适配器空轮询产物：ID 0
    can_handle.push_rx_repeated(ShoreFrame::new(0, [0; 8]), 10);

    let bridge = ShoreBridge::start(can, instrument, fast_config());
    let ctx = bridge.context();
    sleep(Duration::from_millis(100));
    bridge.shutdown().unwrap();

    assert_eq!(ctx.counters.messages_received(), 0);
    assert_eq!(
        ctx.requested.snapshot(),
        shore_bridge::RequestedSetpoint::default()
    );
    // 设定值从未变化：除关停指令外不应有任何命令
    assert!(
        psu_handle
            .commands()
            .iter()
            .all(|c| matches!(c, MockCommand::Abort))
    );
}

#[test]
fn test_unrecognized_ids_are_drained_but_ignored() {
    let (can, can_handle) = MockCanAdapter::new();
    let (instrument, psu_handle) = MockInstrument::new();

    can_handle.push_rx_repeated(ShoreFrame::new(0x200, [0xAB; 8]), 3);

    let bridge = ShoreBridge::start(can, instrument, fast_config());
    let ctx = bridge.context();
    sleep(Duration::from_millis(100));
    bridge.shutdown().unwrap();

    // 计入收包数，但不产生任何设定值
    assert_eq!(ctx.counters.messages_received(), 3);
    assert!(can_handle.rx_drained());
    assert!(
        psu_handle
            .commands()
            .iter()
            .all(|c| matches!(c, MockCommand::Abort))
    );
}

#[test]
fn test_periodic_reports_carry_latest_telemetry() {
    let (can, can_handle) = MockCanAdapter::new();
    let (instrument, psu_handle) = MockInstrument::new();

    psu_handle.set_measurements(48.3, 127.1, true);
    psu_handle.set_status(StatusFlags {
        ac_fault: true,
        ovp: true,
        ..Default::default()
    });

    let bridge = ShoreBridge::start(can, instrument, fast_config());
    sleep(Duration::from_millis(250));
    bridge.shutdown().unwrap();

    let sent = can_handle.sent_frames();
    let telemetry: Vec<_> = sent.iter().filter(|f| f.id == ID_TELEMETRY_REPORT).collect();
    let status: Vec<_> = sent.iter().filter(|f| f.id == ID_STATUS_REPORT).collect();

    // 250 ms / 50 ms 周期：至少 3 个完整周期
    assert!(telemetry.len() >= 3, "expected >=3 telemetry frames, got {}", telemetry.len());
    assert_eq!(telemetry.len(), status.len());

    let last = telemetry.last().unwrap();
    // 48.3 V / 127.1 A 的大端 ×10 编码，未上报字节为 0xFF 哨兵
    assert_eq!(&last.data[0..4], &[0xFF; 4]);
    assert_eq!(&last.data[4..8], &[0x01, 0xE3, 0x04, 0xF7]);

    let last_status = status.last().unwrap();
    // ac_fault(bit7) + ready(bit6) + ovp(bit4)
    assert_eq!(last_status.data[0], 0xD0);
    assert_eq!(last_status.data[4], 0xA8);
}

#[test]
fn test_telemetry_snapshot_tracks_instrument_within_fetch_period() {
    let (can, _can_handle) = MockCanAdapter::new();
    let (instrument, psu_handle) = MockInstrument::new();

    psu_handle.set_measurements(10.0, 1.0, false);

    let bridge = ShoreBridge::start(can, instrument, fast_config());
    let ctx = bridge.context();
    sleep(Duration::from_millis(150));
    assert_eq!(ctx.telemetry().voltage, 10.0);

    // 仪器读数变化后，共享快照在一个轮询周期内跟上
    psu_handle.set_measurements(55.5, 7.5, true);
    sleep(Duration::from_millis(150));
    let snapshot = ctx.telemetry();
    assert_eq!(snapshot.voltage, 55.5);
    assert_eq!(snapshot.current, 7.5);
    assert!(snapshot.output_enabled);

    bridge.shutdown().unwrap();
}

#[test]
fn test_shutdown_sends_two_aborts_and_freezes_setpoints() {
    let (can, can_handle) = MockCanAdapter::new();
    let (instrument, psu_handle) = MockInstrument::new();

    // 关停发起时设定值非零
    can_handle.push_rx(control_frame(true, 400.0, 12.0));

    let bridge = ShoreBridge::start(can, instrument, fast_config());
    sleep(Duration::from_millis(100));
    bridge.shutdown().unwrap();

    assert_eq!(psu_handle.count_aborts(), 2);

    // 第一条停机指令之后不再有任何设定值下发
    let commands = psu_handle.commands();
    let first_abort = commands
        .iter()
        .position(|c| matches!(c, MockCommand::Abort))
        .expect("abort must have been issued");
    assert!(
        commands[first_abort..]
            .iter()
            .all(|c| matches!(c, MockCommand::Abort)),
        "no setpoint command may follow the safe-stop: {:?}",
        &commands[first_abort..]
    );
}

#[test]
fn test_transport_faults_are_counted_never_fatal() {
    let (can, can_handle) = MockCanAdapter::new();
    let (instrument, _psu_handle) = MockInstrument::new();

    // 错误帧（ID 0 + 错误标志）既计错误数、也不计收包数
    can_handle.push_rx(ShoreFrame {
        id: 0,
        data: [0; 8],
        error_flags: 0x20,
    });
    // 之后所有发送都失败
    can_handle.set_fail_sends(true);

    let bridge = ShoreBridge::start(can, instrument, fast_config());
    let ctx = bridge.context();
    sleep(Duration::from_millis(200));

    assert_eq!(ctx.counters.messages_received(), 0);
    // 1 个错误帧 + 每个 50 ms 周期两次失败发送
    assert!(ctx.counters.transport_errors() >= 3);

    // 循环未被故障终止，仍可正常关停
    bridge.shutdown().unwrap();
}
