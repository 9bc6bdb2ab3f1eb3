//! 桥接循环
//!
//! 三个常驻循环的主体逻辑。循环之间不直接阻塞等待，只通过
//! [`BridgeContext`] 与各自的停止标志协调；停止标志在周期性
//! 分支之后、每次迭代检查一次，关停延迟因此以一次迭代
//! （接收超时 + 空闲睡眠）为上界。

use crate::context::{BridgeContext, MeasuredTelemetry, RequestedSetpoint};
use crossbeam_channel::Receiver;
use shore_can::{CanAdapter, CanError};
use shore_instrument::{Instrument, InstrumentError};
use shore_protocol::ids::ID_CONTROL_REQUEST;
use shore_protocol::{ControlRequest, StatusReport, TelemetryReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 仪器安全停机请求（关停协调器 → 仪器调度循环）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortRequest;

/// 循环时序配置
///
/// 周期均按单调时钟测量。空闲睡眠只为限制轮询设计的 CPU 占用，
/// 粒度必须保持在迭代周期以下（亚 20 ms）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// 出站 CAN 帧发送周期（毫秒）
    pub can_tx_period_ms: u64,
    /// 仪器遥测轮询周期（毫秒）
    pub telemetry_fetch_period_ms: u64,
    /// 迭代间空闲睡眠（毫秒）
    pub idle_sleep_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            can_tx_period_ms: 100,
            telemetry_fetch_period_ms: 500,
            idle_sleep_ms: 5,
        }
    }
}

/// CAN 桥接循环
///
/// 每次迭代先处理入站（解码控制请求、维护计数器），再评估
/// 周期性发送分支（遥测帧 + 状态帧），最后检查停止标志。
/// 传输层错误只计数、从不致命。
///
/// # 参数
/// - `can`: CAN 适配器（本循环独占）
/// - `ctx`: 共享状态上下文
/// - `config`: 时序配置
/// - `running`: 停止标志（false 时退出）
pub fn can_loop(
    mut can: impl CanAdapter,
    ctx: Arc<BridgeContext>,
    config: TimingConfig,
    running: Arc<AtomicBool>,
) {
    let tx_period = Duration::from_millis(config.can_tx_period_ms);
    let idle_sleep = Duration::from_millis(config.idle_sleep_ms);
    let mut last_tx = Instant::now();

    loop {
        // ============================================================
        // 1. 入站：读一帧（带超时），超时即总线空闲
        // ============================================================
        let mut bus_idle = false;
        match can.receive() {
            Ok(frame) => {
                if frame.error_flags != 0 {
                    ctx.counters.transport_errors.fetch_add(1, Ordering::Relaxed);
                }
                if frame.is_idle() {
                    // 适配器空轮询产物，不计数
                    bus_idle = true;
                } else {
                    ctx.counters
                        .messages_received
                        .fetch_add(1, Ordering::Relaxed);

                    if frame.id == ID_CONTROL_REQUEST {
                        match ControlRequest::decode(&frame) {
                            Ok(request) => {
                                trace!(
                                    "control request: enable={} max_ac={:.1}A {:.1}V {:.1}A",
                                    request.enable_output,
                                    request.max_ac_current,
                                    request.voltage,
                                    request.current
                                );
                                ctx.requested.store(&request);
                            },
                            Err(e) => debug!("control request decode failed: {}", e),
                        }
                    }
                    // 其他 ID：读出即丢弃（排空传输层）
                }
            },
            Err(CanError::Timeout) => {
                bus_idle = true;
            },
            Err(e) => {
                warn!("CAN receive error: {}", e);
                ctx.counters.transport_errors.fetch_add(1, Ordering::Relaxed);
            },
        }

        // ============================================================
        // 2. 出站：100 ms 周期发送遥测帧 + 状态帧
        // ============================================================
        if last_tx.elapsed() >= tx_period {
            let telemetry = ctx.telemetry();
            let report_frame = TelemetryReport {
                voltage: telemetry.voltage,
                current: telemetry.current,
            }
            .to_frame();
            let status_frame = StatusReport::from_flags(&telemetry.status).to_frame();

            for frame in [report_frame, status_frame] {
                if let Err(e) = can.send(frame) {
                    warn!("CAN send error (ID 0x{:X}): {}", frame.id, e);
                    ctx.counters.transport_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            last_tx = Instant::now();
        }

        // 3. 停止检查（周期性发送分支之后，每迭代一次）
        if !running.load(Ordering::Acquire) {
            trace!("CAN bridge loop: stop flag observed, exiting");
            break;
        }

        // 总线有积压时不睡眠，继续排空
        if bus_idle {
            spin_sleep::sleep(idle_sleep);
        }
    }
}

/// 仪器调度循环
///
/// 去抖不变式：仅当某字段与**上一次成功下发**的值不同才发命令，
/// 且一个字段一条命令（电压变化不会重发电流/使能命令）。
/// 写失败告警后保留旧的已下发值——下一迭代比较仍然不同，
/// 自然重试；从不把失败当成功。
///
/// # 参数
/// - `instrument`: 仪器驱动（本循环独占）
/// - `abort_rx`: 安全停机请求通道（关停协调器写入）
/// - `ctx`/`config`/`running`: 同 [`can_loop`]
pub fn instrument_loop(
    mut instrument: impl Instrument,
    abort_rx: Receiver<AbortRequest>,
    ctx: Arc<BridgeContext>,
    config: TimingConfig,
    running: Arc<AtomicBool>,
) {
    let fetch_period = Duration::from_millis(config.telemetry_fetch_period_ms);
    let idle_sleep = Duration::from_millis(config.idle_sleep_ms);

    // 上一次成功下发的本地副本；初始与共享状态一致（零/关闭）
    let mut applied = RequestedSetpoint::default();
    // 启动后立即执行首次轮询
    let mut last_fetch = Instant::now() - fetch_period;
    // 收到安全停机请求后不再下发任何设定值
    let mut safe_stopped = false;

    loop {
        // ============================================================
        // 1. 安全停机请求优先于一切设定值下发
        // ============================================================
        while abort_rx.try_recv().is_ok() {
            safe_stopped = true;
            match instrument.abort() {
                Ok(()) => debug!("instrument safe-stop executed"),
                Err(e) => warn!("instrument abort failed: {}", e),
            }
        }

        // ============================================================
        // 2. 去抖下发：逐字段与上次成功值比较
        // ============================================================
        let requested = if safe_stopped {
            // 停机序列已开始，冻结在当前已下发值上
            applied
        } else {
            ctx.requested.snapshot()
        };

        if requested.voltage != applied.voltage {
            match instrument.set_voltage(requested.voltage) {
                Ok(()) => applied.voltage = requested.voltage,
                Err(e) => warn!("set_voltage({}) failed: {}", requested.voltage, e),
            }
        }

        if requested.current != applied.current {
            match instrument.set_current(requested.current) {
                Ok(()) => applied.current = requested.current,
                Err(e) => warn!("set_current({}) failed: {}", requested.current, e),
            }
        }

        if requested.enable_output != applied.enable_output {
            let result = if requested.enable_output {
                instrument.enable_output()
            } else {
                instrument.disable_output()
            };
            match result {
                Ok(()) => applied.enable_output = requested.enable_output,
                Err(e) => warn!(
                    "output {} failed: {}",
                    if requested.enable_output { "enable" } else { "disable" },
                    e
                ),
            }
        }

        // ============================================================
        // 3. 500 ms 周期遥测轮询：整体换入新快照
        // ============================================================
        if last_fetch.elapsed() >= fetch_period {
            match fetch_telemetry(&mut instrument) {
                Ok(snapshot) => ctx.publish_telemetry(snapshot),
                // 轮询失败保留旧快照（有界陈旧优于撕裂数据）
                Err(e) => warn!("telemetry poll failed: {}", e),
            }
            last_fetch = Instant::now();
        }

        // 4. 停止检查
        if !running.load(Ordering::Acquire) {
            trace!("instrument dispatch loop: stop flag observed, exiting");
            break;
        }

        spin_sleep::sleep(idle_sleep);
    }
}

/// 轮询仪器，组装完整遥测快照
///
/// 任一查询失败则整个快照作废，调用方保留上一份。
fn fetch_telemetry(instrument: &mut impl Instrument) -> Result<MeasuredTelemetry, InstrumentError> {
    let voltage = instrument.measure_voltage()?;
    let current = instrument.measure_current()?;
    let output_enabled = instrument.get_output_enabled()?;
    let status = instrument.fetch_status()?;
    Ok(MeasuredTelemetry {
        voltage,
        current,
        output_enabled,
        status,
    })
}

/// 遥测报告循环
///
/// 周期每迭代重读，操作员修改在下一次比较生效。
pub fn info_loop(ctx: Arc<BridgeContext>, config: TimingConfig, running: Arc<AtomicBool>) {
    let idle_sleep = Duration::from_millis(config.idle_sleep_ms);
    let mut last_print = Instant::now();

    loop {
        if last_print.elapsed() >= ctx.info_print_period() {
            let telemetry = ctx.telemetry();
            tracing::info!(
                "Run time: {:.2} min | CAN messages: {} | transport errors: {}",
                ctx.uptime().as_secs_f64() / 60.0,
                ctx.counters.messages_received(),
                ctx.counters.transport_errors(),
            );
            tracing::info!(
                "PSU measured: {:.2} V {:.2} A | output {}",
                telemetry.voltage,
                telemetry.current,
                if telemetry.output_enabled { "ON" } else { "OFF" },
            );
            last_print = Instant::now();
        }

        // 停止检查（打印分支之后）
        if !running.load(Ordering::Acquire) {
            trace!("info loop: stop flag observed, exiting");
            break;
        }

        spin_sleep::sleep(idle_sleep);
    }
}
