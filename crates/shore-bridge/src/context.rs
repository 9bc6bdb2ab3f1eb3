//! 共享遥测状态
//!
//! 进程级状态容器：最新请求设定值（来自 CAN）与最新实测遥测
//! （来自仪器），外加单调递增的计数器和可在运行期修改的打印周期。
//!
//! 写者约束（每组字段只有一个写者）：
//! - 设定值：仅 CAN 桥接循环写入，各字段独立（原子标量）
//! - 实测遥测/状态位：仅仪器调度循环写入，整体换入（ArcSwap）
//!
//! 所有方法都不会阻塞，任何锁下都不做 I/O。

use arc_swap::ArcSwap;
use shore_protocol::{ControlRequest, StatusFlags};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 默认的信息打印周期
const DEFAULT_INFO_PRINT_PERIOD: Duration = Duration::from_secs(10);

/// 位转换封装的原子 f64
///
/// 设定值各字段代表独立的控制信号，允许逐字段更新，
/// 因此不需要整体快照，仅需单字段的原子性。
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// 请求设定值快照（读取侧视图）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RequestedSetpoint {
    pub enable_output: bool,
    /// 最大交流侧输入电流（A），当前仅存储/上报，不下发仪器
    pub max_ac_current: f64,
    /// 直流电压设定值（V）
    pub voltage: f64,
    /// 直流电流设定值（A）
    pub current: f64,
}

/// 请求设定值的原子存储单元
pub struct RequestedSetpointCell {
    enable_output: AtomicBool,
    max_ac_current: AtomicF64,
    voltage: AtomicF64,
    current: AtomicF64,
}

impl RequestedSetpointCell {
    fn new() -> Self {
        // 初始：零设定值，输出关闭
        Self {
            enable_output: AtomicBool::new(false),
            max_ac_current: AtomicF64::new(0.0),
            voltage: AtomicF64::new(0.0),
            current: AtomicF64::new(0.0),
        }
    }

    /// 用解码出的控制请求覆盖各字段（仅 CAN 桥接循环调用）
    pub fn store(&self, request: &ControlRequest) {
        self.enable_output
            .store(request.enable_output, Ordering::Relaxed);
        self.max_ac_current.store(request.max_ac_current);
        self.voltage.store(request.voltage);
        self.current.store(request.current);
    }

    /// 读取当前设定值
    pub fn snapshot(&self) -> RequestedSetpoint {
        RequestedSetpoint {
            enable_output: self.enable_output.load(Ordering::Relaxed),
            max_ac_current: self.max_ac_current.load(),
            voltage: self.voltage.load(),
            current: self.current.load(),
        }
    }
}

/// 实测遥测快照
///
/// 整体替换、从不逐字段修改：读者要么看到上一次轮询的完整快照，
/// 要么看到这一次的，不会混合。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeasuredTelemetry {
    /// 实测电压（V）
    pub voltage: f64,
    /// 实测电流（A）
    pub current: f64,
    /// 输出是否使能
    pub output_enabled: bool,
    /// 保护/故障状态位
    pub status: StatusFlags,
}

/// 进程生命周期内单调递增的计数器
#[derive(Default)]
pub struct BridgeCounters {
    /// 收到的非空 CAN 帧总数
    pub messages_received: AtomicU64,
    /// 传输层错误总数（错误帧、读写失败）
    pub transport_errors: AtomicU64,
}

impl BridgeCounters {
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }
}

/// 共享状态上下文
///
/// 三个循环（以及操作员控制面）之间唯一的协调对象。
pub struct BridgeContext {
    /// 请求设定值（CAN 桥接循环写）
    pub requested: RequestedSetpointCell,
    /// 实测遥测（仪器调度循环写，ArcSwap 整体换入）
    telemetry: ArcSwap<MeasuredTelemetry>,
    /// 计数器
    pub counters: BridgeCounters,
    /// 信息打印周期（毫秒，操作员可在运行期修改）
    info_print_period_ms: AtomicU64,
    /// 进程启动时刻（运行时长显示用）
    started_at: Instant,
}

impl BridgeContext {
    pub fn new() -> Self {
        Self {
            requested: RequestedSetpointCell::new(),
            telemetry: ArcSwap::from_pointee(MeasuredTelemetry::default()),
            counters: BridgeCounters::default(),
            info_print_period_ms: AtomicU64::new(DEFAULT_INFO_PRINT_PERIOD.as_millis() as u64),
            started_at: Instant::now(),
        }
    }

    /// 最新实测遥测快照（无锁读取）
    pub fn telemetry(&self) -> Arc<MeasuredTelemetry> {
        self.telemetry.load_full()
    }

    /// 发布新的遥测快照（仅仪器调度循环调用）
    pub fn publish_telemetry(&self, snapshot: MeasuredTelemetry) {
        self.telemetry.store(Arc::new(snapshot));
    }

    /// 当前信息打印周期
    pub fn info_print_period(&self) -> Duration {
        Duration::from_millis(self.info_print_period_ms.load(Ordering::Relaxed))
    }

    /// 修改信息打印周期（在报告循环的下一次比较时生效）
    pub fn set_info_print_period(&self, period: Duration) {
        self.info_print_period_ms
            .store(period.as_millis() as u64, Ordering::Relaxed);
    }

    /// 进程运行时长
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_zero_and_disabled() {
        let ctx = BridgeContext::new();
        assert_eq!(ctx.requested.snapshot(), RequestedSetpoint::default());
        assert_eq!(*ctx.telemetry(), MeasuredTelemetry::default());
        assert_eq!(ctx.counters.messages_received(), 0);
        assert_eq!(ctx.counters.transport_errors(), 0);
    }

    #[test]
    fn test_setpoint_store_round_trip() {
        let ctx = BridgeContext::new();
        let request = ControlRequest {
            enable_output: true,
            max_ac_current: 5.0,
            voltage: 30.0,
            current: 10.0,
        };
        ctx.requested.store(&request);
        let snap = ctx.requested.snapshot();
        assert!(snap.enable_output);
        assert_eq!(snap.voltage, 30.0);
        assert_eq!(snap.current, 10.0);
        assert_eq!(snap.max_ac_current, 5.0);
    }

    #[test]
    fn test_telemetry_snapshot_is_replaced_wholesale() {
        let ctx = BridgeContext::new();
        let old = ctx.telemetry();
        ctx.publish_telemetry(MeasuredTelemetry {
            voltage: 48.3,
            current: 12.7,
            output_enabled: true,
            status: StatusFlags::default(),
        });
        // 旧快照持有者不受影响，新读者拿到新快照
        assert_eq!(old.voltage, 0.0);
        assert_eq!(ctx.telemetry().voltage, 48.3);
    }

    #[test]
    fn test_info_print_period_default_and_update() {
        let ctx = BridgeContext::new();
        assert_eq!(ctx.info_print_period(), Duration::from_secs(10));
        ctx.set_info_print_period(Duration::from_secs_f64(2.5));
        assert_eq!(ctx.info_print_period(), Duration::from_millis(2500));
    }

    #[test]
    fn test_atomic_f64_bit_round_trip() {
        let cell = AtomicF64::new(0.0);
        for v in [0.0, -1.5, 48.3, f64::MAX] {
            cell.store(v);
            assert_eq!(cell.load(), v);
        }
    }
}
