//! 关停协调器与对外 API
//!
//! [`ShoreBridge`] 封装三个循环线程的生命周期：启动时各自持有
//! 独立的停止标志；关停时先把仪器置于安全状态（停机指令发两次，
//! 容忍单次丢失），再依次置停止标志并限时 join。

use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::pipeline::{AbortRequest, TimingConfig, can_loop, info_loop, instrument_loop};
use crossbeam_channel::Sender;
use shore_can::CanAdapter;
use shore_instrument::Instrument;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{info, warn};

/// 安全停机指令的发送次数（容忍单次丢失）
const ABORT_ATTEMPTS: usize = 2;
/// 两次停机指令之间的固定延迟
/// （必须大于仪器调度循环的一次迭代，保证第一条已被执行）
const ABORT_RESEND_DELAY: Duration = Duration::from_millis(100);
/// 单个循环线程的 join 限时
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 带限时的线程 join 扩展
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        // 看门狗线程代为 join，结果经通道限时接收
        let (tx, rx) = mpsc::channel();
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // 超时：看门狗继续挂着，进程退出时由 OS 清理
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "Thread join timeout",
                )))
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 岸电充电器转换桥（对外 API）
///
/// 进程状态机：Initializing（适配器/仪器由调用方先行初始化，
/// 任一失败则不构造本类型）→ Running（[`ShoreBridge::start`]）→
/// Stopping（[`ShoreBridge::shutdown`]）→ Terminated。
pub struct ShoreBridge {
    ctx: Arc<BridgeContext>,
    abort_tx: Sender<AbortRequest>,
    can_running: Arc<AtomicBool>,
    instrument_running: Arc<AtomicBool>,
    info_running: Arc<AtomicBool>,
    can_thread: Option<JoinHandle<()>>,
    instrument_thread: Option<JoinHandle<()>>,
    info_thread: Option<JoinHandle<()>>,
}

impl ShoreBridge {
    /// 启动三个桥接循环
    ///
    /// 两个硬件句柄被移动进各自的循环线程并独占持有，
    /// 循环之间只通过共享上下文与停止标志交互。
    pub fn start(
        can: impl CanAdapter + 'static,
        instrument: impl Instrument + 'static,
        config: TimingConfig,
    ) -> Self {
        let ctx = Arc::new(BridgeContext::new());
        // 容量覆盖全部重发次数，协调器端永不阻塞
        let (abort_tx, abort_rx) = crossbeam_channel::bounded(ABORT_ATTEMPTS);

        let can_running = Arc::new(AtomicBool::new(true));
        let instrument_running = Arc::new(AtomicBool::new(true));
        let info_running = Arc::new(AtomicBool::new(true));

        let can_thread = {
            let ctx = ctx.clone();
            let running = can_running.clone();
            spawn(move || can_loop(can, ctx, config, running))
        };

        let instrument_thread = {
            let ctx = ctx.clone();
            let running = instrument_running.clone();
            spawn(move || instrument_loop(instrument, abort_rx, ctx, config, running))
        };

        let info_thread = {
            let ctx = ctx.clone();
            let running = info_running.clone();
            spawn(move || info_loop(ctx, config, running))
        };

        info!("shore bridge running (CAN, instrument, info loops started)");

        Self {
            ctx,
            abort_tx,
            can_running,
            instrument_running,
            info_running,
            can_thread: Some(can_thread),
            instrument_thread: Some(instrument_thread),
            info_thread: Some(info_thread),
        }
    }

    /// 共享状态上下文（操作员控制面读取计数器、调整打印周期）
    pub fn context(&self) -> Arc<BridgeContext> {
        self.ctx.clone()
    }

    /// 有界关停序列
    ///
    /// 1. 向仪器调度循环发出安全停机请求，发 [`ABORT_ATTEMPTS`] 次、
    ///    间隔 [`ABORT_RESEND_DELAY`]，容忍单次丢失；
    /// 2. 依次置各循环的停止标志并限时 join。
    ///
    /// # 错误
    /// - `BridgeError::ThreadJoin`: 某循环未在限时内退出
    pub fn shutdown(mut self) -> Result<(), BridgeError> {
        info!("shutdown requested, placing instrument in safe state");

        for attempt in 1..=ABORT_ATTEMPTS {
            if let Err(e) = self.abort_tx.try_send(AbortRequest) {
                warn!("failed to queue safe-stop request #{}: {}", attempt, e);
            }
            // 留出一次迭代让调度循环执行停机指令
            std::thread::sleep(ABORT_RESEND_DELAY);
        }

        self.stop_loops()?;
        info!("all bridge loops stopped");
        Ok(())
    }

    /// 依次停止三个循环（CAN → 仪器 → 报告）
    fn stop_loops(&mut self) -> Result<(), BridgeError> {
        let loops: [(&Arc<AtomicBool>, &mut Option<JoinHandle<()>>, &'static str); 3] = [
            (&self.can_running, &mut self.can_thread, "can-bridge"),
            (
                &self.instrument_running,
                &mut self.instrument_thread,
                "instrument-dispatch",
            ),
            (&self.info_running, &mut self.info_thread, "info-report"),
        ];

        for (flag, handle, name) in loops {
            flag.store(false, Ordering::Release);
            if let Some(handle) = handle.take() {
                handle
                    .join_timeout(JOIN_TIMEOUT)
                    .map_err(|_| BridgeError::ThreadJoin(name))?;
            }
        }
        Ok(())
    }
}

impl Drop for ShoreBridge {
    /// 被放弃的桥做尽力而为的停止（不发停机指令，不限时等待结果）
    fn drop(&mut self) {
        if self.can_thread.is_some() || self.instrument_thread.is_some() || self.info_thread.is_some()
        {
            warn!("ShoreBridge dropped without shutdown(); raising stop flags");
            let _ = self.stop_loops();
        }
    }
}
