//! 测试用 Mock CAN 适配器
//!
//! 预置入站帧脚本，记录全部出站帧，供集成测试断言。
//! 共享句柄允许测试线程在桥接循环运行期间注入帧 / 读取记录。

use crate::{CanAdapter, CanError, ShoreFrame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Mock 适配器的测试侧句柄
#[derive(Clone, Default)]
pub struct MockCanHandle {
    rx_script: Arc<Mutex<VecDeque<ShoreFrame>>>,
    sent: Arc<Mutex<Vec<ShoreFrame>>>,
    fail_sends: Arc<Mutex<bool>>,
}

impl MockCanHandle {
    /// 注入一帧等待被 `receive` 读出
    pub fn push_rx(&self, frame: ShoreFrame) {
        self.rx_script.lock().push_back(frame);
    }

    /// 注入同一帧 N 次
    pub fn push_rx_repeated(&self, frame: ShoreFrame, count: usize) {
        let mut script = self.rx_script.lock();
        for _ in 0..count {
            script.push_back(frame);
        }
    }

    /// 取出已记录的出站帧快照
    pub fn sent_frames(&self) -> Vec<ShoreFrame> {
        self.sent.lock().clone()
    }

    /// 之后的 `send` 调用全部失败（模拟总线故障）
    pub fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock() = fail;
    }

    /// 入站脚本是否已被读空
    pub fn rx_drained(&self) -> bool {
        self.rx_script.lock().is_empty()
    }
}

/// Mock CAN 适配器：脚本化接收 + 记录式发送
pub struct MockCanAdapter {
    handle: MockCanHandle,
}

impl MockCanAdapter {
    pub fn new() -> (Self, MockCanHandle) {
        let handle = MockCanHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl CanAdapter for MockCanAdapter {
    fn receive(&mut self) -> Result<ShoreFrame, CanError> {
        // 空脚本等价于总线静默：返回超时
        self.handle
            .rx_script
            .lock()
            .pop_front()
            .ok_or(CanError::Timeout)
    }

    fn send(&mut self, frame: ShoreFrame) -> Result<(), CanError> {
        if *self.handle.fail_sends.lock() {
            return Err(CanError::Device("mock send failure".to_string()));
        }
        self.handle.sent.lock().push(frame);
        Ok(())
    }

    fn set_receive_timeout(&mut self, _timeout: Duration) -> Result<(), CanError> {
        Ok(())
    }
}
