//! 仪器保护/故障状态位字段
//!
//! Chroma 62000H 的 `:FETC:STAT?` 查询返回两个状态字和输出/调节模式
//! 参数。状态字的位映射如下：
//!
//! - word0 bit0–7：OVP、OCP、OPP、远程抑制、OTP、风扇堵转、检测线故障、串联故障
//! - word1 bit9–11：交流故障、折返 CV→CC、折返 CC→CV
//!
//! 快照在每次轮询时整体替换，读者永远不会看到两次轮询混合的位。

/// 输出状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputState {
    #[default]
    Off,
    On,
}

/// 调节模式（恒压/恒流）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegulationMode {
    /// 恒压
    #[default]
    Cv,
    /// 恒流
    Cc,
}

/// 仪器保护/故障状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags {
    /// 过压保护动作
    pub ovp: bool,
    /// 过流保护动作
    pub ocp: bool,
    /// 过功率保护动作
    pub opp: bool,
    /// 远程抑制输入有效
    pub remote_inhibit: bool,
    /// 过温保护动作
    pub otp: bool,
    /// 风扇堵转
    pub fan_lock: bool,
    /// 检测线（sense）故障
    pub sense_fault: bool,
    /// 串联运行故障
    pub series_fault: bool,
    /// 交流输入故障
    pub ac_fault: bool,
    /// 折返：CV 转 CC
    pub fold_back_cv_to_cc: bool,
    /// 折返：CC 转 CV
    pub fold_back_cc_to_cv: bool,
    pub output_state: OutputState,
    pub mode: RegulationMode,
}

impl StatusFlags {
    /// 从仪器返回的两个状态字解码（输出状态/调节模式由调用方另行填充）
    pub fn from_status_words(word0: u16, word1: u16) -> Self {
        Self {
            ovp: word0 & 0x0001 != 0,
            ocp: word0 & 0x0002 != 0,
            opp: word0 & 0x0004 != 0,
            remote_inhibit: word0 & 0x0008 != 0,
            otp: word0 & 0x0010 != 0,
            fan_lock: word0 & 0x0020 != 0,
            sense_fault: word0 & 0x0040 != 0,
            series_fault: word0 & 0x0080 != 0,
            ac_fault: word1 & (1 << 9) != 0,
            fold_back_cv_to_cc: word1 & (1 << 10) != 0,
            fold_back_cc_to_cv: word1 & (1 << 11) != 0,
            output_state: OutputState::default(),
            mode: RegulationMode::default(),
        }
    }

    /// 是否有任何保护/故障位有效
    pub fn any_fault(&self) -> bool {
        self.ovp
            || self.ocp
            || self.opp
            || self.remote_inhibit
            || self.otp
            || self.fan_lock
            || self.sense_fault
            || self.series_fault
            || self.ac_fault
            || self.fold_back_cv_to_cc
            || self.fold_back_cc_to_cv
    }
}
