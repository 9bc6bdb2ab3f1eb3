//! CAN ID 常量定义
//!
//! 岸电充电器监控总线只使用三个标准帧 ID：一个入站控制请求，
//! 两个出站报告（遥测 + 状态）。其余 ID 属于总线上的其他模块，
//! 桥接层读出后直接丢弃。

/// 控制请求帧（入站）：使能 + 最大交流电流 + 电压/电流设定值
pub const ID_CONTROL_REQUEST: u32 = 0x618;

/// 遥测报告帧（出站）：实测电压/电流
pub const ID_TELEMETRY_REPORT: u32 = 0x611;

/// 状态报告帧（出站）：保护/故障位打包
pub const ID_STATUS_REPORT: u32 = 0x615;
