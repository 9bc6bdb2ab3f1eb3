//! # Shore Charger
//!
//! CAN 总线 ↔ 台式电源转换层的操作员入口。
//!
//! ```bash
//! shore-charger --interface can0 --port /dev/ttyUSB0
//! ```
//!
//! 启动顺序：CAN 适配器 → 仪器连接（`*IDN?` 验证）→ 默认保护配置 →
//! 初始测量回读 → 桥接循环。任一初始化步骤失败则打印诊断并以
//! 非零码退出；运行期的传输故障由桥接循环自行容忍，不会到达这里。

use anyhow::{Context, Result};
use clap::Parser;
use shore_bridge::{ShoreBridge, TimingConfig};
use shore_can::SocketCanAdapter;
use shore_instrument::{Chroma62000H, Instrument};
use std::process;
use tracing::{error, info};

mod console;

/// Shore charger - CAN 总线到台式电源的转换层
#[derive(Parser, Debug)]
#[command(name = "shore-charger")]
#[command(about = "Shore charger translation layer (CAN bus to bench power supply)", long_about = None)]
#[command(version)]
struct Args {
    /// SocketCAN 接口名
    #[arg(long, default_value = "can0")]
    interface: String,

    /// 期望的 CAN 波特率（bps，用户态无法核验，仅提示）
    #[arg(long, default_value_t = 500_000)]
    bitrate: u32,

    /// 仪器串口设备路径
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// 串口波特率
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// 信息打印周期（秒，运行期可用 `r` 命令修改）
    #[arg(long, default_value_t = 10.0)]
    info_period: f64,
}

fn main() {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        info!("Program exit");
        process::exit(1);
    }
    info!("Program exit");
}

fn run(args: Args) -> Result<()> {
    // 先验证参数再碰硬件（非有限值在 Duration 换算时会 panic）
    let info_period = console::period_from_seconds(args.info_period)
        .context("--info-period must be a positive, finite number of seconds")?;

    // 1. CAN 适配器（接口不存在/未 UP 则致命）
    let can = SocketCanAdapter::new(&args.interface, Some(args.bitrate))
        .with_context(|| format!("CAN adapter init failed on '{}'", args.interface))?;
    info!("CAN interface '{}' ready", args.interface);

    // 2. 仪器连接与身份验证
    let mut psu = Chroma62000H::connect(&args.port, args.baud)
        .with_context(|| format!("instrument connect failed on '{}'", args.port))?;
    info!("Instrument: {}", psu.identity());

    // 3. 默认保护配置（写入后回读核对限值）
    psu.configure_default_protections()
        .context("default protection setup failed")?;
    let (volt_low, volt_high) = psu
        .get_voltage_limits()
        .context("limit readback failed")?;
    let (curr_low, curr_high) = psu
        .get_current_limits()
        .context("limit readback failed")?;
    info!(
        "Configured limits: {:.0}-{:.0} V, {:.0}-{:.0} A",
        volt_low, volt_high, curr_low, curr_high
    );

    // 4. 初始测量回读（验证查询通路）
    let voltage = psu.measure_voltage().context("initial readback failed")?;
    let current = psu.measure_current().context("initial readback failed")?;
    let power = psu.measure_power().context("initial readback failed")?;
    info!(
        "Initial readback: {:.2} V {:.2} A {:.1} W",
        voltage, current, power
    );

    // 5. 启动桥接循环
    let bridge = ShoreBridge::start(can, psu, TimingConfig::default());
    bridge.context().set_info_print_period(info_period);
    info!("Running shore charger translation layer...");

    // 6. 操作员控制面（阻塞直到退出请求，内部执行关停序列）
    console::operator_loop(bridge)
}
