//! 操作员控制面
//!
//! 专用输入线程 + 通道：stdin 按行读取后经 crossbeam 通道送入
//! 主线程事件循环，SIGINT 以同一通道汇入，等价于 `x` 命令。
//! 主线程因此只在一个 `recv` 上阻塞，退出路径唯一。

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, unbounded};
use shore_bridge::ShoreBridge;
use std::io::BufRead;
use std::thread;
use std::time::Duration;

/// 把操作员给出的秒数换算为打印周期
///
/// 非正值、非有限值（`inf`/`NaN`，含溢出成 `inf` 的超大字面量）
/// 以及超出 `Duration` 表示范围的值一律拒绝：这里直接换算会
/// panic，而 panic 会绕过桥的安全停机序列。
pub(crate) fn period_from_seconds(seconds: f64) -> Option<Duration> {
    if seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

/// 控制面事件
enum ConsoleEvent {
    /// 操作员输入了一行
    Line(String),
    /// SIGINT（等价于退出命令）
    Interrupt,
}

/// 启动 stdin 读取线程
///
/// stdin EOF 时线程退出、发送端随之关闭，事件循环把通道断开
/// 视为退出请求。
fn spawn_stdin_reader(tx: Sender<ConsoleEvent>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(ConsoleEvent::Line(line)).is_err() {
                            break;
                        }
                    },
                    Err(_) => break,
                }
            }
        })?;
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  x  - stop the charger and exit");
    println!("  r  - change the info print period");
    println!("  ?  - show this help");
}

/// 操作员事件循环
///
/// 阻塞直到退出请求（`x` 命令、SIGINT 或 stdin 关闭），
/// 然后执行桥的关停序列并返回。
pub fn operator_loop(bridge: ShoreBridge) -> Result<()> {
    let (tx, rx) = unbounded();

    spawn_stdin_reader(tx.clone()).context("failed to spawn stdin reader thread")?;
    ctrlc::set_handler(move || {
        let _ = tx.send(ConsoleEvent::Interrupt);
    })
    .context("failed to install SIGINT handler")?;

    let ctx = bridge.context();
    print_help();

    // `r` 命令的第二阶段：下一行解析为新的打印周期
    let mut awaiting_period = false;

    loop {
        let event = match rx.recv() {
            Ok(event) => event,
            // 所有发送端都已关闭，不可能再有输入：按退出处理
            Err(_) => break,
        };

        let line = match event {
            ConsoleEvent::Interrupt => {
                println!("Interrupt received, stopping...");
                break;
            },
            ConsoleEvent::Line(line) => line,
        };
        let input = line.trim();

        if awaiting_period {
            awaiting_period = false;
            match input.parse::<f64>().ok().and_then(period_from_seconds) {
                Some(period) => {
                    ctx.set_info_print_period(period);
                    println!("Info print period set to {} s", input);
                },
                None => println!(
                    "Invalid period '{}', expected a positive number of seconds",
                    input
                ),
            }
            continue;
        }

        match input {
            "" => {},
            "x" => break,
            "r" => {
                println!("Enter new info print period in seconds:");
                awaiting_period = true;
            },
            "?" => print_help(),
            other => println!("Unknown command '{}', type ? for help", other),
        }
    }

    bridge.shutdown()?;
    Ok(())
}
