#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

mod app;
mod capture;
mod extract;
mod geometry;
mod hotkey;
mod preview;
mod save;
mod selection;
mod selection_logic;
mod session;
#[cfg(not(target_os = "linux"))]
mod tray;

use app::{Options, RunMode};

/// 区域截图：拖动框选，浮动预览，保存为 PNG
#[derive(Debug, Parser)]
#[command(name = "regionshot", version, about)]
struct Cli {
    /// 常驻托盘，通过热键或托盘菜单截图
    #[arg(long)]
    tray: bool,

    /// 不用整屏快照，选区结束后按 DPI 换算重新截取
    #[arg(long)]
    live: bool,

    /// 自定义全局热键，可重复，例如 `--hotkey ctrl+shift+KeyA`
    #[arg(long = "hotkey", value_name = "COMBO")]
    hotkeys: Vec<String>,

    /// 不注册全局热键
    #[arg(long, conflicts_with = "hotkeys")]
    no_hotkeys: bool,

    /// 保存对话框的初始目录，默认桌面
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,
}

impl Cli {
    fn into_options(self) -> Options {
        Options {
            mode: if self.tray { RunMode::Tray } else { RunMode::OneShot },
            force_live: self.live,
            hotkeys: self.hotkeys,
            hotkeys_enabled: !self.no_hotkeys,
            save_dir: self.save_dir.unwrap_or_else(save::default_directory),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Cli::parse().into_options();
    log::info!("regionshot {} starting ({:?})", env!("CARGO_PKG_VERSION"), options.mode);

    app::run(options)?;
    log::info!("regionshot exited");
    Ok(())
}
