// src/app.rs
// druid wiring: one launcher per process, the delegate drives the capture
// cycle selector -> extractor -> presenter.

use std::path::PathBuf;

use anyhow::Result;
use druid::widget::SizedBox;
use druid::{
    AppDelegate, AppLauncher, Command, Data, DelegateCtx, Env, Handled, Selector, Target, WindowDesc, WindowHandle,
    WindowId, commands,
};
use rfd::{MessageDialog, MessageLevel};

use crate::capture::{self, DisplayMetrics, ScreenSource};
use crate::geometry::Rect;
use crate::hotkey::{self, Binding, Hotkeys};
use crate::preview;
use crate::selection::{self, Background};
use crate::session::{self, CaptureSession, Step};

pub const TRIGGER_CAPTURE: Selector<Trigger> = Selector::new("regionshot.trigger-capture");
pub const SELECTION_FINISHED: Selector<Option<Rect>> = Selector::new("regionshot.selection-finished");
pub const TEST_HOTKEYS: Selector = Selector::new("regionshot.test-hotkeys");
pub const QUIT: Selector = Selector::new("regionshot.quit");

const HOST_POSITION: (f64, f64) = (-10_000.0, -10_000.0);

/// 截图请求的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Hotkey(u32),
    TrayMenu,
    TrayIcon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 截一次就退出
    OneShot,
    /// 常驻托盘，热键触发
    Tray,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub mode: RunMode,
    pub force_live: bool,
    pub hotkeys: Vec<String>,
    pub hotkeys_enabled: bool,
    pub save_dir: PathBuf,
}

#[derive(Clone, Data, Default)]
pub struct AppState {
    #[data(same_fn = "PartialEq::eq")]
    pub session: CaptureSession,
}

// 选区窗口打开期间保留的截图源
struct Pending {
    source: ScreenSource,
    metrics: DisplayMetrics,
    window: WindowId,
}

struct CaptureDelegate {
    options: Options,
    host_window: WindowId,
    started: bool,
    pending: Option<Pending>,
    preview_window: Option<WindowId>,
    hotkeys: Option<Hotkeys>,
    #[cfg(not(target_os = "linux"))]
    tray: Option<tray_icon::TrayIcon>,
}

impl CaptureDelegate {
    fn new(options: Options, host_window: WindowId) -> Self {
        CaptureDelegate {
            options,
            host_window,
            started: false,
            pending: None,
            preview_window: None,
            hotkeys: None,
            #[cfg(not(target_os = "linux"))]
            tray: None,
        }
    }

    fn bindings(&self) -> &[Binding] {
        self.hotkeys.as_ref().map(|h| h.bindings()).unwrap_or(&[])
    }

    fn setup_resident(&mut self, ctx: &mut DelegateCtx) {
        let sink = ctx.get_external_handle();

        if self.options.hotkeys_enabled {
            match Hotkeys::register(hotkey::resolve_bindings(&self.options.hotkeys)) {
                Ok(hotkeys) => {
                    hotkeys.forward_to(sink.clone());
                    self.hotkeys = Some(hotkeys);
                }
                Err(e) => log::warn!("Global hotkeys disabled: {}", e),
            }
        }

        #[cfg(not(target_os = "linux"))]
        match crate::tray::create(sink, &hotkey::tooltip(self.bindings())) {
            Ok(tray) => self.tray = Some(tray),
            Err(e) => log::error!("Tray icon unavailable: {}", e),
        }
        #[cfg(target_os = "linux")]
        {
            drop(sink);
            log::warn!("Tray icon is not available on this platform, capture with the hotkeys");
        }

        let active: Vec<&str> = self
            .bindings()
            .iter()
            .filter(|b| b.registered)
            .map(|b| b.label.as_str())
            .collect();
        log::info!("regionshot running in the tray, hotkeys: [{}]", active.join(", "));
    }

    fn start_capture(&mut self, ctx: &mut DelegateCtx, data: &mut AppState, trigger: Trigger) {
        if !data.session.try_begin() {
            log::info!(
                "Capture already in progress ({:?}), ignoring {:?} ({} dropped so far)",
                data.session.phase(),
                trigger,
                data.session.dropped()
            );
            return;
        }
        match trigger {
            Trigger::Hotkey(id) => {
                let label = hotkey::label_for(self.bindings(), id).unwrap_or("?");
                log::info!("Hotkey {} pressed, starting capture", label);
            }
            other => log::info!("Starting capture ({:?})", other),
        }

        match capture::prepare(self.options.force_live) {
            Ok(prepared) => {
                let background = Background::for_source(&prepared.source, prepared.screen_size);
                let desc = selection::overlay_window(background);
                self.pending = Some(Pending { source: prepared.source, metrics: prepared.metrics, window: desc.id });
                ctx.new_window(desc);
            }
            Err(e) => {
                log::error!("Screen capture unavailable: {}", e);
                show_error("截图失败", &format!("无法截取屏幕:\n{}", e));
                self.end_cycle(ctx, data);
            }
        }
    }

    fn selection_finished(&mut self, ctx: &mut DelegateCtx, data: &mut AppState, selection: Option<Rect>) {
        let Some(pending) = self.pending.take() else {
            log::warn!("Selection finished without a pending capture");
            return;
        };

        match session::resolve_selection(selection, &pending.source, &pending.metrics) {
            Step::Preview(image) => {
                let desc = preview::preview_window(image, self.options.save_dir.clone());
                self.preview_window = Some(desc.id);
                data.session.show_preview();
                // 先开预览再关选区窗口，保证任何时刻至少有一个窗口
                ctx.new_window(desc);
            }
            Step::Abort => self.end_cycle(ctx, data),
            Step::Failed(e) => {
                log::error!("Extraction failed: {}", e);
                show_error("截图失败", &format!("截图失败:\n{}", e));
                self.end_cycle(ctx, data);
            }
        }

        ctx.submit_command(commands::CLOSE_WINDOW.to(pending.window));
    }

    fn end_cycle(&mut self, ctx: &mut DelegateCtx, data: &mut AppState) {
        data.session.finish();
        log::debug!("Capture cycle {} finished", data.session.completed());
        if self.options.mode == RunMode::OneShot {
            self.shutdown();
            ctx.submit_command(commands::QUIT_APP);
        }
    }

    // 热键和托盘图标只在这里释放一次
    fn shutdown(&mut self) {
        if let Some(mut hotkeys) = self.hotkeys.take() {
            hotkeys.unregister_all();
        }
        #[cfg(not(target_os = "linux"))]
        self.tray.take();
    }
}

impl AppDelegate<AppState> for CaptureDelegate {
    fn command(
        &mut self,
        ctx: &mut DelegateCtx,
        _target: Target,
        cmd: &Command,
        data: &mut AppState,
        _env: &Env,
    ) -> Handled {
        if let Some(trigger) = cmd.get(TRIGGER_CAPTURE) {
            self.start_capture(ctx, data, *trigger);
            Handled::Yes
        } else if let Some(selection) = cmd.get(SELECTION_FINISHED) {
            self.selection_finished(ctx, data, *selection);
            Handled::Yes
        } else if cmd.is(TEST_HOTKEYS) {
            MessageDialog::new()
                .set_level(MessageLevel::Info)
                .set_title("热键测试")
                .set_description(hotkey::report(self.bindings()))
                .show();
            Handled::Yes
        } else if cmd.is(QUIT) {
            log::info!("Quit requested from tray menu");
            self.shutdown();
            ctx.submit_command(commands::QUIT_APP);
            Handled::Yes
        } else {
            Handled::No
        }
    }

    fn window_added(
        &mut self,
        id: WindowId,
        handle: WindowHandle,
        data: &mut AppState,
        _env: &Env,
        ctx: &mut DelegateCtx,
    ) {
        if id != self.host_window || self.started {
            return;
        }
        // 宿主窗口只用来维持事件循环，不出现在任务栏和切换列表里
        handle.hide();
        self.started = true;
        match self.options.mode {
            RunMode::OneShot => self.start_capture(ctx, data, Trigger::Startup),
            RunMode::Tray => self.setup_resident(ctx),
        }
    }

    fn window_removed(&mut self, id: WindowId, data: &mut AppState, _env: &Env, ctx: &mut DelegateCtx) {
        if self.preview_window == Some(id) {
            self.preview_window = None;
            log::info!("Preview closed");
            self.end_cycle(ctx, data);
        } else if self.pending.as_ref().is_some_and(|p| p.window == id) {
            // 选区窗口被系统关闭，按取消处理
            self.pending = None;
            self.end_cycle(ctx, data);
        }
    }
}

fn show_error(title: &str, description: &str) {
    MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title(title)
        .set_description(description)
        .show();
}

pub fn run(options: Options) -> Result<()> {
    // 1x1 的宿主窗口：托盘模式下截图窗口全部关闭后应用仍然存活。
    // 放在屏幕外，连接后立即隐藏。
    let host = WindowDesc::new(SizedBox::<AppState>::empty())
        .title("regionshot")
        .window_size((1.0, 1.0))
        .show_titlebar(false)
        .resizable(false)
        .set_position(HOST_POSITION);
    let delegate = CaptureDelegate::new(options, host.id);

    AppLauncher::with_window(host)
        .delegate(delegate)
        .launch(AppState::default())?;
    Ok(())
}
