// src/hotkey.rs

use druid::{ExtEventSink, Target};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

use crate::app::{TRIGGER_CAPTURE, Trigger};

#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey manager unavailable: {0}")]
    Manager(String),

    #[error("invalid hotkey `{combo}`: {reason}")]
    Parse { combo: String, reason: String },
}

/// 一个全局热键及其注册结果
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub label: String,
    pub hotkey: HotKey,
    pub registered: bool,
}

/// 默认三组热键：Ctrl+Shift+S、Ctrl+Alt+S、Ctrl+Shift+X
pub fn default_bindings() -> Vec<(String, HotKey)> {
    vec![
        ("Ctrl+Shift+S".to_string(), HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::KeyS)),
        ("Ctrl+Alt+S".to_string(), HotKey::new(Some(Modifiers::CONTROL | Modifiers::ALT), Code::KeyS)),
        ("Ctrl+Shift+X".to_string(), HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::KeyX)),
    ]
}

pub fn parse_binding(combo: &str) -> Result<(String, HotKey), HotkeyError> {
    let hotkey = combo.trim().parse::<HotKey>().map_err(|e| HotkeyError::Parse {
        combo: combo.to_string(),
        reason: e.to_string(),
    })?;
    Ok((combo.trim().to_string(), hotkey))
}

/// 命令行给出的热键优先，无效的跳过；一个都没有时使用默认热键
pub fn resolve_bindings(combos: &[String]) -> Vec<(String, HotKey)> {
    if combos.is_empty() {
        return default_bindings();
    }
    combos
        .iter()
        .filter_map(|c| match parse_binding(c) {
            Ok(b) => Some(b),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        })
        .collect()
}

/// 已注册的全局热键，退出时统一注销
pub struct Hotkeys {
    manager: GlobalHotKeyManager,
    bindings: Vec<Binding>,
}

impl Hotkeys {
    /// 逐个注册；单个失败（多半被别的程序占用）只记日志，不影响其余热键
    pub fn register(wanted: Vec<(String, HotKey)>) -> Result<Self, HotkeyError> {
        let manager = GlobalHotKeyManager::new().map_err(|e| HotkeyError::Manager(e.to_string()))?;

        let bindings = wanted
            .into_iter()
            .map(|(label, hotkey)| {
                let registered = match manager.register(hotkey) {
                    Ok(()) => {
                        log::info!("Hotkey registered: {}", label);
                        true
                    }
                    Err(e) => {
                        log::warn!("Hotkey {} not registered: {}", label, e);
                        false
                    }
                };
                Binding { label, hotkey, registered }
            })
            .collect::<Vec<_>>();

        if !bindings.iter().any(|b| b.registered) {
            log::warn!("No hotkey registered, use the tray menu to capture");
        }

        Ok(Hotkeys { manager, bindings })
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// 热键事件转发到 UI 线程，由会话的忙标志决定是否丢弃
    pub fn forward_to(&self, sink: ExtEventSink) {
        GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
            if event.state != HotKeyState::Pressed {
                return;
            }
            if let Err(e) = sink.submit_command(TRIGGER_CAPTURE, Trigger::Hotkey(event.id), Target::Auto) {
                log::error!("Cannot deliver hotkey event: {:?}", e);
            }
        }));
    }

    pub fn unregister_all(&mut self) {
        for binding in self.bindings.iter_mut().filter(|b| b.registered) {
            if let Err(e) = self.manager.unregister(binding.hotkey) {
                log::warn!("Failed to unregister {}: {}", binding.label, e);
            }
            binding.registered = false;
        }
        GlobalHotKeyEvent::set_event_handler(None::<fn(GlobalHotKeyEvent)>);
        log::info!("Hotkeys unregistered");
    }
}

impl Drop for Hotkeys {
    fn drop(&mut self) {
        if self.bindings.iter().any(|b| b.registered) {
            self.unregister_all();
        }
    }
}

pub fn label_for(bindings: &[Binding], id: u32) -> Option<&str> {
    bindings.iter().find(|b| b.hotkey.id() == id).map(|b| b.label.as_str())
}

/// 热键测试对话框的正文
pub fn report(bindings: &[Binding]) -> String {
    if bindings.is_empty() {
        return "未启用全局热键，请使用托盘菜单截图。".to_string();
    }
    let mut text = String::from("请按下快捷键进行测试：\n\n");
    for b in bindings {
        let status = if b.registered { "已注册" } else { "注册失败" };
        text.push_str(&format!("• {}  ({})\n", b.label, status));
    }
    if bindings.iter().any(|b| !b.registered) {
        text.push_str("\n注册失败的热键可能被其他程序占用，请关闭其他截图工具或使用托盘菜单。");
    }
    text
}

/// 托盘提示文字
pub fn tooltip(bindings: &[Binding]) -> String {
    let active: Vec<&str> = bindings.iter().filter(|b| b.registered).map(|b| b.label.as_str()).collect();
    if active.is_empty() {
        "regionshot".to_string()
    } else {
        format!("regionshot\n{}", active.join("\n"))
    }
}
