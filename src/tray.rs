// src/tray.rs
// 托盘图标和菜单，所有动作都通过 ExtEventSink 转回 UI 线程

use druid::{ExtEventSink, Target};
use image::{Rgba, RgbaImage};
use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, MouseButton, TrayIcon, TrayIconBuilder, TrayIconEvent};

use crate::app::{QUIT, TEST_HOTKEYS, TRIGGER_CAPTURE, Trigger};

const ICON_SIZE: u32 = 32;

#[derive(Debug, thiserror::Error)]
pub enum TrayError {
    #[error("bad tray icon: {0}")]
    Icon(String),

    #[error("cannot build tray menu: {0}")]
    Menu(String),

    #[error("cannot create tray icon: {0}")]
    Build(String),
}

/// 取景框样式的图标：四个白色角标加中间一个红点
fn icon_pixels() -> RgbaImage {
    let last = ICON_SIZE - 1;
    RgbaImage::from_fn(ICON_SIZE, ICON_SIZE, |x, y| {
        let near_x = x < 10 || x > last - 10;
        let near_y = y < 10 || y > last - 10;
        let on_edge = x < 3 || x > last - 3 || y < 3 || y > last - 3;
        let (dx, dy) = (x as i32 - 16, y as i32 - 16);

        if on_edge && near_x && near_y {
            Rgba([255, 255, 255, 255])
        } else if dx * dx + dy * dy <= 16 {
            Rgba([230, 40, 40, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// 左键双击托盘图标直接截图，右键弹菜单
fn is_capture_click(event: &TrayIconEvent) -> bool {
    matches!(event, TrayIconEvent::DoubleClick { button: MouseButton::Left, .. })
}

fn load_icon() -> Result<Icon, TrayError> {
    Icon::from_rgba(icon_pixels().into_raw(), ICON_SIZE, ICON_SIZE).map_err(|e| TrayError::Icon(e.to_string()))
}

pub fn create(sink: ExtEventSink, tooltip: &str) -> Result<TrayIcon, TrayError> {
    let tray_menu = Menu::new();
    let item_capture = MenuItem::new("立即截图", true, None);
    let item_test = MenuItem::new("测试热键", true, None);
    let item_exit = MenuItem::new("退出", true, None);

    let menu_err = |e: tray_icon::menu::Error| TrayError::Menu(e.to_string());
    tray_menu.append(&item_capture).map_err(menu_err)?;
    tray_menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;
    tray_menu.append(&item_test).map_err(menu_err)?;
    tray_menu.append(&PredefinedMenuItem::separator()).map_err(menu_err)?;
    tray_menu.append(&item_exit).map_err(menu_err)?;

    let tray_icon = TrayIconBuilder::new()
        .with_icon(load_icon()?)
        .with_tooltip(format!("{}\n双击托盘图标也可以截图", tooltip))
        .with_menu(Box::new(tray_menu))
        .with_menu_on_left_click(false)
        .build()
        .map_err(|e| TrayError::Build(e.to_string()))?;

    let click_sink = sink.clone();
    TrayIconEvent::set_event_handler(Some(move |event: TrayIconEvent| {
        if is_capture_click(&event) {
            if let Err(e) = click_sink.submit_command(TRIGGER_CAPTURE, Trigger::TrayIcon, Target::Auto) {
                log::error!("Cannot deliver tray click: {:?}", e);
            }
        }
    }));

    let capture_id = item_capture.id().clone();
    let test_id = item_test.id().clone();
    let exit_id = item_exit.id().clone();
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        let sent = if event.id == capture_id {
            sink.submit_command(TRIGGER_CAPTURE, Trigger::TrayMenu, Target::Auto)
        } else if event.id == test_id {
            sink.submit_command(TEST_HOTKEYS, (), Target::Auto)
        } else if event.id == exit_id {
            sink.submit_command(QUIT, (), Target::Auto)
        } else {
            Ok(())
        };
        if let Err(e) = sent {
            log::error!("Cannot deliver tray menu event: {:?}", e);
        }
    }));

    log::info!("Tray icon created");
    Ok(tray_icon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tray_icon::dpi::PhysicalPosition;
    use tray_icon::{MouseButtonState, Rect, TrayIconId};

    fn at_origin() -> (TrayIconId, PhysicalPosition<f64>, Rect) {
        (TrayIconId::new("regionshot"), PhysicalPosition::new(0.0, 0.0), Rect::default())
    }

    #[test]
    fn left_double_click_captures() {
        let (id, position, rect) = at_origin();
        let event = TrayIconEvent::DoubleClick { id, position, rect, button: MouseButton::Left };
        assert!(is_capture_click(&event));
    }

    #[test]
    fn single_click_and_right_double_click_do_not_capture() {
        let (id, position, rect) = at_origin();
        let single = TrayIconEvent::Click {
            id: id.clone(),
            position,
            rect,
            button: MouseButton::Left,
            button_state: MouseButtonState::Up,
        };
        assert!(!is_capture_click(&single));

        let right = TrayIconEvent::DoubleClick { id, position, rect, button: MouseButton::Right };
        assert!(!is_capture_click(&right));
    }

    #[test]
    fn icon_has_expected_layout() {
        let img = icon_pixels();
        assert_eq!(img.dimensions(), (ICON_SIZE, ICON_SIZE));
        // 角标
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(31, 31), &Rgba([255, 255, 255, 255]));
        // 边框中段留空
        assert_eq!(img.get_pixel(16, 0)[3], 0);
        // 中心红点
        assert_eq!(img.get_pixel(16, 16), &Rgba([230, 40, 40, 255]));
    }
}
