// src/selection.rs
// Full-screen selection overlay. State lives in `selection_logic`, this file only
// maps druid events onto it and paints.

use druid::piet::{FontFamily, ImageFormat, InterpolationMode, PietImage, Text, TextLayout, TextLayoutBuilder};
use druid::{
    BoxConstraints, Color, Cursor, Env, Event, EventCtx, KbKey, LayoutCtx, LifeCycle, LifeCycleCtx, PaintCtx,
    Point as DipPoint, Rect as DipRect, RenderContext, Screen, Size, Target, UpdateCtx, Widget, WindowDesc,
};

use crate::app::{AppState, SELECTION_FINISHED};
use crate::capture::{FullScreenImage, ScreenSource};
use crate::geometry::{Point, Rect};
use crate::selection_logic::{Selection, SelectionState};

const STROKE_COLOR: Color = Color::rgb8(255, 0, 0);
const STROKE_WIDTH: f64 = 2.0;
const LABEL_OFFSET: (f64, f64) = (5.0, 5.0);
const LABEL_FONT_SIZE: f64 = 14.0;

/// 覆盖层背景：整屏快照，或截屏失败时的纯黑背景
pub enum Background {
    Snapshot(FullScreenImage),
    Solid { width: u32, height: u32 },
}

impl Background {
    /// 有快照时用快照做背景，否则纯黑；`screen_size` 是主显示器的物理像素尺寸
    pub fn for_source(source: &ScreenSource, screen_size: (u32, u32)) -> Self {
        match source.snapshot() {
            Some(img) => Background::Snapshot(img.clone()),
            None => Background::Solid { width: screen_size.0, height: screen_size.1 },
        }
    }

    /// 背景图的像素尺寸，屏幕信息读不到时也用它定窗口大小
    pub fn pixel_size(&self) -> (u32, u32) {
        match self {
            Background::Snapshot(img) => (img.width(), img.height()),
            Background::Solid { width, height } => (*width, *height),
        }
    }

    /// 选区坐标所在的像素空间。快照背景下是快照像素，直接裁剪；
    /// 纯色背景下为 `None`，选区保持窗口坐标，由提取器做 DPI 换算。
    pub fn overlay_pixels(&self) -> Option<(u32, u32)> {
        match self {
            Background::Snapshot(img) => Some((img.width(), img.height())),
            Background::Solid { .. } => None,
        }
    }
}

/// 覆盖层坐标空间的尺寸：没有快照时就是窗口本身
pub fn overlay_space(pixels: Option<(u32, u32)>, widget: Size) -> (u32, u32) {
    pixels.unwrap_or((widget.width.round() as u32, widget.height.round() as u32))
}

/// 窗口坐标 (dp) -> 覆盖层像素坐标，越界时夹到画布内
pub fn to_overlay(pos: DipPoint, widget: Size, pixels: (u32, u32)) -> Point {
    let sx = if widget.width > 0.0 { pixels.0 as f64 / widget.width } else { 1.0 };
    let sy = if widget.height > 0.0 { pixels.1 as f64 / widget.height } else { 1.0 };
    let x = (pos.x * sx).round().clamp(0.0, pixels.0 as f64);
    let y = (pos.y * sy).round().clamp(0.0, pixels.1 as f64);
    Point::new(x as i32, y as i32)
}

/// 覆盖层像素矩形 -> 窗口坐标矩形，用于绘制
pub fn to_widget(rect: Rect, widget: Size, pixels: (u32, u32)) -> DipRect {
    let sx = if pixels.0 > 0 { widget.width / pixels.0 as f64 } else { 1.0 };
    let sy = if pixels.1 > 0 { widget.height / pixels.1 as f64 } else { 1.0 };
    DipRect::new(
        rect.x as f64 * sx,
        rect.y as f64 * sy,
        rect.right() as f64 * sx,
        rect.bottom() as f64 * sy,
    )
}

pub struct SelectorWidget {
    background: Option<Background>,
    overlay_pixels: Option<(u32, u32)>,
    cached_image: Option<PietImage>,
    selection: Selection,
}

impl SelectorWidget {
    pub fn new(background: Background) -> Self {
        SelectorWidget {
            overlay_pixels: background.overlay_pixels(),
            background: Some(background),
            cached_image: None,
            selection: Selection::new(),
        }
    }

    fn overlay_pos(&self, ctx: &EventCtx, pos: DipPoint) -> Point {
        let size = ctx.size();
        to_overlay(pos, size, overlay_space(self.overlay_pixels, size))
    }

    // 选区结束：先释放背景缓冲，再把结果交给应用
    fn finish(&mut self, ctx: &mut EventCtx) {
        let SelectionState::Finalized(rect) = self.selection.state() else {
            return;
        };
        ctx.set_active(false);
        self.background = None;
        self.cached_image = None;
        ctx.submit_command(SELECTION_FINISHED.with(rect).to(Target::Global));
        ctx.request_paint();
    }
}

impl Widget<AppState> for SelectorWidget {
    fn event(&mut self, ctx: &mut EventCtx, event: &Event, _data: &mut AppState, _env: &Env) {
        match event {
            Event::WindowConnected => {
                // 托盘或热键触发时前台是别的程序，要把系统键盘焦点抢过来
                ctx.window().bring_to_front_and_focus();
                ctx.request_focus();
                ctx.set_cursor(&Cursor::Crosshair);
            }

            Event::MouseDown(e) if e.button.is_left() => {
                let pos = self.overlay_pos(ctx, e.pos);
                if self.selection.press(pos) {
                    ctx.set_active(true);
                    ctx.request_paint();
                }
            }

            Event::MouseMove(e) if self.selection.is_dragging() => {
                let pos = self.overlay_pos(ctx, e.pos);
                if self.selection.drag_to(pos) {
                    ctx.request_paint();
                }
            }

            Event::MouseUp(e) if e.button.is_left() => {
                let pos = self.overlay_pos(ctx, e.pos);
                if self.selection.release(pos).is_some() {
                    self.finish(ctx);
                }
            }

            Event::KeyDown(k) if k.key == KbKey::Escape => {
                if self.selection.cancel().is_some() {
                    log::info!("Selection cancelled");
                    self.finish(ctx);
                }
                ctx.set_handled();
            }
            _ => {}
        }
    }

    fn lifecycle(&mut self, ctx: &mut LifeCycleCtx, event: &LifeCycle, _data: &AppState, _env: &Env) {
        if let LifeCycle::WidgetAdded = event {
            ctx.register_for_focus();
        }
    }

    fn update(&mut self, _ctx: &mut UpdateCtx, _old: &AppState, _data: &AppState, _env: &Env) {}

    fn layout(&mut self, _ctx: &mut LayoutCtx, bc: &BoxConstraints, _data: &AppState, _env: &Env) -> Size {
        bc.max()
    }

    fn paint(&mut self, ctx: &mut PaintCtx, _data: &AppState, _env: &Env) {
        let size = ctx.size();
        let full_rect = size.to_rect();

        match &self.background {
            Some(Background::Snapshot(img)) => {
                if self.cached_image.is_none() {
                    let buf = img.as_image();
                    self.cached_image = ctx
                        .make_image(
                            buf.width() as usize,
                            buf.height() as usize,
                            buf.as_raw(),
                            ImageFormat::RgbaSeparate,
                        )
                        .ok();
                }
                match &self.cached_image {
                    Some(cached) => ctx.draw_image(cached, full_rect, InterpolationMode::NearestNeighbor),
                    None => ctx.fill(full_rect, &Color::BLACK),
                }
            }
            _ => ctx.fill(full_rect, &Color::BLACK),
        }

        let Some(rect) = self.selection.current_rect() else {
            return;
        };
        let r = to_widget(rect, size, overlay_space(self.overlay_pixels, size));
        ctx.stroke(r, &STROKE_COLOR, STROKE_WIDTH);

        let layout = ctx
            .text()
            .new_text_layout(rect.size_label())
            .font(FontFamily::SYSTEM_UI, LABEL_FONT_SIZE)
            .text_color(Color::WHITE)
            .build();
        if let Ok(layout) = layout {
            let y = (r.y0 - LABEL_OFFSET.1 - layout.size().height).max(0.0);
            ctx.draw_text(&layout, (r.x0 + LABEL_OFFSET.0, y));
        }
    }
}

fn primary_screen_rect() -> Option<DipRect> {
    Screen::get_monitors()
        .into_iter()
        .find(|m| m.is_primary())
        .map(|m| m.virtual_rect())
}

/// 覆盖主显示器的无边框、置顶选区窗口
pub fn overlay_window(background: Background) -> WindowDesc<AppState> {
    let (w, h) = background.pixel_size();
    let screen = primary_screen_rect()
        .unwrap_or_else(|| DipRect::from_origin_size(DipPoint::ORIGIN, Size::new(w as f64, h as f64)));

    WindowDesc::new(SelectorWidget::new(background))
        .title("regionshot")
        .show_titlebar(false)
        .resizable(false)
        .set_always_on_top(true)
        .set_position(screen.origin())
        .window_size(screen.size())
}
