// src/preview.rs
// Floating preview window: the captured image plus Save / Close.

use std::path::{Path, PathBuf};

use chrono::Local;
use druid::piet::{ImageFormat, InterpolationMode, PietImage};
use druid::widget::{Button, Controller, Flex};
use druid::{
    BoxConstraints, Color, Env, Event, EventCtx, LayoutCtx, LifeCycle, LifeCycleCtx, PaintCtx, Point, RenderContext,
    Size, UpdateCtx, Vec2, Widget, WidgetExt, WindowDesc, commands,
};
use rfd::{FileDialog, MessageDialog, MessageLevel};

use crate::app::AppState;
use crate::extract::CapturedImage;
use crate::save;

const BUTTON_BAR_HEIGHT: f64 = 60.0;
const MIN_WIDTH: f64 = 200.0;
const FRAME_COLOR: Color = Color::rgb8(0x33, 0x33, 0x33);

/// 拖动窗口时记录的锚点：按下时指针相对窗口原点的偏移
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowDrag {
    anchor: Option<Vec2>,
}

impl WindowDrag {
    pub fn begin(&mut self, global: Point, window_origin: Point) {
        self.anchor = Some(global - window_origin);
    }

    /// 拖动中返回窗口新位置。不做屏幕边界限制，允许拖出屏幕。
    pub fn update(&self, global: Point) -> Option<Point> {
        self.anchor.map(|a| global - a)
    }

    pub fn end(&mut self) {
        self.anchor = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }
}

/// 在窗体上按住左键拖动整个窗口
#[derive(Default)]
pub struct DragToMove {
    drag: WindowDrag,
}

impl<W: Widget<AppState>> Controller<AppState, W> for DragToMove {
    fn event(&mut self, child: &mut W, ctx: &mut EventCtx, event: &Event, data: &mut AppState, env: &Env) {
        match event {
            Event::MouseDown(e) if e.button.is_left() => {
                let origin = ctx.window().get_position();
                self.drag.begin(origin + e.window_pos.to_vec2(), origin);
                ctx.set_active(true);
            }
            Event::MouseMove(e) if self.drag.is_dragging() && e.buttons.has_left() => {
                let origin = ctx.window().get_position();
                if let Some(pos) = self.drag.update(origin + e.window_pos.to_vec2()) {
                    ctx.window().set_position(pos);
                }
            }
            Event::MouseUp(e) if e.button.is_left() => {
                self.drag.end();
                ctx.set_active(false);
            }
            _ => {}
        }
        child.event(ctx, event, data, env)
    }
}

/// 只读显示截图
pub struct PreviewImage {
    image: CapturedImage,
    cached_image: Option<PietImage>,
}

impl PreviewImage {
    pub fn new(image: CapturedImage) -> Self {
        PreviewImage { image, cached_image: None }
    }
}

impl Widget<AppState> for PreviewImage {
    fn event(&mut self, _ctx: &mut EventCtx, _event: &Event, _data: &mut AppState, _env: &Env) {}

    fn lifecycle(&mut self, _ctx: &mut LifeCycleCtx, _event: &LifeCycle, _data: &AppState, _env: &Env) {}

    fn update(&mut self, _ctx: &mut UpdateCtx, _old: &AppState, _data: &AppState, _env: &Env) {}

    fn layout(&mut self, _ctx: &mut LayoutCtx, bc: &BoxConstraints, _data: &AppState, _env: &Env) -> Size {
        bc.constrain(Size::new(self.image.width() as f64, self.image.height() as f64))
    }

    fn paint(&mut self, ctx: &mut PaintCtx, _data: &AppState, _env: &Env) {
        if self.cached_image.is_none() {
            self.cached_image = ctx
                .make_image(
                    self.image.width() as usize,
                    self.image.height() as usize,
                    self.image.as_raw(),
                    ImageFormat::RgbaSeparate,
                )
                .ok();
        }
        let rect = ctx.size().to_rect();
        if let Some(img) = &self.cached_image {
            ctx.draw_image(img, rect, InterpolationMode::NearestNeighbor);
        }
    }
}

pub fn window_size(image: &CapturedImage) -> Size {
    Size::new(
        (image.width() as f64).max(MIN_WIDTH),
        image.height() as f64 + BUTTON_BAR_HEIGHT,
    )
}

fn save_clicked(ctx: &mut EventCtx, image: &CapturedImage, dir: &Path) {
    let Some(path) = FileDialog::new()
        .set_title("保存截图")
        .set_directory(dir)
        .set_file_name(save::default_file_name(Local::now()))
        .add_filter("PNG 图片", &["png"])
        .save_file()
    else {
        return;
    };
    let path = save::with_png_extension(path);

    match save::write_png(image, &path) {
        Ok(()) => {
            MessageDialog::new()
                .set_level(MessageLevel::Info)
                .set_title("保存成功")
                .set_description(format!("截图已保存到:\n{}", path.display()))
                .show();
            ctx.submit_command(commands::CLOSE_WINDOW);
        }
        Err(e) => {
            // 窗口保持打开，用户可以换个位置再存
            log::error!("Save failed: {}", e);
            MessageDialog::new()
                .set_level(MessageLevel::Error)
                .set_title("保存失败")
                .set_description(format!("保存失败:\n{}", e))
                .show();
        }
    }
}

/// 无边框、置顶、可拖动的预览窗口
pub fn preview_window(image: CapturedImage, save_dir: PathBuf) -> WindowDesc<AppState> {
    let size = window_size(&image);
    let save_image = image.clone();

    let buttons = Flex::row()
        .with_flex_spacer(1.0)
        .with_child(
            Button::new("保存").on_click(move |ctx, _data: &mut AppState, _env| {
                save_clicked(ctx, &save_image, &save_dir)
            }),
        )
        .with_spacer(10.0)
        .with_child(Button::new("关闭").on_click(|ctx, _data: &mut AppState, _env| {
            ctx.submit_command(commands::CLOSE_WINDOW)
        }))
        .with_flex_spacer(1.0)
        .fix_height(BUTTON_BAR_HEIGHT);

    let root = Flex::column()
        .with_child(PreviewImage::new(image).controller(DragToMove::default()))
        .with_child(buttons)
        .background(FRAME_COLOR);

    WindowDesc::new(root)
        .title("截图预览")
        .show_titlebar(false)
        .resizable(false)
        .set_always_on_top(true)
        .window_size(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn drag_keeps_pointer_offset() {
        let mut drag = WindowDrag::default();
        drag.begin(Point::new(500.0, 400.0), Point::new(450.0, 380.0));
        assert!(drag.is_dragging());
        assert_eq!(drag.update(Point::new(800.0, 100.0)), Some(Point::new(750.0, 80.0)));
    }

    #[test]
    fn drag_is_not_clamped_to_screen() {
        let mut drag = WindowDrag::default();
        drag.begin(Point::new(10.0, 10.0), Point::new(0.0, 0.0));
        assert_eq!(drag.update(Point::new(-300.0, -200.0)), Some(Point::new(-310.0, -210.0)));
    }

    #[test]
    fn no_move_after_release() {
        let mut drag = WindowDrag::default();
        assert_eq!(drag.update(Point::new(1.0, 1.0)), None);
        drag.begin(Point::new(1.0, 1.0), Point::ORIGIN);
        drag.end();
        assert_eq!(drag.update(Point::new(50.0, 50.0)), None);
    }

    #[test]
    fn window_fits_image_and_buttons() {
        let img = CapturedImage::new(RgbaImage::new(320, 180));
        assert_eq!(window_size(&img), Size::new(320.0, 240.0));

        let narrow = CapturedImage::new(RgbaImage::new(40, 40));
        assert_eq!(window_size(&narrow), Size::new(MIN_WIDTH, 100.0));
    }
}
