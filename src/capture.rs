// src/capture.rs
// Screen grabbing through xcap. Everything that talks to the OS capture API
// lives here, cropping math is in extract.rs.

use std::sync::Arc;
use std::time::Instant;

use image::{GenericImageView, ImageBuffer, RgbaImage};
use xcap::Monitor;

use crate::geometry::{PhysicalRect, Point, Rect};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("no monitor found")]
    NoMonitor,

    #[error("no monitor contains point ({0}, {1})")]
    OutsideMonitors(i32, i32),

    #[error("screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("captured buffer does not match {0}x{1}")]
    BadBuffer(u32, u32),
}

/// 每次截图读取一次的显示参数，只在实时截屏路径的坐标换算中使用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMetrics {
    pub device_pixel_ratio: f64,
    pub monitor_origin: Point,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        DisplayMetrics { device_pixel_ratio: 1.0, monitor_origin: Point::default() }
    }
}

/// 整屏快照：既是选区背景，也是裁剪来源
#[derive(Debug, Clone)]
pub struct FullScreenImage(Arc<RgbaImage>);

impl FullScreenImage {
    pub fn new(image: RgbaImage) -> Self {
        FullScreenImage(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.0
    }

    /// 直接裁剪；选区先与画布求交，求交后为空则返回 `None`
    pub fn crop(&self, rect: Rect) -> Option<RgbaImage> {
        let r = rect.clamp_to(self.width(), self.height());
        if r.is_empty() {
            return None;
        }
        Some(self.0.view(r.x as u32, r.y as u32, r.width, r.height).to_image())
    }
}

/// 没有可靠整屏快照时使用的实时截屏接口
pub trait LiveCapture {
    fn capture_area(&self, area: PhysicalRect) -> Result<RgbaImage, CaptureError>;
}

/// 提取器的像素来源
pub enum ScreenSource {
    Snapshot(FullScreenImage),
    Live(Box<dyn LiveCapture>),
}

impl ScreenSource {
    pub fn snapshot(&self) -> Option<&FullScreenImage> {
        match self {
            ScreenSource::Snapshot(img) => Some(img),
            ScreenSource::Live(_) => None,
        }
    }
}

/// 一次截图周期开始时准备好的全部材料
pub struct Prepared {
    pub source: ScreenSource,
    pub metrics: DisplayMetrics,
    /// 主显示器的物理像素尺寸，纯色背景时用来确定覆盖层像素空间
    pub screen_size: (u32, u32),
}

fn primary_monitor() -> Result<Monitor, CaptureError> {
    let monitors = Monitor::all().map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;
    let mut fallback = None;
    for m in monitors {
        if m.is_primary().unwrap_or(false) {
            return Ok(m);
        }
        fallback.get_or_insert(m);
    }
    fallback.ok_or(CaptureError::NoMonitor)
}

fn read_metrics(monitor: &Monitor) -> Result<DisplayMetrics, CaptureError> {
    let x = monitor.x().map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
    let y = monitor.y().map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
    let scale = monitor.scale_factor().unwrap_or(1.0) as f64;
    Ok(DisplayMetrics {
        device_pixel_ratio: if scale > 0.0 { scale } else { 1.0 },
        monitor_origin: Point::new(x, y),
    })
}

// xcap 的 RgbaImage 来自它自己的 image 版本，按原始字节转一次
fn grab_monitor(monitor: &Monitor) -> Result<RgbaImage, CaptureError> {
    let img = monitor
        .capture_image()
        .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
    let (w, h) = (img.width(), img.height());
    ImageBuffer::from_raw(w, h, img.into_raw()).ok_or(CaptureError::BadBuffer(w, h))
}

/// 准备一次截图：默认先抓整屏快照，失败时退回实时截屏。
///
/// `force_live` 对应跨平台回退版本，总是走实时截屏 + DPI 校正。
/// 连显示器参数都读不到时返回错误，由调用方弹窗。
pub fn prepare(force_live: bool) -> Result<Prepared, CaptureError> {
    let start = Instant::now();
    let monitor = primary_monitor()?;
    let metrics = read_metrics(&monitor)?;
    let screen_size = (
        monitor.width().map_err(|e| CaptureError::CaptureFailed(e.to_string()))?,
        monitor.height().map_err(|e| CaptureError::CaptureFailed(e.to_string()))?,
    );

    if force_live {
        log::info!("Live capture mode, ratio {:.2}", metrics.device_pixel_ratio);
        return Ok(Prepared { source: ScreenSource::Live(Box::new(XcapLiveCapture)), metrics, screen_size });
    }

    match grab_monitor(&monitor) {
        Ok(img) => {
            log::info!(
                "Screen captured: {}x{} in {}ms",
                img.width(),
                img.height(),
                start.elapsed().as_millis()
            );
            let screen_size = img.dimensions();
            Ok(Prepared {
                source: ScreenSource::Snapshot(FullScreenImage::new(img)),
                metrics,
                screen_size,
            })
        }
        Err(e) => {
            log::warn!("Background capture failed, using solid background: {}", e);
            Ok(Prepared { source: ScreenSource::Live(Box::new(XcapLiveCapture)), metrics, screen_size })
        }
    }
}

/// 基于 xcap 的实时截屏：找到包含左上角的显示器，整屏抓取后在内存里裁剪
pub struct XcapLiveCapture;

impl LiveCapture for XcapLiveCapture {
    fn capture_area(&self, area: PhysicalRect) -> Result<RgbaImage, CaptureError> {
        let monitors = Monitor::all().map_err(|e| CaptureError::MonitorEnumeration(e.to_string()))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoMonitor);
        }

        for monitor in monitors {
            let (Ok(mx), Ok(my), Ok(mw), Ok(mh)) =
                (monitor.x(), monitor.y(), monitor.width(), monitor.height())
            else {
                continue;
            };
            let bounds = Rect::new(mx, my, mw, mh);
            if !contains(bounds, area.left, area.top) {
                continue;
            }
            let image = grab_monitor(&monitor)?;
            return crop_monitor_area(&image, Point::new(mx, my), area)
                .ok_or(CaptureError::OutsideMonitors(area.left, area.top));
        }

        Err(CaptureError::OutsideMonitors(area.left, area.top))
    }
}

fn contains(bounds: Rect, x: i32, y: i32) -> bool {
    (x as i64) >= bounds.x as i64
        && (y as i64) >= bounds.y as i64
        && (x as i64) < bounds.right()
        && (y as i64) < bounds.bottom()
}

/// 把虚拟屏幕坐标的区域换算成显示器内坐标后裁剪，超出显示器的部分被截掉
pub fn crop_monitor_area(image: &RgbaImage, origin: Point, area: PhysicalRect) -> Option<RgbaImage> {
    let local = Rect::new(area.left - origin.x, area.top - origin.y, area.width, area.height)
        .clamp_to(image.width(), image.height());
    if local.is_empty() {
        return None;
    }
    Some(image.view(local.x as u32, local.y as u32, local.width, local.height).to_image())
}
