// src/extract.rs
// Selection rectangle -> pixels. Either a direct crop of the full-screen
// snapshot or a DPI-corrected request to a live capture source.

use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;

use crate::capture::{CaptureError, DisplayMetrics, ScreenSource};
use crate::geometry::{PhysicalRect, Rect};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(#[from] CaptureError),

    /// 调用方按取消处理，不弹错误框
    #[error("selection has zero area")]
    EmptySelection,
}

/// 截出来的图像，只读；从提取器交给预览窗口
#[derive(Debug, Clone)]
pub struct CapturedImage(Arc<RgbaImage>);

impl CapturedImage {
    pub fn new(image: RgbaImage) -> Self {
        CapturedImage(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.0.as_raw()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.0
    }
}

/// DPI 校正：覆盖层坐标 -> 实时截屏接口使用的物理矩形
///
/// 原点按比例向下取整后加上显示器原点，宽高四舍五入，左上角不小于 0。
pub fn to_physical(rect: Rect, metrics: &DisplayMetrics) -> PhysicalRect {
    let ratio = if metrics.device_pixel_ratio > 0.0 { metrics.device_pixel_ratio } else { 1.0 };
    let left = (rect.x as f64 / ratio).floor() as i64 + metrics.monitor_origin.x as i64;
    let top = (rect.y as f64 / ratio).floor() as i64 + metrics.monitor_origin.y as i64;
    PhysicalRect {
        left: left.clamp(0, i32::MAX as i64) as i32,
        top: top.clamp(0, i32::MAX as i64) as i32,
        width: (rect.width as f64 / ratio).round() as u32,
        height: (rect.height as f64 / ratio).round() as u32,
    }
}

pub fn extract(
    rect: Rect,
    source: &ScreenSource,
    metrics: &DisplayMetrics,
) -> Result<CapturedImage, ExtractError> {
    if rect.is_empty() {
        return Err(ExtractError::EmptySelection);
    }
    let start = Instant::now();

    let image = match source {
        ScreenSource::Snapshot(full) => full.crop(rect).ok_or(ExtractError::EmptySelection)?,
        ScreenSource::Live(live) => {
            let area = to_physical(rect, metrics);
            if area.is_empty() {
                return Err(ExtractError::EmptySelection);
            }
            log::debug!("Live capture of {:?} (ratio {:.2})", area, metrics.device_pixel_ratio);
            live.capture_area(area)?
        }
    };

    log::info!(
        "Extracted {}x{} at {},{} in {}ms",
        image.width(),
        image.height(),
        rect.x,
        rect.y,
        start.elapsed().as_millis()
    );
    Ok(CapturedImage::new(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FullScreenImage, LiveCapture};
    use crate::geometry::Point;
    use image::Rgba;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn metrics(ratio: f64, ox: i32, oy: i32) -> DisplayMetrics {
        DisplayMetrics { device_pixel_ratio: ratio, monitor_origin: Point::new(ox, oy) }
    }

    fn noise(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let v = x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17));
            Rgba([v as u8, (v >> 3) as u8, (x + y) as u8, 255])
        })
    }

    /// Records every requested area and answers with a blank image of that size.
    #[derive(Clone, Default)]
    struct FakeLive {
        calls: Rc<RefCell<Vec<PhysicalRect>>>,
    }

    impl LiveCapture for FakeLive {
        fn capture_area(&self, area: PhysicalRect) -> Result<RgbaImage, CaptureError> {
            self.calls.borrow_mut().push(area);
            Ok(RgbaImage::new(area.width, area.height))
        }
    }

    struct BrokenLive;

    impl LiveCapture for BrokenLive {
        fn capture_area(&self, _area: PhysicalRect) -> Result<RgbaImage, CaptureError> {
            Err(CaptureError::CaptureFailed("permission denied".into()))
        }
    }

    #[test]
    fn ratio_one_keeps_rect() {
        let rect = Rect::new(100, 50, 200, 150);
        let p = to_physical(rect, &metrics(1.0, 0, 0));
        assert_eq!(p, PhysicalRect { left: 100, top: 50, width: 200, height: 150 });
    }

    #[test]
    fn ratio_one_and_a_quarter() {
        let rect = Rect::new(100, 50, 200, 150);
        let p = to_physical(rect, &metrics(1.25, 0, 0));
        assert_eq!(p, PhysicalRect { left: 80, top: 40, width: 160, height: 120 });
    }

    #[test]
    fn monitor_origin_is_added_after_scaling() {
        let rect = Rect::new(101, 51, 30, 30);
        let p = to_physical(rect, &metrics(2.0, 1920, 0));
        assert_eq!(p, PhysicalRect { left: 1970, top: 25, width: 15, height: 15 });
    }

    #[test]
    fn negative_origin_clamps_to_zero() {
        let rect = Rect::new(10, 10, 40, 40);
        let p = to_physical(rect, &metrics(1.0, -1920, -50));
        assert_eq!((p.left, p.top), (0, 0));
        assert_eq!((p.width, p.height), (40, 40));
    }

    #[test]
    fn snapshot_extraction_matches_selection_exactly() {
        let source = ScreenSource::Snapshot(FullScreenImage::new(noise(320, 240)));
        let rect = Rect::normalize(Point::new(210, 190), Point::new(17, 33));
        let img = extract(rect, &source, &metrics(1.5, 0, 0)).unwrap();
        assert_eq!((img.width(), img.height()), (rect.width, rect.height));
        assert_eq!(img.as_image().get_pixel(0, 0), noise(320, 240).get_pixel(17, 33));
    }

    #[test]
    fn snapshot_extraction_is_idempotent() {
        let source = ScreenSource::Snapshot(FullScreenImage::new(noise(128, 128)));
        let rect = Rect::new(9, 14, 60, 33);
        let a = extract(rect, &source, &DisplayMetrics::default()).unwrap();
        let b = extract(rect, &source, &DisplayMetrics::default()).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn live_extraction_requests_corrected_rect() {
        let live = FakeLive::default();
        let calls = live.calls.clone();
        let source = ScreenSource::Live(Box::new(live));
        let rect = Rect::new(100, 50, 200, 150);

        let img = extract(rect, &source, &metrics(1.25, 0, 0)).unwrap();

        assert_eq!(calls.borrow().as_slice(), &[PhysicalRect { left: 80, top: 40, width: 160, height: 120 }]);
        assert!((img.width() as i64 - 160).abs() <= 1);
        assert!((img.height() as i64 - 120).abs() <= 1);
    }

    #[test]
    fn live_extraction_at_ratio_one_is_exact() {
        let source = ScreenSource::Live(Box::new(FakeLive::default()));
        let rect = Rect::new(3, 4, 77, 41);
        let img = extract(rect, &source, &DisplayMetrics::default()).unwrap();
        assert_eq!((img.width(), img.height()), (77, 41));
    }

    #[test]
    fn tiny_rect_rounds_to_nothing() {
        let live = FakeLive::default();
        let calls = live.calls.clone();
        let source = ScreenSource::Live(Box::new(live));
        let err = extract(Rect::new(10, 10, 1, 1), &source, &metrics(3.0, 0, 0)).unwrap_err();
        assert!(matches!(err, ExtractError::EmptySelection));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn empty_rect_never_reaches_source() {
        let live = FakeLive::default();
        let calls = live.calls.clone();
        let source = ScreenSource::Live(Box::new(live));
        let err = extract(Rect::new(10, 10, 0, 40), &source, &DisplayMetrics::default()).unwrap_err();
        assert!(matches!(err, ExtractError::EmptySelection));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn selection_outside_snapshot_is_empty() {
        let source = ScreenSource::Snapshot(FullScreenImage::new(noise(50, 50)));
        let err = extract(Rect::new(60, 60, 10, 10), &source, &DisplayMetrics::default()).unwrap_err();
        assert!(matches!(err, ExtractError::EmptySelection));
    }

    #[test]
    fn live_failure_is_capture_unavailable() {
        let source = ScreenSource::Live(Box::new(BrokenLive));
        let err = extract(Rect::new(0, 0, 10, 10), &source, &DisplayMetrics::default()).unwrap_err();
        assert!(matches!(err, ExtractError::CaptureUnavailable(CaptureError::CaptureFailed(_))));
    }
}
