// src/session.rs
// One capture cycle at a time: selector -> extractor -> presenter.

use crate::capture::{DisplayMetrics, ScreenSource};
use crate::extract::{self, CapturedImage, ExtractError};
use crate::geometry::Rect;

/// 截图周期所处阶段；非 Idle 即忙
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Selecting,
    Previewing,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptureSession {
    phase: Phase,
    completed: u64,
    dropped: u64,
}

impl CaptureSession {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// 触发一次截图。忙时直接丢弃，不排队。
    pub fn try_begin(&mut self) -> bool {
        if self.is_busy() {
            self.dropped += 1;
            return false;
        }
        self.phase = Phase::Selecting;
        true
    }

    pub fn show_preview(&mut self) {
        if self.phase == Phase::Selecting {
            self.phase = Phase::Previewing;
        }
    }

    /// 周期结束（取消、失败或预览关闭），回到空闲
    pub fn finish(&mut self) {
        if self.phase != Phase::Idle {
            self.phase = Phase::Idle;
            self.completed += 1;
        }
    }
}

/// 选区结束后下一步要做什么
#[derive(Debug)]
pub enum Step {
    /// 取消或空选区：静默结束
    Abort,
    Preview(CapturedImage),
    Failed(ExtractError),
}

/// 选区结果交给提取器。取消和空选区不会触碰截图源。
pub fn resolve_selection(
    selection: Option<Rect>,
    source: &ScreenSource,
    metrics: &DisplayMetrics,
) -> Step {
    let Some(rect) = selection.filter(|r| !r.is_empty()) else {
        log::info!("No region selected, capture cancelled");
        return Step::Abort;
    };

    match extract::extract(rect, source, metrics) {
        Ok(image) => Step::Preview(image),
        Err(ExtractError::EmptySelection) => {
            log::info!("Selection {:?} resolved to zero area, capture cancelled", rect);
            Step::Abort
        }
        Err(e) => Step::Failed(e),
    }
}
