// src/selection_logic.rs
// Pure selection state, no druid types here so it can be tested headless.

use crate::geometry::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    Dragging { start: Point, current: Point },
    /// `None` 表示取消或空选区
    Finalized(Option<Rect>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    state: SelectionState,
}

impl Selection {
    pub fn new() -> Self {
        Selection { state: SelectionState::Idle }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SelectionState::Dragging { .. })
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, SelectionState::Finalized(_))
    }

    /// 当前拖拽中的规范化矩形，用于重绘
    pub fn current_rect(&self) -> Option<Rect> {
        match self.state {
            SelectionState::Dragging { start, current } => Some(Rect::normalize(start, current)),
            _ => None,
        }
    }

    /// 主键按下：Idle -> Dragging
    pub fn press(&mut self, pos: Point) -> bool {
        if self.state != SelectionState::Idle {
            return false;
        }
        self.state = SelectionState::Dragging { start: pos, current: pos };
        true
    }

    /// 拖拽中移动鼠标，返回是否需要重绘
    pub fn drag_to(&mut self, pos: Point) -> bool {
        match &mut self.state {
            SelectionState::Dragging { current, .. } if *current != pos => {
                *current = pos;
                true
            }
            _ => false,
        }
    }

    /// 主键松开：Dragging -> Finalized。空矩形按取消处理。
    pub fn release(&mut self, pos: Point) -> Option<SelectionState> {
        let SelectionState::Dragging { start, .. } = self.state else {
            return None;
        };
        let rect = Rect::normalize(start, pos);
        self.state = SelectionState::Finalized(Some(rect).filter(|r| !r.is_empty()));
        Some(self.state)
    }

    /// Escape：任何未结束的状态直接 Finalized(None)
    pub fn cancel(&mut self) -> Option<SelectionState> {
        if self.is_finalized() {
            return None;
        }
        self.state = SelectionState::Finalized(None);
        Some(self.state)
    }

    /// 最终结果；尚未结束时为 `None`
    pub fn outcome(&self) -> Option<Option<Rect>> {
        match self.state {
            SelectionState::Finalized(rect) => Some(rect),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_and_release_finalizes_normalized_rect() {
        let mut sel = Selection::new();
        assert!(sel.press(Point::new(300, 200)));
        assert!(sel.drag_to(Point::new(120, 260)));
        assert_eq!(sel.current_rect(), Some(Rect::new(120, 200, 180, 60)));

        let state = sel.release(Point::new(100, 250));
        assert_eq!(state, Some(SelectionState::Finalized(Some(Rect::new(100, 200, 200, 50)))));
        assert_eq!(sel.outcome(), Some(Some(Rect::new(100, 200, 200, 50))));
    }

    #[test]
    fn click_without_drag_is_no_selection() {
        let mut sel = Selection::new();
        sel.press(Point::new(50, 50));
        sel.release(Point::new(50, 50));
        assert_eq!(sel.state(), SelectionState::Finalized(None));
    }

    #[test]
    fn escape_mid_drag_discards_extent() {
        let mut sel = Selection::new();
        sel.press(Point::new(0, 0));
        sel.drag_to(Point::new(800, 600));
        assert_eq!(sel.cancel(), Some(SelectionState::Finalized(None)));
        assert_eq!(sel.outcome(), Some(None));
    }

    #[test]
    fn escape_before_any_drag() {
        let mut sel = Selection::new();
        sel.cancel();
        assert_eq!(sel.outcome(), Some(None));
    }

    #[test]
    fn input_after_finalize_is_ignored() {
        let mut sel = Selection::new();
        sel.press(Point::new(10, 10));
        sel.release(Point::new(20, 30));
        let done = sel.state();

        assert!(!sel.press(Point::new(1, 1)));
        assert!(!sel.drag_to(Point::new(400, 400)));
        assert_eq!(sel.release(Point::new(400, 400)), None);
        assert_eq!(sel.cancel(), None);
        assert_eq!(sel.state(), done);
    }

    #[test]
    fn move_without_press_does_nothing() {
        let mut sel = Selection::new();
        assert!(!sel.drag_to(Point::new(5, 5)));
        assert_eq!(sel.release(Point::new(5, 5)), None);
        assert_eq!(sel.state(), SelectionState::Idle);
    }
}
