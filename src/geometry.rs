// src/geometry.rs

/// 选区覆盖层坐标空间中的整数点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

/// 矩形选区结构体
///
/// 只能通过 [`Rect::normalize`] 或 [`Rect::new`] 构造，宽高永远非负。
/// 宽或高为 0 的矩形视为空选区，语义上等同于“没有选区”。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect { x, y, width, height }
    }

    /// 由拖拽的两个端点得到规范化矩形：原点取分量最小值，宽高取差的绝对值
    pub fn normalize(p1: Point, p2: Point) -> Self {
        Rect {
            x: p1.x.min(p2.x),
            y: p1.y.min(p2.y),
            width: p1.x.abs_diff(p2.x),
            height: p1.y.abs_diff(p2.y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// 与 `(0, 0, width, height)` 的画布求交，结果可能为空
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let x0 = (self.x as i64).clamp(0, width as i64);
        let y0 = (self.y as i64).clamp(0, height as i64);
        let x1 = self.right().clamp(0, width as i64);
        let y1 = self.bottom().clamp(0, height as i64);
        Rect {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    /// 选区尺寸标签，例如 `200 x 150`
    pub fn size_label(&self) -> String {
        format!("{} x {}", self.width, self.height)
    }
}

/// 经过 DPI 校正、交给实时截屏接口的物理像素矩形（虚拟屏幕坐标）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl PhysicalRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
