//! Floor-plan drawing model.
//!
//! An ordered list of vector shapes (z-order = list order) plus the
//! serialization contract around it. The editor side is a small gesture
//! state machine driven by pointer events: freehand and box tools go
//! `idle → drawing → idle`, two-point line tools go
//! `idle → awaiting second point → idle`, and the select tool goes
//! `idle → moving/resizing → idle` gated on hit tests.
//!
//! Payloads load from three shapes for backwards compatibility: the
//! current `{ "drawings": [...] }` object, a bare array, or an object with
//! a `paths` property. Anything else, or a parse failure, loads as empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Side length of the square hit target around a resize handle.
pub const HANDLE_SIZE: f64 = 14.0;

/// Default grid interval for snap-to-grid.
pub const DEFAULT_GRID_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Freehand,
    Rect,
    Circle,
    Line,
    DashedLine,
    Text,
    Door,
    Window,
}

/// One vector shape.
///
/// Box-like shapes (rect, circle, text, door, window) use `x`/`y`/`width`/
/// `height`; freehand and line shapes carry their geometry in `points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingShape {
    pub id: String,
    pub kind: ShapeKind,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub points: Vec<(f64, f64)>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub text: Option<String>,
}

fn default_color() -> String {
    "#000000".to_string()
}
fn default_stroke_width() -> f64 {
    2.0
}

impl DrawingShape {
    pub fn new(kind: ShapeKind, x: f64, y: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            x,
            y,
            width: 0.0,
            height: 0.0,
            points: Vec::new(),
            color: default_color(),
            stroke_width: default_stroke_width(),
            text: None,
        }
    }

    /// Axis-aligned bounding box as `(min_x, min_y, max_x, max_y)`.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        if self.points.is_empty() {
            let (x0, x1) = ordered(self.x, self.x + self.width);
            let (y0, y1) = ordered(self.y, self.y + self.height);
            (x0, y0, x1, y1)
        } else {
            let mut min_x = f64::INFINITY;
            let mut min_y = f64::INFINITY;
            let mut max_x = f64::NEG_INFINITY;
            let mut max_y = f64::NEG_INFINITY;
            for (px, py) in &self.points {
                min_x = min_x.min(*px);
                min_y = min_y.min(*py);
                max_x = max_x.max(*px);
                max_y = max_y.max(*py);
            }
            (min_x, min_y, max_x, max_y)
        }
    }

    /// Does `(x, y)` fall inside this shape's bounding box?
    pub fn hit_test(&self, x: f64, y: f64) -> bool {
        let (x0, y0, x1, y1) = self.bounding_box();
        x >= x0 && x <= x1 && y >= y0 && y <= y1
    }

    /// Does `(x, y)` fall on the resize handle (bottom-right corner of the
    /// bounding box, with a fixed-size hit target)?
    pub fn hit_test_handle(&self, x: f64, y: f64) -> bool {
        let (_, _, x1, y1) = self.bounding_box();
        let half = HANDLE_SIZE / 2.0;
        x >= x1 - half && x <= x1 + half && y >= y1 - half && y <= y1 + half
    }

    /// Move the whole shape by `(dx, dy)`.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
        for point in self.points.iter_mut() {
            point.0 += dx;
            point.1 += dy;
        }
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Round `value` to the nearest multiple of `grid`.
pub fn snap(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

pub fn snap_point(x: f64, y: f64, grid: f64) -> (f64, f64) {
    (snap(x, grid), snap(y, grid))
}

// ─── Serialization ──────────────────────────────────────────────────

/// The canonical drawing payload: shapes, attached images (rasterized
/// preview included), and free-form metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawingPayload {
    #[serde(default)]
    pub drawings: Vec<DrawingShape>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl DrawingPayload {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Load a payload from any of the accepted shapes.
    ///
    /// Accepts the canonical `{ drawings: [...] }` object, a legacy bare
    /// array of shapes, or a legacy `{ paths: [...] }` object. Anything
    /// else — including malformed JSON — loads as an empty payload.
    pub fn from_json(raw: &str) -> Self {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => return Self::default(),
        };

        match value {
            Value::Array(_) => {
                let drawings = serde_json::from_value(value).unwrap_or_default();
                Self {
                    drawings,
                    ..Self::default()
                }
            }
            Value::Object(ref map) if map.contains_key("drawings") => {
                serde_json::from_value(value).unwrap_or_default()
            }
            Value::Object(mut map) => match map.remove("paths") {
                Some(paths) => Self {
                    drawings: serde_json::from_value(paths).unwrap_or_default(),
                    ..Self::default()
                },
                None => Self::default(),
            },
            _ => Self::default(),
        }
    }
}

// ─── Editor ─────────────────────────────────────────────────────────

/// The tool selected in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Select,
    Freehand,
    Rect,
    Circle,
    Line,
    DashedLine,
    Text,
    Door,
    Window,
}

impl Tool {
    fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            Tool::Select => None,
            Tool::Freehand => Some(ShapeKind::Freehand),
            Tool::Rect => Some(ShapeKind::Rect),
            Tool::Circle => Some(ShapeKind::Circle),
            Tool::Line => Some(ShapeKind::Line),
            Tool::DashedLine => Some(ShapeKind::DashedLine),
            Tool::Text => Some(ShapeKind::Text),
            Tool::Door => Some(ShapeKind::Door),
            Tool::Window => Some(ShapeKind::Window),
        }
    }

    fn is_two_point(&self) -> bool {
        matches!(self, Tool::Line | Tool::DashedLine)
    }
}

/// State of the active pointer gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureState {
    Idle,
    /// A shape is being created and follows the pointer.
    Drawing { shape: DrawingShape },
    /// First point of a two-point line is down; waiting for the second.
    AwaitingSecondPoint { shape: DrawingShape },
    /// The selected shape follows the pointer.
    Moving { last_x: f64, last_y: f64 },
    /// The selected shape's bottom-right corner follows the pointer.
    Resizing,
}

/// In-memory drawing editor: ordered shape list plus gesture state.
pub struct Editor {
    shapes: Vec<DrawingShape>,
    pub tool: Tool,
    pub selected: Option<usize>,
    pub grid: Option<f64>,
    state: GestureState,
}

impl Editor {
    pub fn new() -> Self {
        Self {
            shapes: Vec::new(),
            tool: Tool::Select,
            selected: None,
            grid: None,
            state: GestureState::Idle,
        }
    }

    pub fn from_payload(payload: DrawingPayload) -> Self {
        let mut editor = Self::new();
        editor.shapes = payload.drawings;
        editor
    }

    pub fn shapes(&self) -> &[DrawingShape] {
        &self.shapes
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn to_payload(&self) -> DrawingPayload {
        DrawingPayload {
            drawings: self.shapes.clone(),
            images: Vec::new(),
            metadata: Value::Null,
        }
    }

    fn snapped(&self, x: f64, y: f64) -> (f64, f64) {
        match self.grid {
            Some(grid) => snap_point(x, y, grid),
            None => (x, y),
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        match self.tool.shape_kind() {
            None => {
                // Select tool: handle first, then body, then nothing.
                // Topmost shape wins, so scan back to front. Hit tests use
                // raw coordinates; snapping is for geometry, and a snapped
                // probe can miss a shape edge.
                if let Some(idx) = self.selected {
                    let shape = &self.shapes[idx];
                    // Point-based shapes have no corner geometry to resize;
                    // a handle press on one falls through to a move.
                    if shape.points.is_empty() && shape.hit_test_handle(x, y) {
                        self.state = GestureState::Resizing;
                        return;
                    }
                }
                let hit = self
                    .shapes
                    .iter()
                    .rposition(|shape| shape.hit_test(x, y));
                self.selected = hit;
                self.state = match hit {
                    Some(_) => GestureState::Moving { last_x: x, last_y: y },
                    None => GestureState::Idle,
                };
            }
            Some(kind) => {
                let (x, y) = self.snapped(x, y);
                let mut shape = DrawingShape::new(kind, x, y);
                if self.tool.is_two_point() || kind == ShapeKind::Freehand {
                    shape.points.push((x, y));
                }
                self.state = if self.tool.is_two_point() {
                    GestureState::AwaitingSecondPoint { shape }
                } else {
                    GestureState::Drawing { shape }
                };
            }
        }
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        let (sx, sy) = self.snapped(x, y);

        match &mut self.state {
            GestureState::Idle | GestureState::AwaitingSecondPoint { .. } => {}
            GestureState::Drawing { shape } => {
                if shape.kind == ShapeKind::Freehand {
                    shape.points.push((sx, sy));
                } else {
                    shape.width = sx - shape.x;
                    shape.height = sy - shape.y;
                }
            }
            // Moving tracks the raw pointer so the grab point stays under
            // the finger; created geometry that was snapped stays snapped
            // relative to it.
            GestureState::Moving { last_x, last_y } => {
                let dx = x - *last_x;
                let dy = y - *last_y;
                *last_x = x;
                *last_y = y;
                if let Some(idx) = self.selected {
                    self.shapes[idx].translate(dx, dy);
                }
            }
            GestureState::Resizing => {
                if let Some(idx) = self.selected {
                    let shape = &mut self.shapes[idx];
                    shape.width = sx - shape.x;
                    shape.height = sy - shape.y;
                }
            }
        }
    }

    /// Finish the active gesture. A completed shape joins the end of the
    /// list (topmost in z-order).
    pub fn pointer_up(&mut self, x: f64, y: f64) {
        let (x, y) = self.snapped(x, y);

        match std::mem::replace(&mut self.state, GestureState::Idle) {
            GestureState::Idle | GestureState::Moving { .. } | GestureState::Resizing => {}
            GestureState::Drawing { mut shape } => {
                if shape.kind == ShapeKind::Freehand {
                    shape.points.push((x, y));
                } else {
                    shape.width = x - shape.x;
                    shape.height = y - shape.y;
                }
                self.shapes.push(shape);
            }
            GestureState::AwaitingSecondPoint { mut shape } => {
                shape.points.push((x, y));
                self.shapes.push(shape);
            }
        }
    }

    pub fn delete_selected(&mut self) {
        if let Some(idx) = self.selected.take() {
            if idx < self.shapes.len() {
                self.shapes.remove(idx);
            }
        }
    }

    pub fn bring_to_front(&mut self, idx: usize) {
        if idx < self.shapes.len() {
            let shape = self.shapes.remove(idx);
            self.shapes.push(shape);
            self.selected = Some(self.shapes.len() - 1);
        }
    }

    pub fn send_to_back(&mut self, idx: usize) {
        if idx < self.shapes.len() {
            let shape = self.shapes.remove(idx);
            self.shapes.insert(0, shape);
            self.selected = Some(0);
        }
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> DrawingShape {
        let mut shape = DrawingShape::new(ShapeKind::Rect, x, y);
        shape.width = w;
        shape.height = h;
        shape
    }

    #[test]
    fn snap_rounds_to_nearest_multiple() {
        assert_eq!(snap(13.0, 10.0), 10.0);
        assert_eq!(snap(15.0, 10.0), 20.0);
        assert_eq!(snap(-3.0, 10.0), -0.0);
        assert_eq!(snap(-7.0, 10.0), -10.0);
        // Disabled grid passes values through
        assert_eq!(snap(13.7, 0.0), 13.7);
        assert_eq!(snap_point(13.0, 26.0, 10.0), (10.0, 30.0));
    }

    #[test]
    fn bounding_box_handles_negative_extent() {
        let shape = rect(100.0, 100.0, -40.0, -20.0);
        assert_eq!(shape.bounding_box(), (60.0, 80.0, 100.0, 100.0));
        assert!(shape.hit_test(70.0, 90.0));
        assert!(!shape.hit_test(50.0, 90.0));
    }

    #[test]
    fn handle_hit_target_is_fixed_size() {
        let shape = rect(0.0, 0.0, 100.0, 50.0);
        assert!(shape.hit_test_handle(100.0, 50.0));
        assert!(shape.hit_test_handle(100.0 + HANDLE_SIZE / 2.0, 50.0));
        assert!(!shape.hit_test_handle(100.0 + HANDLE_SIZE, 50.0));
        assert!(!shape.hit_test_handle(0.0, 0.0));
    }

    #[test]
    fn payload_round_trip() {
        let mut payload = DrawingPayload::default();
        payload.drawings.push(rect(1.0, 2.0, 3.0, 4.0));
        let mut line = DrawingShape::new(ShapeKind::Line, 0.0, 0.0);
        line.points = vec![(0.0, 0.0), (10.0, 10.0)];
        payload.drawings.push(line);
        payload.images.push("data:image/png;base64,AAAA".to_string());

        let reloaded = DrawingPayload::from_json(&payload.to_json());
        assert_eq!(reloaded, payload);
    }

    #[test]
    fn legacy_bare_array_loads_like_canonical() {
        let shapes = vec![rect(1.0, 2.0, 3.0, 4.0), rect(5.0, 6.0, 7.0, 8.0)];
        let bare = serde_json::to_string(&shapes).unwrap();
        let canonical = serde_json::json!({ "drawings": shapes }).to_string();

        let from_bare = DrawingPayload::from_json(&bare);
        let from_canonical = DrawingPayload::from_json(&canonical);
        assert_eq!(from_bare.drawings, from_canonical.drawings);
        assert_eq!(from_bare.drawings.len(), 2);
    }

    #[test]
    fn legacy_paths_object_loads() {
        let shapes = vec![rect(0.0, 0.0, 5.0, 5.0)];
        let legacy = serde_json::json!({ "paths": shapes }).to_string();
        let payload = DrawingPayload::from_json(&legacy);
        assert_eq!(payload.drawings.len(), 1);
    }

    #[test]
    fn unrecognized_payloads_load_empty() {
        assert!(DrawingPayload::from_json("not json").drawings.is_empty());
        assert!(DrawingPayload::from_json("42").drawings.is_empty());
        assert!(DrawingPayload::from_json("{\"other\":1}").drawings.is_empty());
    }

    #[test]
    fn draw_rect_gesture() {
        let mut editor = Editor::new();
        editor.tool = Tool::Rect;
        editor.pointer_down(10.0, 10.0);
        assert!(matches!(editor.state(), GestureState::Drawing { .. }));
        editor.pointer_move(30.0, 25.0);
        editor.pointer_up(40.0, 30.0);
        assert!(matches!(editor.state(), GestureState::Idle));

        assert_eq!(editor.shapes().len(), 1);
        let shape = &editor.shapes()[0];
        assert_eq!(shape.kind, ShapeKind::Rect);
        assert_eq!((shape.width, shape.height), (30.0, 20.0));
    }

    #[test]
    fn two_point_line_gesture() {
        let mut editor = Editor::new();
        editor.tool = Tool::DashedLine;
        editor.pointer_down(0.0, 0.0);
        assert!(matches!(
            editor.state(),
            GestureState::AwaitingSecondPoint { .. }
        ));
        editor.pointer_up(50.0, 50.0);
        assert_eq!(editor.shapes().len(), 1);
        assert_eq!(editor.shapes()[0].points, vec![(0.0, 0.0), (50.0, 50.0)]);
    }

    #[test]
    fn snap_applies_during_creation() {
        let mut editor = Editor::new();
        editor.tool = Tool::Rect;
        editor.grid = Some(10.0);
        editor.pointer_down(13.0, 27.0);
        editor.pointer_up(38.0, 52.0);

        let shape = &editor.shapes()[0];
        assert_eq!((shape.x, shape.y), (10.0, 30.0));
        assert_eq!((shape.width, shape.height), (30.0, 20.0));
    }

    #[test]
    fn select_move_and_resize() {
        let mut editor = Editor::new();
        editor.tool = Tool::Rect;
        editor.pointer_down(0.0, 0.0);
        editor.pointer_up(100.0, 50.0);

        // Move
        editor.tool = Tool::Select;
        editor.pointer_down(50.0, 25.0);
        assert_eq!(editor.selected, Some(0));
        assert!(matches!(editor.state(), GestureState::Moving { .. }));
        editor.pointer_move(60.0, 35.0);
        editor.pointer_up(60.0, 35.0);
        assert_eq!((editor.shapes()[0].x, editor.shapes()[0].y), (10.0, 10.0));

        // Resize from the bottom-right handle
        editor.pointer_down(110.0, 60.0);
        assert!(matches!(editor.state(), GestureState::Resizing));
        editor.pointer_move(130.0, 80.0);
        editor.pointer_up(130.0, 80.0);
        assert_eq!(
            (editor.shapes()[0].width, editor.shapes()[0].height),
            (120.0, 70.0)
        );
    }

    #[test]
    fn selection_ignores_grid_snapping() {
        let mut editor = Editor::from_payload(DrawingPayload {
            drawings: vec![rect(12.0, 12.0, 4.0, 4.0)],
            ..Default::default()
        });
        editor.grid = Some(10.0);

        // A snapped probe would land at (10, 10), outside the shape.
        editor.pointer_down(13.0, 13.0);
        assert_eq!(editor.selected, Some(0));
        editor.pointer_up(13.0, 13.0);
    }

    #[test]
    fn line_handle_press_moves_rather_than_resizes() {
        let mut line = DrawingShape::new(ShapeKind::Line, 0.0, 0.0);
        line.points = vec![(0.0, 0.0), (50.0, 50.0)];
        let mut editor = Editor::from_payload(DrawingPayload {
            drawings: vec![line],
            ..Default::default()
        });
        editor.selected = Some(0);

        // Press where a box shape's resize handle would be.
        editor.pointer_down(50.0, 50.0);
        assert!(matches!(editor.state(), GestureState::Moving { .. }));
        editor.pointer_move(60.0, 60.0);
        editor.pointer_up(60.0, 60.0);

        assert_eq!(editor.shapes()[0].points, vec![(10.0, 10.0), (60.0, 60.0)]);
    }

    #[test]
    fn select_topmost_shape_wins() {
        let mut editor = Editor::from_payload(DrawingPayload {
            drawings: vec![rect(0.0, 0.0, 50.0, 50.0), rect(25.0, 25.0, 50.0, 50.0)],
            ..Default::default()
        });
        editor.pointer_down(30.0, 30.0);
        assert_eq!(editor.selected, Some(1));
        editor.pointer_up(30.0, 30.0);
    }

    #[test]
    fn z_order_and_delete() {
        let mut editor = Editor::from_payload(DrawingPayload {
            drawings: vec![rect(0.0, 0.0, 1.0, 1.0), rect(2.0, 2.0, 1.0, 1.0)],
            ..Default::default()
        });
        let first_id = editor.shapes()[0].id.clone();

        editor.bring_to_front(0);
        assert_eq!(editor.shapes()[1].id, first_id);

        editor.send_to_back(1);
        assert_eq!(editor.shapes()[0].id, first_id);

        editor.selected = Some(0);
        editor.delete_selected();
        assert_eq!(editor.shapes().len(), 1);
        assert!(editor.selected.is_none());
    }
}
