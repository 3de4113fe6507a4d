//! The raster backend boundary.
//!
//! [`Canvas`] is the stateful 2D drawing context the renderer draws into:
//! path verbs, fill/stroke/clip, save/restore, transform and alpha setters,
//! and text. [`Recorder`] is the crate's command-recording implementation,
//! used by the test suite and by embedders that flatten commands onto their
//! own surface.

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::{Affine, Point, Rect, Vec2};

use crate::style::{Paint, TextStyle};

/// Winding rule for fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// Metrics for a measured text run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Advance width in logical units.
    pub width: f64,
}

/// A stateful 2D drawing context.
///
/// Transform and alpha setters take absolute values except [`Canvas::transform`],
/// which concatenates; `save`/`restore` snapshot and pop the whole state.
pub trait Canvas {
    fn save(&mut self);
    fn restore(&mut self);

    /// Replace the current transform.
    fn set_transform(&mut self, transform: Affine);
    /// Concatenate onto the current transform.
    fn transform(&mut self, transform: Affine);
    /// Replace the global alpha.
    fn set_alpha(&mut self, alpha: f64);
    fn clear_rect(&mut self, rect: Rect);

    fn begin_path(&mut self);
    fn close_path(&mut self);
    fn move_to(&mut self, point: Point);
    fn line_to(&mut self, point: Point);
    fn quad_to(&mut self, control: Point, point: Point);
    fn curve_to(&mut self, control1: Point, control2: Point, point: Point);
    /// Append an elliptical arc; a negative sweep runs counterclockwise.
    fn ellipse(
        &mut self,
        center: Point,
        radii: Vec2,
        rotation: f64,
        start_angle: f64,
        sweep_angle: f64,
    );
    fn rect(&mut self, rect: Rect);

    fn set_line_width(&mut self, width: f64);
    fn set_stroke(&mut self, paint: &Paint);
    fn set_fill(&mut self, paint: &Paint);
    fn set_text_style(&mut self, style: &TextStyle);

    fn fill(&mut self, rule: FillRule);
    fn stroke(&mut self);
    /// Intersect the clip region with the current path.
    fn clip(&mut self);

    fn fill_text(&mut self, text: &str, position: Point);
    fn stroke_text(&mut self, text: &str, position: Point);
    fn measure_text(&mut self, text: &str) -> TextMetrics;
}

/// One recorded canvas operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Save,
    Restore,
    SetTransform(Affine),
    Transform(Affine),
    SetAlpha(f64),
    ClearRect(Rect),
    BeginPath,
    ClosePath,
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CurveTo(Point, Point, Point),
    Ellipse {
        center: Point,
        radii: Vec2,
        rotation: f64,
        start_angle: f64,
        sweep_angle: f64,
    },
    Rect(Rect),
    SetLineWidth(f64),
    SetStroke(Paint),
    SetFill(Paint),
    SetTextStyle(TextStyle),
    Fill(FillRule),
    Stroke,
    Clip,
    FillText(String, Point),
    StrokeText(String, Point),
}

/// A [`Canvas`] that records every operation.
///
/// Clones share the same command log, so a test can keep one handle and hand
/// another to the graph. Text measurement is deterministic and approximate
/// (fixed advance per character).
#[derive(Clone, Default)]
pub struct Recorder {
    commands: Rc<RefCell<Vec<Command>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded commands.
    pub fn commands(&self) -> Vec<Command> {
        self.commands.borrow().clone()
    }

    /// Drain the recorded commands.
    pub fn take(&self) -> Vec<Command> {
        self.commands.borrow_mut().drain(..).collect()
    }

    fn push(&self, command: Command) {
        self.commands.borrow_mut().push(command);
    }
}

impl Canvas for Recorder {
    fn save(&mut self) {
        self.push(Command::Save);
    }

    fn restore(&mut self) {
        self.push(Command::Restore);
    }

    fn set_transform(&mut self, transform: Affine) {
        self.push(Command::SetTransform(transform));
    }

    fn transform(&mut self, transform: Affine) {
        self.push(Command::Transform(transform));
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.push(Command::SetAlpha(alpha));
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.push(Command::ClearRect(rect));
    }

    fn begin_path(&mut self) {
        self.push(Command::BeginPath);
    }

    fn close_path(&mut self) {
        self.push(Command::ClosePath);
    }

    fn move_to(&mut self, point: Point) {
        self.push(Command::MoveTo(point));
    }

    fn line_to(&mut self, point: Point) {
        self.push(Command::LineTo(point));
    }

    fn quad_to(&mut self, control: Point, point: Point) {
        self.push(Command::QuadTo(control, point));
    }

    fn curve_to(&mut self, control1: Point, control2: Point, point: Point) {
        self.push(Command::CurveTo(control1, control2, point));
    }

    fn ellipse(
        &mut self,
        center: Point,
        radii: Vec2,
        rotation: f64,
        start_angle: f64,
        sweep_angle: f64,
    ) {
        self.push(Command::Ellipse {
            center,
            radii,
            rotation,
            start_angle,
            sweep_angle,
        });
    }

    fn rect(&mut self, rect: Rect) {
        self.push(Command::Rect(rect));
    }

    fn set_line_width(&mut self, width: f64) {
        self.push(Command::SetLineWidth(width));
    }

    fn set_stroke(&mut self, paint: &Paint) {
        self.push(Command::SetStroke(paint.clone()));
    }

    fn set_fill(&mut self, paint: &Paint) {
        self.push(Command::SetFill(paint.clone()));
    }

    fn set_text_style(&mut self, style: &TextStyle) {
        self.push(Command::SetTextStyle(style.clone()));
    }

    fn fill(&mut self, rule: FillRule) {
        self.push(Command::Fill(rule));
    }

    fn stroke(&mut self) {
        self.push(Command::Stroke);
    }

    fn clip(&mut self) {
        self.push(Command::Clip);
    }

    fn fill_text(&mut self, text: &str, position: Point) {
        self.push(Command::FillText(text.to_string(), position));
    }

    fn stroke_text(&mut self, text: &str, position: Point) {
        self.push(Command::StrokeText(text.to_string(), position));
    }

    fn measure_text(&mut self, text: &str) -> TextMetrics {
        TextMetrics {
            width: text.chars().count() as f64 * 6.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_records_in_order() {
        let mut recorder = Recorder::new();
        recorder.begin_path();
        recorder.move_to(Point::new(1.0, 2.0));
        recorder.line_to(Point::new(3.0, 4.0));
        recorder.stroke();
        assert_eq!(
            recorder.commands(),
            vec![
                Command::BeginPath,
                Command::MoveTo(Point::new(1.0, 2.0)),
                Command::LineTo(Point::new(3.0, 4.0)),
                Command::Stroke,
            ]
        );
    }

    #[test]
    fn test_recorder_clones_share_the_log() {
        let mut recorder = Recorder::new();
        let witness = recorder.clone();
        recorder.save();
        assert_eq!(witness.commands(), vec![Command::Save]);
        assert_eq!(witness.take(), vec![Command::Save]);
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn test_measure_text_is_deterministic() {
        let mut recorder = Recorder::new();
        let a = recorder.measure_text("abcd");
        let b = recorder.measure_text("abcd");
        assert_eq!(a, b);
        assert_eq!(a.width, 24.0);
    }
}
