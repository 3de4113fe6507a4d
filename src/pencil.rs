//! Turning drawables into canvas commands.
//!
//! [`Pencil`] traces shapes as path verbs on a [`Canvas`] and fills or
//! strokes them according to their [`Style`]. Styles are interned, so the
//! pencil memoizes the last applied style and skips the state writes when
//! consecutive draws share an instance. `restore` forgets the memo because
//! the backend pops to an older state.

use std::f64::consts::TAU;

use kurbo::{Affine, Point, Rect, Vec2};

use crate::canvas::{Canvas, FillRule, TextMetrics};
use crate::shape::{self, Path, Shape};
use crate::style::{Style, TextStyle};

pub(crate) struct Pencil {
    canvas: Box<dyn Canvas>,
    last_style: Option<Style>,
    last_text_style: Option<TextStyle>,
    /// Effective alpha mirroring save/restore; the canvas only ever sees
    /// absolute values.
    alpha_stack: Vec<f64>,
}

impl Pencil {
    pub(crate) fn new(canvas: Box<dyn Canvas>) -> Self {
        Self {
            canvas,
            last_style: None,
            last_text_style: None,
            alpha_stack: vec![1.0],
        }
    }

    /// Reset the surface for a new frame: device transform and a full clear.
    pub(crate) fn begin_frame(&mut self, width: f64, height: f64, pixel_ratio: f64) {
        self.canvas.set_transform(Affine::scale(pixel_ratio));
        self.canvas.clear_rect(Rect::new(0.0, 0.0, width, height));
        self.alpha_stack.clear();
        self.alpha_stack.push(1.0);
    }

    pub(crate) fn save(&mut self) {
        self.canvas.save();
        let current = self.alpha();
        self.alpha_stack.push(current);
    }

    pub(crate) fn restore(&mut self) {
        self.canvas.restore();
        if self.alpha_stack.len() > 1 {
            self.alpha_stack.pop();
        }
        // The backend popped to an older state, so the memoized styles no
        // longer describe it.
        self.last_style = None;
        self.last_text_style = None;
    }

    pub(crate) fn transform(&mut self, transform: Affine) {
        self.canvas.transform(transform);
    }

    /// Multiply `alpha` into the current effective alpha.
    pub(crate) fn multiply_alpha(&mut self, alpha: f64) {
        let product = self.alpha() * alpha;
        self.canvas.set_alpha(product);
        if let Some(top) = self.alpha_stack.last_mut() {
            *top = product;
        }
    }

    fn alpha(&self) -> f64 {
        self.alpha_stack.last().copied().unwrap_or(1.0)
    }

    pub(crate) fn draw(&mut self, shape: &Shape, style: &Style) {
        // A style with no paints draws nothing.
        if style.fill().is_none() && style.stroke().is_none() {
            return;
        }
        self.apply_style(style);
        self.trace(shape);
        if style.fill().is_some() {
            self.canvas.fill(FillRule::EvenOdd);
        }
        if style.stroke().is_some() {
            self.canvas.stroke();
        }
    }

    /// Clip subsequent drawing to `shape`.
    pub(crate) fn mask(&mut self, shape: &Shape) {
        self.trace(shape);
        self.canvas.clip();
    }

    pub(crate) fn draw_text(
        &mut self,
        text: &str,
        position: Point,
        style: &Style,
        text_style: &TextStyle,
    ) {
        if style.fill().is_none() && style.stroke().is_none() {
            return;
        }
        self.apply_style(style);
        self.apply_text_style(text_style);
        if style.fill().is_some() {
            self.canvas.fill_text(text, position);
        }
        if style.stroke().is_some() {
            self.canvas.stroke_text(text, position);
        }
    }

    pub(crate) fn measure_text(&mut self, text: &str, text_style: &TextStyle) -> TextMetrics {
        self.apply_text_style(text_style);
        self.canvas.measure_text(text)
    }

    // The memo keys on instance identity; styles from separate caches
    // never compare equal even with identical options.
    fn apply_style(&mut self, style: &Style) {
        if self.last_style.as_ref() == Some(style) {
            return;
        }
        self.canvas.set_line_width(style.line_width());
        if let Some(stroke) = style.stroke() {
            self.canvas.set_stroke(stroke);
        }
        if let Some(fill) = style.fill() {
            self.canvas.set_fill(fill);
        }
        self.last_style = Some(style.clone());
    }

    fn apply_text_style(&mut self, style: &TextStyle) {
        if self.last_text_style.as_ref() == Some(style) {
            return;
        }
        self.canvas.set_text_style(style);
        self.last_text_style = Some(style.clone());
    }

    fn trace(&mut self, shape: &Shape) {
        self.canvas.begin_path();
        match shape {
            Shape::Box(rect) => self.canvas.rect(*rect),
            Shape::Circle(circle) => self.canvas.ellipse(
                circle.center,
                Vec2::new(circle.radius, circle.radius),
                0.0,
                0.0,
                TAU,
            ),
            Shape::Segment(line) => {
                self.canvas.move_to(line.p0);
                self.canvas.line_to(line.p1);
            }
            Shape::Arc(arc) => self.canvas.ellipse(
                arc.center,
                arc.radii,
                arc.x_rotation,
                arc.start_angle,
                arc.sweep_angle,
            ),
            Shape::Quadratic(quad) => {
                self.canvas.move_to(quad.p0);
                self.canvas.quad_to(quad.p1, quad.p2);
            }
            Shape::Bezier(cubic) => {
                self.canvas.move_to(cubic.p0);
                self.canvas.curve_to(cubic.p1, cubic.p2, cubic.p3);
            }
            Shape::Path(path) => self.trace_path(path),
        }
    }

    /// Trace compound-path parts as one contour, restarting the sub-path
    /// wherever consecutive parts do not touch.
    fn trace_path(&mut self, path: &Path) {
        let mut last: Option<Point> = None;
        for part in &path.parts {
            let start = shape::part_start(part);
            match last {
                None => self.canvas.move_to(start),
                Some(prev) if !shape::points_touch(prev, start) => {
                    self.canvas.close_path();
                    self.canvas.move_to(start);
                }
                Some(_) => {}
            }
            match part {
                Shape::Segment(line) => self.canvas.line_to(line.p1),
                Shape::Arc(arc) => self.canvas.ellipse(
                    arc.center,
                    arc.radii,
                    arc.x_rotation,
                    arc.start_angle,
                    arc.sweep_angle,
                ),
                Shape::Quadratic(quad) => self.canvas.quad_to(quad.p1, quad.p2),
                Shape::Bezier(cubic) => self.canvas.curve_to(cubic.p1, cubic.p2, cubic.p3),
                other => shape::unsupported_part(other),
            }
            last = part.end();
        }
        if path.closed {
            self.canvas.close_path();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Recorder};
    use crate::style::{Color, Paint, StyleOptions, Styles};

    fn pencil_with_log() -> (Pencil, Recorder) {
        let recorder = Recorder::new();
        (Pencil::new(Box::new(recorder.clone())), recorder)
    }

    #[test]
    fn test_begin_frame_scales_and_clears() {
        let (mut pencil, log) = pencil_with_log();
        pencil.begin_frame(800.0, 600.0, 2.0);
        assert_eq!(
            log.take(),
            vec![
                Command::SetTransform(Affine::scale(2.0)),
                Command::ClearRect(Rect::new(0.0, 0.0, 800.0, 600.0)),
            ]
        );
    }

    #[test]
    fn test_draw_applies_style_then_fills_and_strokes() {
        let (mut pencil, log) = pencil_with_log();
        let mut styles = Styles::new();
        let style = styles.style(
            StyleOptions::default()
                .fill(Color::rgb(1.0, 0.0, 0.0))
                .stroke(Color::BLACK)
                .line_width(2.0),
        );
        pencil.draw(&Shape::circle((10.0, 10.0), 5.0), &style);
        let commands = log.take();
        assert_eq!(commands[0], Command::SetLineWidth(2.0));
        assert!(matches!(commands[1], Command::SetStroke(_)));
        assert!(matches!(commands[2], Command::SetFill(_)));
        assert_eq!(commands[3], Command::BeginPath);
        assert!(matches!(commands[4], Command::Ellipse { .. }));
        assert_eq!(commands[5], Command::Fill(FillRule::EvenOdd));
        assert_eq!(commands[6], Command::Stroke);
    }

    #[test]
    fn test_stroke_only_style_never_fills() {
        let (mut pencil, log) = pencil_with_log();
        let mut styles = Styles::new();
        let style = styles.style(StyleOptions::default().stroke(Color::BLACK));
        pencil.draw(&Shape::segment((0.0, 0.0), (10.0, 0.0)), &style);
        let commands = log.take();
        assert!(!commands.iter().any(|c| matches!(c, Command::Fill(_))));
        assert!(!commands.iter().any(|c| matches!(c, Command::SetFill(_))));
        assert_eq!(*commands.last().unwrap(), Command::Stroke);
    }

    #[test]
    fn test_style_memo_skips_redundant_writes() {
        let (mut pencil, log) = pencil_with_log();
        let mut styles = Styles::new();
        let red = styles.style(StyleOptions::default().fill(Color::rgb(1.0, 0.0, 0.0)));
        let blue = styles.style(StyleOptions::default().fill(Color::rgb(0.0, 0.0, 1.0)));
        let shape = Shape::circle((0.0, 0.0), 1.0);
        pencil.draw(&shape, &red);
        log.take();
        pencil.draw(&shape, &red);
        let second = log.take();
        assert!(!second.iter().any(|c| matches!(c, Command::SetFill(_))));
        pencil.draw(&shape, &blue);
        let third = log.take();
        assert!(third.iter().any(|c| matches!(c, Command::SetFill(_))));
    }

    #[test]
    fn test_memo_never_aliases_styles_from_separate_caches() {
        let (mut pencil, log) = pencil_with_log();
        let mut own = Styles::new();
        let mut foreign = Styles::new();
        let red = own.style(StyleOptions::default().fill(Color::rgb(1.0, 0.0, 0.0)));
        let blue = foreign.style(StyleOptions::default().fill(Color::rgb(0.0, 0.0, 1.0)));
        let shape = Shape::circle((0.0, 0.0), 1.0);
        pencil.draw(&shape, &red);
        log.take();
        // Both caches hand out their first style; the draw must still
        // reach the backend with the foreign fill.
        pencil.draw(&shape, &blue);
        let fills: Vec<Paint> = log
            .take()
            .into_iter()
            .filter_map(|c| match c {
                Command::SetFill(paint) => Some(paint),
                _ => None,
            })
            .collect();
        assert_eq!(fills, vec![Paint::Solid(Color::rgb(0.0, 0.0, 1.0))]);
    }

    #[test]
    fn test_restore_forgets_the_style_memo() {
        let (mut pencil, log) = pencil_with_log();
        let mut styles = Styles::new();
        let style = styles.style(StyleOptions::default().fill(Color::BLACK));
        let shape = Shape::circle((0.0, 0.0), 1.0);
        pencil.draw(&shape, &style);
        pencil.save();
        pencil.restore();
        log.take();
        pencil.draw(&shape, &style);
        let commands = log.take();
        assert!(commands.iter().any(|c| matches!(c, Command::SetFill(_))));
    }

    #[test]
    fn test_paintless_style_draws_nothing() {
        let (mut pencil, log) = pencil_with_log();
        let mut styles = Styles::new();
        let style = styles.style(StyleOptions::default());
        pencil.draw(&Shape::circle((0.0, 0.0), 5.0), &style);
        assert!(log.take().is_empty());
    }

    #[test]
    fn test_alpha_stack_sends_absolute_products() {
        let (mut pencil, log) = pencil_with_log();
        pencil.save();
        pencil.multiply_alpha(0.5);
        pencil.save();
        pencil.multiply_alpha(0.5);
        pencil.restore();
        pencil.save();
        pencil.multiply_alpha(0.8);
        let alphas: Vec<f64> = log
            .take()
            .into_iter()
            .filter_map(|c| match c {
                Command::SetAlpha(a) => Some(a),
                _ => None,
            })
            .collect();
        assert_eq!(alphas, vec![0.5, 0.25, 0.4]);
    }

    #[test]
    fn test_path_tracing_restarts_on_gaps() {
        let (mut pencil, log) = pencil_with_log();
        pencil.mask(&Shape::path(vec![
            Shape::segment((0.0, 0.0), (10.0, 0.0)),
            Shape::segment((20.0, 0.0), (30.0, 0.0)),
        ]));
        assert_eq!(
            log.take(),
            vec![
                Command::BeginPath,
                Command::MoveTo(Point::new(0.0, 0.0)),
                Command::LineTo(Point::new(10.0, 0.0)),
                Command::ClosePath,
                Command::MoveTo(Point::new(20.0, 0.0)),
                Command::LineTo(Point::new(30.0, 0.0)),
                Command::Clip,
            ]
        );
    }

    #[test]
    fn test_polygon_tracing_closes_the_contour() {
        let (mut pencil, log) = pencil_with_log();
        pencil.mask(&Shape::polygon(vec![
            Shape::segment((0.0, 0.0), (10.0, 0.0)),
            Shape::segment((10.0, 0.0), (5.0, 8.0)),
        ]));
        let commands = log.take();
        assert_eq!(commands[commands.len() - 2], Command::ClosePath);
        assert_eq!(*commands.last().unwrap(), Command::Clip);
    }

    #[test]
    fn test_text_style_memo() {
        let (mut pencil, log) = pencil_with_log();
        let mut styles = Styles::new();
        let style = styles.style(StyleOptions::default().fill(Color::BLACK));
        let text_style = styles.text_style(Default::default());
        pencil.draw_text("hi", Point::new(0.0, 0.0), &style, &text_style);
        log.take();
        pencil.draw_text("again", Point::new(0.0, 10.0), &style, &text_style);
        let commands = log.take();
        assert!(!commands.iter().any(|c| matches!(c, Command::SetTextStyle(_))));
        assert_eq!(
            *commands.last().unwrap(),
            Command::FillText("again".to_string(), Point::new(0.0, 10.0))
        );
    }

    #[test]
    fn test_measure_text_applies_the_text_style() {
        let (mut pencil, log) = pencil_with_log();
        let mut styles = Styles::new();
        let text_style = styles.text_style(Default::default());
        let metrics = pencil.measure_text("abc", &text_style);
        assert_eq!(metrics.width, 18.0);
        assert!(matches!(log.take()[0], Command::SetTextStyle(_)));
    }
}
