//! Immutable, cache-deduplicated drawing styles.
//!
//! Styles are value objects: two requests with the same options yield the
//! identical instance, so the renderer can detect "style unchanged" by
//! comparing handles instead of option sets. The cache lives in [`Styles`],
//! owned by the graph that uses it.

use std::collections::HashMap;
use std::rc::Rc;

use kurbo::Point;

/// An RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from a `0xRRGGBB` value.
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
            a: 1.0,
        }
    }

    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
}

impl Default for Color {
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

/// A linear gradient between two points in local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub start: Point,
    pub end: Point,
    /// Color stops as `(offset, color)` with offsets in `[0, 1]`.
    pub stops: Vec<(f64, Color)>,
}

impl LinearGradient {
    pub fn new(start: impl Into<Point>, end: impl Into<Point>, stops: Vec<(f64, Color)>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            stops,
        }
    }
}

/// What to paint a fill or stroke with.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Linear(LinearGradient),
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Solid(color)
    }
}

impl From<LinearGradient> for Paint {
    fn from(gradient: LinearGradient) -> Self {
        Paint::Linear(gradient)
    }
}

/// Options describing a [`Style`] before it is interned.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleOptions {
    pub line_width: f64,
    pub stroke: Option<Paint>,
    pub fill: Option<Paint>,
}

impl StyleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }

    pub fn stroke(mut self, paint: impl Into<Paint>) -> Self {
        self.stroke = Some(paint.into());
        self
    }

    pub fn fill(mut self, paint: impl Into<Paint>) -> Self {
        self.fill = Some(paint.into());
        self
    }
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            stroke: None,
            fill: None,
        }
    }
}

/// An interned drawing style. Cheap to clone; equality is instance
/// identity, which interning makes equivalent to option-set equality.
#[derive(Debug, Clone)]
pub struct Style(Rc<StyleOptions>);

impl Style {
    pub fn line_width(&self) -> f64 {
        self.0.line_width
    }

    pub fn stroke(&self) -> Option<&Paint> {
        self.0.stroke.as_ref()
    }

    pub fn fill(&self) -> Option<&Paint> {
        self.0.fill.as_ref()
    }
}

impl PartialEq for Style {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Horizontal text anchoring, canvas semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextAlign {
    #[default]
    Start,
    End,
    Left,
    Right,
    Center,
}

/// Vertical text anchoring, canvas semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextBaseline {
    #[default]
    Alphabetic,
    Top,
    Hanging,
    Middle,
    Ideographic,
    Bottom,
}

/// Options describing a [`TextStyle`] before it is interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextStyleOptions {
    /// CSS-style font shorthand, e.g. `"12px sans-serif"`.
    pub font: String,
    pub align: TextAlign,
    pub baseline: TextBaseline,
}

impl TextStyleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font(mut self, font: impl Into<String>) -> Self {
        self.font = font.into();
        self
    }

    pub fn align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn baseline(mut self, baseline: TextBaseline) -> Self {
        self.baseline = baseline;
        self
    }
}

impl Default for TextStyleOptions {
    fn default() -> Self {
        Self {
            font: "10px sans-serif".to_string(),
            align: TextAlign::default(),
            baseline: TextBaseline::default(),
        }
    }
}

/// An interned text style. Cheap to clone; equality is instance
/// identity, which interning makes equivalent to option-set equality.
#[derive(Debug, Clone)]
pub struct TextStyle(Rc<TextStyleOptions>);

impl TextStyle {
    pub fn font(&self) -> &str {
        &self.0.font
    }

    pub fn align(&self) -> TextAlign {
        self.0.align
    }

    pub fn baseline(&self) -> TextBaseline {
        self.0.baseline
    }
}

impl PartialEq for TextStyle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// Cache keys canonicalize floats to their bit patterns so the public types
// keep ordinary float equality.
#[derive(PartialEq, Eq, Hash)]
struct StyleKey {
    line_width: u64,
    stroke: Option<PaintKey>,
    fill: Option<PaintKey>,
}

#[derive(PartialEq, Eq, Hash)]
enum PaintKey {
    Solid([u32; 4]),
    Linear {
        start: [u64; 2],
        end: [u64; 2],
        stops: Vec<(u64, [u32; 4])>,
    },
}

fn color_key(color: &Color) -> [u32; 4] {
    [
        color.r.to_bits(),
        color.g.to_bits(),
        color.b.to_bits(),
        color.a.to_bits(),
    ]
}

fn paint_key(paint: &Paint) -> PaintKey {
    match paint {
        Paint::Solid(color) => PaintKey::Solid(color_key(color)),
        Paint::Linear(gradient) => PaintKey::Linear {
            start: [gradient.start.x.to_bits(), gradient.start.y.to_bits()],
            end: [gradient.end.x.to_bits(), gradient.end.y.to_bits()],
            stops: gradient
                .stops
                .iter()
                .map(|(offset, color)| (offset.to_bits(), color_key(color)))
                .collect(),
        },
    }
}

fn style_key(options: &StyleOptions) -> StyleKey {
    StyleKey {
        line_width: options.line_width.to_bits(),
        stroke: options.stroke.as_ref().map(paint_key),
        fill: options.fill.as_ref().map(paint_key),
    }
}

/// Interning cache for [`Style`] and [`TextStyle`] instances.
///
/// Equal option sets return the identical instance for the lifetime of the
/// cache, which is what makes identity comparison in the renderer sound.
#[derive(Default)]
pub struct Styles {
    styles: HashMap<StyleKey, Style>,
    text_styles: HashMap<TextStyleOptions, TextStyle>,
}

impl Styles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `options`, returning the shared instance for that option set.
    pub fn style(&mut self, options: StyleOptions) -> Style {
        let key = style_key(&options);
        if let Some(style) = self.styles.get(&key) {
            return style.clone();
        }
        let style = Style(Rc::new(options));
        self.styles.insert(key, style.clone());
        style
    }

    /// Intern `options`, returning the shared instance for that option set.
    pub fn text_style(&mut self, options: TextStyleOptions) -> TextStyle {
        if let Some(style) = self.text_styles.get(&options) {
            return style.clone();
        }
        let style = TextStyle(Rc::new(options.clone()));
        self.text_styles.insert(options, style.clone());
        style
    }
}
