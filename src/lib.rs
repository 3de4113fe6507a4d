pub use kurbo;

pub mod animation;
pub mod canvas;
pub mod events;
pub mod graph;
pub mod scene;
pub mod scheduler;
pub mod shape;
pub mod style;

// Internal: the canvas-command renderer behind Graph::render.
mod pencil;

pub mod prelude {
    pub use crate::animation::{
        animate, Animation, Easing, Ticker, Tween, TweenHandle, TweenStatus,
    };
    pub use crate::canvas::{Canvas, Command, FillRule, Recorder, TextMetrics};
    pub use crate::events::{
        CursorIcon, EventKind, EventResponse, InputEvent, ListenerId, NodeEvent, WheelDelta,
    };
    pub use crate::graph::{Graph, GraphOptions};
    pub use crate::scene::{Drawable, NodeId};
    pub use crate::scheduler::{FrameId, Scheduler};
    pub use crate::shape::{Path, Shape};
    pub use crate::style::{
        Color, LinearGradient, Paint, Style, StyleOptions, TextAlign, TextBaseline, TextStyle,
        TextStyleOptions,
    };
}
