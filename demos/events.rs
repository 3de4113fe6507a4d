//! Pointer-event walkthrough: hover-scale, drag and wheel-zoom on one
//! circle, driven by a scripted input session over a recording canvas.
//!
//! Run with `RUST_LOG=debug cargo run --example events_demo` to watch the
//! dispatch machinery log.

use charcoal::prelude::*;

fn main() {
    env_logger::init();

    let recorder = Recorder::new();
    let graph = Graph::new(
        Box::new(recorder.clone()),
        GraphOptions::new(400.0, 300.0),
    );

    let fill = graph.style(StyleOptions::default().fill(Color::from_hex(0x4f86f7)));
    let circle = graph.create_node(Shape::circle((0.0, 0.0), 24.0), &fill);
    graph.add(graph.root(), circle);
    graph.set_position(circle, 200.0, 150.0);
    graph.set_cursor(circle, CursorIcon::Grab);

    // One animation slot for the hover scale, shared by both listeners so a
    // quick over/out flicker restarts instead of stacking tweens.
    let hover = Animation::new();
    let scheduler = graph.scheduler();

    let grow = hover.clone();
    let grow_scheduler = scheduler.clone();
    graph.on(circle, EventKind::PointerOver, move |graph, event| {
        let node = event.node;
        let target = graph.clone();
        let from = graph.scale(node);
        grow.start(
            &grow_scheduler,
            Tween::new(from, 1.25).duration(150.0),
            move |value, _| {
                target.set_scale(node, value);
                target.request_render();
            },
        );
    });

    let shrink = hover.clone();
    let shrink_scheduler = scheduler.clone();
    graph.on(circle, EventKind::PointerOut, move |graph, event| {
        let node = event.node;
        let target = graph.clone();
        let from = graph.scale(node);
        shrink.start(
            &shrink_scheduler,
            Tween::new(from, 1.0).duration(150.0),
            move |value, _| {
                target.set_scale(node, value);
                target.request_render();
            },
        );
    });

    // Dragging follows the pointer step by step.
    graph.on(circle, EventKind::DragMove, |graph, event| {
        let offset = event.offset().expect("drag event carries an offset");
        let position = graph.position(event.node);
        graph.set_position(event.node, position.x + offset.x, position.y + offset.y);
        graph.request_render();
    });

    // Wheel zooms the circle in place.
    graph.on(circle, EventKind::Wheel, |graph, event| {
        let delta = event.wheel_delta().expect("wheel event carries a delta");
        let factor = if delta.y < 0.0 { 1.1 } else { 0.9 };
        graph.set_scale(event.node, graph.scale(event.node) * factor);
        graph.request_render();
    });

    graph.render();

    // A scripted pointer session standing in for a host's input feed.
    let script = [
        InputEvent::PointerMove { x: 60.0, y: 60.0 },
        InputEvent::PointerMove { x: 200.0, y: 150.0 },
        InputEvent::PointerDown { x: 200.0, y: 150.0 },
        InputEvent::PointerMove { x: 240.0, y: 170.0 },
        InputEvent::PointerMove { x: 280.0, y: 190.0 },
        InputEvent::PointerUp { x: 280.0, y: 190.0 },
        InputEvent::Wheel {
            x: 280.0,
            y: 190.0,
            delta: WheelDelta::new(0.0, -3.0),
        },
        InputEvent::PointerMove { x: 30.0, y: 30.0 },
    ];

    let mut timestamp = 0.0;
    for event in &script {
        let response = graph.dispatch(event);
        println!("{event:?} -> {response:?}, cursor {:?}", graph.cursor());
        for _ in 0..4 {
            graph.run_frame(timestamp);
            timestamp += 16.0;
        }
    }
    while graph.scheduler().needs_frame() {
        graph.run_frame(timestamp);
        timestamp += 16.0;
    }

    println!(
        "circle settled at {:?}, scale {:.2}",
        graph.position(circle),
        graph.scale(circle)
    );
    println!("recorded {} canvas commands", recorder.take().len());
}
