//! Ticker-driven motion: a satellite circling a sun, with a trailing text
//! label, rendered headlessly onto a recording canvas.

use std::f64::consts::TAU;

use charcoal::prelude::*;

fn main() {
    env_logger::init();

    let recorder = Recorder::new();
    let graph = Graph::new(
        Box::new(recorder.clone()),
        GraphOptions::new(400.0, 400.0),
    );

    let sun_style = graph.style(StyleOptions::default().fill(Color::from_hex(0xf7c64f)));
    let satellite_style = graph.style(
        StyleOptions::default()
            .fill(Color::from_hex(0x4f86f7))
            .stroke(Color::BLACK),
    );
    let label_style = graph.style(StyleOptions::default().fill(Color::BLACK));
    let label_font = graph.text_style(TextStyleOptions::default().font("12px sans-serif"));

    // The pivot carries the rotation; the satellite sits at a fixed radius
    // inside it.
    let pivot = graph.create_container();
    let sun = graph.create_node(Shape::circle((0.0, 0.0), 30.0), &sun_style);
    let satellite = graph.create_node(Shape::circle((120.0, 0.0), 12.0), &satellite_style);
    let label = graph.create_text_node(
        "orbiting",
        kurbo::Point::new(40.0, -10.0),
        &label_style,
        &label_font,
    );
    graph.add(graph.root(), pivot);
    graph.add(pivot, sun);
    graph.add(pivot, satellite);
    graph.add(satellite, label);
    graph.set_position(pivot, 200.0, 200.0);

    // One full revolution every four seconds.
    let orbit = graph.clone();
    let ticker = Ticker::start(&graph.scheduler(), move |elapsed, _delta| {
        orbit.set_rotation(pivot, TAU * elapsed / 4000.0);
        orbit.request_render();
    });

    let mut timestamp = 0.0;
    for _ in 0..120 {
        graph.run_frame(timestamp);
        timestamp += 16.0;
    }
    ticker.stop();
    while graph.scheduler().needs_frame() {
        graph.run_frame(timestamp);
        timestamp += 16.0;
    }

    println!(
        "pivot rotation after {:.0}ms: {:.3} rad",
        timestamp,
        graph.rotation(pivot)
    );
    println!("recorded {} canvas commands", recorder.take().len());
}
