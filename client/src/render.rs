use web_sys::CanvasRenderingContext2d;

use waymark_shared::GeoPoint;

use crate::geometry::Viewport;
use crate::state::State;

const BACKGROUND: &str = "#f4f1ea";
const GRATICULE: &str = "#d9d2c3";
const MARKER_RADIUS: f64 = 6.0;

const GRATICULE_STEPS: [f64; 12] = [
    45.0, 20.0, 10.0, 5.0, 2.0, 1.0, 0.5, 0.2, 0.1, 0.05, 0.02, 0.01,
];

fn graticule_step(viewport: &Viewport) -> f64 {
    let px_per_degree = 256.0 * viewport.zoom.exp2() / 360.0;
    for step in GRATICULE_STEPS {
        if step * px_per_degree >= 90.0 {
            continue;
        }
        return step;
    }
    GRATICULE_STEPS[GRATICULE_STEPS.len() - 1]
}

fn draw_graticule(ctx: &CanvasRenderingContext2d, viewport: &Viewport) {
    let step = graticule_step(viewport);
    let top_left = viewport.screen_to_geo(0.0, 0.0);
    let bottom_right = viewport.screen_to_geo(viewport.width, viewport.height);

    ctx.set_stroke_style_str(GRATICULE);
    ctx.set_line_width(1.0);

    let mut lng = (top_left.lng / step).floor() * step;
    while lng <= top_left.lng + 360.0 {
        let (x, _) = viewport.world_to_screen(GeoPoint::new(0.0, lng));
        if x > viewport.width {
            break;
        }
        if x >= 0.0 {
            ctx.begin_path();
            ctx.move_to(x, 0.0);
            ctx.line_to(x, viewport.height);
            ctx.stroke();
        }
        lng += step;
    }

    let mut lat = (bottom_right.lat / step).floor() * step;
    while lat <= top_left.lat + step {
        let (_, y) = viewport.world_to_screen(GeoPoint::new(lat, 0.0));
        if y >= 0.0 && y <= viewport.height {
            ctx.begin_path();
            ctx.move_to(0.0, y);
            ctx.line_to(viewport.width, y);
            ctx.stroke();
        }
        lat += step;
    }
}

fn draw_polyline(
    ctx: &CanvasRenderingContext2d,
    viewport: &Viewport,
    coordinates: &[GeoPoint],
    color: &str,
    width: f64,
    alpha: f64,
) {
    if coordinates.len() < 2 {
        return;
    }
    ctx.save();
    ctx.set_global_alpha(alpha);
    ctx.set_stroke_style_str(color);
    ctx.set_line_width(width);
    ctx.begin_path();
    let (x, y) = viewport.world_to_screen(coordinates[0]);
    ctx.move_to(x, y);
    for coordinate in &coordinates[1..] {
        let (x, y) = viewport.world_to_screen(*coordinate);
        ctx.line_to(x, y);
    }
    ctx.stroke();
    ctx.restore();
}

fn draw_marker(
    ctx: &CanvasRenderingContext2d,
    viewport: &Viewport,
    position: GeoPoint,
    color: &str,
    has_note: bool,
    highlighted: bool,
) {
    let (x, y) = viewport.world_to_screen(position);
    let radius = if highlighted {
        MARKER_RADIUS + 2.0
    } else {
        MARKER_RADIUS
    };
    ctx.set_fill_style_str(color);
    ctx.begin_path();
    let _ = ctx.arc(x, y, radius, 0.0, std::f64::consts::PI * 2.0);
    ctx.fill();
    ctx.set_stroke_style_str("#ffffff");
    ctx.set_line_width(2.0);
    ctx.begin_path();
    let _ = ctx.arc(x, y, radius, 0.0, std::f64::consts::PI * 2.0);
    ctx.stroke();
    if has_note {
        ctx.set_fill_style_str("#ffffff");
        ctx.begin_path();
        let _ = ctx.arc(x, y, 2.0, 0.0, std::f64::consts::PI * 2.0);
        ctx.fill();
    }
}

/// One full paint of the surface: graticule, persisted polylines,
/// markers, and the transient draw-session polyline on top.
pub fn redraw(state: &State) {
    let ctx = &state.ctx;
    let viewport = &state.viewport;

    ctx.set_fill_style_str(BACKGROUND);
    ctx.fill_rect(0.0, 0.0, viewport.width, viewport.height);
    draw_graticule(ctx, viewport);

    for polyline in state.engine.polylines.values() {
        draw_polyline(ctx, viewport, &polyline.coordinates, polyline.color, 2.0, 1.0);
    }

    for (id, marker) in &state.engine.markers {
        draw_marker(
            ctx,
            viewport,
            marker.position,
            marker.color,
            !marker.note.is_empty(),
            state.open_info == Some(*id),
        );
    }

    if let Some(transient) = state.engine.transient_path() {
        let color = state
            .engine
            .current_user()
            .and_then(|user| state.engine.meta_for(user.id))
            .map(|meta| meta.color)
            .unwrap_or("#1f1f1f");
        draw_polyline(ctx, viewport, transient, color, 4.0, 0.7);
    }
}
