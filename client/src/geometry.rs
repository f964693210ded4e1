use std::collections::HashMap;

use waymark_shared::{GeoPoint, PointId};

use crate::engine::MarkerHandle;

pub const MIN_ZOOM: f64 = 2.0;
pub const MAX_ZOOM: f64 = 19.0;
pub const MARKER_HIT_RADIUS: f64 = 10.0;

// Web Mercator is undefined at the poles; clamp like every slippy map.
const MERCATOR_LAT_LIMIT: f64 = 85.051_128_78;

/// Project degrees onto the unit Web Mercator square.
pub fn project(point: GeoPoint) -> (f64, f64) {
    let lat = point.lat.clamp(-MERCATOR_LAT_LIMIT, MERCATOR_LAT_LIMIT);
    let x = (point.lng + 180.0) / 360.0;
    let lat_rad = lat.to_radians();
    let y = 0.5 - (std::f64::consts::FRAC_PI_4 + lat_rad / 2.0).tan().ln()
        / (2.0 * std::f64::consts::PI);
    (x, y)
}

pub fn unproject(x: f64, y: f64) -> GeoPoint {
    let lng = x * 360.0 - 180.0;
    let lat = (std::f64::consts::PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    GeoPoint::new(lat, lng)
}

pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Default view: Saint Joseph, IL at zoom 12.
    pub fn home() -> Self {
        Self {
            center: GeoPoint::new(40.11, -88.04),
            zoom: 12.0,
            width: 0.0,
            height: 0.0,
        }
    }

    fn world_scale(&self) -> f64 {
        256.0 * self.zoom.exp2()
    }

    pub fn world_to_screen(&self, point: GeoPoint) -> (f64, f64) {
        let (wx, wy) = project(point);
        let (cx, cy) = project(self.center);
        let scale = self.world_scale();
        (
            (wx - cx) * scale + self.width / 2.0,
            (wy - cy) * scale + self.height / 2.0,
        )
    }

    pub fn screen_to_geo(&self, sx: f64, sy: f64) -> GeoPoint {
        let (cx, cy) = project(self.center);
        let scale = self.world_scale();
        let wx = cx + (sx - self.width / 2.0) / scale;
        let wy = cy + (sy - self.height / 2.0) / scale;
        unproject(wx.rem_euclid(1.0), wy.clamp(0.0, 1.0))
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let (cx, cy) = project(self.center);
        let scale = self.world_scale();
        let wx = cx - dx / scale;
        let wy = (cy - dy / scale).clamp(0.0, 1.0);
        self.center = unproject(wx.rem_euclid(1.0), wy);
    }

    /// Zoom by a step while keeping the geographic point under the
    /// cursor fixed on screen.
    pub fn zoom_at(&mut self, step: f64, sx: f64, sy: f64) {
        let anchor = self.screen_to_geo(sx, sy);
        self.zoom = (self.zoom + step).clamp(MIN_ZOOM, MAX_ZOOM);
        let (ax, ay) = project(anchor);
        let scale = self.world_scale();
        let cx = ax - (sx - self.width / 2.0) / scale;
        let cy = (ay - (sy - self.height / 2.0) / scale).clamp(0.0, 1.0);
        self.center = unproject(cx.rem_euclid(1.0), cy);
    }
}

/// Topmost marker within the hit radius of a screen position, closest
/// one winning a tie between overlapping markers.
pub fn pick_marker(
    viewport: &Viewport,
    markers: &HashMap<PointId, MarkerHandle>,
    sx: f64,
    sy: f64,
) -> Option<PointId> {
    let mut best: Option<(PointId, f64)> = None;
    for (id, marker) in markers {
        let (mx, my) = viewport.world_to_screen(marker.position);
        let distance = ((mx - sx).powi(2) + (my - sy).powi(2)).sqrt();
        if distance > MARKER_HIT_RADIUS {
            continue;
        }
        if best.map_or(true, |(_, previous)| distance < previous) {
            best = Some((*id, distance));
        }
    }
    best.map(|(id, _)| id)
}
