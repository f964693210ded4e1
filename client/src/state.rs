use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use waymark_shared::PointId;

use crate::engine::Engine;
use crate::geometry::Viewport;
use crate::mirror::Mirror;

/// Movement below this many pixels still counts as a click.
pub const CLICK_SLOP_PX: f64 = 4.0;

pub enum Drag {
    Idle,
    Pressed {
        last_x: f64,
        last_y: f64,
        moved: bool,
    },
}

pub struct State {
    pub canvas: HtmlCanvasElement,
    pub ctx: CanvasRenderingContext2d,
    pub engine: Engine,
    pub mirror: Mirror,
    pub viewport: Viewport,
    pub drag: Drag,
    pub open_info: Option<PointId>,
}

impl State {
    pub fn new(canvas: HtmlCanvasElement, ctx: CanvasRenderingContext2d) -> Self {
        Self {
            canvas,
            ctx,
            engine: Engine::new(),
            mirror: Mirror::new(),
            viewport: Viewport::home(),
            drag: Drag::Idle,
            open_info: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, Drag::Pressed { moved: true, .. })
    }

    /// The overlay anchor may vanish under us when a snapshot removes
    /// or hides the point; report whether it is still on the surface.
    pub fn info_anchor_alive(&self) -> bool {
        self.open_info
            .map_or(false, |id| self.engine.markers.contains_key(&id))
    }
}
