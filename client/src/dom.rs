use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Document, Element, HtmlButtonElement, HtmlCanvasElement, HtmlElement, MouseEvent, Window,
};

use crate::render::redraw;
use crate::state::State;

pub fn get_element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    let element = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing element: {id}")))?;
    element
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("Invalid element type: {id}")))
}

pub fn set_status(status_el: &Element, status_text: &Element, state: &str, text: &str) {
    let _ = status_el.set_attribute("data-state", state);
    status_text.set_text_content(Some(text));
}

/// Blocking report for a failed user-initiated action.
pub fn alert(window: &Window, text: &str) {
    let _ = window.alert_with_message(text);
}

pub fn set_path_button(button: &HtmlButtonElement, drawing: bool) {
    button.set_text_content(Some(if drawing { "End Path" } else { "Start Path" }));
    let pressed = if drawing { "true" } else { "false" };
    let _ = button.set_attribute("aria-pressed", pressed);
}

pub fn set_map_cursor(canvas: &HtmlCanvasElement, drawing: bool, dragging: bool) {
    let cursor = if dragging {
        "grabbing"
    } else if drawing {
        "pointer"
    } else {
        "crosshair"
    };
    if let Ok(element) = canvas.clone().dyn_into::<HtmlElement>() {
        let _ = element.style().set_property("cursor", cursor);
    }
}

pub fn resize_canvas(window: &Window, state: &mut State) {
    let rect = state.canvas.get_bounding_client_rect();
    let dpr = window.device_pixel_ratio();
    state.canvas.set_width((rect.width() * dpr) as u32);
    state.canvas.set_height((rect.height() * dpr) as u32);
    let _ = state.ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
    state.viewport.width = rect.width();
    state.viewport.height = rect.height();
    redraw(state);
}

/// Pointer position relative to the canvas, in CSS pixels.
pub fn event_to_screen(canvas: &HtmlCanvasElement, event: &MouseEvent) -> Option<(f64, f64)> {
    let rect = canvas.get_bounding_client_rect();
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        return None;
    }
    Some((
        event.client_x() as f64 - rect.left(),
        event.client_y() as f64 - rect.top(),
    ))
}
