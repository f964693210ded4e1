use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, Event, HtmlButtonElement, HtmlCanvasElement,
    HtmlElement, HtmlInputElement, KeyboardEvent, MouseEvent, PointerEvent, WheelEvent, Window,
};

use waymark_shared::{ClientMessage, Collection, ServerMessage, UserProfile};

use crate::dom::{
    alert, event_to_screen, get_element, resize_canvas, set_map_cursor, set_path_button,
    set_status,
};
use crate::engine::{
    DrawingEnd, IdentityTransition, MapClick, MarkerClick, SnapshotReport, WriteRequest,
};
use crate::geometry::pick_marker;
use crate::legend::{legend_user_from_event, render_legend};
use crate::overlay::InfoPanel;
use crate::render::redraw;
use crate::state::{Drag, State, CLICK_SLOP_PX};
use crate::ws::{connect_ws, WsEvent, WsSender};

struct Ui {
    window: Window,
    document: Document,
    canvas: HtmlCanvasElement,
    status_el: Element,
    status_text: Element,
    name_input: HtmlInputElement,
    sign_in_button: HtmlButtonElement,
    sign_out_button: HtmlButtonElement,
    path_button: HtmlButtonElement,
    legend_el: HtmlElement,
    info: InfoPanel,
}

type SharedState = Rc<RefCell<State>>;
type SenderSlot = Rc<RefCell<Option<Rc<WsSender>>>>;

fn document_ready_state(document: &Document) -> Option<String> {
    js_sys::Reflect::get(document.as_ref(), &JsValue::from_str("readyState"))
        .ok()?
        .as_string()
}

fn sender(slot: &SenderSlot) -> Option<Rc<WsSender>> {
    slot.borrow().clone().filter(|sender| sender.is_open())
}

/// Direct user actions need the data service; failing that is a
/// blocking report, not a silent drop.
fn send_or_alert(ui: &Ui, slot: &SenderSlot, message: ClientMessage) -> bool {
    match sender(slot) {
        Some(sender) => {
            sender.send(&message);
            true
        }
        None => {
            alert(&ui.window, "Not connected. Try again in a moment.");
            false
        }
    }
}

fn send_many(slot: &SenderSlot, messages: Vec<ClientMessage>) {
    if let Some(sender) = sender(slot) {
        sender.send_all(&messages);
    }
}

fn sync_legend(ui: &Ui, state: &State) {
    render_legend(&ui.document, &ui.legend_el, &state.engine.legend_entries());
}

/// Re-anchor or close the info panel after anything that may have
/// moved or removed its marker.
fn refresh_info(ui: &Ui, state: &mut State) {
    let Some(id) = state.open_info else {
        ui.info.close();
        return;
    };
    if !state.info_anchor_alive() {
        state.open_info = None;
        ui.info.close();
        return;
    }
    let Some(point) = state.engine.point(id).cloned() else {
        state.open_info = None;
        ui.info.close();
        return;
    };
    let owner_name = state
        .engine
        .meta_for(point.owner)
        .map(|meta| meta.name.clone())
        .unwrap_or_default();
    let is_owner = state.engine.current_user().map(|user| user.id) == Some(point.owner);
    let anchor = state.viewport.world_to_screen(point.position);
    ui.info.open(&point, &owner_name, is_owner, anchor);
}

fn report_skips(collection: Collection, report: SnapshotReport) {
    if report.skipped > 0 {
        web_sys::console::warn_1(
            &format!(
                "Skipped {} malformed document(s) in {} delivery",
                report.skipped,
                collection.as_str()
            )
            .into(),
        );
    }
}

fn apply_auth(ui: &Ui, state: &SharedState, slot: &SenderSlot, user: Option<UserProfile>) {
    let transition = state.borrow_mut().engine.set_identity(user);
    match transition {
        IdentityTransition::SignedIn(profile) => {
            let subscriptions = {
                let mut state = state.borrow_mut();
                let mut messages = state.mirror.subscribe(Collection::Points);
                messages.extend(state.mirror.subscribe(Collection::Paths));
                messages
            };
            send_many(slot, subscriptions);
            ui.name_input.set_hidden(true);
            ui.sign_in_button.set_hidden(true);
            ui.sign_out_button.set_hidden(false);
            ui.path_button.set_hidden(false);
            set_status(
                &ui.status_el,
                &ui.status_text,
                "signed-in",
                &format!("Signed in as {}", profile.name),
            );
        }
        IdentityTransition::SignedOut => {
            let teardown = state.borrow_mut().mirror.unsubscribe_all();
            send_many(slot, teardown);
            ui.name_input.set_hidden(false);
            ui.sign_in_button.set_hidden(false);
            ui.sign_out_button.set_hidden(true);
            ui.path_button.set_hidden(true);
            set_path_button(&ui.path_button, false);
            set_status(&ui.status_el, &ui.status_text, "signed-out", "Signed out");
        }
        IdentityTransition::Unchanged => return,
    }
    let mut state = state.borrow_mut();
    state.open_info = None;
    refresh_info(ui, &mut state);
    sync_legend(ui, &state);
    set_map_cursor(&ui.canvas, state.engine.is_drawing(), false);
    redraw(&state);
}

fn handle_server_message(ui: &Ui, state: &SharedState, slot: &SenderSlot, message: ServerMessage) {
    match message {
        ServerMessage::AuthState { user } => apply_auth(ui, state, slot, user),
        ServerMessage::UsersSync { users } => {
            let mut state = state.borrow_mut();
            state.engine.observe_users(users);
            sync_legend(ui, &state);
        }
        ServerMessage::UserSeen { user } => {
            let mut state = state.borrow_mut();
            state.engine.observe_user(user);
            sync_legend(ui, &state);
        }
        ServerMessage::PointsSync { points } => {
            let mut state = state.borrow_mut();
            if !state.mirror.accepts(Collection::Points) {
                return;
            }
            let report = state.engine.apply_points_sync(points);
            report_skips(Collection::Points, report);
            refresh_info(ui, &mut state);
            sync_legend(ui, &state);
            redraw(&state);
        }
        ServerMessage::PointAdded { point } | ServerMessage::PointModified { point } => {
            let mut state = state.borrow_mut();
            if !state.mirror.accepts(Collection::Points) {
                return;
            }
            let report = state.engine.apply_point_upsert(point);
            report_skips(Collection::Points, report);
            refresh_info(ui, &mut state);
            sync_legend(ui, &state);
            redraw(&state);
        }
        ServerMessage::PointRemoved { id } => {
            let mut state = state.borrow_mut();
            if !state.mirror.accepts(Collection::Points) {
                return;
            }
            state.engine.apply_point_removed(id);
            refresh_info(ui, &mut state);
            redraw(&state);
        }
        ServerMessage::PathsSync { paths } => {
            let mut state = state.borrow_mut();
            if !state.mirror.accepts(Collection::Paths) {
                return;
            }
            let report = state.engine.apply_paths_sync(paths);
            report_skips(Collection::Paths, report);
            sync_legend(ui, &state);
            redraw(&state);
        }
        ServerMessage::PathSet { path } => {
            let mut state = state.borrow_mut();
            if !state.mirror.accepts(Collection::Paths) {
                return;
            }
            let report = state.engine.apply_path_set(path);
            report_skips(Collection::Paths, report);
            sync_legend(ui, &state);
            redraw(&state);
        }
        ServerMessage::PathRemoved { owner } => {
            let mut state = state.borrow_mut();
            if !state.mirror.accepts(Collection::Paths) {
                return;
            }
            state.engine.apply_path_removed(owner);
            redraw(&state);
        }
        ServerMessage::Error { op, reason } => match op.as_str() {
            "auth:sign-in" | "point:create" | "point:note" | "point:delete" | "path:set"
            | "path:delete" => {
                alert(&ui.window, &format!("{op} failed: {reason}"));
            }
            _ => {
                web_sys::console::error_1(&format!("Server error op={op} reason={reason}").into());
            }
        },
    }
}

fn attempt_sign_in(ui: &Ui, slot: &SenderSlot) {
    let name = ui.name_input.value();
    if name.trim().is_empty() {
        alert(&ui.window, "Enter a display name to sign in.");
        return;
    }
    send_or_alert(ui, slot, ClientMessage::SignIn { name });
}

fn delete_point(ui: &Ui, state: &SharedState, slot: &SenderSlot, id: waymark_shared::PointId) {
    let request = state.borrow_mut().engine.request_delete(id);
    match request {
        WriteRequest::Send(message) => {
            send_or_alert(ui, slot, message);
            let mut state = state.borrow_mut();
            if state.open_info == Some(id) {
                state.open_info = None;
            }
            refresh_info(ui, &mut state);
            redraw(&state);
        }
        WriteRequest::NotOwner => alert(&ui.window, "You can only delete your own points."),
        WriteRequest::Unknown => {}
    }
}

fn handle_primary_click(ui: &Ui, state: &SharedState, slot: &SenderSlot, sx: f64, sy: f64) {
    let hit = {
        let state = state.borrow();
        pick_marker(&state.viewport, &state.engine.markers, sx, sy)
    };

    if let Some(id) = hit {
        let outcome = state.borrow_mut().engine.marker_clicked(id);
        match outcome {
            MarkerClick::OpenInfo(id) => {
                let mut state = state.borrow_mut();
                state.open_info = Some(id);
                refresh_info(ui, &mut state);
                redraw(&state);
            }
            MarkerClick::PathAppended(count) => {
                let state = state.borrow();
                set_status(
                    &ui.status_el,
                    &ui.status_text,
                    "drawing",
                    &format!("Path point {count} added"),
                );
                redraw(&state);
            }
            MarkerClick::NotYourPoint => {
                set_status(
                    &ui.status_el,
                    &ui.status_text,
                    "drawing",
                    "Only your own points can join your path",
                );
            }
            MarkerClick::Unknown => {}
        }
        return;
    }

    let position = state.borrow().viewport.screen_to_geo(sx, sy);
    let outcome = state.borrow_mut().engine.map_clicked(position);
    match outcome {
        MapClick::Create(message) => {
            send_or_alert(ui, slot, message);
        }
        MapClick::DrawingGuidance => {
            set_status(
                &ui.status_el,
                &ui.status_text,
                "drawing",
                "Path mode: click your markers in order, then end the path",
            );
        }
        MapClick::NotSignedIn => {
            set_status(
                &ui.status_el,
                &ui.status_text,
                "signed-out",
                "Sign in to add points",
            );
        }
    }
    let mut state = state.borrow_mut();
    if state.open_info.take().is_some() {
        refresh_info(ui, &mut state);
        redraw(&state);
    }
}

#[wasm_bindgen(start)]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;
    let started = Rc::new(Cell::new(false));

    if document_ready_state(&document).as_deref() == Some("complete") {
        started.set(true);
        return start_app();
    }

    let onload_started = started.clone();
    let onload = Closure::<dyn FnMut(Event)>::new(move |_| {
        if onload_started.replace(true) {
            return;
        }
        if let Err(err) = start_app() {
            web_sys::console::error_1(&err);
        }
    });
    window.add_event_listener_with_callback("load", onload.as_ref().unchecked_ref())?;
    onload.forget();

    Ok(())
}

fn start_app() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;

    let canvas: HtmlCanvasElement = get_element(&document, "map")?;
    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("Missing canvas context"))?
        .dyn_into::<CanvasRenderingContext2d>()?;
    ctx.set_line_cap("round");
    ctx.set_line_join("round");

    let ui = Rc::new(Ui {
        canvas: canvas.clone(),
        status_el: document
            .get_element_by_id("status")
            .ok_or_else(|| JsValue::from_str("Missing status element"))?,
        status_text: document
            .get_element_by_id("statusText")
            .ok_or_else(|| JsValue::from_str("Missing status text"))?,
        name_input: get_element(&document, "nameInput")?,
        sign_in_button: get_element(&document, "signIn")?,
        sign_out_button: get_element(&document, "signOut")?,
        path_button: get_element(&document, "pathToggle")?,
        legend_el: get_element(&document, "legend")?,
        info: InfoPanel::from_document(&document)?,
        window: window.clone(),
        document: document.clone(),
    });

    let state: SharedState = Rc::new(RefCell::new(State::new(canvas.clone(), ctx)));
    let sender_slot: SenderSlot = Rc::new(RefCell::new(None));

    ui.sign_out_button.set_hidden(true);
    ui.path_button.set_hidden(true);
    set_path_button(&ui.path_button, false);
    ui.info.close();
    set_status(&ui.status_el, &ui.status_text, "connecting", "Connecting...");
    set_map_cursor(&canvas, false, false);
    resize_canvas(&window, &mut state.borrow_mut());

    {
        let ui = ui.clone();
        let state = state.clone();
        let slot = sender_slot.clone();
        let ws_sender = connect_ws(&window, move |event| match event {
            WsEvent::Open => {
                set_status(&ui.status_el, &ui.status_text, "open", "Live connection");
            }
            WsEvent::Close => {
                set_status(&ui.status_el, &ui.status_text, "closed", "Offline");
            }
            WsEvent::Error => {
                web_sys::console::error_1(&"WebSocket error".into());
                set_status(&ui.status_el, &ui.status_text, "closed", "Connection error");
            }
            WsEvent::Message(message) => handle_server_message(&ui, &state, &slot, message),
        })?;
        sender_slot.borrow_mut().replace(ws_sender);
    }

    {
        let window_cb = window.clone();
        let state = state.clone();
        let ui = ui.clone();
        let onresize = Closure::<dyn FnMut(Event)>::new(move |_| {
            let mut state = state.borrow_mut();
            resize_canvas(&window_cb, &mut state);
            refresh_info(&ui, &mut state);
        });
        window.add_event_listener_with_callback("resize", onresize.as_ref().unchecked_ref())?;
        onresize.forget();
    }

    {
        let state = state.clone();
        let canvas_cb = canvas.clone();
        let onpointerdown = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if event.button() != 0 {
                return;
            }
            let Some((sx, sy)) = event_to_screen(&canvas_cb, &event) else {
                return;
            };
            let _ = canvas_cb.set_pointer_capture(event.pointer_id());
            state.borrow_mut().drag = Drag::Pressed {
                last_x: sx,
                last_y: sy,
                moved: false,
            };
        });
        canvas.add_event_listener_with_callback(
            "pointerdown",
            onpointerdown.as_ref().unchecked_ref(),
        )?;
        onpointerdown.forget();
    }

    {
        let state = state.clone();
        let ui = ui.clone();
        let canvas_cb = canvas.clone();
        let onpointermove = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            let Some((sx, sy)) = event_to_screen(&canvas_cb, &event) else {
                return;
            };
            let mut state = state.borrow_mut();
            let Drag::Pressed {
                last_x,
                last_y,
                moved,
            } = &mut state.drag
            else {
                return;
            };
            let dx = sx - *last_x;
            let dy = sy - *last_y;
            if !*moved && dx.abs() < CLICK_SLOP_PX && dy.abs() < CLICK_SLOP_PX {
                return;
            }
            *moved = true;
            *last_x = sx;
            *last_y = sy;
            state.viewport.pan_by(dx, dy);
            set_map_cursor(&canvas_cb, state.engine.is_drawing(), true);
            refresh_info(&ui, &mut state);
            redraw(&state);
        });
        canvas.add_event_listener_with_callback(
            "pointermove",
            onpointermove.as_ref().unchecked_ref(),
        )?;
        onpointermove.forget();
    }

    {
        let state = state.clone();
        let ui = ui.clone();
        let slot = sender_slot.clone();
        let canvas_cb = canvas.clone();
        let onpointerup = Closure::<dyn FnMut(PointerEvent)>::new(move |event: PointerEvent| {
            if event.button() != 0 {
                return;
            }
            let was_click = {
                let mut state = state.borrow_mut();
                let was_click = !state.is_dragging();
                state.drag = Drag::Idle;
                was_click
            };
            set_map_cursor(&canvas_cb, state.borrow().engine.is_drawing(), false);
            if !was_click {
                return;
            }
            let Some((sx, sy)) = event_to_screen(&canvas_cb, &event) else {
                return;
            };
            handle_primary_click(&ui, &state, &slot, sx, sy);
        });
        canvas
            .add_event_listener_with_callback("pointerup", onpointerup.as_ref().unchecked_ref())?;
        onpointerup.forget();
    }

    {
        let state = state.clone();
        let ui = ui.clone();
        let slot = sender_slot.clone();
        let canvas_cb = canvas.clone();
        let oncontextmenu = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
            event.prevent_default();
            let Some((sx, sy)) = event_to_screen(&canvas_cb, &event) else {
                return;
            };
            let hit = {
                let state = state.borrow();
                pick_marker(&state.viewport, &state.engine.markers, sx, sy)
            };
            if let Some(id) = hit {
                delete_point(&ui, &state, &slot, id);
            }
        });
        canvas.add_event_listener_with_callback(
            "contextmenu",
            oncontextmenu.as_ref().unchecked_ref(),
        )?;
        oncontextmenu.forget();
    }

    {
        let state = state.clone();
        let ui = ui.clone();
        let canvas_cb = canvas.clone();
        let onwheel = Closure::<dyn FnMut(WheelEvent)>::new(move |event: WheelEvent| {
            event.prevent_default();
            let Some((sx, sy)) = event_to_screen(&canvas_cb, &event) else {
                return;
            };
            let step = if event.delta_y() < 0.0 { 0.5 } else { -0.5 };
            let mut state = state.borrow_mut();
            state.viewport.zoom_at(step, sx, sy);
            refresh_info(&ui, &mut state);
            redraw(&state);
        });
        canvas.add_event_listener_with_callback("wheel", onwheel.as_ref().unchecked_ref())?;
        onwheel.forget();
    }

    {
        let ui_cb = ui.clone();
        let slot = sender_slot.clone();
        let onsignin = Closure::<dyn FnMut(Event)>::new(move |_| {
            attempt_sign_in(&ui_cb, &slot);
        });
        ui.sign_in_button
            .add_event_listener_with_callback("click", onsignin.as_ref().unchecked_ref())?;
        onsignin.forget();
    }

    {
        let ui_cb = ui.clone();
        let slot = sender_slot.clone();
        let onkeydown = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
            if event.key() == "Enter" {
                attempt_sign_in(&ui_cb, &slot);
            }
        });
        ui.name_input
            .add_event_listener_with_callback("keydown", onkeydown.as_ref().unchecked_ref())?;
        onkeydown.forget();
    }

    {
        let ui_cb = ui.clone();
        let state = state.clone();
        let slot = sender_slot.clone();
        let onsignout = Closure::<dyn FnMut(Event)>::new(move |_| {
            match sender(&slot) {
                Some(sender) => sender.send(&ClientMessage::SignOut),
                // Offline sign-out still clears everything locally.
                None => apply_auth(&ui_cb, &state, &slot, None),
            }
        });
        ui.sign_out_button
            .add_event_listener_with_callback("click", onsignout.as_ref().unchecked_ref())?;
        onsignout.forget();
    }

    {
        let ui_cb = ui.clone();
        let state = state.clone();
        let slot = sender_slot.clone();
        let onpathtoggle = Closure::<dyn FnMut(Event)>::new(move |_| {
            let drawing = state.borrow().engine.is_drawing();
            if drawing {
                let outcome = state.borrow_mut().engine.end_drawing();
                match outcome {
                    DrawingEnd::Save(message) => {
                        send_or_alert(&ui_cb, &slot, message);
                        set_status(&ui_cb.status_el, &ui_cb.status_text, "open", "Path saved");
                    }
                    DrawingEnd::NotEnoughPoints => {
                        set_status(
                            &ui_cb.status_el,
                            &ui_cb.status_text,
                            "open",
                            "Not enough points for a path (need 2)",
                        );
                    }
                }
            } else {
                let started = state.borrow_mut().engine.begin_drawing().is_ok();
                if !started {
                    alert(&ui_cb.window, "Sign in to draw a path.");
                    return;
                }
                set_status(
                    &ui_cb.status_el,
                    &ui_cb.status_text,
                    "drawing",
                    "Path mode: click your markers in order, then end the path",
                );
            }
            let state = state.borrow();
            set_path_button(&ui_cb.path_button, state.engine.is_drawing());
            set_map_cursor(&ui_cb.canvas, state.engine.is_drawing(), false);
            redraw(&state);
        });
        ui.path_button
            .add_event_listener_with_callback("click", onpathtoggle.as_ref().unchecked_ref())?;
        onpathtoggle.forget();
    }

    {
        let ui_cb = ui.clone();
        let state = state.clone();
        let onlegend = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Some(user) = legend_user_from_event(&event) else {
                return;
            };
            let mut state = state.borrow_mut();
            state.engine.toggle_visibility(user);
            sync_legend(&ui_cb, &state);
            refresh_info(&ui_cb, &mut state);
            redraw(&state);
        });
        ui.legend_el
            .add_event_listener_with_callback("change", onlegend.as_ref().unchecked_ref())?;
        onlegend.forget();
    }

    {
        let ui_cb = ui.clone();
        let state = state.clone();
        let slot = sender_slot.clone();
        let onsave = Closure::<dyn FnMut(Event)>::new(move |_| {
            let Some(id) = state.borrow().open_info else {
                return;
            };
            let note = ui_cb.info.note_value();
            let request = state.borrow_mut().engine.request_note_update(id, note);
            match request {
                WriteRequest::Send(message) => {
                    send_or_alert(&ui_cb, &slot, message);
                    let state = state.borrow();
                    redraw(&state);
                }
                WriteRequest::NotOwner => {
                    alert(&ui_cb.window, "You can only edit notes on your own points.");
                }
                WriteRequest::Unknown => {}
            }
        });
        ui.info
            .save_button
            .add_event_listener_with_callback("click", onsave.as_ref().unchecked_ref())?;
        onsave.forget();
    }

    {
        let ui_cb = ui.clone();
        let state = state.clone();
        let slot = sender_slot.clone();
        let ondelete = Closure::<dyn FnMut(Event)>::new(move |_| {
            let Some(id) = state.borrow().open_info else {
                return;
            };
            delete_point(&ui_cb, &state, &slot, id);
        });
        ui.info
            .delete_button
            .add_event_listener_with_callback("click", ondelete.as_ref().unchecked_ref())?;
        ondelete.forget();
    }

    Ok(())
}
