use uuid::Uuid;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, HtmlElement, HtmlInputElement};

use waymark_shared::UserId;

/// Rebuild the legend list: one row per known user with their color
/// swatch, display name, and a visibility checkbox.
pub fn render_legend(
    document: &Document,
    legend_el: &HtmlElement,
    entries: &[(UserId, String, &'static str, bool)],
) {
    legend_el.set_inner_html("");
    for (user, name, color, visible) in entries {
        let Ok(row_el) = document.create_element("li") else {
            continue;
        };
        let Ok(row) = row_el.dyn_into::<HtmlElement>() else {
            continue;
        };
        let _ = row.set_attribute("class", "legend-row");

        if let Ok(input_el) = document.create_element("input") {
            if let Ok(checkbox) = input_el.dyn_into::<HtmlInputElement>() {
                let _ = checkbox.set_attribute("type", "checkbox");
                let _ = checkbox.set_attribute("data-uid", &user.to_string());
                let _ = checkbox.set_attribute("aria-label", &format!("Show points for {name}"));
                checkbox.set_checked(*visible);
                let _ = row.append_child(&checkbox);
            }
        }

        if let Ok(swatch_el) = document.create_element("span") {
            if let Ok(swatch) = swatch_el.dyn_into::<HtmlElement>() {
                let _ = swatch.set_attribute("class", "legend-swatch");
                let _ = swatch.style().set_property("background", color);
                let _ = row.append_child(&swatch);
            }
        }

        if let Ok(label) = document.create_element("span") {
            let _ = label.set_attribute("class", "legend-name");
            label.set_text_content(Some(name));
            let _ = row.append_child(&label);
        }

        let _ = legend_el.append_child(&row);
    }
}

/// Resolve a change event inside the legend to the user whose
/// checkbox was flipped.
pub fn legend_user_from_event(event: &Event) -> Option<UserId> {
    let mut current = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok());
    while let Some(element) = current {
        if let Some(uid) = element.get_attribute("data-uid") {
            return Uuid::parse_str(&uid).ok();
        }
        current = element.parent_element();
    }
    None
}
