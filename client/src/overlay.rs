use wasm_bindgen::JsValue;
use web_sys::{Document, HtmlButtonElement, HtmlElement, HtmlTextAreaElement};

use waymark_shared::PointDoc;

use crate::dom::get_element;

/// The anchored info panel for a marker: note text, and edit/delete
/// controls when the viewer owns the point.
pub struct InfoPanel {
    pub root: HtmlElement,
    pub title: HtmlElement,
    pub note: HtmlTextAreaElement,
    pub save_button: HtmlButtonElement,
    pub delete_button: HtmlButtonElement,
}

impl InfoPanel {
    pub fn from_document(document: &Document) -> Result<Self, JsValue> {
        Ok(Self {
            root: get_element(document, "info")?,
            title: get_element(document, "infoTitle")?,
            note: get_element(document, "infoNote")?,
            save_button: get_element(document, "infoSave")?,
            delete_button: get_element(document, "infoDelete")?,
        })
    }

    pub fn open(&self, point: &PointDoc, owner_name: &str, is_owner: bool, anchor: (f64, f64)) {
        self.title.set_text_content(Some(owner_name));
        self.note.set_value(&point.note);
        self.note.set_read_only(!is_owner);
        self.save_button.set_hidden(!is_owner);
        self.delete_button.set_hidden(!is_owner);

        let style = self.root.style();
        let _ = style.set_property("left", &format!("{}px", anchor.0 + 14.0));
        let _ = style.set_property("top", &format!("{}px", anchor.1 - 10.0));
        self.root.set_hidden(false);
    }

    pub fn close(&self) {
        self.root.set_hidden(true);
    }

    pub fn note_value(&self) -> String {
        self.note.value()
    }
}
