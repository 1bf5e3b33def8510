//! Response key → cached field projection table
//!
//! Only keys listed in [`PROJECTIONS`] are ever cached. Keys that are absent
//! or null in a response leave the corresponding field unset, so a merge keeps
//! whatever was cached before.

use super::CachedFields;
use chrono::NaiveDate;
use serde_json::Value;

/// Birthday formats the remote API is known to return
const BIRTHDAY_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

/// One entry of the projection table
#[derive(Debug, Clone, Copy)]
pub struct FieldProjection {
    /// Response key
    pub key: &'static str,

    /// Writes the typed value into the target; returns false if the value was unusable
    pub apply: fn(&mut CachedFields, &Value) -> bool,
}

/// The fixed projection table, applied in order
pub static PROJECTIONS: &[FieldProjection] = &[
    FieldProjection { key: "first_name", apply: set_first_name },
    FieldProjection { key: "last_name", apply: set_last_name },
    FieldProjection { key: "name", apply: set_name },
    FieldProjection { key: "link", apply: set_link },
    FieldProjection { key: "birthday", apply: set_birthday },
    FieldProjection { key: "email", apply: set_email },
    FieldProjection { key: "location", apply: set_location },
    FieldProjection { key: "gender", apply: set_gender },
    FieldProjection { key: "locale", apply: set_locale },
];

/// Project the recognized keys of a response document
///
/// Non-mapping documents project to nothing.
pub fn project(document: &Value) -> CachedFields {
    let mut fields = CachedFields::default();
    let Some(map) = document.as_object() else {
        return fields;
    };

    for projection in PROJECTIONS {
        match map.get(projection.key) {
            None | Some(Value::Null) => {}
            Some(value) => {
                if !(projection.apply)(&mut fields, value) {
                    tracing::debug!(key = projection.key, value = %value, "Ignoring unusable field value");
                }
            }
        }
    }

    fields
}

/// Project the subset of an edge payload that may seed a new stub
///
/// Edge payloads are lower fidelity than a node fetch; only the name is taken.
pub fn project_stub(payload: &Value) -> CachedFields {
    let mut fields = CachedFields::default();
    if let Some(value) = payload.get("name").filter(|v| !v.is_null()) {
        set_name(&mut fields, value);
    }
    fields
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn set_text(target: &mut Option<String>, value: &Value) -> bool {
    match text(value) {
        Some(s) => {
            *target = Some(s);
            true
        }
        None => false,
    }
}

fn set_first_name(fields: &mut CachedFields, value: &Value) -> bool {
    set_text(&mut fields.first_name, value)
}

fn set_last_name(fields: &mut CachedFields, value: &Value) -> bool {
    set_text(&mut fields.last_name, value)
}

fn set_name(fields: &mut CachedFields, value: &Value) -> bool {
    set_text(&mut fields.name, value)
}

fn set_link(fields: &mut CachedFields, value: &Value) -> bool {
    set_text(&mut fields.link, value)
}

fn set_email(fields: &mut CachedFields, value: &Value) -> bool {
    set_text(&mut fields.email, value)
}

fn set_gender(fields: &mut CachedFields, value: &Value) -> bool {
    set_text(&mut fields.gender, value)
}

fn set_locale(fields: &mut CachedFields, value: &Value) -> bool {
    set_text(&mut fields.locale, value)
}

fn set_birthday(fields: &mut CachedFields, value: &Value) -> bool {
    let Some(raw) = value.as_str() else {
        return false;
    };
    let parsed = BIRTHDAY_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok());
    match parsed {
        Some(date) => {
            fields.birthday = Some(date);
            true
        }
        None => false,
    }
}

// Location arrives either as a plain string or as a page reference object.
fn set_location(fields: &mut CachedFields, value: &Value) -> bool {
    match value {
        Value::Object(map) => match map.get("name") {
            Some(name) => set_text(&mut fields.location, name),
            None => false,
        },
        other => set_text(&mut fields.location, other),
    }
}
