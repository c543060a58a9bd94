use serde_json::{Map, Value};
use tracing::info;

const SECTIONS: [&str; 3] = ["users", "messages", "typing"];

/// Bring a raw document up to the current layout. Returns whether anything changed.
///
/// - every top-level section exists and is an object
/// - every registered user owns a mailbox
pub fn run(doc: &mut Map<String, Value>) -> bool {
    let mut changed = false;

    for section in SECTIONS {
        let present = doc.contains_key(section);
        if matches!(doc.get(section), Some(Value::Object(_))) {
            continue;
        }
        if present {
            info!("Store: replacing malformed '{}' section", section);
        }
        doc.insert(section.to_string(), Value::Object(Map::new()));
        changed = true;
    }

    let usernames: Vec<String> = doc
        .get("users")
        .and_then(Value::as_object)
        .map(|users| users.keys().cloned().collect())
        .unwrap_or_default();

    if let Some(Value::Object(messages)) = doc.get_mut("messages") {
        for name in usernames {
            if !messages.contains_key(&name) {
                messages.insert(name, Value::Array(Vec::new()));
                changed = true;
            }
        }
    }

    if changed {
        info!("Store migrations applied");
    }
    changed
}
