//! Index command implementation.

use serde_json::Value;
use std::path::Path;
use vapor_core::{KvWriter, Store};

/// Provider used for documents without a `provider_id`.
pub const DEFAULT_PROVIDER: &str = "default";

/// Stores each object of the JSON array in `json_file` under
/// `<provider_id>/<id>`, all in one batch.
pub fn run(store: &Store, json_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(json_file)?;
    let docs: Vec<Value> = serde_json::from_str(&text)?;

    let writer = store.writer()?;
    let mut batch = writer.new_batch();
    for (i, doc) in docs.iter().enumerate() {
        let key = document_key(doc).ok_or_else(|| format!("Document {i} has no \"id\""))?;
        batch.set(key, serde_json::to_vec(doc)?);
    }
    writer.execute_batch(&batch)?;

    println!("Indexed {} documents", docs.len());
    Ok(())
}

/// Key a document is stored under, or `None` if it has no usable `id`.
pub fn document_key(doc: &Value) -> Option<String> {
    let id = field_text(doc.get("id")?)?;
    let provider = doc
        .get("provider_id")
        .and_then(field_text)
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    Some(format!("{provider}/{id}"))
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
