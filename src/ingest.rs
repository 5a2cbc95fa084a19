use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::record::{NormalizedRecord, SourceRecords, SourceTag, group_by_source};

pub fn load_records(path: &Path) -> Result<SourceRecords> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Accepts a flat array of records or an object keyed by source tag. In the
/// keyed form a record may omit `source`; the key supplies it.
pub fn parse_records(raw: &str) -> Result<SourceRecords> {
    let root: Value = serde_json::from_str(raw).context("invalid json")?;
    match root {
        Value::Array(items) => {
            let records = items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| {
                    serde_json::from_value::<NormalizedRecord>(item)
                        .with_context(|| format!("record #{idx}"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(group_by_source(records))
        }
        Value::Object(map) => {
            let mut out: SourceRecords = BTreeMap::new();
            for (key, items) in map {
                let source = SourceTag::parse(&key).ok_or_else(|| anyhow!("unknown source '{key}'"))?;
                let Value::Array(items) = items else {
                    return Err(anyhow!("records for '{key}' are not an array"));
                };
                let list = out.entry(source).or_default();
                for (idx, mut item) in items.into_iter().enumerate() {
                    if let Value::Object(fields) = &mut item {
                        if !fields.contains_key("source") && !fields.contains_key("site") {
                            fields.insert("source".to_string(), Value::String(source.as_str().to_string()));
                        }
                    }
                    let record = serde_json::from_value::<NormalizedRecord>(item)
                        .with_context(|| format!("{key} record #{idx}"))?;
                    list.push(record);
                }
            }
            Ok(out)
        }
        _ => Err(anyhow!("expected an array or an object keyed by source")),
    }
}
