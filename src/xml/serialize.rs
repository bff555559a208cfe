//! XML request serialization for block list commits.

use crate::models::BlockList;

/// Escapes special XML characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Serializes a block list manifest to the Put Block List request body.
///
/// Entries are written in list order, each tagged with its search mode.
pub fn serialize_block_list(block_list: &BlockList) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?>"#);
    xml.push_str("<BlockList>");
    for entry in &block_list.entries {
        let tag = entry.mode.as_str();
        xml.push_str(&format!(
            "<{}>{}</{}>",
            tag,
            xml_escape(entry.id.as_str()),
            tag
        ));
    }
    xml.push_str("</BlockList>");
    xml
}
