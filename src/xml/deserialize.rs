//! XML parsing for block list manifests.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ErrorCode, StorageError, StorageResult};
use crate::models::{BlockId, BlockList, BlockListEntry, BlockSearchMode};

/// Parses a Put Block List request body, preserving entry order across the
/// `Committed`, `Uncommitted` and `Latest` elements.
pub fn parse_block_list(xml: &str) -> StorageResult<BlockList> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut result = BlockList::new();
    let mut buf = Vec::new();
    let mut current_mode: Option<BlockSearchMode> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                current_mode = BlockSearchMode::from_str(&name);
            }
            Ok(Event::End(_)) => {
                current_mode = None;
            }
            Ok(Event::Text(e)) => {
                if let Some(mode) = current_mode {
                    let block_id = e
                        .unescape()
                        .map_err(|_| StorageError::new(ErrorCode::InvalidBlockList))?
                        .to_string();

                    if block_id.trim().is_empty() {
                        continue;
                    }

                    result.push(BlockListEntry {
                        id: BlockId::from_base64(block_id.trim())?,
                        mode,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => {
                return Err(StorageError::with_message(
                    ErrorCode::InvalidBlockList,
                    "The block list XML is malformed",
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::serialize_block_list;

    #[test]
    fn test_parse_mixed_block_list_keeps_order() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<BlockList>
  <Latest>YmxvY2sx</Latest>
  <Committed>YmxvY2sy</Committed>
  <Uncommitted>YmxvY2sz</Uncommitted>
</BlockList>"#;

        let list = parse_block_list(xml).unwrap();
        let modes: Vec<BlockSearchMode> = list.entries.iter().map(|e| e.mode).collect();
        assert_eq!(
            modes,
            vec![
                BlockSearchMode::Latest,
                BlockSearchMode::Committed,
                BlockSearchMode::Uncommitted
            ]
        );
        assert_eq!(list.entries[0].id.as_str(), "YmxvY2sx");
        assert_eq!(list.entries[2].id.as_str(), "YmxvY2sz");
    }

    #[test]
    fn test_parse_serialized_list() {
        let mut list = BlockList::new();
        list.push(BlockListEntry::latest(BlockId::from_raw("a").unwrap()));
        list.push(BlockListEntry::latest(BlockId::from_raw("b").unwrap()));

        let parsed = parse_block_list(&serialize_block_list(&list)).unwrap();
        assert_eq!(parsed, list);
    }

    #[test]
    fn test_parse_rejects_bad_block_id() {
        let xml = "<BlockList><Latest>***</Latest></BlockList>";
        let err = parse_block_list(xml).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidBlockId);
    }
}
