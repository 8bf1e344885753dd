use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::block::{Block, BlockId, BlockIdGenerator, BlockKind, BlockValidationError};

/// Receives the full sequence after every applied mutation.
pub type BlockObserver = Box<dyn FnMut(&[Block]) + Send>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum EditOutcome {
    Applied,
    NoOp(NoOpReason),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoOpReason {
    BlockNotFound { block_id: BlockId },
    IndexOutOfRange { index: usize, len: usize },
    SamePosition { index: usize },
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoOpReason::BlockNotFound { block_id } => write!(f, "no block with id '{}'", block_id),
            NoOpReason::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range for {} blocks", index, len)
            }
            NoOpReason::SamePosition { index } => write!(f, "block already at index {}", index),
        }
    }
}

/// One authoring action, as sent by a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BlockEdit {
    AddBlock {
        #[serde(rename = "type")]
        block_type: String,
    },
    RemoveBlock {
        id: BlockId,
    },
    UpdateContent {
        id: BlockId,
        content: String,
    },
    UpdateMetadata {
        id: BlockId,
        metadata: Map<String, Value>,
    },
    Reorder {
        source_index: usize,
        dest_index: usize,
    },
}

/// Owns the ordered block sequence of one record for one authoring session.
///
/// Every mutation is applied synchronously; when it changes the sequence the
/// observer is called with the result before the method returns. Lookups that
/// miss leave the sequence untouched and report a [`NoOpReason`].
pub struct BlockEditor {
    record_id: String,
    blocks: Vec<Block>,
    ids: BlockIdGenerator,
    observer: Option<BlockObserver>,
}

impl fmt::Debug for BlockEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockEditor")
            .field("record_id", &self.record_id)
            .field("blocks", &self.blocks)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl BlockEditor {
    pub fn new(record_id: impl Into<String>, blocks: Vec<Block>) -> Self {
        let ids = BlockIdGenerator::seeded(blocks.iter().map(|b| &b.id));
        BlockEditor {
            record_id: record_id.into(),
            blocks,
            ids,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: impl FnMut(&[Block]) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Blocks whose tag is not recognized. They stay in the sequence so
    /// saving does not drop them.
    pub fn unsupported_blocks(&self) -> Vec<&Block> {
        self.blocks.iter().filter(|b| !b.is_supported()).collect()
    }

    /// Appends a fresh empty block and returns its id.
    pub fn add_block(&mut self, kind: BlockKind) -> BlockId {
        let block = self.ids.create_block(kind);
        let id = block.id.clone();
        self.blocks.push(block);
        tracing::debug!(record_id = %self.record_id, block_id = %id, %kind, "Block added");
        self.notify();
        id
    }

    pub fn remove_block(&mut self, id: &BlockId) -> EditOutcome {
        let Some(index) = self.position(id) else {
            return self.no_op(NoOpReason::BlockNotFound { block_id: id.clone() });
        };
        self.blocks.remove(index);
        tracing::debug!(record_id = %self.record_id, block_id = %id, "Block removed");
        self.notify();
        EditOutcome::Applied
    }

    pub fn update_content(&mut self, id: &BlockId, content: impl Into<String>) -> EditOutcome {
        let Some(index) = self.position(id) else {
            return self.no_op(NoOpReason::BlockNotFound { block_id: id.clone() });
        };
        self.blocks[index].content = content.into();
        self.notify();
        EditOutcome::Applied
    }

    /// Shallow-merges `patch` into the block's metadata. Keys the block's
    /// kind does not recognize are ignored.
    pub fn update_metadata(&mut self, id: &BlockId, patch: &Map<String, Value>) -> EditOutcome {
        let Some(index) = self.position(id) else {
            return self.no_op(NoOpReason::BlockNotFound { block_id: id.clone() });
        };
        self.blocks[index].data.merge_metadata(patch);
        self.notify();
        EditOutcome::Applied
    }

    /// Moves the block at `source` so it ends up at `dest`; everything in
    /// between shifts by one.
    pub fn reorder(&mut self, source: usize, dest: usize) -> EditOutcome {
        let len = self.blocks.len();
        if source >= len {
            return self.no_op(NoOpReason::IndexOutOfRange { index: source, len });
        }
        if dest >= len {
            return self.no_op(NoOpReason::IndexOutOfRange { index: dest, len });
        }
        if source == dest {
            return self.no_op(NoOpReason::SamePosition { index: source });
        }

        let block = self.blocks.remove(source);
        self.blocks.insert(dest, block);
        self.notify();
        EditOutcome::Applied
    }

    /// Applies a client edit. Only an unknown block type on add is an error.
    pub fn apply(&mut self, edit: BlockEdit) -> Result<EditOutcome, BlockValidationError> {
        let outcome = match edit {
            BlockEdit::AddBlock { block_type } => {
                let kind = block_type.parse::<BlockKind>()?;
                self.add_block(kind);
                EditOutcome::Applied
            }
            BlockEdit::RemoveBlock { id } => self.remove_block(&id),
            BlockEdit::UpdateContent { id, content } => self.update_content(&id, content),
            BlockEdit::UpdateMetadata { id, metadata } => self.update_metadata(&id, &metadata),
            BlockEdit::Reorder { source_index, dest_index } => self.reorder(source_index, dest_index),
        };
        Ok(outcome)
    }

    fn position(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| &b.id == id)
    }

    fn no_op(&self, reason: NoOpReason) -> EditOutcome {
        tracing::debug!(record_id = %self.record_id, %reason, "Edit left blocks unchanged");
        EditOutcome::NoOp(reason)
    }

    fn notify(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&self.blocks);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::entities::block::{BlockData, RawBlock};

    fn block(id: &str, kind: &str, content: &str) -> Block {
        let raw: RawBlock = serde_json::from_value(json!({"id": id, "type": kind, "content": content})).unwrap();
        Block::from_raw(raw).unwrap()
    }

    fn ids(editor: &BlockEditor) -> Vec<String> {
        editor.blocks().iter().map(|b| b.id.to_string()).collect()
    }

    fn abc() -> BlockEditor {
        BlockEditor::new("1", vec![block("A", "text", "a"), block("B", "text", "b"), block("C", "text", "c")])
    }

    #[test]
    fn add_block_appends_empty_block_with_fresh_id() {
        let original = block("b1", "text", "hi");
        let mut editor = BlockEditor::new("1", vec![original.clone()]);

        let id = editor.add_block(BlockKind::Code);

        let blocks = editor.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], original);
        assert_eq!(blocks[1].id, id);
        assert_ne!(id, original.id);
        assert_eq!(blocks[1].type_name(), "code");
        assert_eq!(blocks[1].content, "");
        assert!(blocks[1].data.metadata_map().is_empty());
    }

    #[test]
    fn reorder_moves_first_to_last() {
        let mut editor = abc();
        assert!(editor.reorder(0, 2).is_applied());
        assert_eq!(ids(&editor), vec!["B", "C", "A"]);
    }

    #[test]
    fn reorder_round_trips() {
        for i in 0..3 {
            for j in 0..3 {
                if i == j {
                    continue;
                }
                let mut editor = abc();
                editor.reorder(i, j);
                editor.reorder(j, i);
                assert_eq!(ids(&editor), vec!["A", "B", "C"], "reorder({i},{j}) then ({j},{i})");
            }
        }
    }

    #[test]
    fn out_of_range_reorder_is_a_no_op() {
        let mut editor = abc();

        assert_eq!(
            editor.reorder(3, 0),
            EditOutcome::NoOp(NoOpReason::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            editor.reorder(0, 7),
            EditOutcome::NoOp(NoOpReason::IndexOutOfRange { index: 7, len: 3 })
        );
        assert_eq!(ids(&editor), vec!["A", "B", "C"]);
    }

    #[test]
    fn missing_ids_leave_sequence_untouched() {
        let mut editor = abc();
        let missing = BlockId::from("Z");

        assert!(!editor.remove_block(&missing).is_applied());
        assert!(!editor.update_content(&missing, "x").is_applied());
        assert!(!editor.update_metadata(&missing, &Map::new()).is_applied());
        assert_eq!(ids(&editor), vec!["A", "B", "C"]);
    }

    #[test]
    fn update_metadata_merges_shallowly() {
        let mut editor = BlockEditor::new("1", vec![block("img", "image", "https://x/y.png")]);
        let id = BlockId::from("img");

        editor.update_metadata(&id, json!({"alt": "A cat", "caption": "first"}).as_object().unwrap());
        editor.update_metadata(&id, json!({"caption": "second"}).as_object().unwrap());

        let meta = editor.blocks()[0].data.metadata_map();
        assert_eq!(meta.get("alt"), Some(&json!("A cat")));
        assert_eq!(meta.get("caption"), Some(&json!("second")));
    }

    #[test]
    fn length_tracks_adds_and_successful_removes() {
        let mut editor = abc();
        let initial: Vec<BlockId> = editor.blocks().iter().map(|b| b.id.clone()).collect();
        let mut expected = editor.blocks().len();

        for step in 0..60usize {
            match step % 4 {
                0 => {
                    editor.add_block(BlockKind::ALL[step % BlockKind::ALL.len()]);
                    expected += 1;
                }
                1 => {
                    let target = editor.blocks().get(step % 5).map(|b| b.id.clone());
                    let id = target.unwrap_or_else(|| BlockId::from("missing"));
                    if editor.remove_block(&id).is_applied() {
                        expected -= 1;
                    }
                }
                2 => {
                    editor.reorder(step % 7, step % 3);
                }
                _ => {
                    editor.remove_block(&BlockId::from("never-issued"));
                }
            }
            assert_eq!(editor.blocks().len(), expected);
        }

        // Survivors keep their original ids.
        let survivors: Vec<_> = editor.blocks().iter().filter(|b| initial.contains(&b.id)).collect();
        assert!(survivors.iter().all(|b| matches!(b.data, BlockData::Text)));
    }

    #[test]
    fn observer_sees_every_applied_mutation_synchronously() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut editor = abc().with_observer(move |blocks| {
            let ids: Vec<String> = blocks.iter().map(|b| b.id.to_string()).collect();
            sink.lock().unwrap().push(ids);
        });

        editor.reorder(0, 2);
        editor.remove_block(&BlockId::from("missing"));
        editor.remove_block(&BlockId::from("C"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], vec!["B", "C", "A"]);
        assert_eq!(seen[1], vec!["B", "A"]);
    }

    #[test]
    fn unknown_blocks_are_flagged_not_dropped() {
        let editor = BlockEditor::new("1", vec![block("x", "hologram", ""), block("y", "text", "")]);
        let flagged: Vec<_> = editor.unsupported_blocks().iter().map(|b| b.id.to_string()).collect();
        assert_eq!(flagged, vec!["x"]);
        assert_eq!(editor.blocks().len(), 2);
    }

    #[test]
    fn client_edits_parse_and_apply() {
        let edits: Vec<BlockEdit> = serde_json::from_value(json!([
            {"op": "addBlock", "type": "quote"},
            {"op": "reorder", "sourceIndex": 3, "destIndex": 0},
            {"op": "updateContent", "id": "A", "content": "changed"},
            {"op": "addBlock", "type": "carousel"}
        ]))
        .unwrap();

        let mut editor = abc();
        let mut results = edits.into_iter().map(|edit| editor.apply(edit));

        assert_eq!(results.next().unwrap(), Ok(EditOutcome::Applied));
        assert_eq!(results.next().unwrap(), Ok(EditOutcome::Applied));
        assert_eq!(results.next().unwrap(), Ok(EditOutcome::Applied));
        assert_eq!(
            results.next().unwrap(),
            Err(BlockValidationError::UnknownType("carousel".into()))
        );
        drop(results);

        assert_eq!(editor.blocks()[0].type_name(), "quote");
        assert_eq!(editor.blocks()[2].content, "changed");
    }
}
