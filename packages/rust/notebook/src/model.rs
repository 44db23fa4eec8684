//! In-memory document model.
//!
//! Every block keeps the raw JSON object it was loaded from, and that object is
//! what gets written back. The typed fields are a read-only view used for
//! classification and validation, so block content can never drift from disk.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use nbmend_shared::{BlockKind, NbmendError, Result};

/// Top-level key holding the ordered cell array.
const CELLS_KEY: &str = "cells";

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Whether an execution output records a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Normal,
    Error,
}

/// One entry of a code cell's `outputs` array. The payload is never interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    kind: OutputKind,
    payload: Value,
}

impl Output {
    fn from_json(cell: usize, position: usize, value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            NbmendError::structural(format!("cell {cell}: output {position} is not an object"))
        })?;

        let kind = match object.get("output_type").and_then(Value::as_str) {
            Some("error") => OutputKind::Error,
            _ => OutputKind::Normal,
        };

        Ok(Self {
            kind,
            payload: value.clone(),
        })
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn is_error(&self) -> bool {
        self.kind == OutputKind::Error
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// An atomic unit of document content (one notebook cell).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    kind: BlockKind,
    content: String,
    execution_marker: Option<u64>,
    outputs: Vec<Output>,
    original_index: usize,
    synthesized: bool,
    raw: Map<String, Value>,
}

impl Block {
    /// Build a block from the raw cell object at `index` of the cell array.
    pub fn from_json(index: usize, value: Value) -> Result<Self> {
        let Value::Object(raw) = value else {
            return Err(NbmendError::structural(format!(
                "cell {index}: expected a JSON object"
            )));
        };

        let kind = {
            let cell_type = raw.get("cell_type").and_then(Value::as_str).ok_or_else(|| {
                NbmendError::structural(format!("cell {index}: missing cell_type"))
            })?;
            BlockKind::from_cell_type(cell_type).ok_or_else(|| {
                NbmendError::structural(format!("cell {index}: unknown cell_type '{cell_type}'"))
            })?
        };

        let content = join_source(index, raw.get("source"))?;

        let (execution_marker, outputs) = match kind {
            BlockKind::Executable => (
                parse_execution_count(index, raw.get("execution_count"))?,
                parse_outputs(index, raw.get("outputs"))?,
            ),
            BlockKind::Narrative => (None, Vec::new()),
        };

        Ok(Self {
            kind,
            content,
            execution_marker,
            outputs,
            original_index: index,
            synthesized: false,
            raw,
        })
    }

    /// Create a narrative header block from Markdown text.
    ///
    /// The source is stored line by line with `\n` terminators, as Jupyter does.
    pub fn synthesize(title: &str) -> Self {
        Self::synthesize_with_id(title, None)
    }

    /// Like [`Block::synthesize`], optionally carrying a cell `id`.
    pub fn synthesize_with_id(title: &str, id: Option<String>) -> Self {
        let lines: Vec<Value> = title
            .split_inclusive('\n')
            .map(|line| Value::String(line.to_string()))
            .collect();

        let mut raw = Map::new();
        raw.insert("cell_type".into(), Value::String("markdown".into()));
        if let Some(id) = id {
            raw.insert("id".into(), Value::String(id));
        }
        raw.insert("metadata".into(), Value::Object(Map::new()));
        raw.insert("source".into(), Value::Array(lines));

        Self {
            kind: BlockKind::Narrative,
            content: title.to_string(),
            execution_marker: None,
            outputs: Vec::new(),
            original_index: 0,
            synthesized: true,
            raw,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Concatenated `source` text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// `execution_count` for code cells; always `None` for narrative blocks.
    pub fn execution_marker(&self) -> Option<u64> {
        self.execution_marker
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Position in the cell array this block was loaded from.
    ///
    /// [`Document::with_blocks`] renumbers blocks by their new position, so in
    /// an assembled document this is the output position, the same value a
    /// reload of the written file would give. Source positions of dropped
    /// blocks are reported separately by the assembler.
    pub fn original_index(&self) -> usize {
        self.original_index
    }

    /// Whether this block was created by the assembler rather than loaded.
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    pub fn is_executable(&self) -> bool {
        self.kind == BlockKind::Executable
    }

    pub fn has_error_output(&self) -> bool {
        self.outputs.iter().any(Output::is_error)
    }

    /// The cell object exactly as it will be written.
    pub fn to_json(&self) -> Value {
        Value::Object(self.raw.clone())
    }

    fn at_position(mut self, index: usize) -> Self {
        self.original_index = index;
        self
    }
}

/// Concatenate a `source` field, which may be a string or an array of strings.
fn join_source(index: usize, source: Option<&Value>) -> Result<String> {
    match source {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Array(fragments)) => {
            let mut content = String::new();
            for fragment in fragments {
                let text = fragment.as_str().ok_or_else(|| {
                    NbmendError::structural(format!("cell {index}: source fragment is not a string"))
                })?;
                content.push_str(text);
            }
            Ok(content)
        }
        Some(_) => Err(NbmendError::structural(format!(
            "cell {index}: source must be a string or an array of strings"
        ))),
    }
}

fn parse_execution_count(index: usize, value: Option<&Value>) -> Result<Option<u64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(count) => count.as_u64().map(Some).ok_or_else(|| {
            NbmendError::structural(format!(
                "cell {index}: execution_count must be a non-negative integer or null"
            ))
        }),
    }
}

fn parse_outputs(index: usize, value: Option<&Value>) -> Result<Vec<Output>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(position, item)| Output::from_json(index, position, item))
            .collect(),
        Some(_) => Err(NbmendError::structural(format!(
            "cell {index}: outputs must be an array"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// An ordered sequence of blocks plus the document-level fields around it.
///
/// Top-level fields (`nbformat`, `metadata`, ...) are kept verbatim and in
/// their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    fields: Map<String, Value>,
    blocks: Vec<Block>,
}

impl Document {
    /// Build a document from a parsed JSON value.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(NbmendError::structural(
                "top level of a notebook must be a JSON object",
            ));
        };

        let cells = match fields.get_mut(CELLS_KEY) {
            None => Vec::new(),
            Some(Value::Array(cells)) => std::mem::take(cells),
            Some(_) => return Err(NbmendError::structural("`cells` must be an array")),
        };

        let blocks = cells
            .into_iter()
            .enumerate()
            .map(|(index, cell)| Block::from_json(index, cell))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { fields, blocks })
    }

    /// Reassemble the full JSON value, blocks in their current order.
    pub fn to_json(&self) -> Value {
        let mut fields = self.fields.clone();
        if fields.contains_key(CELLS_KEY) || !self.blocks.is_empty() {
            let cells = self.blocks.iter().map(Block::to_json).collect();
            fields.insert(CELLS_KEY.into(), Value::Array(cells));
        }
        Value::Object(fields)
    }

    /// A new document with the same top-level fields and the given blocks.
    ///
    /// Blocks are re-indexed by their new position, exactly as if the result
    /// had been written and loaded again.
    pub fn with_blocks(&self, blocks: Vec<Block>) -> Self {
        let mut fields = self.fields.clone();
        if !blocks.is_empty() && !fields.contains_key(CELLS_KEY) {
            fields.insert(CELLS_KEY.into(), Value::Array(Vec::new()));
        }

        let blocks = blocks
            .into_iter()
            .enumerate()
            .map(|(index, block)| block.at_position(index))
            .collect();

        Self { fields, blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The raw `nbformat` value, if present.
    pub fn format_version(&self) -> Option<&Value> {
        self.fields.get("nbformat")
    }

    /// The raw `metadata` value, if present.
    pub fn metadata(&self) -> Option<&Value> {
        self.fields.get("metadata")
    }

    /// Whether the format version makes a per-cell `id` mandatory (4.5 and up).
    pub fn requires_cell_ids(&self) -> bool {
        let major = self.fields.get("nbformat").and_then(Value::as_u64);
        let minor = self
            .fields
            .get("nbformat_minor")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        matches!(major, Some(major) if major > 4 || (major == 4 && minor >= 5))
    }

    /// A synthesized narrative block fit for this document's format version.
    pub fn synthesize_block(&self, title: &str) -> Block {
        let id = self
            .requires_cell_ids()
            .then(|| Uuid::now_v7().simple().to_string());
        Block::synthesize_with_id(title, id)
    }

    /// Whether the source had a `cells` key at all.
    pub fn has_cells(&self) -> bool {
        self.fields.contains_key(CELLS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "cells": [
                {"cell_type": "markdown", "metadata": {}, "source": ["# Title\n", "Intro"]},
                {
                    "cell_type": "code",
                    "execution_count": 3,
                    "metadata": {},
                    "outputs": [
                        {"output_type": "stream", "name": "stdout", "text": ["ok\n"]},
                        {"output_type": "error", "ename": "ValueError", "evalue": "bad", "traceback": []}
                    ],
                    "source": "print('ok')"
                },
                {"cell_type": "code", "execution_count": null, "metadata": {}, "outputs": [], "source": []}
            ],
            "metadata": {"kernelspec": {"name": "python3"}},
            "nbformat": 4,
            "nbformat_minor": 5
        })
    }

    #[test]
    fn parses_blocks_and_typed_view() {
        let doc = Document::from_json(sample()).expect("parse");
        assert_eq!(doc.len(), 3);

        let title = &doc.blocks()[0];
        assert_eq!(title.kind(), BlockKind::Narrative);
        assert_eq!(title.content(), "# Title\nIntro");
        assert_eq!(title.execution_marker(), None);

        let code = &doc.blocks()[1];
        assert_eq!(code.execution_marker(), Some(3));
        assert_eq!(code.outputs().len(), 2);
        assert!(code.has_error_output());
        assert_eq!(code.content(), "print('ok')");
        assert_eq!(code.original_index(), 1);

        let empty = &doc.blocks()[2];
        assert_eq!(empty.execution_marker(), None);
        assert!(empty.outputs().is_empty());
    }

    #[test]
    fn to_json_round_trips_value() {
        let value = sample();
        let doc = Document::from_json(value.clone()).expect("parse");
        assert_eq!(doc.to_json(), value);
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = Document::from_json(json!([1, 2, 3])).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn rejects_unknown_cell_type() {
        let err = Document::from_json(json!({"cells": [{"cell_type": "widget"}]})).unwrap_err();
        assert!(err.to_string().contains("unknown cell_type 'widget'"));
    }

    #[test]
    fn rejects_non_string_source_fragment() {
        let err = Document::from_json(json!({
            "cells": [{"cell_type": "markdown", "source": ["ok", 7]}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("source fragment"));
    }

    #[test]
    fn missing_cells_is_tracked() {
        let doc = Document::from_json(json!({"nbformat": 4})).expect("parse");
        assert!(!doc.has_cells());
        assert!(doc.is_empty());
        assert_eq!(doc.to_json(), json!({"nbformat": 4}));
    }

    #[test]
    fn synthesized_block_splits_lines() {
        let block = Block::synthesize("## 5. Results\n\nBody text");
        assert!(block.is_synthesized());
        assert_eq!(block.content(), "## 5. Results\n\nBody text");
        assert_eq!(
            block.to_json(),
            json!({"cell_type": "markdown", "metadata": {}, "source": ["## 5. Results\n", "\n", "Body text"]})
        );
    }

    #[test]
    fn synthesized_block_gets_id_from_nbformat_4_5() {
        let doc = Document::from_json(sample()).expect("parse");
        assert!(doc.requires_cell_ids());

        let first = doc.synthesize_block("## Intro");
        let second = doc.synthesize_block("## Intro");
        let raw = first.to_json();
        let keys: Vec<&str> = raw
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["cell_type", "id", "metadata", "source"]);

        let id = raw["id"].as_str().expect("id");
        assert!(!id.is_empty() && id.len() <= 64);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(second.to_json()["id"], raw["id"]);
    }

    #[test]
    fn synthesized_block_has_no_id_before_nbformat_4_5() {
        for fields in [
            json!({"nbformat": 4, "nbformat_minor": 4}),
            json!({"nbformat": 3, "nbformat_minor": 9}),
            json!({}),
        ] {
            let doc = Document::from_json(fields).expect("parse");
            assert!(!doc.requires_cell_ids());
            assert!(doc.synthesize_block("## Intro").to_json().get("id").is_none());
        }
    }

    #[test]
    fn with_blocks_reindexes() {
        let doc = Document::from_json(sample()).expect("parse");
        let reversed: Vec<Block> = doc.blocks().iter().rev().cloned().collect();
        let flipped = doc.with_blocks(reversed);

        assert_eq!(flipped.blocks()[0].original_index(), 0);
        assert_eq!(flipped.blocks()[0].content(), "");
        assert_eq!(flipped.blocks()[2].content(), "# Title\nIntro");
        assert_eq!(flipped.format_version(), doc.format_version());
    }
}
