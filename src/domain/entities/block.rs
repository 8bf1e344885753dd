use std::{collections::HashSet, fmt, str::FromStr};

use chrono::Utc;
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ───── Constants ──────────────────────────────────────────────────────
pub const DEFAULT_SPACE_HEIGHT: u32 = 40;

// ───── Block kinds ────────────────────────────────────────────────────

/// The closed set of content block tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Title,
    Image,
    Link,
    Video,
    Gif,
    Icon,
    Code,
    List,
    Space,
    Divider,
    Callout,
    Quote,
}

impl BlockKind {
    pub const ALL: [BlockKind; 13] = [
        BlockKind::Text,
        BlockKind::Title,
        BlockKind::Image,
        BlockKind::Link,
        BlockKind::Video,
        BlockKind::Gif,
        BlockKind::Icon,
        BlockKind::Code,
        BlockKind::List,
        BlockKind::Space,
        BlockKind::Divider,
        BlockKind::Callout,
        BlockKind::Quote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Title => "title",
            BlockKind::Image => "image",
            BlockKind::Link => "link",
            BlockKind::Video => "video",
            BlockKind::Gif => "gif",
            BlockKind::Icon => "icon",
            BlockKind::Code => "code",
            BlockKind::List => "list",
            BlockKind::Space => "space",
            BlockKind::Divider => "divider",
            BlockKind::Callout => "callout",
            BlockKind::Quote => "quote",
        }
    }

    /// Input fields the authoring surface offers for this kind.
    pub fn field_contract(&self) -> FieldContract {
        use InputKind::*;

        let content = |input, required| Some(FieldSpec { name: "content", input, required });
        let meta = |name, input, required| FieldSpec { name, input, required };

        match self {
            BlockKind::Text => FieldContract {
                content: content(Multiline, true),
                metadata: vec![],
            },
            BlockKind::Title => FieldContract {
                content: content(Text, true),
                metadata: vec![meta("subtitle", Text, false)],
            },
            BlockKind::Code => FieldContract {
                content: content(Code, true),
                metadata: vec![meta("language", Text, false)],
            },
            BlockKind::Image => FieldContract {
                content: content(Url, true),
                metadata: vec![meta("alt", Text, true), meta("caption", Text, false)],
            },
            BlockKind::Link => FieldContract {
                content: content(Url, true),
                metadata: vec![meta("title", Text, false), meta("text", Text, false)],
            },
            BlockKind::Video => FieldContract {
                content: content(Url, true),
                metadata: vec![meta("caption", Text, false), meta("thumbnail", Url, false)],
            },
            BlockKind::Gif | BlockKind::Icon => FieldContract {
                content: content(Url, true),
                metadata: vec![meta("caption", Text, false)],
            },
            BlockKind::List => FieldContract {
                content: content(Multiline, true),
                metadata: vec![meta("type", Choice(&["bullet", "number"]), false)],
            },
            BlockKind::Space => FieldContract {
                content: None,
                metadata: vec![meta("height", Number, false)],
            },
            BlockKind::Divider => FieldContract {
                content: content(Text, false),
                metadata: vec![],
            },
            BlockKind::Callout => FieldContract {
                content: content(Multiline, true),
                metadata: vec![],
            },
            BlockKind::Quote => FieldContract {
                content: content(Multiline, true),
                metadata: vec![meta("author", Text, false)],
            },
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = BlockValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        BlockKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| BlockValidationError::UnknownType(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Text,
    Multiline,
    Url,
    Code,
    Number,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub input: InputKind,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldContract {
    pub content: Option<FieldSpec>,
    pub metadata: Vec<FieldSpec>,
}

// ───── Typed metadata ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitleMeta {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeMeta {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkMeta {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, alias = "poster", deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptionMeta {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    #[default]
    Bullet,
    Number,
}

impl ListStyle {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bullet" | "bulleted" | "unordered" => Some(ListStyle::Bullet),
            "number" | "numbered" | "ordered" => Some(ListStyle::Number),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMeta {
    #[serde(rename = "type", default, deserialize_with = "lenient_list_style", skip_serializing_if = "Option::is_none")]
    pub style: Option<ListStyle>,
}

impl ListMeta {
    pub fn style_or_default(&self) -> ListStyle {
        self.style.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceMeta {
    #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl SpaceMeta {
    pub fn height_or_default(&self) -> u32 {
        self.height.unwrap_or(DEFAULT_SPACE_HEIGHT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteMeta {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Per-kind payload of a block. Each variant carries only the metadata its
/// kind recognizes; anything else in the stored mapping is ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockData {
    Text,
    Title(TitleMeta),
    Code(CodeMeta),
    Image(ImageMeta),
    Link(LinkMeta),
    Video(VideoMeta),
    Gif(CaptionMeta),
    Icon(CaptionMeta),
    List(ListMeta),
    Space(SpaceMeta),
    Divider,
    Callout,
    Quote(QuoteMeta),
    /// A stored block whose tag is outside the known set. Its metadata is kept
    /// verbatim so persisting the record does not lose author data.
    Unknown { raw_type: String, metadata: Map<String, Value> },
}

impl BlockData {
    pub fn empty(kind: BlockKind) -> Self {
        Self::from_parts(kind, &Map::new())
    }

    pub fn from_parts(kind: BlockKind, metadata: &Map<String, Value>) -> Self {
        match kind {
            BlockKind::Text => BlockData::Text,
            BlockKind::Title => BlockData::Title(parse_meta(metadata)),
            BlockKind::Code => BlockData::Code(parse_meta(metadata)),
            BlockKind::Image => BlockData::Image(parse_meta(metadata)),
            BlockKind::Link => BlockData::Link(parse_meta(metadata)),
            BlockKind::Video => BlockData::Video(parse_meta(metadata)),
            BlockKind::Gif => BlockData::Gif(parse_meta(metadata)),
            BlockKind::Icon => BlockData::Icon(parse_meta(metadata)),
            BlockKind::List => BlockData::List(parse_meta(metadata)),
            BlockKind::Space => BlockData::Space(parse_meta(metadata)),
            BlockKind::Divider => BlockData::Divider,
            BlockKind::Callout => BlockData::Callout,
            BlockKind::Quote => BlockData::Quote(parse_meta(metadata)),
        }
    }

    /// `None` for blocks with an unrecognized tag.
    pub fn kind(&self) -> Option<BlockKind> {
        let kind = match self {
            BlockData::Text => BlockKind::Text,
            BlockData::Title(_) => BlockKind::Title,
            BlockData::Code(_) => BlockKind::Code,
            BlockData::Image(_) => BlockKind::Image,
            BlockData::Link(_) => BlockKind::Link,
            BlockData::Video(_) => BlockKind::Video,
            BlockData::Gif(_) => BlockKind::Gif,
            BlockData::Icon(_) => BlockKind::Icon,
            BlockData::List(_) => BlockKind::List,
            BlockData::Space(_) => BlockKind::Space,
            BlockData::Divider => BlockKind::Divider,
            BlockData::Callout => BlockKind::Callout,
            BlockData::Quote(_) => BlockKind::Quote,
            BlockData::Unknown { .. } => return None,
        };
        Some(kind)
    }

    pub fn type_name(&self) -> &str {
        match self {
            BlockData::Unknown { raw_type, .. } => raw_type,
            other => other.kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }

    pub fn metadata_map(&self) -> Map<String, Value> {
        match self {
            BlockData::Text | BlockData::Divider | BlockData::Callout => Map::new(),
            BlockData::Title(m) => meta_to_map(m),
            BlockData::Code(m) => meta_to_map(m),
            BlockData::Image(m) => meta_to_map(m),
            BlockData::Link(m) => meta_to_map(m),
            BlockData::Video(m) => meta_to_map(m),
            BlockData::Gif(m) | BlockData::Icon(m) => meta_to_map(m),
            BlockData::List(m) => meta_to_map(m),
            BlockData::Space(m) => meta_to_map(m),
            BlockData::Quote(m) => meta_to_map(m),
            BlockData::Unknown { metadata, .. } => metadata.clone(),
        }
    }

    /// Shallow merge: keys in `patch` overwrite, keys absent from it survive.
    pub fn merge_metadata(&mut self, patch: &Map<String, Value>) {
        match self {
            BlockData::Unknown { metadata, .. } => {
                for (key, value) in patch {
                    metadata.insert(key.clone(), value.clone());
                }
            }
            other => {
                let mut merged = other.metadata_map();
                for (key, value) in patch {
                    merged.insert(key.clone(), value.clone());
                }
                if let Some(kind) = other.kind() {
                    *other = BlockData::from_parts(kind, &merged);
                }
            }
        }
    }
}

fn parse_meta<T>(metadata: &Map<String, Value>) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    // Field deserializers are lenient, so this only falls back for shapes
    // serde cannot map at all.
    serde_json::from_value(Value::Object(metadata.clone())).unwrap_or_default()
}

fn meta_to_map<T: Serialize>(meta: &T) -> Map<String, Value> {
    match serde_json::to_value(meta) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

// ───── Block ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        BlockId(value.to_string())
    }
}

/// One unit of rich content. Serialized in the stored shape
/// `{id, type, content, metadata}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawBlock", try_from = "RawBlock")]
pub struct Block {
    pub id: BlockId,
    pub content: String,
    pub data: BlockData,
}

impl Block {
    pub fn new(id: BlockId, kind: BlockKind) -> Self {
        Block {
            id,
            content: String::new(),
            data: BlockData::empty(kind),
        }
    }

    pub fn kind(&self) -> Option<BlockKind> {
        self.data.kind()
    }

    pub fn type_name(&self) -> &str {
        self.data.type_name()
    }

    pub fn is_supported(&self) -> bool {
        self.kind().is_some()
    }

    /// Builds a block from stored data. Unknown tags become
    /// [`BlockData::Unknown`]; a missing id or tag is rejected.
    pub fn from_raw(raw: RawBlock) -> Result<Self, BlockValidationError> {
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(BlockValidationError::MissingId)?;
        let raw_type = raw
            .block_type
            .filter(|t| !t.trim().is_empty())
            .ok_or(BlockValidationError::MissingType)?;

        let data = match raw_type.parse::<BlockKind>() {
            Ok(kind) => BlockData::from_parts(kind, &raw.metadata),
            Err(_) => BlockData::Unknown { raw_type, metadata: raw.metadata },
        };

        Ok(Block {
            id: BlockId(id),
            content: raw.content.unwrap_or_default(),
            data,
        })
    }

    pub fn to_raw(&self) -> RawBlock {
        RawBlock {
            id: Some(self.id.0.clone()),
            block_type: Some(self.type_name().to_string()),
            content: Some(self.content.clone()),
            metadata: self.data.metadata_map(),
        }
    }
}

impl TryFrom<RawBlock> for Block {
    type Error = BlockValidationError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        Block::from_raw(raw)
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        block.to_raw()
    }
}

/// Loosely-typed block as it comes out of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub block_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_map")]
    pub metadata: Map<String, Value>,
}

impl RawBlock {
    pub fn from_value(value: Value) -> Result<Self, BlockValidationError> {
        serde_json::from_value(value).map_err(|e| BlockValidationError::Malformed(e.to_string()))
    }
}

/// Validates stored data into a renderable block, rejecting tags outside the
/// known set.
pub fn normalize(raw: RawBlock) -> Result<Block, BlockValidationError> {
    let block = Block::from_raw(raw)?;
    match &block.data {
        BlockData::Unknown { raw_type, .. } => Err(BlockValidationError::UnknownType(raw_type.clone())),
        _ => Ok(block),
    }
}

/// Normalizes a stored block sequence for display. Invalid entries are
/// dropped and logged; siblings are unaffected.
pub fn normalize_all(raws: impl IntoIterator<Item = RawBlock>, owner: &str) -> Vec<Block> {
    raws.into_iter()
        .enumerate()
        .filter_map(|(index, raw)| match normalize(raw) {
            Ok(block) => Some(block),
            Err(reason) => {
                tracing::warn!(record_id = owner, index, %reason, "Dropping invalid block");
                None
            }
        })
        .collect()
}

/// Reads a stored block sequence for a record, keeping unknown tags so they
/// can be flagged by the editor. Only structurally invalid entries are
/// dropped.
pub fn blocks_from_values(values: impl IntoIterator<Item = Value>, owner: &str) -> Vec<Block> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            match RawBlock::from_value(value).and_then(Block::from_raw) {
                Ok(block) => Some(block),
                Err(reason) => {
                    tracing::warn!(record_id = owner, index, %reason, "Dropping invalid block");
                    None
                }
            }
        })
        .collect()
}

/// Parses blocks submitted with a new record. The first invalid entry fails
/// the whole sequence with its index, as does an id used twice. Unknown tags
/// are kept.
pub fn blocks_from_input(values: Vec<Value>) -> Result<Vec<Block>, (usize, BlockValidationError)> {
    let mut seen = HashSet::with_capacity(values.len());
    let mut blocks = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let block = RawBlock::from_value(value)
            .and_then(Block::from_raw)
            .map_err(|reason| (index, reason))?;
        if !seen.insert(block.id.as_str().to_string()) {
            return Err((index, BlockValidationError::DuplicateId(block.id.as_str().to_string())));
        }
        blocks.push(block);
    }
    Ok(blocks)
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum BlockValidationError {
    #[display("block is missing an id")]
    MissingId,

    #[display("block is missing a type")]
    MissingType,

    #[display("unknown block type: {_0}")]
    UnknownType(String),

    #[display("malformed block: {_0}")]
    Malformed(String),

    #[display("duplicate block id: {_0}")]
    DuplicateId(String),
}

impl std::error::Error for BlockValidationError {}

// ───── Id generation ──────────────────────────────────────────────────

/// Issues block ids unique within an editing session. Ids already present in
/// the sequence, and every id issued before, are never handed out again.
#[derive(Debug, Default)]
pub struct BlockIdGenerator {
    issued: HashSet<String>,
    sequence: u64,
}

impl BlockIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded<'a>(existing: impl IntoIterator<Item = &'a BlockId>) -> Self {
        let mut generator = Self::new();
        for id in existing {
            generator.reserve(id);
        }
        generator
    }

    pub fn reserve(&mut self, id: &BlockId) {
        self.issued.insert(id.0.clone());
    }

    pub fn next_id(&mut self, kind: BlockKind) -> BlockId {
        loop {
            self.sequence += 1;
            let candidate = format!("{}-{}-{}", kind, Utc::now().timestamp_millis(), self.sequence);
            if self.issued.insert(candidate.clone()) {
                return BlockId(candidate);
            }
        }
    }

    /// A new block of `kind` with a fresh id, empty content and empty metadata.
    pub fn create_block(&mut self, kind: BlockKind) -> Block {
        Block::new(self.next_id(kind), kind)
    }
}

// ───── Lenient field deserializers ────────────────────────────────────

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    })
}

fn lenient_list_style<'de, D>(deserializer: D) -> Result<Option<ListStyle>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => ListStyle::parse(&s),
        _ => None,
    })
}

fn lenient_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> RawBlock {
        RawBlock::from_value(value).unwrap()
    }

    #[test]
    fn normalize_fills_defaults() {
        let block = normalize(raw(json!({"id": "b1", "type": "text"}))).unwrap();

        assert_eq!(block.id, BlockId::from("b1"));
        assert_eq!(block.content, "");
        assert_eq!(block.data, BlockData::Text);
        assert!(block.data.metadata_map().is_empty());
    }

    #[test]
    fn normalize_rejects_unknown_and_incomplete_blocks() {
        assert_eq!(
            normalize(raw(json!({"id": "b1", "type": "carousel"}))),
            Err(BlockValidationError::UnknownType("carousel".into()))
        );
        assert_eq!(
            normalize(raw(json!({"type": "text", "content": "hi"}))),
            Err(BlockValidationError::MissingId)
        );
        assert_eq!(
            normalize(raw(json!({"id": "b2", "content": "hi"}))),
            Err(BlockValidationError::MissingType)
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = vec![
            json!({"id": "a", "type": "code", "content": "fn main() {}", "metadata": {"language": "rust", "theme": "dark"}}),
            json!({"id": 7, "type": "SPACE", "metadata": {"height": "64"}}),
            json!({"id": "c", "type": "list", "content": "x\ny", "metadata": {"type": "numbered"}}),
            json!({"id": "d", "type": "video", "content": "v.mp4", "metadata": {"poster": "p.png"}}),
        ];

        for input in inputs {
            let once = normalize(raw(input)).unwrap();
            let twice = normalize(once.to_raw()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn metadata_ignores_unrecognized_keys_and_coerces_values() {
        let block = normalize(raw(json!({
            "id": "s", "type": "space", "metadata": {"height": 12.0, "color": "red"}
        })))
        .unwrap();

        assert_eq!(block.data, BlockData::Space(SpaceMeta { height: Some(12) }));
        assert_eq!(block.data.metadata_map(), json!({"height": 12}).as_object().unwrap().clone());
    }

    #[test]
    fn null_metadata_becomes_empty() {
        let block = normalize(raw(json!({"id": "q", "type": "quote", "content": "hi", "metadata": null}))).unwrap();
        assert_eq!(block.data, BlockData::Quote(QuoteMeta::default()));
    }

    #[test]
    fn unknown_blocks_survive_from_raw_with_metadata() {
        let block = Block::from_raw(raw(json!({
            "id": "u", "type": "embed", "content": "x", "metadata": {"src": "y"}
        })))
        .unwrap();

        assert!(!block.is_supported());
        assert_eq!(block.type_name(), "embed");
        assert_eq!(block.to_raw().metadata.get("src"), Some(&json!("y")));
    }

    #[test]
    fn merge_metadata_is_shallow() {
        let mut data = BlockData::Image(ImageMeta {
            alt: Some("logo".into()),
            caption: Some("old".into()),
        });
        let patch = json!({"caption": "new", "unused": true});
        data.merge_metadata(patch.as_object().unwrap());

        assert_eq!(
            data,
            BlockData::Image(ImageMeta {
                alt: Some("logo".into()),
                caption: Some("new".into()),
            })
        );
    }

    #[test]
    fn block_serializes_in_stored_shape() {
        let block = Block {
            id: BlockId::from("b1"),
            content: "print()".into(),
            data: BlockData::Code(CodeMeta { language: Some("python".into()) }),
        };

        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({"id": "b1", "type": "code", "content": "print()", "metadata": {"language": "python"}})
        );

        let back: Block = serde_json::from_value(value).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn blocks_from_values_drops_only_invalid_entries() {
        let blocks = blocks_from_values(
            vec![
                json!({"id": "1", "type": "text", "content": "a"}),
                json!({"type": "text"}),
                json!("not a block"),
                json!({"id": "2", "type": "hologram"}),
            ],
            "p1",
        );

        let ids: Vec<_> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn generated_ids_never_collide() {
        let existing = [BlockId::from("text-1-1")];
        let mut ids = BlockIdGenerator::seeded(existing.iter());

        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            let id = ids.next_id(BlockKind::Text);
            assert_ne!(id, existing[0]);
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn create_block_is_empty() {
        let block = BlockIdGenerator::new().create_block(BlockKind::Code);

        assert_eq!(block.kind(), Some(BlockKind::Code));
        assert_eq!(block.content, "");
        assert_eq!(block.data, BlockData::Code(CodeMeta::default()));
    }

    #[test]
    fn every_kind_round_trips_through_its_tag() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.as_str().parse::<BlockKind>(), Ok(kind));
            assert_eq!(BlockData::empty(kind).kind(), Some(kind));
        }
    }

    #[test]
    fn submitted_blocks_fail_on_first_invalid_entry_or_repeated_id() {
        let missing_type = blocks_from_input(vec![
            json!({"id": "a", "type": "text"}),
            json!({"id": "b"}),
        ]);
        assert_eq!(missing_type.unwrap_err(), (1, BlockValidationError::MissingType));

        let repeated = blocks_from_input(vec![
            json!({"id": "a", "type": "text"}),
            json!({"id": "b", "type": "quote"}),
            json!({"id": "a", "type": "divider"}),
        ]);
        assert_eq!(repeated.unwrap_err(), (2, BlockValidationError::DuplicateId("a".into())));

        let kept = blocks_from_input(vec![json!({"id": "x", "type": "carousel"})]).unwrap();
        assert!(!kept[0].is_supported());
    }
}
