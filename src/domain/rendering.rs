//! Maps blocks to display output.
//!
//! Rendering is pure: the same block always yields the same output, and the
//! block is only ever borrowed.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    entities::block::{Block, BlockData, FieldSpec, ListStyle},
    utils::html::{escape, open, safe_url},
};

// ───── Constants ──────────────────────────────────────────────────────
pub const DEFAULT_CODE_LANGUAGE: &str = "text";
pub const DEFAULT_DOWNLOAD_EXTENSION: &str = "txt";
pub const CODE_DOWNLOAD_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    Edit,
    #[default]
    ReadOnly,
}

/// Display form of one block, independent of any output format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedBlock {
    Paragraph { text: String },
    Heading { text: String, subtitle: Option<String> },
    Code { source: String, language: String, download_name: String },
    Image { src: String, alt: String, caption: Option<String> },
    Link { href: String, label: String },
    EmbeddedVideo { src: String, caption: Option<String> },
    NativeVideo { src: String, poster: Option<String>, caption: Option<String> },
    Gif { src: String, caption: Option<String> },
    Icon { src: String, caption: Option<String> },
    List { style: ListStyle, items: Vec<String> },
    Space { height: u32 },
    Divider { label: Option<String> },
    Callout { text: String },
    Quote { text: String, author: Option<String> },
    /// Edit-mode marker for a block whose tag is not recognized.
    Unsupported { raw_type: String },
}

/// Inputs the authoring surface needs to edit a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAffordances {
    pub content: Option<FieldSpec>,
    pub metadata: Vec<FieldSpec>,
    pub removable: bool,
    pub movable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedOutput {
    pub block_id: String,
    pub block_type: String,
    /// `None` when the block has nothing to show in this mode.
    pub body: Option<RenderedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affordances: Option<EditAffordances>,
}

/// Renders one block. Unknown tags produce no body in read-only mode and an
/// explicit unsupported marker in edit mode.
pub fn render(block: &Block, mode: RenderMode) -> RenderedOutput {
    let body = match (&block.data, mode) {
        (BlockData::Unknown { .. }, RenderMode::ReadOnly) => None,
        (BlockData::Unknown { raw_type, .. }, RenderMode::Edit) => Some(RenderedBlock::Unsupported {
            raw_type: raw_type.clone(),
        }),
        (data, _) => Some(render_body(&block.content, data)),
    };

    let affordances = match mode {
        RenderMode::ReadOnly => None,
        RenderMode::Edit => Some(match block.kind() {
            Some(kind) => {
                let contract = kind.field_contract();
                EditAffordances {
                    content: contract.content,
                    metadata: contract.metadata,
                    removable: true,
                    movable: true,
                }
            }
            None => EditAffordances {
                content: None,
                metadata: Vec::new(),
                removable: true,
                movable: true,
            },
        }),
    };

    RenderedOutput {
        block_id: block.id.to_string(),
        block_type: block.type_name().to_string(),
        body,
        affordances,
    }
}

/// Renders a sequence in order. In read-only mode blocks with no body are
/// left out entirely.
pub fn render_blocks(blocks: &[Block], mode: RenderMode) -> Vec<RenderedOutput> {
    blocks
        .iter()
        .map(|block| render(block, mode))
        .filter(|output| mode == RenderMode::Edit || output.body.is_some())
        .collect()
}

fn render_body(content: &str, data: &BlockData) -> RenderedBlock {
    match data {
        BlockData::Text => RenderedBlock::Paragraph { text: content.to_string() },
        BlockData::Title(meta) => RenderedBlock::Heading {
            text: content.to_string(),
            subtitle: present(&meta.subtitle),
        },
        BlockData::Code(meta) => {
            let language = present(&meta.language);
            RenderedBlock::Code {
                source: content.to_string(),
                download_name: download_file_name(language.as_deref()),
                language: language.unwrap_or_else(|| DEFAULT_CODE_LANGUAGE.to_string()),
            }
        }
        BlockData::Image(meta) => RenderedBlock::Image {
            src: content.to_string(),
            alt: present(&meta.alt).unwrap_or_default(),
            caption: present(&meta.caption),
        },
        BlockData::Link(meta) => RenderedBlock::Link {
            href: content.to_string(),
            label: present(&meta.title)
                .or_else(|| present(&meta.text))
                .unwrap_or_else(|| content.to_string()),
        },
        BlockData::Video(meta) => match embed_url(content) {
            Some(src) => RenderedBlock::EmbeddedVideo { src, caption: present(&meta.caption) },
            None => RenderedBlock::NativeVideo {
                src: content.to_string(),
                poster: present(&meta.thumbnail),
                caption: present(&meta.caption),
            },
        },
        BlockData::Gif(meta) => RenderedBlock::Gif {
            src: content.to_string(),
            caption: present(&meta.caption),
        },
        BlockData::Icon(meta) => RenderedBlock::Icon {
            src: content.to_string(),
            caption: present(&meta.caption),
        },
        BlockData::List(meta) => RenderedBlock::List {
            style: meta.style_or_default(),
            items: list_items(content),
        },
        BlockData::Space(meta) => RenderedBlock::Space { height: meta.height_or_default() },
        BlockData::Divider => RenderedBlock::Divider {
            label: Some(content.trim()).filter(|s| !s.is_empty()).map(String::from),
        },
        BlockData::Callout => RenderedBlock::Callout { text: content.to_string() },
        BlockData::Quote(meta) => RenderedBlock::Quote {
            text: content.to_string(),
            author: present(&meta.author),
        },
        BlockData::Unknown { raw_type, .. } => RenderedBlock::Unsupported { raw_type: raw_type.clone() },
    }
}

/// Empty strings are stored as given but shown as absent.
fn present(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

pub fn list_items(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

// ───── Video ──────────────────────────────────────────────────────────

/// Embeddable form of a known video-host watch link, or `None` when the URL
/// should be played natively.
///
/// `youtube.com/watch?v=ID` keeps its scheme and host; `youtu.be/ID` is
/// rewritten onto `www.youtube.com`. Links already in embed form pass through.
pub fn embed_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    if host == "youtu.be" {
        let id = url.path_segments()?.find(|s| !s.is_empty())?;
        return Some(format!("https://www.youtube.com/embed/{}", id));
    }

    if host == "youtube.com" || host.ends_with(".youtube.com") {
        if url.path().starts_with("/embed/") {
            return Some(url.to_string());
        }
        if url.path() == "/watch" {
            let id = url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())
                .filter(|id| !id.is_empty())?;
            return Some(format!("{}://{}/embed/{}", url.scheme(), host, id));
        }
    }

    None
}

// ───── Code actions ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CodeDownload {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

pub fn download_file_name(language: Option<&str>) -> String {
    let extension = language
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_DOWNLOAD_EXTENSION);
    format!("code.{}", extension)
}

/// File download for a code block; `None` for non-code blocks.
pub fn code_download(block: &Block) -> Option<CodeDownload> {
    match &block.data {
        BlockData::Code(meta) => Some(CodeDownload {
            file_name: download_file_name(meta.language.as_deref()),
            content_type: CODE_DOWNLOAD_CONTENT_TYPE,
            body: block.content.as_bytes().to_vec(),
        }),
        _ => None,
    }
}

// ───── HTML ───────────────────────────────────────────────────────────

impl RenderedOutput {
    /// HTML fragment for this block; empty when there is no body.
    pub fn to_html(&self) -> String {
        match &self.body {
            Some(body) => body.to_html(),
            None => String::new(),
        }
    }
}

impl RenderedBlock {
    pub fn to_html(&self) -> String {
        match self {
            RenderedBlock::Paragraph { text } => format!("<p>{}</p>", escape(text)),
            RenderedBlock::Heading { text, subtitle } => {
                let mut html = format!("<h2>{}</h2>", escape(text));
                if let Some(subtitle) = subtitle {
                    html.push_str(&format!("<p class=\"block-subtitle\">{}</p>", escape(subtitle)));
                }
                html
            }
            RenderedBlock::Code { source, language, download_name } => format!(
                "<figure class=\"block-code\" data-download=\"{}\"><pre><code class=\"language-{}\">{}</code></pre></figure>",
                escape(download_name),
                escape(language),
                escape(source)
            ),
            RenderedBlock::Image { src, alt, caption } => figure(
                format!("<img src=\"{}\" alt=\"{}\">", safe_url(src), escape(alt)),
                caption,
            ),
            RenderedBlock::Link { href, label } => format!(
                "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                safe_url(href),
                escape(label)
            ),
            RenderedBlock::EmbeddedVideo { src, caption } => figure(
                format!(
                    "<iframe src=\"{}\" frameborder=\"0\" allowfullscreen></iframe>",
                    safe_url(src)
                ),
                caption,
            ),
            RenderedBlock::NativeVideo { src, poster, caption } => {
                let poster = poster
                    .as_deref()
                    .map(|p| format!(" poster=\"{}\"", safe_url(p)))
                    .unwrap_or_default();
                figure(
                    format!("<video src=\"{}\" controls{}></video>", safe_url(src), poster),
                    caption,
                )
            }
            RenderedBlock::Gif { src, caption } => figure(
                format!("<img class=\"block-gif\" src=\"{}\" alt=\"\">", safe_url(src)),
                caption,
            ),
            RenderedBlock::Icon { src, caption } => figure(
                format!("<img class=\"block-icon\" src=\"{}\" alt=\"\">", safe_url(src)),
                caption,
            ),
            RenderedBlock::List { style, items } => {
                let tag = match style {
                    ListStyle::Bullet => "ul",
                    ListStyle::Number => "ol",
                };
                let items: String = items
                    .iter()
                    .map(|item| format!("<li>{}</li>", escape(item)))
                    .collect();
                format!("<{tag}>{items}</{tag}>")
            }
            RenderedBlock::Space { height } => format!(
                "<div class=\"block-space\" style=\"height: {}px\" aria-hidden=\"true\"></div>",
                height
            ),
            RenderedBlock::Divider { label: None } => "<hr>".to_string(),
            RenderedBlock::Divider { label: Some(label) } => format!(
                "{}<span>{}</span></div>",
                open("div", "block-divider"),
                escape(label)
            ),
            RenderedBlock::Callout { text } => {
                format!("{}{}</aside>", open("aside", "block-callout"), escape(text))
            }
            RenderedBlock::Quote { text, author } => {
                let cite = author
                    .as_deref()
                    .map(|a| format!("<cite>{}</cite>", escape(a)))
                    .unwrap_or_default();
                format!("<blockquote><p>{}</p>{}</blockquote>", escape(text), cite)
            }
            RenderedBlock::Unsupported { raw_type } => format!(
                "{}Unsupported block type: {}</div>",
                open("div", "block-unsupported"),
                escape(raw_type)
            ),
        }
    }
}

fn figure(inner: String, caption: &Option<String>) -> String {
    match caption {
        Some(caption) => format!("<figure>{}<figcaption>{}</figcaption></figure>", inner, escape(caption)),
        None => format!("<figure>{}</figure>", inner),
    }
}

/// Concatenated HTML for a rendered sequence.
pub fn to_html(outputs: &[RenderedOutput]) -> String {
    outputs.iter().map(RenderedOutput::to_html).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::entities::block::{BlockData, BlockId, BlockKind, RawBlock};

    fn block(kind: &str, content: &str, metadata: Value) -> Block {
        let raw: RawBlock = serde_json::from_value(json!({
            "id": "b1",
            "type": kind,
            "content": content,
            "metadata": metadata
        }))
        .unwrap();
        Block::from_raw(raw).unwrap()
    }

    #[test]
    fn list_drops_blank_lines_and_defaults_to_bullets() {
        let output = render(&block("list", "one\ntwo\n\nthree", json!({})), RenderMode::ReadOnly);

        assert_eq!(
            output.body,
            Some(RenderedBlock::List {
                style: ListStyle::Bullet,
                items: vec!["one".into(), "two".into(), "three".into()],
            })
        );
        assert_eq!(output.to_html(), "<ul><li>one</li><li>two</li><li>three</li></ul>");
    }

    #[test]
    fn numbered_list_uses_ordered_markup() {
        let output = render(&block("list", " a \n b", json!({"type": "number"})), RenderMode::ReadOnly);
        assert_eq!(output.to_html(), "<ol><li>a</li><li>b</li></ol>");
    }

    #[test]
    fn youtube_watch_links_become_embeds() {
        let output = render(
            &block("video", "https://youtube.com/watch?v=XYZ", json!({})),
            RenderMode::ReadOnly,
        );

        match output.body {
            Some(RenderedBlock::EmbeddedVideo { src, .. }) => assert!(src.ends_with("/embed/XYZ")),
            other => panic!("expected embedded video, got {:?}", other),
        }
        assert_eq!(
            embed_url("https://youtu.be/abc123").as_deref(),
            Some("https://www.youtube.com/embed/abc123")
        );
    }

    #[test]
    fn other_videos_render_natively_with_poster() {
        let output = render(
            &block("video", "https://cdn.example.com/clip.mp4", json!({"thumbnail": "https://cdn.example.com/p.jpg"})),
            RenderMode::ReadOnly,
        );

        assert_eq!(
            output.body,
            Some(RenderedBlock::NativeVideo {
                src: "https://cdn.example.com/clip.mp4".into(),
                poster: Some("https://cdn.example.com/p.jpg".into()),
                caption: None,
            })
        );
    }

    #[test]
    fn space_defaults_to_forty_pixels() {
        let output = render(&block("space", "", json!({})), RenderMode::ReadOnly);
        assert_eq!(output.body, Some(RenderedBlock::Space { height: 40 }));

        let tall = render(&block("space", "", json!({"height": "80"})), RenderMode::ReadOnly);
        assert_eq!(tall.body, Some(RenderedBlock::Space { height: 80 }));
    }

    #[test]
    fn divider_shows_label_only_when_present() {
        let plain = render(&block("divider", "  ", json!({})), RenderMode::ReadOnly);
        assert_eq!(plain.to_html(), "<hr>");

        let labelled = render(&block("divider", "Part 2", json!({})), RenderMode::ReadOnly);
        assert_eq!(labelled.body, Some(RenderedBlock::Divider { label: Some("Part 2".into()) }));
    }

    #[test]
    fn code_defaults_language_and_download_name() {
        let plain = block("code", "fn main() {}", json!({}));
        let output = render(&plain, RenderMode::ReadOnly);

        assert_eq!(
            output.body,
            Some(RenderedBlock::Code {
                source: "fn main() {}".into(),
                language: "text".into(),
                download_name: "code.txt".into(),
            })
        );

        let rust = block("code", "fn main() {}", json!({"language": "rs"}));
        let download = code_download(&rust).unwrap();
        assert_eq!(download.file_name, "code.rs");
        assert_eq!(download.body, b"fn main() {}");
        assert_eq!(rust, block("code", "fn main() {}", json!({"language": "rs"})));
    }

    #[test]
    fn unknown_blocks_are_silent_when_read_only_and_flagged_when_editing() {
        let unknown = block("hologram", "x", json!({}));

        assert_eq!(render(&unknown, RenderMode::ReadOnly).body, None);
        assert_eq!(
            render(&unknown, RenderMode::Edit).body,
            Some(RenderedBlock::Unsupported { raw_type: "hologram".into() })
        );

        let seq = vec![block("text", "hi", json!({})), unknown];
        assert_eq!(render_blocks(&seq, RenderMode::ReadOnly).len(), 1);
        assert_eq!(render_blocks(&seq, RenderMode::Edit).len(), 2);
    }

    #[test]
    fn edit_mode_exposes_field_contract() {
        let quote = block("quote", "Stay hungry", json!({"author": "Someone"}));

        let read_only = render(&quote, RenderMode::ReadOnly);
        assert!(read_only.affordances.is_none());

        let edit = render(&quote, RenderMode::Edit);
        let affordances = edit.affordances.unwrap();
        assert!(affordances.content.is_some());
        assert!(affordances.metadata.iter().any(|f| f.name == "author"));
    }

    #[test]
    fn rendering_is_pure() {
        let b = block("link", "https://example.com", json!({"text": "Example"}));
        let before = b.clone();

        let first = render(&b, RenderMode::ReadOnly);
        let second = render(&b, RenderMode::ReadOnly);

        assert_eq!(first, second);
        assert_eq!(b, before);
        assert_eq!(
            first.body,
            Some(RenderedBlock::Link { href: "https://example.com".into(), label: "Example".into() })
        );
    }

    #[test]
    fn html_output_is_escaped() {
        let mut b = Block::new(BlockId::from("t"), BlockKind::Text);
        b.content = "<b>bold</b>".into();
        let html = render(&b, RenderMode::ReadOnly).to_html();
        assert!(!html.contains("<b>"));

        let unknown = Block {
            id: BlockId::from("u"),
            content: String::new(),
            data: BlockData::Unknown { raw_type: "<x>".into(), metadata: Map::new() },
        };
        assert!(!render(&unknown, RenderMode::Edit).to_html().contains("<x>"));
    }
}
