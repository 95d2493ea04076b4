//! Document outline produced at the end of a conversation
//!
//! The model answers in markdown; this module turns that markdown into a flat
//! list of headed sections and renders it back out as markdown (for display)
//! or as a Lexical-style rich-text editor state (for the host document).

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Placeholder the model is asked to leave where the writer's own content goes
pub const TBD_PLACEHOLDER: &str = "🚧 TBD";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutlineError {
    #[error("markdown contains no usable headings")]
    Empty,
}

/// One heading of the outline together with the guidance notes below it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSection {
    /// Heading level, 2 through 6 (top-level headings are reserved for the document title)
    pub level: u8,
    pub title: String,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl OutlineSection {
    pub fn new(level: u8, title: impl Into<String>) -> Self {
        Self {
            level: level.clamp(2, 6),
            title: title.into(),
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Structured document outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Outline {
    /// Paragraphs ahead of the first section, such as an introduction
    /// written under the title
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preamble: Vec<String>,
    pub sections: Vec<OutlineSection>,
}

impl Outline {
    pub fn new(sections: Vec<OutlineSection>) -> Self {
        Self {
            preamble: Vec::new(),
            sections,
        }
    }

    pub fn with_preamble(mut self, paragraph: impl Into<String>) -> Self {
        self.preamble.push(paragraph.into());
        self
    }

    /// Parse model markdown into an outline.
    ///
    /// H1 headings are dropped but the text under them is kept: before the
    /// first section it becomes the preamble, afterwards it joins the
    /// preceding section's notes.
    pub fn from_markdown(markdown: &str) -> Result<Self, OutlineError> {
        let mut outline = Self::default();
        let mut heading: Option<(u8, String)> = None;
        let mut note: Option<String> = None;

        for event in Parser::new(markdown) {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    outline.flush_note(&mut note);
                    heading = Some((level as u8, String::new()));
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((level, title)) = heading.take() {
                        let title = title.trim();
                        if level > 1 && !title.is_empty() {
                            outline.sections.push(OutlineSection::new(level, title));
                        }
                    }
                }
                Event::Start(Tag::Item) => {
                    outline.flush_note(&mut note);
                    note = Some(String::new());
                }
                Event::Start(Tag::Paragraph) => {
                    if note.is_none() {
                        note = Some(String::new());
                    }
                }
                Event::End(TagEnd::Paragraph | TagEnd::Item) => {
                    outline.flush_note(&mut note);
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, title)) = heading.as_mut() {
                        title.push_str(&text);
                    } else if let Some(buf) = note.as_mut() {
                        buf.push_str(&text);
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if let Some((_, title)) = heading.as_mut() {
                        title.push(' ');
                    } else if let Some(buf) = note.as_mut() {
                        buf.push(' ');
                    }
                }
                _ => {}
            }
        }

        if outline.sections.is_empty() {
            return Err(OutlineError::Empty);
        }
        Ok(outline)
    }

    fn flush_note(&mut self, note: &mut Option<String>) {
        let Some(text) = note.take() else {
            return;
        };
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match self.sections.last_mut() {
            Some(section) => section.notes.push(text.to_string()),
            None => self.preamble.push(text.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Render the outline back to markdown
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for paragraph in &self.preamble {
            out.push_str(paragraph);
            out.push_str("\n\n");
        }
        for section in &self.sections {
            out.push_str(&"#".repeat(usize::from(section.level)));
            out.push(' ');
            out.push_str(&section.title);
            out.push_str("\n\n");
            for note in &section.notes {
                out.push_str(note);
                out.push_str("\n\n");
            }
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
        out
    }

    /// Render as a Lexical editor state
    pub fn to_rich_text(&self) -> Value {
        let mut children: Vec<Value> = self
            .preamble
            .iter()
            .map(|paragraph| paragraph_node(Some(paragraph.as_str())))
            .collect();
        for section in &self.sections {
            children.push(heading_node(section.level, &section.title));
            for note in &section.notes {
                children.push(paragraph_node(Some(note.as_str())));
            }
        }
        root_node(children)
    }
}

/// Editor state of an empty rich-text field
pub fn empty_rich_text() -> Value {
    root_node(vec![paragraph_node(None)])
}

/// Remove a surrounding markdown code fence, if the model wrapped its answer in one
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the opening fence line including any language tag
    let Some((_, body)) = rest.split_once('\n') else {
        return "";
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn root_node(children: Vec<Value>) -> Value {
    json!({
        "root": {
            "type": "root",
            "children": children,
            "direction": "ltr",
            "format": "",
            "indent": 0,
            "version": 1
        }
    })
}

fn heading_node(level: u8, title: &str) -> Value {
    json!({
        "type": "heading",
        "tag": format!("h{}", level.clamp(2, 6)),
        "children": [text_node(title)],
        "direction": "ltr",
        "format": "",
        "indent": 0,
        "version": 1
    })
}

fn paragraph_node(text: Option<&str>) -> Value {
    let children: Vec<Value> = text.into_iter().map(text_node).collect();
    let direction = if children.is_empty() {
        Value::Null
    } else {
        json!("ltr")
    };
    json!({
        "type": "paragraph",
        "children": children,
        "direction": direction,
        "format": "",
        "indent": 0,
        "textFormat": 0,
        "version": 1
    })
}

fn text_node(text: &str) -> Value {
    json!({
        "type": "text",
        "text": text,
        "detail": 0,
        "format": 0,
        "mode": "normal",
        "style": "",
        "version": 1
    })
}
