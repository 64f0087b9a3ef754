// Loading narration input: EPUB books and plain text files

use anyhow::{Context, Result};
use std::path::Path;

/// One section of readable text
#[derive(Debug, Clone)]
pub struct Chapter {
    /// Heading, if the source had one
    pub title: Option<String>,
    pub text: String,
}

/// A document ready for narration
#[derive(Debug)]
pub struct Book {
    pub title: String,
    pub author: Option<String>,
    pub chapters: Vec<Chapter>,
    /// Plain text input can grow while it is being read
    pub appendable: bool,
}

impl Book {
    /// Text to narrate: one chapter, or every chapter in order.
    ///
    /// Chapter headings are read before their text.
    pub fn narration_text(&self, chapter: Option<usize>) -> Result<String> {
        let selected: Vec<&Chapter> = match chapter {
            Some(index) => vec![self.chapters.get(index).with_context(|| {
                format!(
                    "Chapter {} out of range (book has {})",
                    index,
                    self.chapters.len()
                )
            })?],
            None => self.chapters.iter().collect(),
        };

        Ok(selected
            .iter()
            .map(|c| match &c.title {
                Some(title) if !c.text.starts_with(title.as_str()) => {
                    format!("{}.\n\n{}", title.trim_end_matches('.'), c.text)
                }
                _ => c.text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    pub fn total_words(&self) -> usize {
        self.chapters
            .iter()
            .map(|c| c.text.split_whitespace().count())
            .sum()
    }
}

/// Load `path` as an EPUB (by extension) or as UTF-8 text.
pub fn load_book(path: &Path) -> Result<Book> {
    let is_epub = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("epub"))
        .unwrap_or(false);

    if is_epub {
        parse_epub(path)
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(plain_text_book(path, &text))
    }
}

fn plain_text_book(path: &Path, text: &str) -> Book {
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string());

    Book {
        title,
        author: None,
        chapters: vec![Chapter {
            title: None,
            text: text.to_string(),
        }],
        appendable: true,
    }
}

fn parse_epub(path: &Path) -> Result<Book> {
    let mut doc =
        epub::doc::EpubDoc::new(path).map_err(|e| anyhow::anyhow!("Failed to open EPUB: {}", e))?;

    let title = doc
        .mdata("title")
        .map(|m| m.value.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let author = doc.mdata("creator").map(|m| m.value.clone());

    let mut chapters = Vec::new();
    let spine = doc.spine.clone();
    for item in &spine {
        let Some((bytes, _mime)) = doc.get_resource(&item.idref) else {
            log::debug!("Spine item {} has no resource", item.idref);
            continue;
        };
        let html = String::from_utf8_lossy(&bytes);
        let text = html_to_text(&html);
        if text.trim().is_empty() {
            continue;
        }
        chapters.push(Chapter {
            title: heading(&html),
            text,
        });
    }

    if chapters.is_empty() {
        anyhow::bail!("No readable chapters in {}", path.display());
    }

    Ok(Book {
        title,
        author,
        chapters,
        appendable: false,
    })
}

/// First non-empty `<h1>` or `<h2>` of a chapter.
fn heading(html: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets valid for slicing `html`
    let lower = html.to_ascii_lowercase();
    ["h1", "h2"].iter().find_map(|tag| {
        let open = lower.find(&format!("<{}", tag))?;
        let content_start = open + lower[open..].find('>')? + 1;
        let content_end = content_start + lower[content_start..].find(&format!("</{}>", tag))?;
        let text = strip_tags(&html[content_start..content_end]);
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    })
}

fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

/// Render chapter HTML as paragraphs of plain text.
fn html_to_text(html: &str) -> String {
    let rendered = html2text::from_read(html.as_bytes(), 10_000);

    // html2text hard-wraps; rejoin lines into paragraphs
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in rendered.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    decode_entities(&paragraphs.join("\n\n"))
}

/// Entities html2text leaves behind in some books.
fn decode_entities(text: &str) -> String {
    const ENTITIES: &[(&str, &str)] = &[
        ("&nbsp;", " "),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&rsquo;", "'"),
        ("&lsquo;", "'"),
        ("&rdquo;", "\""),
        ("&ldquo;", "\""),
        ("&mdash;", "-"),
        ("&ndash;", "-"),
        ("&hellip;", "..."),
        // Last, so "&amp;lt;" stays "&lt;"
        ("&amp;", "&"),
    ];
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, plain)| acc.replace(entity, plain))
}
