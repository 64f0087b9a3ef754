//! Normalization of extracted text before it is chunked and spoken.

/// Map typographic characters to plain ASCII a speech command reads cleanly.
///
/// Returns `None` for characters that should be dropped.
fn speakable(c: char) -> Option<&'static str> {
    let plain = match c {
        '\u{2018}' | '\u{2019}' | '\u{2032}' => "'",
        '\u{201c}' | '\u{201d}' | '\u{2033}' | '\u{00ab}' | '\u{00bb}' => "\"",
        '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' => "-",
        '\u{2026}' => "...",
        '\u{00a0}' | '\t' => " ",
        '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' => return None,
        _ => return Some(""),
    };
    Some(plain)
}

/// Clean text for narration.
///
/// Smart punctuation becomes ASCII, control characters are dropped,
/// runs of spaces collapse, paragraphs are kept (at most one blank line)
/// and runs of periods become a single period.
pub fn clean_text(text: &str) -> String {
    let mut mapped = String::with_capacity(text.len());
    for c in text.chars() {
        match speakable(c) {
            None => {}
            Some("") if c == '\n' || !c.is_control() => mapped.push(c),
            Some("") => {}
            Some(plain) => mapped.push_str(plain),
        }
    }

    let paragraphs: Vec<String> = mapped
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect();

    collapse_periods(&paragraphs.join("\n\n"))
}

fn collapse_periods(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last = None;
    for c in text.chars() {
        if !(c == '.' && last == Some('.')) {
            result.push(c);
        }
        last = Some(c);
    }
    result
}
