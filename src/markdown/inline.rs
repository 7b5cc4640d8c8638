//! Inline markdown: emphasis markers, hyperlinks and URL encoding.
//!
//! Only the subset written by extraction is understood: `*`/`**`/`***`
//! emphasis, backslash escapes, and `[text](url)` links.

use regex::Regex;
use std::sync::LazyLock;

use crate::docx::Run;

/// Markdown hyperlink `[text](url)`; link text may contain `\[` and `\]`.
pub static HYPERLINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[((?:[^\]\\]|\\.)*)\]\(([^)]+)\)").expect("static hyperlink pattern")
});

/// Characters that may follow a backslash to be taken literally.
const ESCAPABLE: &[char] = &['\\', '*', '[', ']', '#'];

/// Whether `text` contains at least one markdown hyperlink.
pub fn has_hyperlinks(text: &str) -> bool {
    HYPERLINK_PATTERN.is_match(text)
}

/// A piece of inline text split around hyperlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSegment<'a> {
    /// Text outside any link
    Text(&'a str),
    /// A link with its raw (still escaped) text and raw (still encoded) URL
    Link {
        /// Link text as written
        text: &'a str,
        /// Link target as written
        url: &'a str,
    },
}

/// Split text into plain segments and hyperlinks, in order.
pub fn split_links(text: &str) -> Vec<LinkSegment<'_>> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in HYPERLINK_PATTERN.captures_iter(text) {
        let (Some(whole), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(LinkSegment::Text(&text[last..whole.start()]));
        }
        segments.push(LinkSegment::Link {
            text: label.as_str(),
            url: url.as_str(),
        });
        last = whole.end();
    }
    if last < text.len() {
        segments.push(LinkSegment::Text(&text[last..]));
    }
    segments
}

/// Escape backslashes and brackets in link text.
pub fn escape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Undo [`escape_link_text`].
pub fn unescape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&next) if c == '\\' && matches!(next, '\\' | '[' | ']') => {
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Escape a leading `#` so a paragraph is not re-read as a heading.
pub fn escape_heading_marker(markdown: String) -> String {
    if markdown.starts_with('#') {
        format!("\\{}", markdown)
    } else {
        markdown
    }
}

/// Escape emphasis markers in plain run text so they survive a re-parse.
pub fn escape_emphasis(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("\\*"),
            '\\' if chars.peek().is_some_and(|n| ESCAPABLE.contains(n)) => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode characters that would break `[text](url)` syntax.
///
/// Spaces, parentheses, angle brackets, control characters and non-ASCII
/// bytes are encoded; everything else (including `%`) is kept as is.
pub fn percent_encode_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        if c.is_ascii() && !c.is_ascii_control() && !matches!(c, ' ' | '(' | ')' | '<' | '>') {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}

/// Decode `%XX` sequences. Malformed sequences are kept literally.
pub fn percent_decode(url: &str) -> String {
    let bytes = url.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strip a single layer of emphasis wrapping from link text.
///
/// Returns `(plain_text, bold, italic)`; escaped brackets are unescaped.
pub fn parse_link_text_formatting(link_text: &str) -> (String, bool, bool) {
    let len = link_text.chars().count();
    let wrapped = |marker: &str| {
        link_text.starts_with(marker)
            && link_text.ends_with(marker)
            && len > marker.len() * 2
    };

    let (text, bold, italic) = if wrapped("***") || wrapped("___") {
        (&link_text[3..link_text.len() - 3], true, true)
    } else if wrapped("**") || wrapped("__") {
        (&link_text[2..link_text.len() - 2], true, false)
    } else if wrapped("*") || wrapped("_") {
        (&link_text[1..link_text.len() - 1], false, true)
    } else {
        (link_text, false, false)
    };

    (unescape_link_text(text), bold, italic)
}

/// Wrap text in the emphasis markers for the given flags.
///
/// Surrounding whitespace stays outside the markers so the result parses back.
pub fn wrap_emphasis(text: &str, bold: bool, italic: bool) -> String {
    let marker = match (bold, italic) {
        (true, true) => "***",
        (true, false) => "**",
        (false, true) => "*",
        (false, false) => return text.to_string(),
    };

    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }
    let lead = &text[..text.len() - text.trim_start().len()];
    let trail = &text[text.trim_end().len()..];
    format!("{lead}{marker}{core}{marker}{trail}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Strong,
    Em,
}

#[derive(Debug)]
struct Delimiter {
    remaining: usize,
    can_open: bool,
    can_close: bool,
    opens: Vec<Emphasis>,
    closes: Vec<Emphasis>,
}

#[derive(Debug)]
enum Token {
    Text(String),
    Delim(Delimiter),
}

/// Parse `*` emphasis into formatted runs.
///
/// Pairing follows the usual delimiter-run rules: a run of asterisks may open
/// when it is left-flanking and close when it is right-flanking; two or more
/// on both sides make bold, otherwise italic. Markers that find no partner
/// are kept as literal text, so any input yields runs whose concatenated
/// text is the input minus the markers that were consumed.
pub fn parse_emphasis(text: &str) -> Vec<Run> {
    let mut tokens = tokenize(text);
    pair_delimiters(&mut tokens);
    emit_runs(tokens)
}

fn is_punct(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

fn left_flanking(before: Option<char>, after: Option<char>) -> bool {
    match after {
        None => false,
        Some(a) if a.is_whitespace() => false,
        Some(a) => !is_punct(a) || before.map_or(true, |b| b.is_whitespace() || is_punct(b)),
    }
}

fn right_flanking(before: Option<char>, after: Option<char>) -> bool {
    match before {
        None => false,
        Some(b) if b.is_whitespace() => false,
        Some(b) => !is_punct(b) || after.map_or(true, |a| a.is_whitespace() || is_punct(a)),
    }
}

fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && chars.get(i + 1).is_some_and(|n| ESCAPABLE.contains(n)) {
            buf.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c != '*' {
            buf.push(c);
            i += 1;
            continue;
        }

        let start = i;
        while chars.get(i) == Some(&'*') {
            i += 1;
        }
        let before = start.checked_sub(1).map(|p| chars[p]);
        let after = chars.get(i).copied();

        if !buf.is_empty() {
            tokens.push(Token::Text(std::mem::take(&mut buf)));
        }
        tokens.push(Token::Delim(Delimiter {
            remaining: i - start,
            can_open: left_flanking(before, after),
            can_close: right_flanking(before, after),
            opens: Vec::new(),
            closes: Vec::new(),
        }));
    }

    if !buf.is_empty() {
        tokens.push(Token::Text(buf));
    }
    tokens
}

fn remaining(tokens: &[Token], i: usize) -> usize {
    match &tokens[i] {
        Token::Delim(d) => d.remaining,
        Token::Text(_) => 0,
    }
}

fn pair_delimiters(tokens: &mut [Token]) {
    // Indices of delimiter runs that may still open; each has remaining > 0.
    let mut openers: Vec<usize> = Vec::new();

    for i in 0..tokens.len() {
        let (can_open, can_close) = match &tokens[i] {
            Token::Delim(d) => (d.can_open, d.can_close),
            Token::Text(_) => continue,
        };

        if can_close {
            while remaining(tokens, i) > 0 {
                let Some(&j) = openers.last() else {
                    break;
                };
                let used = if remaining(tokens, i) >= 2 && remaining(tokens, j) >= 2 {
                    2
                } else {
                    1
                };
                let kind = if used == 2 {
                    Emphasis::Strong
                } else {
                    Emphasis::Em
                };

                if let Token::Delim(opener) = &mut tokens[j] {
                    opener.remaining -= used;
                    opener.opens.push(kind);
                }
                if let Token::Delim(closer) = &mut tokens[i] {
                    closer.remaining -= used;
                    closer.closes.push(kind);
                }
                if remaining(tokens, j) == 0 {
                    openers.pop();
                }
            }
        }

        if can_open && remaining(tokens, i) > 0 {
            openers.push(i);
        }
    }
}

fn push_text(runs: &mut Vec<Run>, text: &str, bold: bool, italic: bool) {
    if text.is_empty() {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.bold == bold && last.italic == italic => last.text.push_str(text),
        _ => runs.push(Run {
            text: text.to_string(),
            bold,
            italic,
            underline: false,
        }),
    }
}

fn emit_runs(tokens: Vec<Token>) -> Vec<Run> {
    let mut runs = Vec::new();
    let (mut strong, mut em) = (0usize, 0usize);

    for token in tokens {
        match token {
            Token::Text(text) => push_text(&mut runs, &text, strong > 0, em > 0),
            Token::Delim(d) => {
                for kind in d.closes {
                    match kind {
                        Emphasis::Strong => strong = strong.saturating_sub(1),
                        Emphasis::Em => em = em.saturating_sub(1),
                    }
                }
                push_text(&mut runs, &"*".repeat(d.remaining), strong > 0, em > 0);
                for kind in d.opens {
                    match kind {
                        Emphasis::Strong => strong += 1,
                        Emphasis::Em => em += 1,
                    }
                }
            }
        }
    }

    runs
}
