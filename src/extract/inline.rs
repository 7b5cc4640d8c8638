//! Rendering of paragraph runs and hyperlinks into inline markdown.

use crate::docx::{ParagraphChild, Run};
use crate::markdown::inline::{
    escape_emphasis, escape_link_text, percent_encode_url, wrap_emphasis,
};
use crate::model::InlineFormat;

/// Inline markdown for one paragraph plus the spans markdown cannot express.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedInline {
    /// Markdown text, trimmed
    pub markdown: String,
    /// Underline and hyperlink spans over the plain text
    pub formatting: Vec<InlineFormat>,
}

impl RenderedInline {
    /// Whether nothing visible was rendered.
    pub fn is_empty(&self) -> bool {
        self.markdown.is_empty()
    }
}

/// Render a paragraph's children left to right.
pub fn render_children(children: &[ParagraphChild]) -> RenderedInline {
    let mut writer = InlineWriter::default();
    for child in merge_runs(children) {
        match child {
            ParagraphChild::Run(run) => writer.run(&run),
            ParagraphChild::Hyperlink { url: Some(url), runs } => writer.hyperlink(&url, &runs),
            ParagraphChild::Hyperlink { url: None, runs } => {
                runs.iter().for_each(|run| writer.run(run));
            }
        }
    }
    writer.finish()
}

/// Join adjacent plain runs that carry identical formatting.
fn merge_runs(children: &[ParagraphChild]) -> Vec<ParagraphChild> {
    let mut merged: Vec<ParagraphChild> = Vec::with_capacity(children.len());
    for child in children {
        if let (Some(ParagraphChild::Run(last)), ParagraphChild::Run(run)) = (merged.last_mut(), child)
        {
            if last.bold == run.bold && last.italic == run.italic && last.underline == run.underline {
                last.text.push_str(&run.text);
                continue;
            }
        }
        merged.push(child.clone());
    }
    merged
}

/// Runs are kept on one line so every block stays a single markdown line.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[derive(Debug, Default)]
struct InlineWriter {
    markdown: String,
    formatting: Vec<InlineFormat>,
    position: usize,
}

impl InlineWriter {
    fn run(&mut self, run: &Run) {
        if run.is_empty() {
            return;
        }
        let text = single_line(&run.text);
        let len = text.chars().count();

        self.markdown
            .push_str(&wrap_emphasis(&escape_emphasis(&text), run.bold, run.italic));
        if run.underline && !text.trim().is_empty() {
            self.formatting.push(InlineFormat::Underline {
                start: self.position,
                end: self.position + len,
            });
        }
        self.position += len;
    }

    fn hyperlink(&mut self, url: &str, runs: &[Run]) {
        let visible: Vec<&Run> = runs.iter().filter(|r| !r.is_empty()).collect();
        let text = single_line(&visible.iter().map(|r| r.text.as_str()).collect::<String>());
        if text.is_empty() {
            return;
        }
        let bold = visible.iter().all(|r| r.bold);
        let italic = visible.iter().all(|r| r.italic);
        let marker = match (bold, italic) {
            (true, true) => "***",
            (true, false) => "**",
            (false, true) => "*",
            (false, false) => "",
        };
        let len = text.chars().count();

        self.markdown.push_str(&format!(
            "[{marker}{}{marker}]({})",
            escape_link_text(&text),
            percent_encode_url(url)
        ));
        self.formatting.push(InlineFormat::Hyperlink {
            start: self.position,
            end: self.position + len,
            url: url.to_string(),
        });
        self.position += len;
    }

    /// Trim the line and shift spans past any dropped leading whitespace.
    fn finish(self) -> RenderedInline {
        let lead = self
            .markdown
            .chars()
            .take_while(|c| c.is_whitespace())
            .count();
        let markdown = self.markdown.trim().to_string();
        if lead == 0 || self.formatting.is_empty() {
            return RenderedInline {
                markdown,
                formatting: self.formatting,
            };
        }

        let formatting = self
            .formatting
            .into_iter()
            .map(|span| match span {
                InlineFormat::Underline { start, end } => InlineFormat::Underline {
                    start: start.saturating_sub(lead),
                    end: end.saturating_sub(lead),
                },
                InlineFormat::Hyperlink { start, end, url } => InlineFormat::Hyperlink {
                    start: start.saturating_sub(lead),
                    end: end.saturating_sub(lead),
                    url,
                },
            })
            .filter(|span| {
                let (start, end) = span.range();
                end > start
            })
            .collect();

        RenderedInline {
            markdown,
            formatting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn runs(children: Vec<ParagraphChild>) -> RenderedInline {
        render_children(&children)
    }

    #[test]
    fn test_bold_italic_markers() {
        let out = runs(vec![
            ParagraphChild::Run(Run::new("Plain ")),
            ParagraphChild::Run(Run::bold("bold")),
            ParagraphChild::Run(Run::new(" and ")),
            ParagraphChild::Run(Run::italic("italic")),
            ParagraphChild::Run(Run {
                text: " both".into(),
                bold: true,
                italic: true,
                underline: false,
            }),
        ]);
        assert_eq!(out.markdown, "Plain **bold** and *italic* ***both***");
        assert!(out.formatting.is_empty());
    }

    #[test]
    fn test_underline_span_uses_plain_offsets() {
        let out = runs(vec![
            ParagraphChild::Run(Run::bold("Bold")),
            ParagraphChild::Run(Run::new(" ")),
            ParagraphChild::Run(Run {
                text: "under".into(),
                bold: false,
                italic: false,
                underline: true,
            }),
        ]);
        assert_eq!(out.markdown, "**Bold** under");
        assert_eq!(out.formatting, vec![InlineFormat::Underline { start: 5, end: 10 }]);
    }

    #[test]
    fn test_empty_runs_are_skipped() {
        let out = runs(vec![
            ParagraphChild::Run(Run::bold("")),
            ParagraphChild::Run(Run::new("text")),
        ]);
        assert_eq!(out.markdown, "text");
    }

    #[test]
    fn test_hyperlink_rendering() {
        let out = runs(vec![
            ParagraphChild::Run(Run::new("Visit ")),
            ParagraphChild::Hyperlink {
                url: Some("https://www.google.com".into()),
                runs: vec![Run::new("Google")],
            },
            ParagraphChild::Run(Run::new(" today")),
        ]);
        assert_eq!(out.markdown, "Visit [Google](https://www.google.com) today");
        assert_eq!(
            out.formatting,
            vec![InlineFormat::Hyperlink {
                start: 6,
                end: 12,
                url: "https://www.google.com".into()
            }]
        );
    }

    #[test]
    fn test_hyperlink_with_formatting_and_escapes() {
        let out = runs(vec![ParagraphChild::Hyperlink {
            url: Some("https://example.com/my page".into()),
            runs: vec![Run::bold("see [1]")],
        }]);
        assert_eq!(out.markdown, r"[**see \[1\]**](https://example.com/my%20page)");
        match &out.formatting[0] {
            InlineFormat::Hyperlink { url, .. } => assert_eq!(url, "https://example.com/my page"),
            other => panic!("unexpected span {:?}", other),
        }
    }

    #[test]
    fn test_hyperlink_without_target_is_plain() {
        let out = runs(vec![ParagraphChild::Hyperlink {
            url: None,
            runs: vec![Run::italic("anchor")],
        }]);
        assert_eq!(out.markdown, "*anchor*");
        assert!(out.formatting.is_empty());
    }

    #[test]
    fn test_leading_whitespace_shifts_spans() {
        let out = runs(vec![
            ParagraphChild::Run(Run::new("  ")),
            ParagraphChild::Run(Run::underlined("x")),
        ]);
        assert_eq!(out.markdown, "x");
        assert_eq!(out.formatting, vec![InlineFormat::Underline { start: 0, end: 1 }]);
    }

    #[test]
    fn test_adjacent_runs_merge() {
        let out = runs(vec![
            ParagraphChild::Run(Run::bold("Hel")),
            ParagraphChild::Run(Run::bold("lo")),
        ]);
        assert_eq!(out.markdown, "**Hello**");
    }
}
