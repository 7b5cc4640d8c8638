//! End-to-end tests: Word document -> archive -> Word document.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use sidedoc::docx::{OutParagraph, ParagraphChild, Run};
use sidedoc::{
    build_file, extract_file, Archive, BuildOptions, DocumentSink, DocumentSource, DocxReader,
    DocxWriter, ExtractOptions,
};

fn paragraph(style: &str, runs: Vec<Run>) -> OutParagraph {
    let mut p = OutParagraph::styled(style);
    for run in runs {
        p.push_run(run);
    }
    p
}

fn save(writer: DocxWriter, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, writer.finish().unwrap()).unwrap();
    path
}

fn texts(path: &Path) -> Vec<String> {
    DocxReader::open(path)
        .unwrap()
        .paragraphs()
        .unwrap()
        .iter()
        .map(|p| p.text())
        .collect()
}

#[test]
fn test_headings_and_paragraphs_survive_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let expected = [
        ("Heading 1", "Annual Report"),
        ("Normal", "This report covers the fiscal year."),
        ("Heading 2", "Revenue"),
        ("Normal", "Revenue increased by twelve percent."),
        ("Normal", "Growth was strongest in the second half."),
        ("Heading 2", "Outlook"),
        ("Normal", "We expect continued growth next year."),
    ];

    let mut writer = DocxWriter::new();
    for (style, text) in expected {
        writer
            .add_paragraph(paragraph(style, vec![Run::new(text)]))
            .unwrap();
    }
    let source = save(writer, dir.path(), "report.docx");

    let archive_path = dir.path().join("report.sidedoc");
    let extracted = extract_file(&source, Some(&archive_path), &ExtractOptions::default()).unwrap();
    assert_eq!(extracted.blocks, 7);

    let archive = Archive::open(&archive_path).unwrap();
    assert_eq!(
        archive.content,
        "# Annual Report\nThis report covers the fiscal year.\n## Revenue\n\
         Revenue increased by twelve percent.\nGrowth was strongest in the second half.\n\
         ## Outlook\nWe expect continued growth next year."
    );

    let output = dir.path().join("rebuilt.docx");
    let report = build_file(&archive_path, Some(&output), &BuildOptions::default()).unwrap();
    assert_eq!(report.paragraphs, 7);

    let rebuilt = texts(&output);
    let original: Vec<String> = expected.iter().map(|(_, t)| t.to_string()).collect();
    assert_eq!(rebuilt, original);

    let styles: Vec<String> = DocxReader::open(&output)
        .unwrap()
        .paragraphs()
        .unwrap()
        .into_iter()
        .map(|p| p.style_name)
        .collect();
    assert_eq!(styles[0], "Heading 1");
    assert_eq!(styles[2], "Heading 2");
    assert_eq!(styles[1], "Normal");
}

#[test]
fn test_inline_formatting_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    let mut p = paragraph(
        "Normal",
        vec![Run::new("Visit "), Run::bold("our"), Run::new(" ")],
    );
    p.push_hyperlink("https://example.com/docs", Run::new("site"));
    let mut writer = DocxWriter::new();
    writer.add_paragraph(p).unwrap();
    writer
        .add_paragraph(paragraph(
            "Normal",
            vec![Run::new("An "), Run::italic("important"), Run::new(" note")],
        ))
        .unwrap();
    let source = save(writer, dir.path(), "links.docx");

    let archive_path = dir.path().join("links.sidedoc");
    extract_file(&source, Some(&archive_path), &ExtractOptions::default()).unwrap();
    let archive = Archive::open(&archive_path).unwrap();
    assert_eq!(
        archive.content,
        "Visit **our** [site](https://example.com/docs)\nAn *important* note"
    );
    assert!(!archive.blocks[0].inline_formatting.is_empty());

    let output = dir.path().join("links-out.docx");
    build_file(&archive_path, Some(&output), &BuildOptions::default()).unwrap();

    let paragraphs = DocxReader::open(&output).unwrap().paragraphs().unwrap();
    assert_eq!(paragraphs[0].text(), "Visit our site");
    assert!(paragraphs[0].children.iter().any(|c| matches!(
        c,
        ParagraphChild::Run(run) if run.bold && run.text == "our"
    )));
    assert!(paragraphs[0].children.iter().any(|c| matches!(
        c,
        ParagraphChild::Hyperlink { url: Some(url), .. } if url == "https://example.com/docs"
    )));
    assert_eq!(paragraphs[1].text(), "An important note");
    assert!(paragraphs[1].children.iter().any(|c| matches!(
        c,
        ParagraphChild::Run(run) if run.italic && run.text == "important"
    )));
}

#[test]
fn test_lists_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = DocxWriter::new();
    for text in ["Apples", "Pears"] {
        writer
            .add_paragraph(paragraph("List Bullet", vec![Run::new(text)]))
            .unwrap();
    }
    writer
        .add_paragraph(paragraph("Normal", vec![Run::new("Steps:")]))
        .unwrap();
    for text in ["Open", "Close"] {
        writer
            .add_paragraph(paragraph("List Number", vec![Run::new(text)]))
            .unwrap();
    }
    let source = save(writer, dir.path(), "lists.docx");

    let archive_path = dir.path().join("lists.sidedoc");
    extract_file(&source, Some(&archive_path), &ExtractOptions::default()).unwrap();
    let archive = Archive::open(&archive_path).unwrap();
    assert_eq!(
        archive.content,
        "- Apples\n- Pears\nSteps:\n1. Open\n2. Close"
    );

    let output = dir.path().join("lists-out.docx");
    build_file(&archive_path, Some(&output), &BuildOptions::default()).unwrap();
    let paragraphs = DocxReader::open(&output).unwrap().paragraphs().unwrap();
    let summary: Vec<(String, String)> = paragraphs
        .into_iter()
        .map(|p| (p.style_name.clone(), p.text()))
        .collect();
    assert_eq!(summary[0], ("List Bullet".to_string(), "Apples".to_string()));
    assert_eq!(summary[3], ("List Number".to_string(), "Open".to_string()));
    assert_eq!(summary[2], ("Normal".to_string(), "Steps:".to_string()));
}
