//! Extraction of images, lists and styles from Word documents.

use pretty_assertions::assert_eq;
use sidedoc::docx::{OutInline, OutParagraph, Run, SourceImage, SourceParagraph, EMU_PER_INCH};
use sidedoc::extract::MAX_IMAGE_SIZE;
use sidedoc::{
    extract_file, Alignment, Archive, BlockKind, DocumentSink, DocxWriter, ExtractOptions,
    Extractor,
};

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 2, 0, 0, 0, 0, 0, 0, 0]);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(b"IEND");
    data.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
    data
}

fn jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x0B, 0x08];
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
    data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0x00]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

fn image_paragraph(data: Vec<u8>, extension: &str) -> OutParagraph {
    let mut p = OutParagraph::default();
    p.content.push(OutInline::Image {
        data,
        extension: extension.to_string(),
        width_emu: EMU_PER_INCH,
        height_emu: EMU_PER_INCH,
    });
    p
}

#[test]
fn test_images_stored_and_spoofed_image_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = DocxWriter::new();
    writer.add_paragraph(OutParagraph::text("Before")).unwrap();
    writer.add_paragraph(image_paragraph(png(40, 20), "png")).unwrap();
    // A JPEG payload saved under a .png name.
    writer.add_paragraph(image_paragraph(jpeg(8, 8), "png")).unwrap();
    writer.add_paragraph(OutParagraph::text("After")).unwrap();
    let source = dir.path().join("images.docx");
    std::fs::write(&source, writer.finish().unwrap()).unwrap();

    let report = extract_file(&source, None::<&str>, &ExtractOptions::default()).unwrap();
    assert_eq!(report.images, 1);
    assert_eq!(report.rejected_images, 1);

    let archive = Archive::open(&report.output).unwrap();
    let lines: Vec<&str> = archive.content.lines().collect();
    assert_eq!(lines[0], "Before");
    assert_eq!(lines[1], "![Image 1](assets/image1.png)");
    assert!(lines[2].starts_with("[Image 2: "), "{}", lines[2]);
    assert!(lines[2].contains("format mismatch"), "{}", lines[2]);
    assert_eq!(lines[3], "After");

    assert_eq!(archive.assets.keys().collect::<Vec<_>>(), vec!["image1.png"]);
    assert_eq!(archive.assets["image1.png"], png(40, 20));
    assert_eq!(
        archive.blocks[1].kind,
        BlockKind::image("assets/image1.png")
    );
    assert_eq!(archive.blocks[2].kind, BlockKind::Paragraph);
    // Image blocks carry no style.
    assert!(archive.styles.get("block-1").is_none());
    assert!(archive.styles.get("block-2").is_some());
}

#[test]
fn test_oversized_image_rejected_with_size_message() {
    let mut huge = png(10, 10);
    huge.resize(MAX_IMAGE_SIZE as usize + 1, 0);
    let source = vec![
        SourceParagraph::new("Normal").with_image(SourceImage::new(huge, "png")),
        SourceParagraph::new("Normal").with_image(SourceImage::new(png(1, 1), "png")),
    ];

    let result = Extractor::new(ExtractOptions::default())
        .extract(&source)
        .unwrap();
    assert_eq!(result.blocks[0].kind, BlockKind::Paragraph);
    assert!(
        result.blocks[0].content.contains("exceeds maximum"),
        "{}",
        result.blocks[0].content
    );
    // Numbering stays stable after a rejection.
    assert_eq!(result.blocks[1].content, "![Image 2](assets/image2.png)");
    assert_eq!(result.images.len(), 1);
    assert!(result.images.contains_key("image2.png"));
}

#[test]
fn test_custom_image_limit() {
    let source = vec![SourceParagraph::new("Normal").with_image(SourceImage::new(png(4, 4), "png"))];
    let result = Extractor::new(ExtractOptions::new().with_max_image_size(16))
        .extract(&source)
        .unwrap();
    assert!(result.images.is_empty());
    assert_eq!(result.rejected_images(), 1);
}

#[test]
fn test_numbered_list_counter_resets() {
    let source = vec![
        SourceParagraph::new("List Number").with_run(Run::new("one")),
        SourceParagraph::new("List Number").with_run(Run::new("two")),
        SourceParagraph::new("List Bullet").with_run(Run::new("bullet")),
        SourceParagraph::new("List Number").with_run(Run::new("again")),
        SourceParagraph::new("Heading 3").with_run(Run::new("Section")),
        SourceParagraph::new("List Number 2").with_run(Run::new("fresh")),
    ];
    let result = Extractor::default().extract(&source).unwrap();
    assert_eq!(
        result.markdown(),
        "1. one\n2. two\n- bullet\n1. again\n### Section\n1. fresh"
    );
    assert_eq!(result.blocks[4].level(), Some(3));
    assert!(result.blocks[..4]
        .iter()
        .all(|b| b.kind == BlockKind::ListItem));
}

#[test]
fn test_offsets_and_hashes() {
    let source = vec![
        SourceParagraph::new("Heading 1").with_run(Run::new("Title")),
        SourceParagraph::new("Normal").with_run(Run::new("")),
        SourceParagraph::new("Normal").with_run(Run::new("Body")),
    ];
    let result = Extractor::default().extract(&source).unwrap();
    let markdown = result.markdown();
    assert_eq!(markdown, "# Title\nBody");

    for block in &result.blocks {
        let slice: String = markdown
            .chars()
            .skip(block.content_start)
            .take(block.content_end - block.content_start)
            .collect();
        assert_eq!(slice, block.content);
        assert_eq!(block.content_hash, sidedoc::hash::content_hash(&block.content));
    }
    assert_eq!(result.blocks[1].source_paragraph_index, 2);
}

#[test]
fn test_styles_from_document() {
    let dir = tempfile::tempdir().unwrap();
    let mut heading = OutParagraph::styled("Heading 1");
    heading.alignment = Some(Alignment::Center);
    heading.font_name = Some("Georgia".into());
    heading.font_size = Some(20);
    heading.push_run(Run::new("Centered"));

    let mut writer = DocxWriter::new();
    writer.add_paragraph(heading).unwrap();
    writer.add_paragraph(OutParagraph::text("Plain")).unwrap();
    let source = dir.path().join("styled.docx");
    std::fs::write(&source, writer.finish().unwrap()).unwrap();

    let report = extract_file(&source, None::<&str>, &ExtractOptions::default()).unwrap();
    let archive = Archive::open(&report.output).unwrap();

    let title = archive.styles.get("block-0").unwrap();
    assert_eq!(title.source_style_name, "Heading 1");
    assert_eq!(title.alignment, Alignment::Center);
    assert_eq!(title.font_name, "Georgia");
    assert_eq!(title.font_size, 20);

    let plain = archive.styles.get("block-1").unwrap();
    assert_eq!(plain.source_style_name, "Normal");
    assert_eq!(plain.alignment, Alignment::Left);
    assert_eq!(plain.font_name, archive.styles.document_defaults.font_name);
}
