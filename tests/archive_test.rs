//! Archive integrity: validation, unsafe entries, corrupt containers.

use std::collections::BTreeMap;
use std::path::Path;

use sidedoc::hash::content_hash;
use sidedoc::package::{ArchiveWriter, MAX_ASSET_SIZE};
use sidedoc::{
    archive_info, markdown, pack_dir, sync_file, unpack_file, validate_file, Archive,
    DocumentDefaults, Error, ErrorKind, Manifest, StyleSheet, SyncOptions,
};

fn zip_entries(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ArchiveWriter::new();
    for (name, data) in entries {
        writer.add_bytes(name, data).unwrap();
    }
    std::fs::write(path, writer.finish().unwrap()).unwrap();
}

fn simple_archive(content: &str) -> Archive {
    let manifest = Manifest::new("doc.docx", "f".repeat(64), content_hash(content));
    Archive::new(
        content.to_string(),
        markdown::parse(content),
        StyleSheet::from_styles(Vec::new(), DocumentDefaults::default()),
        manifest,
        BTreeMap::new(),
    )
}

#[test]
fn test_missing_styles_json_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.sidedoc");
    zip_entries(
        &path,
        &[
            ("content.md", b"# Title"),
            ("structure.json", b"{\"blocks\": []}"),
            ("manifest.json", b"{}"),
        ],
    );

    let err = validate_file(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert!(err.to_string().contains("styles.json"), "{}", err);
}

#[test]
fn test_malformed_json_reports_parser_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.sidedoc");
    zip_entries(
        &path,
        &[
            ("content.md", b"# Title"),
            ("structure.json", b"{\"blocks\": []}"),
            ("styles.json", b"{\"block_styles\": {}}"),
            ("manifest.json", b"{not json"),
        ],
    );

    match validate_file(&path).unwrap_err() {
        Error::InvalidJson { file, message } => {
            assert_eq!(file, "manifest.json");
            assert!(message.contains("line 1"), "{}", message);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_corrupt_zip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.sidedoc");
    std::fs::write(&path, b"PK\x03\x04 this is not really a zip").unwrap();

    let err = validate_file(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
}

#[test]
fn test_missing_archive() {
    let err = archive_info("/nonexistent/doc.sidedoc").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_unpack_rejects_path_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evil.sidedoc");
    zip_entries(
        &path,
        &[
            ("content.md", b"# Title"),
            ("../../etc/passwd", b"root::0:0::/root:/bin/sh"),
        ],
    );

    let dest = dir.path().join("nested").join("out");
    let err = unpack_file(&path, &dest).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    assert!(err.to_string().contains("../../etc/passwd"));

    assert!(!dest.exists());
    assert!(!dir.path().join("etc").exists());
    assert!(!dir.path().join("nested").join("etc").exists());
}

#[test]
fn test_unpack_rejects_absolute_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evil.sidedoc");
    zip_entries(&path, &[("content.md", b"# A"), ("/tmp/sidedoc-evil", b"x")]);

    let err = unpack_file(&path, dir.path().join("out")).unwrap_err();
    assert!(matches!(err, Error::UnsafePath { .. }));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_unpack_edit_pack_sync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.sidedoc");
    simple_archive("# Title\nBody text.").save(&path).unwrap();

    let unpacked = dir.path().join("doc");
    unpack_file(&path, &unpacked).unwrap();
    std::fs::write(unpacked.join("content.md"), "# Title\nBody text.\nMore text.").unwrap();

    let repacked = dir.path().join("doc2.sidedoc");
    pack_dir(&unpacked, &repacked).unwrap();
    assert!(validate_file(&repacked).unwrap().content_modified);

    let report = sync_file(&repacked, &SyncOptions::default()).unwrap();
    assert_eq!((report.exact, report.added), (2, 1));
    assert!(!validate_file(&repacked).unwrap().content_modified);
}

#[test]
fn test_oversized_asset_aborts_sync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.sidedoc");
    let archive = simple_archive("# Title");
    let bytes = archive.to_bytes().unwrap();
    std::fs::write(&path, &bytes).unwrap();

    // Rebuild the archive with one extra oversized asset.
    let unpacked = dir.path().join("doc");
    unpack_file(&path, &unpacked).unwrap();
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    for name in ["content.md", "structure.json", "styles.json", "manifest.json"] {
        entries.push((name.to_string(), std::fs::read(unpacked.join(name)).unwrap()));
    }
    entries.push((
        "assets/huge.png".to_string(),
        vec![0u8; MAX_ASSET_SIZE as usize + 1],
    ));
    let refs: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    zip_entries(&path, &refs);
    let before = std::fs::read(&path).unwrap();

    let err = sync_file(&path, &SyncOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(err.to_string().contains("huge.png"));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_archive_info_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.sidedoc");
    let mut archive = simple_archive("# Title\n## Part\nText.\n![Image 1](assets/image1.png)");
    archive.assets.insert("image1.png".into(), vec![0; 10]);
    archive.save(&path).unwrap();

    let info = archive_info(&path).unwrap();
    assert_eq!(info.blocks, 4);
    assert_eq!(info.headings, 2);
    assert_eq!(info.paragraphs, 1);
    assert_eq!(info.images, 1);
    assert_eq!(info.asset_bytes, 10);
    assert_eq!(info.manifest.source_file, "doc.docx");
}
