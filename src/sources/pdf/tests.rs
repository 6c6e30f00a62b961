use super::*;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tempfile::TempDir;

/// Write a one-page PDF showing each of `lines` in a standard font
pub(crate) fn write_pdf(path: &Path, lines: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut operations = Vec::new();
    if !lines.is_empty() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![72.into(), 720.into()]));
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
        }
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content should encode"),
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("should write pdf");
}

fn squashed(text: &str) -> String {
    text.split_whitespace().collect()
}

#[test]
fn pdf_extension_detection() {
    assert!(is_pdf(Path::new("paper.pdf")));
    assert!(is_pdf(Path::new("/tmp/REPORT.PDF")));
    assert!(!is_pdf(Path::new("notes.txt")));
    assert!(!is_pdf(Path::new("pdf")));
}

#[test]
fn extracts_text_layer() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("guide.pdf");
    write_pdf(&path, &["Ownership rules", "Borrowing works"]);

    let text = extract_pdf_text(&path).expect("extraction should succeed");

    let text = squashed(&text);
    assert!(text.contains("Ownershiprules"), "got {:?}", text);
    assert!(text.contains("Borrowingworks"), "got {:?}", text);
}

#[test]
fn page_without_text_yields_blank_text() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("scan.pdf");
    write_pdf(&path, &[]);

    let text = extract_pdf_text(&path).expect("blank pdf is not an error");

    assert!(text.trim().is_empty());
}

#[test]
fn missing_pdf_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let err = extract_pdf_text(&temp_dir.path().join("absent.pdf"))
        .expect_err("missing file must fail");

    assert!(matches!(
        err.downcast_ref::<SourceError>(),
        Some(SourceError::NotFound(_))
    ));
}

#[test]
fn unparseable_pdf_is_unsupported() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("broken.pdf");
    std::fs::write(&path, b"this is not a pdf").expect("should write file");

    let err = extract_pdf_text(&path).expect_err("garbage must fail");

    assert!(matches!(
        err.downcast_ref::<SourceError>(),
        Some(SourceError::Unsupported(_))
    ));
}
