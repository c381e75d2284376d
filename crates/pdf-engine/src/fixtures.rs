//! In-memory PDFs for tests.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Builds a document with one page per `(width, height)` entry.
pub fn sample_pdf(sizes: &[(f32, f32)]) -> Vec<u8> {
    let boxes: Vec<_> = sizes.iter().map(|&(width, height)| Some([0.0, 0.0, width, height])).collect();
    sample_pdf_with_boxes(&boxes, [0.0, 0.0, 612.0, 792.0])
}

/// Builds a document where pages with `None` inherit `inherited_box` from the page tree.
///
/// Every page carries a short line-drawing content stream that leaves a `cm`
/// transform in effect, and shares one Resources dictionary through the
/// page tree.
pub fn sample_pdf_with_boxes(page_boxes: &[Option<[f32; 4]>], inherited_box: [f32; 4]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page_box in page_boxes {
        let content = Content {
            operations: vec![
                Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 5.into(), 5.into()]),
                Operation::new("RG", vec![0.into(), 0.into(), 1.into()]),
                Operation::new("m", vec![10.into(), 10.into()]),
                Operation::new("l", vec![60.into(), 60.into()]),
                Operation::new("S", vec![]),
            ],
        };
        let encoded = content.encode().expect("fixture content should encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(media_box) = page_box {
            page.set("MediaBox", box_object(*media_box));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "MediaBox" => box_object(inherited_box),
        "Resources" => resources_id,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("fixture should serialize");
    buffer
}

fn box_object(values: [f32; 4]) -> Object {
    Object::Array(values.iter().map(|&value| Object::Real(value)).collect())
}
