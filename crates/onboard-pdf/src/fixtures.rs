//! Test documents built directly with lopdf

use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::document::{decode_text_string, number, page_ids};

/// US Letter pages, each with its own MediaBox, F1 font and a line of text
pub fn blank_document(num_pages: u32) -> Document {
    build_document(num_pages, [0, 0, 612, 792], false, "Page")
}

/// Like [`blank_document`] with a label in every page's text
pub fn labeled_document(num_pages: u32, label: &str) -> Document {
    build_document(num_pages, [0, 0, 612, 792], false, label)
}

/// Pages that inherit MediaBox and Resources from the page tree root
pub fn blank_document_inherited_box(num_pages: u32, media_box: [i64; 4]) -> Document {
    build_document(num_pages, media_box, true, "Page")
}

fn build_document(num_pages: u32, media_box: [i64; 4], inherit: bool, label: &str) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources = dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    };
    let media_box: Vec<Object> = media_box.iter().map(|v| Object::Integer(*v)).collect();

    let mut kids = Vec::new();
    for page_num in 0..num_pages {
        let content = format!(
            "BT /F1 12 Tf 50 700 Td ({}-{}) Tj ET",
            label,
            page_num + 1
        );
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if !inherit {
            page.set("MediaBox", Object::Array(media_box.clone()));
            page.set("Resources", resources.clone());
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => num_pages as i64,
    };
    if inherit {
        pages.set("MediaBox", Object::Array(media_box));
        pages.set("Resources", resources);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

#[derive(Debug, Clone)]
pub enum FixtureValue {
    Text(String),
    Checked(bool),
}

/// A merged field/widget dictionary to place in a fixture
#[derive(Debug, Clone)]
pub struct FixtureField {
    pub name: String,
    pub page: usize,
    pub rect: [f32; 4],
    pub value: FixtureValue,
    pub with_appearance: bool,
}

impl FixtureField {
    pub fn text(name: &str, page: usize, rect: [f32; 4], value: &str) -> Self {
        Self {
            name: name.to_string(),
            page,
            rect,
            value: FixtureValue::Text(value.to_string()),
            with_appearance: false,
        }
    }

    pub fn checkbox(name: &str, page: usize, rect: [f32; 4], checked: bool) -> Self {
        Self {
            name: name.to_string(),
            page,
            rect,
            value: FixtureValue::Checked(checked),
            with_appearance: false,
        }
    }

    pub fn with_appearance(mut self) -> Self {
        self.with_appearance = true;
        self
    }
}

/// A blank document with the given fields in its AcroForm
pub fn form_document(num_pages: u32, entries: &[FixtureField]) -> Document {
    let mut doc = blank_document(num_pages);
    let pages = page_ids(&doc);

    let mut field_refs = Vec::new();
    for entry in entries {
        let page_id = pages[entry.page];
        let [x0, y0, x1, y1] = entry.rect;
        let rect: Vec<Object> = entry.rect.iter().map(|v| Object::Real(*v)).collect();

        let mut field = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "T" => Object::String(entry.name.as_bytes().to_vec(), StringFormat::Literal),
            "Rect" => rect,
            "P" => page_id,
            "F" => 4,
            "DA" => Object::String(b"/Helv 10 Tf 0 g".to_vec(), StringFormat::Literal),
        };

        match &entry.value {
            FixtureValue::Text(text) => {
                field.set("FT", "Tx");
                field.set(
                    "V",
                    Object::String(text.as_bytes().to_vec(), StringFormat::Literal),
                );
                if entry.with_appearance {
                    let stream_id = appearance_stream(
                        &mut doc,
                        x1 - x0,
                        y1 - y0,
                        format!("BT /Helv 10 Tf 2 4 Td ({}) Tj ET", text),
                    );
                    field.set("AP", dictionary! { "N" => stream_id });
                }
            }
            FixtureValue::Checked(checked) => {
                let state = if *checked { "Yes" } else { "Off" };
                field.set("FT", "Btn");
                field.set("V", state);
                field.set("AS", state);
                if entry.with_appearance {
                    let on_id = appearance_stream(
                        &mut doc,
                        x1 - x0,
                        y1 - y0,
                        "BT /Helv 10 Tf 2 2 Td (4) Tj ET".to_string(),
                    );
                    let off_id = appearance_stream(&mut doc, x1 - x0, y1 - y0, String::new());
                    field.set(
                        "AP",
                        dictionary! {
                            "N" => dictionary! { "Yes" => on_id, "Off" => off_id },
                        },
                    );
                }
            }
        }

        let field_id = doc.add_object(field);
        add_annotation(&mut doc, page_id, field_id);
        field_refs.push(Object::Reference(field_id));
    }

    install_acroform(&mut doc, field_refs);
    doc
}

/// One text field `parent.child` split over a parent node and a kid that
/// is both the terminal field and its widget
pub fn nested_field_document(parent: &str, child: &str, value: &str) -> Document {
    let mut doc = blank_document(1);
    let page_id = page_ids(&doc)[0];

    let parent_id = doc.new_object_id();
    let kid_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Parent" => parent_id,
        "T" => Object::String(child.as_bytes().to_vec(), StringFormat::Literal),
        "V" => Object::String(value.as_bytes().to_vec(), StringFormat::Literal),
        "Rect" => vec![72.into(), 400.into(), 272.into(), 420.into()],
        "P" => page_id,
    });
    doc.objects.insert(
        parent_id,
        Object::Dictionary(dictionary! {
            "T" => Object::String(parent.as_bytes().to_vec(), StringFormat::Literal),
            "FT" => "Tx",
            "DA" => Object::String(b"/Helv 11 Tf 0 g".to_vec(), StringFormat::Literal),
            "Kids" => vec![Object::Reference(kid_id)],
        }),
    );
    add_annotation(&mut doc, page_id, kid_id);
    install_acroform(&mut doc, vec![Object::Reference(parent_id)]);
    doc
}

/// Parent field whose Kids list itself and one terminal kid several times,
/// with the parent also repeated in the AcroForm Fields array
pub fn cyclic_field_document(parent: &str, child: &str) -> Document {
    let mut doc = blank_document(1);
    let page_id = page_ids(&doc)[0];

    let parent_id = doc.new_object_id();
    let kid_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "Parent" => parent_id,
        "T" => Object::String(child.as_bytes().to_vec(), StringFormat::Literal),
        "V" => Object::String(b"555-0100".to_vec(), StringFormat::Literal),
        "Rect" => vec![72.into(), 400.into(), 272.into(), 420.into()],
        "P" => page_id,
    });
    let parent_ref = Object::Reference(parent_id);
    let kid_ref = Object::Reference(kid_id);
    doc.objects.insert(
        parent_id,
        Object::Dictionary(dictionary! {
            "T" => Object::String(parent.as_bytes().to_vec(), StringFormat::Literal),
            "FT" => "Tx",
            "Kids" => vec![
                parent_ref.clone(),
                parent_ref.clone(),
                kid_ref.clone(),
                parent_ref.clone(),
                kid_ref,
                parent_ref.clone(),
            ],
        }),
    );
    add_annotation(&mut doc, page_id, kid_id);
    install_acroform(&mut doc, vec![parent_ref.clone(), parent_ref]);
    doc
}

/// AcroForm whose Fields entry is not an array
pub fn malformed_acroform_document() -> Document {
    let mut doc = blank_document(1);
    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(catalog_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("AcroForm", dictionary! { "Fields" => 42 });
    doc
}

fn appearance_stream(doc: &mut Document, width: f32, height: f32, content: String) -> ObjectId {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), Object::Real(width), Object::Real(height)],
            "Resources" => dictionary! { "Font" => dictionary! { "Helv" => font_id } },
        },
        content.into_bytes(),
    ))
}

fn add_annotation(doc: &mut Document, page_id: ObjectId, annot_id: ObjectId) {
    let page = doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
    let mut annots = match page.get(b"Annots") {
        Ok(Object::Array(arr)) => arr.clone(),
        _ => Vec::new(),
    };
    annots.push(Object::Reference(annot_id));
    page.set("Annots", annots);
}

fn install_acroform(doc: &mut Document, fields: Vec<Object>) {
    let acroform_id = doc.add_object(dictionary! {
        "Fields" => fields,
        "DA" => Object::String(b"/Helv 0 Tf 0 g".to_vec(), StringFormat::Literal),
    });
    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_object_mut(catalog_id)
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("AcroForm", acroform_id);
}

pub fn to_bytes(doc: &mut Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Concatenated (decompressed) content streams of a page
pub fn page_content(doc: &Document, page_id: ObjectId) -> String {
    String::from_utf8_lossy(&page_content_bytes(doc, page_id)).into_owned()
}

pub fn page_content_bytes(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let page = doc.get_dictionary(page_id).unwrap();
    let refs: Vec<ObjectId> = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
            _ => vec![*id],
        },
        Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
        _ => Vec::new(),
    };

    let mut out = Vec::new();
    for id in refs {
        if let Ok(Object::Stream(stream)) = doc.get_object(id) {
            let bytes = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            out.extend_from_slice(&bytes);
        }
    }
    out
}

/// Every `Tj` string on a page with the `Td` position it was shown at
pub fn text_draws(doc: &Document, page_id: ObjectId) -> Vec<(String, f32, f32)> {
    let content = Content::decode(&page_content_bytes(doc, page_id)).unwrap();
    let mut position = (0.0, 0.0);
    let mut draws = Vec::new();
    for op in content.operations {
        match op.operator.as_str() {
            "Td" if op.operands.len() == 2 => {
                position = (
                    number(&op.operands[0]).unwrap(),
                    number(&op.operands[1]).unwrap(),
                );
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    draws.push((decode_text_string(bytes), position.0, position.1));
                }
            }
            _ => {}
        }
    }
    draws
}

/// Text drawn on a page, matched by exact string
pub fn find_draw(doc: &Document, page_id: ObjectId, text: &str) -> Option<(f32, f32)> {
    text_draws(doc, page_id)
        .into_iter()
        .find(|(shown, _, _)| shown == text)
        .map(|(_, x, y)| (x, y))
}

/// XObject ids registered on a page
pub fn page_xobjects(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let page = doc.get_dictionary(page_id).unwrap();
    let resources = match page.get(b"Resources") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).unwrap().clone(),
        _ => return Vec::new(),
    };
    let xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).unwrap().clone(),
        _ => return Vec::new(),
    };
    xobjects
        .iter()
        .filter_map(|(_, obj)| obj.as_reference().ok())
        .collect()
}

/// 4x2 RGBA PNG
pub fn tiny_png() -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, 4, 2);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        let pixels: Vec<u8> = (0..8u8)
            .flat_map(|i| [i * 30, 0, 255 - i * 30, if i % 2 == 0 { 255 } else { 0 }])
            .collect();
        writer.write_image_data(&pixels).unwrap();
    }
    out
}
