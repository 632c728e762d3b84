//! PDF Merge algorithm
//!
//! Copies the pages of several documents, in order, into one fresh
//! document.

use lopdf::{dictionary, Document, Object, ObjectId};

use crate::document::{inherited_attribute, load, page_ids, INHERITABLE_PAGE_KEYS};
use crate::error::OnboardPdfError;

/// Merge documents into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, return it as-is
/// 3. Create a new destination document with its own page tree root
/// 4. For each source document:
///    a. Record each page's inherited attributes
///    b. Import all objects with IDs shifted past the destination's max
///    c. Write the attributes onto the imported pages and re-parent them
/// 5. Build Catalog and Pages, drop unreachable objects, compress
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, OnboardPdfError> {
    if documents.is_empty() {
        return Err(OnboardPdfError::OperationError(
            "No documents to merge".into(),
        ));
    }

    if documents.len() == 1 {
        let mut documents = documents;
        return documents
            .pop()
            .ok_or_else(|| OnboardPdfError::OperationError("No documents to merge".into()));
    }

    let mut dest = Document::with_version("1.7");
    let pages_id = dest.new_object_id();
    let mut dest_page_refs = Vec::new();

    for source in documents {
        let source_pages = page_ids(&source);
        let inherited: Vec<(ObjectId, Vec<(&[u8], Object)>)> = source_pages
            .iter()
            .map(|page_id| {
                let attrs = INHERITABLE_PAGE_KEYS
                    .iter()
                    .filter_map(|key| {
                        inherited_attribute(&source, *page_id, key).map(|value| (*key, value))
                    })
                    .collect();
                (*page_id, attrs)
            })
            .collect();

        // Shift source ids past everything already in the destination
        let id_offset = dest.max_id;
        let source_max_id = source.max_id;
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects
                .insert(new_id, remap_object_refs(object, id_offset));
        }

        for (old_page_id, attrs) in inherited {
            let new_page_id = (old_page_id.0 + id_offset, old_page_id.1);
            let page = dest
                .get_object_mut(new_page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| {
                    OnboardPdfError::OperationError(format!("Imported page missing: {}", e))
                })?;
            for (key, value) in attrs {
                if !page.has(key) {
                    page.set(key, remap_object_refs(value, id_offset));
                }
            }
            page.set("Parent", Object::Reference(pages_id));
            dest_page_refs.push(new_page_id);
        }

        dest.max_id = (source_max_id + id_offset).max(dest.max_id);
    }

    build_page_tree(&mut dest, pages_id, &dest_page_refs);
    dest.prune_objects();
    dest.compress();

    Ok(dest)
}

/// Number of pages in serialized PDF bytes
pub fn page_count(bytes: &[u8]) -> Result<u32, OnboardPdfError> {
    Ok(load(bytes)?.get_pages().len() as u32)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Install the Pages root and a Catalog pointing at it
fn build_page_tree(doc: &mut Document, pages_id: ObjectId, page_refs: &[ObjectId]) {
    let kids: Vec<Object> = page_refs.iter().map(|&id| Object::Reference(id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_refs.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
}
