use std::collections::HashMap;

use bson::{Bson, Document};

/// Apply an inclusion projection in place.
///
/// Keeps `_id` plus every listed path. Dotted paths keep only the requested
/// sub-fields of nested documents (and of documents inside arrays). Field
/// order of the original document is preserved.
pub fn apply_projection(doc: &mut Document, fields: &[String]) {
    let paths: Vec<Vec<&str>> = fields.iter().map(|f| f.split('.').collect()).collect();
    let refs: Vec<&[&str]> = paths.iter().map(|p| p.as_slice()).collect();
    let projected = project_document(doc, &refs, true);
    *doc = projected;
}

fn project_document(doc: &Document, paths: &[&[&str]], top_level: bool) -> Document {
    let mut whole: Vec<&str> = Vec::new();
    // top key → remaining sub-paths
    let mut nested: HashMap<&str, Vec<&[&str]>> = HashMap::new();
    for path in paths {
        match **path {
            [] => {}
            [single] => whole.push(single),
            [first, ref rest @ ..] => nested.entry(first).or_default().push(rest),
        }
    }

    let mut out = Document::new();
    for (key, value) in doc {
        if (top_level && key == "_id") || whole.contains(&key.as_str()) {
            out.insert(key.clone(), value.clone());
            continue;
        }
        let Some(sub_paths) = nested.get(key.as_str()) else {
            continue;
        };
        match value {
            Bson::Document(sub) => {
                out.insert(key.clone(), project_document(sub, sub_paths, false));
            }
            Bson::Array(arr) => {
                let items: Vec<Bson> = arr
                    .iter()
                    .filter_map(|elem| match elem {
                        Bson::Document(sub) => {
                            Some(Bson::Document(project_document(sub, sub_paths, false)))
                        }
                        _ => None,
                    })
                    .collect();
                out.insert(key.clone(), items);
            }
            _ => {}
        }
    }
    out
}
