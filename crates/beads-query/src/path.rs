use bson::{Bson, Document};

/// Resolve a dot-path to a single value.
///
/// Documents are traversed by key; arrays accept numeric segments
/// (`"items.0.sku"`). Returns `None` as soon as a segment is missing.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for seg in segments {
        current = match current {
            Bson::Document(d) => d.get(seg)?,
            Bson::Array(arr) => arr.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dot-path to every value it can reach, descending through arrays
/// of sub-documents. Leaf arrays yield the array itself followed by each
/// element, so equality can match either the whole array or a member.
pub fn get_path_values<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some(value) = doc.get(segments[0]) {
        collect(value, &segments, 1, &mut out);
    }
    out
}

fn collect<'a>(value: &'a Bson, segments: &[&str], idx: usize, out: &mut Vec<&'a Bson>) {
    if idx >= segments.len() {
        out.push(value);
        if let Bson::Array(arr) = value {
            out.extend(arr.iter());
        }
        return;
    }
    match value {
        Bson::Document(d) => {
            if let Some(next) = d.get(segments[idx]) {
                collect(next, segments, idx + 1, out);
            }
        }
        Bson::Array(arr) => {
            if let Ok(i) = segments[idx].parse::<usize>() {
                if let Some(next) = arr.get(i) {
                    collect(next, segments, idx + 1, out);
                }
                return;
            }
            for elem in arr {
                if let Bson::Document(d) = elem {
                    if let Some(next) = d.get(segments[idx]) {
                        collect(next, segments, idx + 1, out);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Whether a value counts as present for key gathering.
///
/// Null, undefined, `false`, numeric zero, NaN and the empty string are
/// treated as absent.
pub fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0 && !n.is_nan(),
        Bson::String(s) => !s.is_empty(),
        _ => true,
    }
}
