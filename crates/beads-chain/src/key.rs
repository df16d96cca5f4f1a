use bson::Bson;
use bson::spec::ElementType;

/// Hashable join key: a type tag plus the value bytes.
///
/// Numbers are normalised so that `Int32(7)`, `Int64(7)` and `Double(7.0)`
/// produce the same key, matching how the store compares them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LookupKey {
    tag: u8,
    bytes: Vec<u8>,
}

impl LookupKey {
    pub(crate) fn from_bson(value: &Bson) -> Self {
        let mut bytes = Vec::new();
        let tag = encode(value, &mut bytes);
        LookupKey {
            tag: tag as u8,
            bytes,
        }
    }
}

fn encode(value: &Bson, out: &mut Vec<u8>) -> ElementType {
    match value {
        Bson::Int32(n) => encode_integral(*n as i64, out),
        Bson::Int64(n) => encode_integral(*n, out),
        Bson::Double(f) => encode_double(*f, out),
        Bson::String(s) | Bson::Symbol(s) => {
            encode_str(s, out);
            ElementType::String
        }
        Bson::ObjectId(oid) => {
            out.extend_from_slice(&oid.bytes());
            ElementType::ObjectId
        }
        Bson::Boolean(b) => {
            out.push(*b as u8);
            ElementType::Boolean
        }
        Bson::DateTime(dt) => {
            out.extend_from_slice(&dt.timestamp_millis().to_be_bytes());
            ElementType::DateTime
        }
        Bson::Null | Bson::Undefined => ElementType::Null,
        Bson::Decimal128(d) => {
            out.extend_from_slice(&d.bytes());
            ElementType::Decimal128
        }
        Bson::Binary(bin) => {
            out.extend_from_slice(&(bin.bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(&bin.bytes);
            ElementType::Binary
        }
        Bson::Timestamp(ts) => {
            out.extend_from_slice(&ts.time.to_be_bytes());
            out.extend_from_slice(&ts.increment.to_be_bytes());
            ElementType::Timestamp
        }
        Bson::Document(doc) => {
            out.extend_from_slice(&(doc.len() as u32).to_be_bytes());
            for (k, v) in doc {
                encode_str(k, out);
                encode_nested(v, out);
            }
            ElementType::EmbeddedDocument
        }
        Bson::Array(items) => {
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode_nested(item, out);
            }
            ElementType::Array
        }
        other => {
            encode_str(&other.to_string(), out);
            other.element_type()
        }
    }
}

fn encode_nested(value: &Bson, out: &mut Vec<u8>) {
    let mut inner = Vec::new();
    let tag = encode(value, &mut inner);
    out.push(tag as u8);
    out.extend_from_slice(&(inner.len() as u32).to_be_bytes());
    out.extend_from_slice(&inner);
}

fn encode_integral(n: i64, out: &mut Vec<u8>) -> ElementType {
    out.extend_from_slice(&n.to_be_bytes());
    ElementType::Int64
}

fn encode_double(f: f64, out: &mut Vec<u8>) -> ElementType {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return encode_integral(f as i64, out);
    }
    let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
    out.extend_from_slice(&bits.to_be_bytes());
    ElementType::Double
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};

    fn key(v: impl Into<Bson>) -> LookupKey {
        LookupKey::from_bson(&v.into())
    }

    #[test]
    fn numbers_normalise_across_types() {
        assert_eq!(key(7_i32), key(7_i64));
        assert_eq!(key(7_i32), key(7.0_f64));
        assert_eq!(key(-0.0_f64), key(0_i32));
        assert_ne!(key(7.5_f64), key(7_i32));
    }

    #[test]
    fn types_do_not_collide() {
        assert_ne!(key("7"), key(7_i32));
        assert_ne!(key(true), key(1_i32));
        let oid = ObjectId::new();
        assert_eq!(key(oid), key(oid));
        assert_ne!(key(oid), key(oid.to_hex()));
    }

    #[test]
    fn nested_values() {
        assert_eq!(key(doc! { "a": 1_i32 }), key(doc! { "a": 1_i64 }));
        assert_ne!(key(doc! { "a": 1 }), key(doc! { "b": 1 }));
        assert_eq!(
            key(vec![Bson::Int32(1), Bson::from("x")]),
            key(vec![Bson::Double(1.0), Bson::from("x")])
        );
        assert_ne!(key(vec![Bson::from("ab")]), key(vec![Bson::from("a"), Bson::from("b")]));
    }
}
