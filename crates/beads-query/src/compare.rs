use std::cmp::Ordering;

use bson::{Bson, Document};

/// Canonical cross-type ordering rank, following the document-store
/// convention: missing/null < numbers < strings < documents < arrays <
/// binary < object ids < booleans < dates < timestamps < regexes.
pub fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        Some(Bson::MinKey) => 0,
        None | Some(Bson::Null) | Some(Bson::Undefined) => 1,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 2,
        Some(Bson::Decimal128(_)) => 3,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 4,
        Some(Bson::Document(_)) => 5,
        Some(Bson::Array(_)) => 6,
        Some(Bson::Binary(_)) => 7,
        Some(Bson::ObjectId(_)) => 8,
        Some(Bson::Boolean(_)) => 9,
        Some(Bson::DateTime(_)) => 10,
        Some(Bson::Timestamp(_)) => 11,
        Some(Bson::RegularExpression(_)) => 12,
        Some(Bson::MaxKey) => 14,
        Some(_) => 13,
    }
}

/// Total order over optional BSON values. Numbers compare by value across
/// `Int32`/`Int64`/`Double`; everything else compares within its rank.
pub fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ordering::Equal,
    };
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => (*x as i64).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&(*y as i64)),
        (Bson::Double(x), Bson::Double(y)) => compare_doubles(*x, *y),
        (Bson::Int32(x), Bson::Double(y)) => compare_int_double(*x as i64, *y),
        (Bson::Int64(x), Bson::Double(y)) => compare_int_double(*x, *y),
        (Bson::Double(x), Bson::Int32(y)) => compare_int_double(*y as i64, *x).reverse(),
        (Bson::Double(x), Bson::Int64(y)) => compare_int_double(*y, *x).reverse(),
        (Bson::Decimal128(x), Bson::Decimal128(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Document(x), Bson::Document(y)) => compare_documents(x, y),
        (Bson::Array(x), Bson::Array(y)) => compare_arrays(x, y),
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then_with(|| x.bytes.cmp(&y.bytes)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        // Remaining same-rank pairs (symbols vs strings, regexes, code) compare
        // by their rendered form.
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Equality with numeric coercion: `Int32(9)`, `Int64(9)` and `Double(9.0)`
/// are all equal.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    compare_values(Some(a), Some(b)) == Ordering::Equal
}

/// `-0.0` equals `0.0`; NaN sorts by `total_cmp` (positive NaN above
/// every number).
fn compare_doubles(x: f64, y: f64) -> Ordering {
    x.partial_cmp(&y).unwrap_or_else(|| x.total_cmp(&y))
}

/// Exact integer/double comparison, including integers above 2^53.
fn compare_int_double(i: i64, d: f64) -> Ordering {
    // 2^63 as f64; every integral double strictly below it fits in an i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if d.is_nan() {
        return if d.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if d >= LIMIT {
        return Ordering::Less;
    }
    if d < -LIMIT {
        return Ordering::Greater;
    }
    let whole = d.trunc();
    i.cmp(&(whole as i64)).then_with(|| {
        // Same integral part: the fraction decides.
        if d > whole {
            Ordering::Less
        } else if d < whole {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

fn compare_documents(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = compare_values(Some(va), Some(vb)).then_with(|| ka.cmp(kb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_arrays(a: &[Bson], b: &[Bson]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = compare_values(Some(x), Some(y));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}
