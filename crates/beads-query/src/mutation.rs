use bson::{Bson, Document};

/// Error raised while parsing or applying an update document.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationError(pub String);

impl std::fmt::Display for MutationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mutation error: {}", self.0)
    }
}

impl std::error::Error for MutationError {}

/// A single field-level mutation operator.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    /// Set a field to a value. Creates the field if it doesn't exist.
    Set(Bson),
    /// Remove a field from the document.
    Unset,
    /// Increment a numeric field by the given amount (negative for decrement).
    Inc(Bson),
    /// Append a value to the end of an array field. Creates the array if missing.
    Push(Bson),
}

/// A single field + operator pair within a Mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMutation {
    pub field: String,
    pub op: MutationOp,
}

/// A complete mutation specification: a list of (field, operator) pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub ops: Vec<FieldMutation>,
}

impl Mutation {
    /// Apply this mutation to a document in place. Returns whether anything
    /// changed.
    pub fn apply(&self, doc: &mut Document) -> Result<bool, MutationError> {
        let mut changed = false;
        for fm in &self.ops {
            let creates = !matches!(fm.op, MutationOp::Unset);
            let Some((parent, leaf)) = resolve_parent_mut(doc, &fm.field, creates)? else {
                continue;
            };
            changed |= match &fm.op {
                MutationOp::Set(val) => parent.insert(leaf, val.clone()).as_ref() != Some(val),
                MutationOp::Unset => parent.remove(leaf).is_some(),
                MutationOp::Inc(amount) => op_inc(parent, leaf, amount)?,
                MutationOp::Push(val) => op_push(parent, leaf, val)?,
            };
        }
        Ok(changed)
    }
}

/// Parse a BSON update document into a validated `Mutation`.
///
/// Recognizes operator keys (`$set`, `$unset`, `$inc`, `$push`) whose values
/// are sub-documents mapping field paths to operand values. Bare top-level
/// fields are treated as implicit `$set`. `_id` cannot be modified.
pub fn parse_mutation(update: &Document) -> Result<Mutation, MutationError> {
    let mut ops = Vec::new();
    for (key, value) in update {
        if !key.starts_with('$') {
            ops.push(field_mutation(key, MutationOp::Set(value.clone()))?);
            continue;
        }
        let fields = match value {
            Bson::Document(d) => d,
            _ => {
                return Err(MutationError(format!("{key} value must be a document")));
            }
        };
        for (field, operand) in fields {
            let op = match key.as_str() {
                "$set" => MutationOp::Set(operand.clone()),
                "$unset" => MutationOp::Unset,
                "$inc" => match operand {
                    Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => {
                        MutationOp::Inc(operand.clone())
                    }
                    _ => {
                        return Err(MutationError(format!("$inc amount for '{field}' must be numeric")));
                    }
                },
                "$push" => MutationOp::Push(operand.clone()),
                other => return Err(MutationError(format!("unknown update operator: {other}"))),
            };
            ops.push(field_mutation(field, op)?);
        }
    }
    if ops.is_empty() {
        return Err(MutationError("empty update document".into()));
    }
    Ok(Mutation { ops })
}

fn field_mutation(field: &str, op: MutationOp) -> Result<FieldMutation, MutationError> {
    if field == "_id" {
        return Err(MutationError("cannot modify _id".into()));
    }
    Ok(FieldMutation {
        field: field.to_string(),
        op,
    })
}

/// Walk to the parent document of the last path segment, optionally creating
/// intermediate documents.
fn resolve_parent_mut<'a, 'p>(
    doc: &'a mut Document,
    path: &'p str,
    create: bool,
) -> Result<Option<(&'a mut Document, &'p str)>, MutationError> {
    let Some((head, rest)) = path.split_once('.') else {
        return Ok(Some((doc, path)));
    };
    if !doc.contains_key(head) {
        if !create {
            return Ok(None);
        }
        doc.insert(head, Document::new());
    }
    match doc.get_mut(head) {
        Some(Bson::Document(child)) => resolve_parent_mut(child, rest, create),
        _ => Err(MutationError(format!("cannot traverse non-document field '{head}'"))),
    }
}

fn op_inc(parent: &mut Document, leaf: &str, amount: &Bson) -> Result<bool, MutationError> {
    let next = match (parent.get(leaf), amount) {
        (None, _) => amount.clone(),
        (Some(Bson::Int32(a)), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(n) => Bson::Int32(n),
            None => Bson::Int64(*a as i64 + *b as i64),
        },
        (Some(Bson::Int32(a)), Bson::Int64(b)) => Bson::Int64(checked_inc(leaf, *a as i64, *b)?),
        (Some(Bson::Int64(a)), Bson::Int32(b)) => Bson::Int64(checked_inc(leaf, *a, *b as i64)?),
        (Some(Bson::Int64(a)), Bson::Int64(b)) => Bson::Int64(checked_inc(leaf, *a, *b)?),
        (Some(Bson::Double(a)), Bson::Double(b)) => Bson::Double(a + b),
        (Some(Bson::Double(a)), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Some(Bson::Double(a)), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (Some(Bson::Int32(a)), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Some(Bson::Int64(a)), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Some(_), _) => {
            return Err(MutationError(format!("cannot $inc non-numeric field '{leaf}'")));
        }
    };
    parent.insert(leaf, next);
    Ok(true)
}

fn checked_inc(leaf: &str, a: i64, b: i64) -> Result<i64, MutationError> {
    a.checked_add(b)
        .ok_or_else(|| MutationError(format!("$inc overflows 64-bit integer field '{leaf}'")))
}

fn op_push(parent: &mut Document, leaf: &str, val: &Bson) -> Result<bool, MutationError> {
    match parent.get_mut(leaf) {
        None => {
            parent.insert(leaf, vec![val.clone()]);
        }
        Some(Bson::Array(arr)) => arr.push(val.clone()),
        Some(_) => {
            return Err(MutationError(format!("cannot $push to non-array field '{leaf}'")));
        }
    }
    Ok(true)
}
