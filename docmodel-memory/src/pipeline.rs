//! Aggregation pipeline execution for in-memory documents.
//!
//! Supported stages: `$match`, `$sort`, `$skip`, `$limit`, `$project`, `$count` and `$group`
//! with the `$sum`, `$avg`, `$min`, `$max`, `$first`, `$last` and `$push` accumulators.
//! Expressions are either literals or `"$field.path"` references.

use bson::{Bson, Document};

use docmodel_core::error::{ModelError, ModelResult};

use crate::evaluator::{Comparable, DocumentEvaluator, compare_documents, lookup, sort_spec};

/// Runs every stage of `pipeline` over `documents`, in order.
pub(crate) fn run(documents: Vec<Document>, pipeline: &[Document]) -> ModelResult<Vec<Document>> {
    pipeline
        .iter()
        .try_fold(documents, |documents, stage| run_stage(documents, stage))
}

fn run_stage(documents: Vec<Document>, stage: &Document) -> ModelResult<Vec<Document>> {
    let mut entries = stage.iter();
    let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
        return Err(invalid("a pipeline stage must have exactly one field"));
    };

    match name.as_str() {
        "$match" => {
            let filter = as_document(name, spec)?;
            DocumentEvaluator::filter_documents(&documents, filter)
        }
        "$sort" => {
            let sort = sort_spec(as_document(name, spec)?)?;
            let mut documents = documents;
            documents.sort_by(|a, b| compare_documents(a, b, &sort));

            Ok(documents)
        }
        "$skip" => Ok(documents
            .into_iter()
            .skip(as_count(name, spec)?)
            .collect()),
        "$limit" => Ok(documents
            .into_iter()
            .take(as_count(name, spec)?)
            .collect()),
        "$project" => project(documents, as_document(name, spec)?),
        "$count" => {
            let Bson::String(field) = spec else {
                return Err(invalid("$count expects a field name"));
            };

            if documents.is_empty() {
                return Ok(Vec::new());
            }

            let mut counted = Document::new();
            counted.insert(field.as_str(), documents.len() as i32);
            Ok(vec![counted])
        }
        "$group" => group(documents, as_document(name, spec)?),
        other => Err(invalid(&format!("unsupported stage {other}"))),
    }
}

fn invalid(message: &str) -> ModelError {
    ModelError::Backend(message.to_string())
}

fn as_document<'s>(stage: &str, spec: &'s Bson) -> ModelResult<&'s Document> {
    match spec {
        Bson::Document(doc) => Ok(doc),
        _ => Err(invalid(&format!("{stage} expects a document"))),
    }
}

fn as_count(stage: &str, spec: &Bson) -> ModelResult<usize> {
    let count = match spec {
        Bson::Int32(n) => *n as i64,
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        _ => -1,
    };

    usize::try_from(count).map_err(|_| invalid(&format!("{stage} expects a non-negative integer")))
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

/// Inclusion or exclusion of top-level fields. `_id` is kept unless excluded explicitly.
fn project(documents: Vec<Document>, spec: &Document) -> ModelResult<Vec<Document>> {
    let keep_id = spec.get("_id").is_none_or(is_truthy);
    let fields = spec
        .iter()
        .filter(|(field, _)| field.as_str() != "_id")
        .collect::<Vec<_>>();

    let inclusive = fields.iter().any(|(_, flag)| is_truthy(flag));
    if inclusive && fields.iter().any(|(_, flag)| !is_truthy(flag)) {
        return Err(invalid("$project cannot mix inclusion and exclusion"));
    }

    Ok(documents
        .into_iter()
        .map(|document| {
            let mut projected = Document::new();

            for (field, value) in document {
                let listed = fields.iter().any(|(name, _)| **name == field);
                let keep = if field == "_id" {
                    keep_id
                } else if inclusive {
                    listed
                } else {
                    !listed
                };

                if keep {
                    projected.insert(field, value);
                }
            }

            projected
        })
        .collect())
}

/// Evaluates a group key or accumulator operand against one document.
fn evaluate(document: &Document, expression: &Bson) -> Bson {
    match expression {
        Bson::String(path) if path.starts_with('$') => lookup(document, &path[1..])
            .cloned()
            .unwrap_or(Bson::Null),
        Bson::Document(fields) => Bson::Document(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), evaluate(document, value)))
                .collect(),
        ),
        literal => literal.clone(),
    }
}

#[derive(Debug)]
enum Accumulator {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    First(Option<Bson>),
    Last(Bson),
    Push(Vec<Bson>),
}

impl Accumulator {
    fn new(op: &str) -> ModelResult<Self> {
        Ok(match op {
            "$sum" => Accumulator::Sum { int: 0, float: 0.0, is_float: false },
            "$avg" => Accumulator::Avg { total: 0.0, count: 0 },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$first" => Accumulator::First(None),
            "$last" => Accumulator::Last(Bson::Null),
            "$push" => Accumulator::Push(Vec::new()),
            other => return Err(invalid(&format!("unsupported accumulator {other}"))),
        })
    }

    /// Adds to the integer total, moving to the float total once it would overflow.
    fn add_int(int: &mut i64, float: &mut f64, is_float: &mut bool, n: i64) {
        match int.checked_add(n) {
            Some(total) => *int = total,
            None => {
                *float += *int as f64 + n as f64;
                *int = 0;
                *is_float = true;
            }
        }
    }

    fn add(&mut self, value: Bson) {
        match self {
            Accumulator::Sum { int, float, is_float } => match value {
                Bson::Int32(n) => Accumulator::add_int(int, float, is_float, n as i64),
                Bson::Int64(n) => Accumulator::add_int(int, float, is_float, n),
                Bson::Double(n) => {
                    *float += n;
                    *is_float = true;
                }
                _ => {}
            },
            Accumulator::Avg { total, count } => {
                if let Comparable::Number(n) = Comparable::from(&value) {
                    *total += n;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => {
                let replace = value != Bson::Null
                    && current
                        .as_ref()
                        .is_none_or(|c| Comparable::from(&value).sort_cmp(&Comparable::from(c)).is_lt());
                if replace {
                    *current = Some(value);
                }
            }
            Accumulator::Max(current) => {
                let replace = value != Bson::Null
                    && current
                        .as_ref()
                        .is_none_or(|c| Comparable::from(&value).sort_cmp(&Comparable::from(c)).is_gt());
                if replace {
                    *current = Some(value);
                }
            }
            Accumulator::First(current) => {
                if current.is_none() {
                    *current = Some(value);
                }
            }
            Accumulator::Last(current) => *current = value,
            Accumulator::Push(values) => values.push(value),
        }
    }

    fn finish(self) -> Bson {
        match self {
            Accumulator::Sum { int, float, is_float } => {
                if is_float {
                    Bson::Double(float + int as f64)
                } else if let Ok(n) = i32::try_from(int) {
                    Bson::Int32(n)
                } else {
                    Bson::Int64(int)
                }
            }
            Accumulator::Avg { total, count } => {
                if count == 0 {
                    Bson::Null
                } else {
                    Bson::Double(total / count as f64)
                }
            }
            Accumulator::Min(value) | Accumulator::Max(value) | Accumulator::First(value) => {
                value.unwrap_or(Bson::Null)
            }
            Accumulator::Last(value) => value,
            Accumulator::Push(values) => Bson::Array(values),
        }
    }
}

/// Groups documents by the `_id` expression, in order of first appearance.
fn group(documents: Vec<Document>, spec: &Document) -> ModelResult<Vec<Document>> {
    let key_expression = spec
        .get("_id")
        .ok_or_else(|| invalid("$group requires an _id expression"))?;

    let mut outputs = Vec::new();
    for (field, definition) in spec.iter().filter(|(field, _)| field.as_str() != "_id") {
        let definition = as_document(field, definition)?;
        let mut entries = definition.iter();
        let (Some((op, operand)), None) = (entries.next(), entries.next()) else {
            return Err(invalid(&format!("{field} must use exactly one accumulator")));
        };

        Accumulator::new(op)?;
        outputs.push((field.as_str(), op.as_str(), operand));
    }

    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();
    for document in &documents {
        let key = evaluate(document, key_expression);

        let index = match groups.iter().position(|(existing, _)| *existing == key) {
            Some(index) => index,
            None => {
                let accumulators = outputs
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<ModelResult<Vec<_>>>()?;
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };

        for (accumulator, (_, _, operand)) in groups[index].1.iter_mut().zip(&outputs) {
            accumulator.add(evaluate(document, operand));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut grouped = Document::new();
            grouped.insert("_id", key);
            for (accumulator, (field, _, _)) in accumulators.into_iter().zip(&outputs) {
                grouped.insert(*field, accumulator.finish());
            }

            grouped
        })
        .collect())
}
