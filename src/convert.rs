//! Value conversion between the numeric and scripting models.
//!
//! Matrices leave the numeric side in row-major order; the numeric runtime's
//! column-major storage is never visible to Lua.
//!
//! The mapping is deliberately lossy in one direction: a flat table always
//! becomes a 1×n row vector, so a column vector sent to Lua comes back as a
//! row vector of the same length. A 1×1 matrix comes back as a plain number.

use tracing::trace;

use crate::error::CodecError;
use crate::value::{Matrix, NumericValue, ScriptValue};

// ==================== Numeric → Script ====================

/// Convert a numeric value into a Lua-side value.
///
/// | shape | result |
/// |---|---|
/// | k=0 or l=0 | empty table |
/// | 1×1 | plain number |
/// | 1×n or n×1 | flat table, length n |
/// | k×l | table of k row tables of length l |
pub fn numeric_to_script(value: &NumericValue) -> Result<ScriptValue, CodecError> {
    let m = match value {
        NumericValue::Matrix(m) => m,
        NumericValue::Undefined => return Err(CodecError::Undefined),
        NumericValue::Complex { .. } => return Err(CodecError::Complex),
        NumericValue::Array { dims, .. } => return Err(CodecError::TooManyDimensions(dims.len())),
        NumericValue::Text(_) => return Err(CodecError::NotReal(value.class_name())),
    };

    let (k, l) = (m.rows(), m.cols());
    let out = if m.is_empty() {
        ScriptValue::Table(Vec::new())
    } else if k == 1 && l == 1 {
        ScriptValue::Number(m.get(0, 0))
    } else if k == 1 || l == 1 {
        ScriptValue::Table(m.row_major().map(ScriptValue::Number).collect())
    } else {
        ScriptValue::Table(
            (0..k)
                .map(|i| ScriptValue::Table((0..l).map(|j| ScriptValue::Number(m.get(i, j))).collect()))
                .collect(),
        )
    };
    trace!(rows = k, cols = l, "numeric -> script");
    Ok(out)
}

// ==================== Script → Numeric ====================

/// Row shape found by the classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableShape {
    Empty,
    /// Every entry is a number.
    Flat,
    /// Every entry is a table of this many numbers.
    Rows(usize),
}

/// Convert a Lua-side value into a numeric value.
///
/// A number becomes a 1×1 matrix. A table is classified first and only then
/// materialized, so a malformed table never yields a partial matrix.
pub fn script_to_numeric(value: &ScriptValue) -> Result<NumericValue, CodecError> {
    match value {
        ScriptValue::Number(x) => Ok(NumericValue::scalar(*x)),
        ScriptValue::Table(entries) => {
            let shape = classify(entries)?;
            trace!(entries = entries.len(), ?shape, "script -> numeric");
            Ok(NumericValue::Matrix(materialize(entries, shape)))
        }
        other => Err(CodecError::NotNumeric(other.type_name())),
    }
}

fn classify(entries: &[ScriptValue]) -> Result<TableShape, CodecError> {
    let Some(first) = entries.first() else {
        return Ok(TableShape::Empty);
    };
    let shape = match first {
        ScriptValue::Number(_) => TableShape::Flat,
        ScriptValue::Table(row) => TableShape::Rows(row.len()),
        other => {
            return Err(CodecError::MixedEntries {
                position: 1,
                expected: "number or table",
                found: other.type_name(),
            })
        }
    };

    for (i, entry) in entries.iter().enumerate() {
        match (shape, entry) {
            (TableShape::Flat, ScriptValue::Number(_)) => {}
            (TableShape::Rows(width), ScriptValue::Table(row)) => {
                if row.len() != width {
                    return Err(CodecError::RaggedRows {
                        row: i + 1,
                        expected: width,
                        found: row.len(),
                    });
                }
                if let Some((j, leaf)) = row
                    .iter()
                    .enumerate()
                    .find(|(_, leaf)| !matches!(leaf, ScriptValue::Number(_)))
                {
                    return Err(CodecError::NonNumericLeaf {
                        row: i + 1,
                        col: j + 1,
                        found: leaf.type_name(),
                    });
                }
            }
            (TableShape::Flat, other) => {
                return Err(CodecError::MixedEntries {
                    position: i + 1,
                    expected: "number",
                    found: other.type_name(),
                })
            }
            (_, other) => {
                return Err(CodecError::MixedEntries {
                    position: i + 1,
                    expected: "table",
                    found: other.type_name(),
                })
            }
        }
    }
    Ok(shape)
}

fn materialize(entries: &[ScriptValue], shape: TableShape) -> Matrix {
    match shape {
        TableShape::Empty => Matrix::empty(),
        // The table length becomes the column count.
        TableShape::Flat => {
            let values: Vec<f64> = entries.iter().filter_map(ScriptValue::as_number).collect();
            Matrix::row_vector(&values)
        }
        TableShape::Rows(width) => {
            let mut m = Matrix::zeros(entries.len(), width);
            for (i, entry) in entries.iter().enumerate() {
                if let ScriptValue::Table(row) = entry {
                    for (j, leaf) in row.iter().enumerate() {
                        if let Some(x) = leaf.as_number() {
                            m.set(i, j, x);
                        }
                    }
                }
            }
            m
        }
    }
}
