//! Value models of the two runtimes.
//!
//! [`NumericValue`] is what the numeric runtime hands across the bridge;
//! [`ScriptValue`] is the Lua side. Both are transient: built per call,
//! dropped after conversion.

// ==================== Numeric Side ====================

/// Real-valued 2-D array in column-major storage.
///
/// A scalar is a 1×1 matrix; the numeric runtime makes no distinction.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// `rows × cols` matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// 0×0 matrix.
    pub fn empty() -> Self {
        Self::zeros(0, 0)
    }

    pub fn scalar(x: f64) -> Self {
        Self {
            rows: 1,
            cols: 1,
            data: vec![x],
        }
    }

    pub fn row_vector(values: &[f64]) -> Self {
        Self {
            rows: 1,
            cols: values.len(),
            data: values.to_vec(),
        }
    }

    pub fn column_vector(values: &[f64]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    /// Build from row slices. Returns `None` if the rows are ragged.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Option<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut m = Self::zeros(rows.len(), cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return None;
            }
            for (j, &x) in row.iter().enumerate() {
                m.set(i, j, x);
            }
        }
        Some(m)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Element at row `i`, column `j` (0-based).
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.rows && j < self.cols, "matrix index out of bounds");
        self.data[j * self.rows + i]
    }

    /// # Panics
    /// Panics if the index is out of bounds.
    pub fn set(&mut self, i: usize, j: usize, x: f64) {
        assert!(i < self.rows && j < self.cols, "matrix index out of bounds");
        self.data[j * self.rows + i] = x;
    }

    /// Elements in row-major order.
    pub fn row_major(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.rows).flat_map(move |i| (0..self.cols).map(move |j| self.get(i, j)))
    }

    /// Underlying column-major storage.
    pub fn as_column_major(&self) -> &[f64] {
        &self.data
    }
}

/// A value produced or consumed by the numeric runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    /// Unbound variable or missing output.
    Undefined,
    /// Real 2-D matrix (scalars included).
    Matrix(Matrix),
    /// Complex 2-D matrix. Only the shape is carried; the bridge never
    /// converts complex values.
    Complex { rows: usize, cols: usize },
    /// Real array with more than two dimensions, shape only.
    Array { dims: Vec<usize> },
    /// Character matrix, one string per row.
    Text(Vec<String>),
}

impl NumericValue {
    pub fn scalar(x: f64) -> Self {
        NumericValue::Matrix(Matrix::scalar(x))
    }

    /// Single-row character value.
    pub fn text(s: impl Into<String>) -> Self {
        NumericValue::Text(vec![s.into()])
    }

    /// The dimension vector, as the numeric runtime reports it.
    pub fn dims(&self) -> Vec<usize> {
        match self {
            NumericValue::Undefined => vec![0, 0],
            NumericValue::Matrix(m) => vec![m.rows(), m.cols()],
            NumericValue::Complex { rows, cols, .. } => vec![*rows, *cols],
            NumericValue::Array { dims, .. } => dims.clone(),
            NumericValue::Text(rows) => {
                let cols = rows.first().map_or(0, |r| r.chars().count());
                vec![rows.len(), cols]
            }
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            NumericValue::Undefined => "undefined",
            NumericValue::Matrix(_) | NumericValue::Array { .. } => "double",
            NumericValue::Complex { .. } => "complex",
            NumericValue::Text(_) => "char",
        }
    }

    pub fn as_matrix(&self) -> Option<&Matrix> {
        match self {
            NumericValue::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Matrix> for NumericValue {
    fn from(m: Matrix) -> Self {
        NumericValue::Matrix(m)
    }
}


// ==================== Scripting Side ====================

/// A value produced or consumed by the scripting runtime.
///
/// `Table` holds only the 1-indexed sequence part of a Lua table, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Nil,
    Boolean(bool),
    Number(f64),
    Text(String),
    Table(Vec<ScriptValue>),
    /// Anything the bridge never converts (functions, userdata, threads),
    /// tagged with its Lua type name.
    Opaque(&'static str),
}

impl ScriptValue {
    /// Flat table of numbers.
    pub fn list(values: &[f64]) -> Self {
        ScriptValue::Table(values.iter().copied().map(ScriptValue::Number).collect())
    }

    /// Table of flat row tables.
    pub fn rows<R: AsRef<[f64]>>(rows: &[R]) -> Self {
        ScriptValue::Table(rows.iter().map(|r| ScriptValue::list(r.as_ref())).collect())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Nil => "nil",
            ScriptValue::Boolean(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::Text(_) => "string",
            ScriptValue::Table(_) => "table",
            ScriptValue::Opaque(name) => *name,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(x) => Some(*x),
            _ => None,
        }
    }
}
