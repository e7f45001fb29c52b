use std::fmt;

use smallvec::SmallVec;

use crate::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    /// Product of all dimensions. A rank-0 shape holds one element.
    ///
    /// Dimensions come from toolkit output, so a product that does not fit
    /// in `usize` is an error rather than an overflow.
    pub fn numel(&self) -> Result<usize> {
        checked_product(&self.0).ok_or_else(|| Error::ShapeOverflow {
            shape: self.to_string(),
        })
    }

    /// Element strides for the given storage order. Saturates for shapes
    /// whose [`numel`](Self::numel) fails.
    pub fn strides(&self, order: Order) -> SmallVec<[usize; 6]> {
        let mut strides: SmallVec<[usize; 6]> = SmallVec::from_elem(0, self.rank());
        let mut acc = 1usize;
        match order {
            Order::ColumnMajor => {
                for (stride, dim) in strides.iter_mut().zip(self.0.iter()) {
                    *stride = acc;
                    acc = acc.saturating_mul(*dim);
                }
            }
            Order::RowMajor => {
                for (stride, dim) in strides.iter_mut().zip(self.0.iter()).rev() {
                    *stride = acc;
                    acc = acc.saturating_mul(*dim);
                }
            }
        }
        strides
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Product of `dims`, or `None` if it overflows. Any zero makes it zero.
pub fn checked_product(dims: &[usize]) -> Option<usize> {
    if dims.contains(&0) {
        return Some(0);
    }
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Memory layout of a tensor's flat element buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    RowMajor,
    /// Fortran order: the first axis varies fastest. This is the layout the
    /// toolkit writes its tabular output in.
    ColumnMajor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub shape: Shape,
    pub order: Order,
    pub data: Vec<f64>,
}

impl Tensor {
    /// Interprets `data` as the column-major flattening of `shape`.
    pub fn from_column_major(shape: Shape, data: Vec<f64>) -> Result<Self> {
        Self::new(shape, Order::ColumnMajor, data)
    }

    pub fn from_row_major(shape: Shape, data: Vec<f64>) -> Result<Self> {
        Self::new(shape, Order::RowMajor, data)
    }

    fn new(shape: Shape, order: Order, data: Vec<f64>) -> Result<Self> {
        let expected = shape.numel()?;
        if expected != data.len() {
            return Err(Error::ReshapeMismatch {
                expected,
                got: data.len(),
                shape,
            });
        }
        Ok(Self { shape, order, data })
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Element at a multi-dimensional index, independent of storage order.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.shape.rank() {
            return None;
        }
        let strides = self.shape.strides(self.order);
        let mut offset = 0usize;
        for ((i, dim), stride) in index.iter().zip(self.shape.0.iter()).zip(strides.iter()) {
            if i >= dim {
                return None;
            }
            offset += i * stride;
        }
        self.data.get(offset).copied()
    }

    /// Copy of this tensor with the same logical values laid out row-major.
    pub fn to_row_major(&self) -> Tensor {
        self.to_order(Order::RowMajor)
    }

    pub fn to_order(&self, order: Order) -> Tensor {
        if self.order == order {
            return self.clone();
        }
        let src = self.shape.strides(self.order);
        let dst = self.shape.strides(order);
        let mut data = vec![0.0; self.data.len()];
        for (flat, value) in data.iter_mut().enumerate() {
            let mut offset = 0usize;
            for ((dim, d_stride), s_stride) in self.shape.0.iter().zip(dst.iter()).zip(src.iter()) {
                offset += (flat / d_stride) % dim * s_stride;
            }
            *value = self.data[offset];
        }
        Tensor {
            shape: self.shape.clone(),
            order,
            data,
        }
    }
}

/// One variable-length example: samples sharing the sequence's declared shape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    pub samples: Vec<Tensor>,
}

impl Sequence {
    pub fn new(samples: Vec<Tensor>) -> Self {
        Self { samples }
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Tensor> {
        self.samples.iter()
    }
    pub fn element_count(&self) -> usize {
        self.samples.iter().map(Tensor::numel).sum()
    }

    /// Joins the samples along a trailing axis of length `len()`.
    ///
    /// Because the trailing axis is the slowest one in column-major order the
    /// stacked buffer is just the samples' buffers one after another.
    pub fn stacked(&self) -> Result<Option<Tensor>> {
        let Some(first) = self.samples.first() else {
            return Ok(None);
        };
        let mut dims = first.shape.0.clone();
        dims.push(self.samples.len());
        let shape = Shape(dims);

        let mut data = Vec::with_capacity(self.element_count());
        for sample in &self.samples {
            if sample.shape != first.shape {
                return Err(Error::ReshapeMismatch {
                    shape: first.shape.clone(),
                    expected: first.numel(),
                    got: sample.numel(),
                });
            }
            data.extend_from_slice(&sample.to_order(Order::ColumnMajor).data);
        }
        Tensor::from_column_major(shape, data).map(Some)
    }
}

/// Everything one evaluation or write action produced, in output order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub sequences: Vec<Sequence>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.sequences.len()
    }
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
    pub fn get(&self, idx: usize) -> Option<&Sequence> {
        self.sequences.get(idx)
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Sequence> {
        self.sequences.iter()
    }
    pub fn element_count(&self) -> usize {
        self.sequences.iter().map(Sequence::element_count).sum()
    }
}

impl IntoIterator for ResultSet {
    type Item = Sequence;
    type IntoIter = std::vec::IntoIter<Sequence>;

    fn into_iter(self) -> Self::IntoIter {
        self.sequences.into_iter()
    }
}
