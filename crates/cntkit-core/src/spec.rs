use std::fmt;

use smallvec::SmallVec;

use crate::{checked_product, Error, Result, Shape};

/// A node shape as announced by the toolkit. `None` marks the free
/// dimension printed as `*`, which is only known once data is observed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShapeSpec(pub SmallVec<[Option<usize>; 6]>);

impl ShapeSpec {
    pub fn from_dims(d: &[Option<usize>]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    pub fn free_dims(&self) -> usize {
        self.0.iter().filter(|d| d.is_none()).count()
    }
    /// Product of the known dimensions.
    pub fn known_numel(&self) -> Result<usize> {
        let known: SmallVec<[usize; 6]> = self.0.iter().flatten().copied().collect();
        checked_product(&known).ok_or_else(|| Error::ShapeOverflow {
            shape: self.to_string(),
        })
    }
    /// The concrete shape, if no dimension is free.
    pub fn to_shape(&self) -> Option<Shape> {
        self.0.iter().copied().collect::<Option<SmallVec<_>>>().map(Shape)
    }
}

impl fmt::Display for ShapeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            match d {
                Some(n) => write!(f, "{n}")?,
                None => write!(f, "*")?,
            }
        }
        write!(f, "]")
    }
}

/// Outcome of resolving a [`ShapeSpec`] against observed data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedShape {
    pub shape: Shape,
    pub size: usize,
}
