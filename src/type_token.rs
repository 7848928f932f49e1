//! Type tags and type-erased partition helpers.
//!
//! This module provides:
//! - [`Partition`]: one worker's share of a DIA, type-erased (`Vec<T>` behind `Any`).
//! - [`TypeTag`]: a lightweight runtime type identifier attached to every node so
//!   the runner and [`explain`](crate::explain) can name element types without
//!   carrying generics.
//! - [`VecOps`]: type-erased `Vec<T>` queries the runner needs for nodes whose
//!   element type it does not know statically (length, memory footprint).
//!
//! All operations return `None` if the dynamic type does not match the expected
//! `Vec<T>`.

use crate::error::DiaError;
use anyhow::Result;
use std::any::{Any, TypeId, type_name};
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::Arc;

/// A partition buffer carried between nodes at runtime.
pub type Partition = Box<dyn Any + Send + Sync>;

/// The materialized output of a node: one partition per worker, in worker
/// order. Shared so retained results can feed several consumers.
pub type Shards = Arc<Vec<Partition>>;

/// A lightweight runtime type tag for debugging and assertions.
///
/// ```
/// use irondia::type_token::TypeTag;
/// let tag = TypeTag::of::<u32>();
/// assert_eq!(tag.name, "u32");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeTag {
    /// Stable Rust type identifier.
    pub id: TypeId,
    /// Human-readable type name (best-effort).
    pub name: &'static str,
}

impl TypeTag {
    /// Construct a tag for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// Type-erased helpers for `Vec<T>`.
pub trait VecOps: Send + Sync {
    /// Return the number of elements if `data` is a `Vec<T>`, otherwise `None`.
    fn len(&self, data: &dyn Any) -> Option<usize>;

    /// Shallow byte footprint (`len * size_of::<T>()`) if `data` is a `Vec<T>`.
    fn footprint(&self, data: &dyn Any) -> Option<usize>;
}

/// Concrete `VecOps` for a specific `T`.
pub struct VecOpsImpl<T: Send + Sync + 'static>(PhantomData<fn() -> T>);

impl<T: Send + Sync + 'static> VecOps for VecOpsImpl<T> {
    fn len(&self, data: &dyn Any) -> Option<usize> {
        data.downcast_ref::<Vec<T>>().map(Vec::len)
    }

    fn footprint(&self, data: &dyn Any) -> Option<usize> {
        data.downcast_ref::<Vec<T>>()
            .map(|v| v.len().saturating_mul(size_of::<T>()))
    }
}

/// Create a type-erased `VecOps` for `Vec<T>`.
///
/// ```
/// use irondia::type_token::{vec_ops_for, VecOps};
/// use std::any::Any;
///
/// let ops = vec_ops_for::<i64>();
/// let data: Box<dyn Any + Send + Sync> = Box::new(vec![1i64, 2, 3]);
/// assert_eq!(ops.len(data.as_ref()), Some(3));
/// assert_eq!(ops.footprint(data.as_ref()), Some(24));
/// ```
pub fn vec_ops_for<T: Send + Sync + 'static>() -> Arc<dyn VecOps> {
    Arc::new(VecOpsImpl::<T>(PhantomData))
}

/// Borrow a partition as `&Vec<T>`.
///
/// # Errors
///
/// A [`DiaError::Usage`] if the partition holds a different element type.
pub fn downcast_part<T: 'static>(part: &dyn Any) -> Result<&Vec<T>> {
    part.downcast_ref::<Vec<T>>().ok_or_else(|| {
        DiaError::usage(format!(
            "partition type mismatch: expected Vec<{}>",
            type_name::<T>()
        ))
        .into()
    })
}
