// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! The archiving contract types implement.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use crate::archive::Archive;
use crate::error::{ArchiveError, Result};
use crate::registry::SharedObj;

/// A value the archive can transfer in either direction.
///
/// `archive` is the single hook: writing emits the value through the
/// archive's codec, reading overwrites `self` from the stream. Aggregates
/// implement it by forwarding each field in a fixed order; writer and reader
/// must traverse identically, the stream carries no field framing.
///
/// ```no_run
/// use tessel_archive::{Archivable, Archive, Result};
///
/// #[derive(Default)]
/// struct MeshPoint {
///     coords: [f64; 3],
///     index: usize,
/// }
///
/// impl Archivable for MeshPoint {
///     fn archive(&mut self, ar: &mut Archive) -> Result<()> {
///         self.coords.archive(ar)?;
///         self.index.archive(ar)
///     }
///
///     fn fresh() -> Result<Self> {
///         Ok(Self::default())
///     }
/// }
/// ```
pub trait Archivable: Any {
    fn archive(&mut self, ar: &mut Archive) -> Result<()>;

    /// Blank instance for the read side to fill in.
    ///
    /// Types with no sensible blank state keep the default and can then only
    /// appear behind references reconstructed through the type registry;
    /// an inline reference to them fails at read time.
    fn fresh() -> Result<Self>
    where
        Self: Sized,
    {
        Err(ArchiveError::NotDefaultConstructible {
            type_name: std::any::type_name::<Self>(),
        })
    }

    /// Transfer a contiguous run of values.
    ///
    /// Defaults to element-wise transfer; the hot primitive types override
    /// this to hand the whole run to the codec's block path.
    fn archive_slice(data: &mut [Self], ar: &mut Archive) -> Result<()>
    where
        Self: Sized,
    {
        for item in data {
            item.archive(ar)?;
        }
        Ok(())
    }

    /// `TypeId` of the most-derived value, resolved through the vtable when
    /// called on a trait object.
    fn concrete_type_id(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    /// Type name of the most-derived value; diagnostic counterpart of
    /// [`concrete_type_id`](Self::concrete_type_id).
    fn concrete_type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A type references can point at.
///
/// Implemented for every sized [`Archivable`] automatically. Trait objects
/// opt in through [`archive_pointee!`](crate::archive_pointee), which routes
/// allocation through the type registry instead of [`Archivable::fresh`].
pub trait Pointee: Archivable {
    /// Fresh shareable instance plus its type-erased canonical handle.
    #[doc(hidden)]
    fn allocate() -> Result<(Rc<RefCell<Self>>, SharedObj)>;

    /// Fresh uniquely-owned instance.
    #[doc(hidden)]
    fn allocate_boxed() -> Result<Box<Self>>;

    /// Re-view a canonical handle as this type, `None` on mismatch.
    #[doc(hidden)]
    fn from_canonical(obj: &SharedObj) -> Option<Rc<RefCell<Self>>>;
}

impl<T: Archivable> Pointee for T {
    fn allocate() -> Result<(Rc<RefCell<T>>, SharedObj)> {
        let fresh = Rc::new(RefCell::new(T::fresh()?));
        let canonical = Rc::clone(&fresh) as SharedObj;
        Ok((fresh, canonical))
    }

    fn allocate_boxed() -> Result<Box<T>> {
        Ok(Box::new(T::fresh()?))
    }

    fn from_canonical(obj: &SharedObj) -> Option<Rc<RefCell<T>>> {
        Rc::clone(obj).downcast::<RefCell<T>>().ok()
    }
}
