// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! Process-wide polymorphic type registry.
//!
//! Values archived behind trait references are reconstructed from their
//! stable type name. Each registered type installs a descriptor holding a
//! constructor and one link per trait it may be viewed through; the links
//! rebuild the trait-object metadata the stream cannot carry.
//!
//! Registration happens through
//! [`register_archive_type!`](crate::register_archive_type) before the first
//! archive operation and the table is read-only afterwards. Identity across
//! views needs no descriptor support: every view of an object shares one
//! allocation address, which the archive uses as its canonical key.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::error::{ArchiveError, Result};
use crate::traits::Archivable;

/// Type-erased canonical handle: an `Rc<RefCell<T>>` for the most-derived
/// `T`, stored behind `dyn Any`. The identity tables and registry closures
/// trade in this form.
pub type SharedObj = Rc<dyn Any>;

/// Type-erased view handle produced by an upcast: a boxed
/// `Rc<RefCell<dyn Trait>>` (or `Box<dyn Trait>` for unique construction).
pub type ViewObj = Box<dyn Any>;

/// One trait a registered type may be archived through.
#[derive(Debug)]
pub struct BaseLink {
    base_id: TypeId,
    base_name: &'static str,
    /// Canonical handle -> handle viewed through this trait.
    upcast_shared: fn(&SharedObj) -> Option<ViewObj>,
    /// Fresh instance, uniquely owned, viewed through this trait.
    construct_boxed: fn() -> Result<ViewObj>,
}

impl BaseLink {
    pub fn new(
        base_id: TypeId,
        base_name: &'static str,
        upcast_shared: fn(&SharedObj) -> Option<ViewObj>,
        construct_boxed: fn() -> Result<ViewObj>,
    ) -> Self {
        Self {
            base_id,
            base_name,
            upcast_shared,
            construct_boxed,
        }
    }
}

/// Descriptor of one registered type.
#[derive(Debug)]
pub struct TypeEntry {
    type_name: &'static str,
    type_id: TypeId,
    /// Fresh canonical instance.
    construct: fn() -> Result<SharedObj>,
    /// Canonical handle viewed as the registered type itself.
    self_view: fn(&SharedObj) -> Option<ViewObj>,
    /// Fresh instance boxed as the registered type itself.
    self_boxed: fn() -> Result<ViewObj>,
    bases: Vec<BaseLink>,
}

impl TypeEntry {
    pub fn new<T: Archivable>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            construct: || {
                let fresh = T::fresh()?;
                Ok(Rc::new(RefCell::new(fresh)) as SharedObj)
            },
            self_view: |obj| {
                let rc = Rc::clone(obj).downcast::<RefCell<T>>().ok()?;
                Some(Box::new(rc) as ViewObj)
            },
            self_boxed: || {
                let fresh = T::fresh()?;
                Ok(Box::new(Box::new(fresh)) as ViewObj)
            },
            bases: Vec::new(),
        }
    }

    pub fn with_base(mut self, link: BaseLink) -> Self {
        self.bases.push(link);
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Default-construct the most-derived type, canonical handle out.
    pub fn construct(&self) -> Result<SharedObj> {
        (self.construct)()
    }

    /// View `canonical` through the base identified by `target`.
    ///
    /// The declared base list is tried in order, first match wins; the
    /// registered type itself is always a valid target.
    pub fn upcast_shared(&self, target: TypeId, target_name: &'static str, canonical: &SharedObj) -> Result<ViewObj> {
        if target == self.type_id {
            if let Some(view) = (self.self_view)(canonical) {
                return Ok(view);
            }
        }
        for link in &self.bases {
            if link.base_id == target {
                if let Some(view) = (link.upcast_shared)(canonical) {
                    return Ok(view);
                }
            }
        }
        Err(ArchiveError::CastFailure {
            from: self.type_name.to_string(),
            to: target_name,
        })
    }

    /// Fresh uniquely-owned instance viewed through the base identified by
    /// `target`.
    pub fn construct_boxed(&self, target: TypeId, target_name: &'static str) -> Result<ViewObj> {
        if target == self.type_id {
            return (self.self_boxed)();
        }
        for link in &self.bases {
            if link.base_id == target {
                return (link.construct_boxed)();
            }
        }
        Err(ArchiveError::CastFailure {
            from: self.type_name.to_string(),
            to: target_name,
        })
    }
}

struct Registry {
    by_name: HashMap<&'static str, Arc<TypeEntry>>,
    name_by_id: HashMap<TypeId, &'static str>,
}

static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

fn registry() -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| {
        RwLock::new(Registry {
            by_name: HashMap::new(),
            name_by_id: HashMap::new(),
        })
    })
}

/// Install a descriptor. Reinstalling a name replaces the old descriptor.
pub fn install(entry: TypeEntry) {
    let mut reg = registry().write();
    let name = entry.type_name;
    reg.name_by_id.insert(entry.type_id, name);
    if reg.by_name.insert(name, Arc::new(entry)).is_some() {
        log::warn!("archive descriptor for {} replaced", name);
    } else {
        log::debug!("archive descriptor for {} installed", name);
    }
}

/// Descriptor for `name`, [`ArchiveError::UnregisteredPolymorphic`] if absent.
pub fn lookup(name: &str) -> Result<Arc<TypeEntry>> {
    registry()
        .read()
        .by_name
        .get(name)
        .cloned()
        .ok_or_else(|| ArchiveError::unregistered(name))
}

pub fn is_registered(name: &str) -> bool {
    registry().read().by_name.contains_key(name)
}

/// Registered stream name for a concrete `TypeId` (write side).
pub fn name_by_id(id: TypeId) -> Option<&'static str> {
    registry().read().name_by_id.get(&id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Archive;

    #[derive(Default)]
    struct Probe {
        value: i32,
    }

    impl Archivable for Probe {
        fn archive(&mut self, ar: &mut Archive) -> Result<()> {
            self.value.archive(ar)
        }

        fn fresh() -> Result<Self> {
            Ok(Self::default())
        }
    }

    struct NoBlank;

    impl Archivable for NoBlank {
        fn archive(&mut self, _ar: &mut Archive) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_install_and_lookup() {
        install(TypeEntry::new::<Probe>());
        assert!(is_registered(std::any::type_name::<Probe>()));
        assert!(!is_registered("tessel::NotAThing"));

        let entry = lookup(std::any::type_name::<Probe>()).expect("installed entry resolves");
        assert_eq!(entry.type_id(), TypeId::of::<Probe>());
        assert_eq!(name_by_id(TypeId::of::<Probe>()), Some(std::any::type_name::<Probe>()));

        let err = lookup("tessel::NotAThing").expect_err("unknown name fails");
        assert!(matches!(err, ArchiveError::UnregisteredPolymorphic { .. }));
    }

    #[test]
    fn test_construct_and_self_view() {
        install(TypeEntry::new::<Probe>());
        let entry = lookup(std::any::type_name::<Probe>()).expect("installed entry resolves");
        let canonical = entry.construct().expect("Probe constructs");

        let view = entry
            .upcast_shared(TypeId::of::<Probe>(), "Probe", &canonical)
            .expect("self view always available");
        let typed = view
            .downcast::<Rc<RefCell<Probe>>>()
            .expect("self view has the registered type");
        assert_eq!(typed.borrow().value, 0);
    }

    #[test]
    fn test_missing_base_is_cast_failure() {
        install(TypeEntry::new::<Probe>());
        let entry = lookup(std::any::type_name::<Probe>()).expect("installed entry resolves");
        let canonical = entry.construct().expect("Probe constructs");
        let err = entry
            .upcast_shared(TypeId::of::<String>(), "String", &canonical)
            .expect_err("unrelated target fails");
        assert!(matches!(err, ArchiveError::CastFailure { .. }));
    }

    #[test]
    fn test_construct_without_fresh_fails() {
        install(TypeEntry::new::<NoBlank>());
        let entry = lookup(std::any::type_name::<NoBlank>()).expect("installed entry resolves");
        let err = entry.construct().expect_err("NoBlank has no blank state");
        assert!(matches!(err, ArchiveError::NotDefaultConstructible { .. }));
    }
}
