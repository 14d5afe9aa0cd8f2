// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! Registration macros for polymorphic archiving.

/// Make a trait usable as a reference target
/// (`Option<Rc<RefCell<dyn Trait>>>`, `Option<Weak<RefCell<dyn Trait>>>`,
/// `Option<Box<dyn Trait>>`).
///
/// The trait must have [`Archivable`](crate::Archivable) as a supertrait.
/// Invoke once, in the crate that defines the trait:
///
/// ```ignore
/// trait Element: tessel_archive::Archivable {
///     fn corners(&self) -> usize;
/// }
///
/// tessel_archive::archive_pointee!(Element);
/// ```
#[macro_export]
macro_rules! archive_pointee {
    ($trait:path) => {
        impl $crate::Pointee for dyn $trait {
            fn allocate() -> $crate::Result<(
                ::std::rc::Rc<::std::cell::RefCell<Self>>,
                $crate::registry::SharedObj,
            )> {
                ::std::result::Result::Err($crate::ArchiveError::FormatMismatch {
                    detail: ::std::format!(
                        "erased reference to {} needs a registered type name on the stream",
                        ::std::any::type_name::<dyn $trait>()
                    ),
                })
            }

            fn allocate_boxed() -> $crate::Result<::std::boxed::Box<Self>> {
                ::std::result::Result::Err($crate::ArchiveError::FormatMismatch {
                    detail: ::std::format!(
                        "erased reference to {} needs a registered type name on the stream",
                        ::std::any::type_name::<dyn $trait>()
                    ),
                })
            }

            fn from_canonical(
                _obj: &$crate::registry::SharedObj,
            ) -> ::std::option::Option<::std::rc::Rc<::std::cell::RefCell<Self>>> {
                ::std::option::Option::None
            }
        }
    };
}

/// Install the archive descriptor for a concrete type, naming every trait it
/// is archived through.
///
/// Listing a trait the type does not implement is a compile error. Call once
/// per type before the first archive operation:
///
/// ```ignore
/// fn register_geometry_types() {
///     tessel_archive::register_archive_type!(Quad: Element, Refinable);
///     tessel_archive::register_archive_type!(Segment: Element);
///     tessel_archive::register_archive_type!(MeshPoint);
/// }
/// ```
#[macro_export]
macro_rules! register_archive_type {
    ($ty:ty) => {
        $crate::registry::install($crate::registry::TypeEntry::new::<$ty>());
    };
    ($ty:ty : $($base:path),+ $(,)?) => {
        $crate::registry::install(
            $crate::registry::TypeEntry::new::<$ty>()
            $(
                .with_base($crate::registry::BaseLink::new(
                    ::std::any::TypeId::of::<dyn $base>(),
                    ::std::any::type_name::<dyn $base>(),
                    |obj| {
                        let rc = ::std::rc::Rc::clone(obj)
                            .downcast::<::std::cell::RefCell<$ty>>()
                            .ok()?;
                        ::std::option::Option::Some(::std::boxed::Box::new(
                            rc as ::std::rc::Rc<::std::cell::RefCell<dyn $base>>,
                        ) as $crate::registry::ViewObj)
                    },
                    || {
                        let fresh = <$ty as $crate::Archivable>::fresh()?;
                        ::std::result::Result::Ok(::std::boxed::Box::new(
                            ::std::boxed::Box::new(fresh) as ::std::boxed::Box<dyn $base>,
                        ) as $crate::registry::ViewObj)
                    },
                ))
            )+
        );
    };
}
