// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! `Archivable` for the reference forms.
//!
//! `None` is the null reference in every form. The blanket impls cover both
//! concrete targets and trait objects; the latter become valid targets once
//! [`archive_pointee!`](crate::archive_pointee) has been invoked for the
//! trait and the concrete types are registered.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::archive::Archive;
use crate::error::Result;
use crate::traits::{Archivable, Pointee};

/// Owning shared reference. Sharing and cycles survive a round trip: every
/// reference to one object before saving resolves to one object after
/// loading.
impl<P: Pointee + ?Sized> Archivable for Option<Rc<RefCell<P>>> {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        ar.xfer_shared(self)
    }

    fn fresh() -> Result<Self> {
        Ok(None)
    }
}

/// Non-owning reference. Writes transfer the target inline on first
/// encounter; reads keep the target alive through the archive session until
/// an owning reference adopts it.
impl<P: Pointee + ?Sized> Archivable for Option<Weak<RefCell<P>>> {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        ar.xfer_weak(self)
    }

    fn fresh() -> Result<Self> {
        Ok(None)
    }
}

/// Uniquely-owned reference, always transferred inline.
impl<P: Pointee + ?Sized> Archivable for Option<Box<P>> {
    fn archive(&mut self, ar: &mut Archive) -> Result<()> {
        ar.xfer_boxed(self)
    }

    fn fresh() -> Result<Self> {
        Ok(None)
    }
}
