// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 Tessel contributors

//! The archive session object.
//!
//! An [`Archive`] binds one codec to one direction for its whole lifetime
//! and carries the per-session identity tables that make shared and weak
//! references round-trip: every distinct object gets a small integer id in
//! encounter order, back-references replay the id instead of the body, and
//! cycles resolve because ids are recorded before bodies are transferred.
//!
//! Reference sentinels on the stream:
//!
//! ```text
//!  -1   first occurrence, body follows inline
//!  -2   null
//!  -3   first occurrence of a type-erased value; registered name + body follow
//!  >=0  back-reference to an already transferred object
//! ```
//!
//! A back-reference is followed by an erased flag and, when set, the
//! registered name of the most-derived type so the reader can rebuild the
//! trait-object view.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ffi::CString;
use std::io::{Read, Write};
use std::rc::{Rc, Weak};

use crate::codec::binary::{BinaryDecoder, BinaryEncoder};
use crate::codec::text::{TextDecoder, TextEncoder};
use crate::codec::{Decoder, Encoder};
use crate::error::{ArchiveError, Result};
use crate::registry::{self, SharedObj};
use crate::traits::{Archivable, Pointee};
use crate::version::{self, VersionInfo};

const ID_INLINE: i32 = -1;
const ID_NULL: i32 = -2;
const ID_POLY: i32 = -3;

/// Transfer direction, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Writing,
    Reading,
}

enum Io {
    Write(Box<dyn Encoder>),
    Read(Box<dyn Decoder>),
}

/// Write-side identity record: id plus the most-derived type of the object,
/// so later references through other views never have to re-borrow it.
#[derive(Clone, Copy)]
struct WriteEntry {
    id: i32,
    concrete: TypeId,
    concrete_name: &'static str,
}

/// Generate the symmetric primitive transfer methods.
macro_rules! impl_xfer_primitive {
    ($fn_name:ident, $ty:ty, $put:ident, $get:ident) => {
        pub(crate) fn $fn_name(&mut self, v: &mut $ty) -> Result<()> {
            match &mut self.io {
                Io::Write(enc) => enc.$put(*v),
                Io::Read(dec) => {
                    *v = dec.$get()?;
                    Ok(())
                }
            }
        }
    };
}

/// Generate the symmetric block transfer methods.
macro_rules! impl_xfer_slice {
    ($fn_name:ident, $ty:ty, $put:ident, $get:ident) => {
        pub(crate) fn $fn_name(&mut self, data: &mut [$ty]) -> Result<()> {
            match &mut self.io {
                Io::Write(enc) => enc.$put(data),
                Io::Read(dec) => dec.$get(data),
            }
        }
    };
}

/// One serialization session over one byte stream.
///
/// Construct through [`binary_writer`](Archive::binary_writer) /
/// [`binary_reader`](Archive::binary_reader) /
/// [`text_writer`](Archive::text_writer) / [`text_reader`](Archive::text_reader)
/// (or [`writer`](Archive::writer) / [`reader`](Archive::reader) with a custom
/// codec). Construction transfers the library-version header, so it can fail
/// on a bad stream.
///
/// The session is strictly sequential and single-threaded. On the read side
/// the archive keeps a strong handle to every object it allocated, so weak
/// references stay upgradeable until a shared reference in the stream (or
/// the caller) adopts their target; objects nothing adopted die with the
/// archive.
pub struct Archive {
    io: Io,
    shared_ids: HashMap<usize, WriteEntry>,
    raw_ids: HashMap<usize, WriteEntry>,
    shared_slots: Vec<SharedObj>,
    raw_slots: Vec<SharedObj>,
    versions: BTreeMap<String, VersionInfo>,
}

impl Archive {
    /// Writing session over a custom codec. Stamps the library-version table.
    pub fn writer(encoder: Box<dyn Encoder>) -> Result<Self> {
        let mut ar = Self::empty(Io::Write(encoder));
        let mut header = version::snapshot();
        header.archive(&mut ar)?;
        log::debug!("write archive opened, {} library versions stamped", header.len());
        Ok(ar)
    }

    /// Reading session over a custom codec. Consumes the library-version
    /// table before any payload.
    pub fn reader(decoder: Box<dyn Decoder>) -> Result<Self> {
        let mut ar = Self::empty(Io::Read(decoder));
        let mut header = BTreeMap::new();
        header.archive(&mut ar)?;
        log::debug!("read archive opened, {} library versions present", header.len());
        ar.versions = header;
        Ok(ar)
    }

    pub fn binary_writer<W: Write + 'static>(out: W) -> Result<Self> {
        Self::writer(Box::new(BinaryEncoder::new(out)))
    }

    pub fn binary_reader<R: Read + 'static>(input: R) -> Result<Self> {
        Self::reader(Box::new(BinaryDecoder::new(input)))
    }

    pub fn text_writer<W: Write + 'static>(out: W) -> Result<Self> {
        Self::writer(Box::new(TextEncoder::new(out)))
    }

    pub fn text_reader<R: Read + 'static>(input: R) -> Result<Self> {
        Self::reader(Box::new(TextDecoder::new(input)))
    }

    fn empty(io: Io) -> Self {
        Self {
            io,
            shared_ids: HashMap::new(),
            raw_ids: HashMap::new(),
            shared_slots: Vec::new(),
            raw_slots: Vec::new(),
            versions: BTreeMap::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        match self.io {
            Io::Write(_) => Direction::Writing,
            Io::Read(_) => Direction::Reading,
        }
    }

    pub fn is_writing(&self) -> bool {
        self.direction() == Direction::Writing
    }

    pub fn is_reading(&self) -> bool {
        self.direction() == Direction::Reading
    }

    /// Version of `library` as recorded by the writing process.
    ///
    /// On a write session this is the live process table; on a read session
    /// it is the table stamped at the head of the stream. Libraries absent
    /// from the table report the all-zero version.
    pub fn version_of(&self, library: &str) -> VersionInfo {
        match self.io {
            Io::Write(_) => version::library_version(library),
            Io::Read(_) => self.versions.get(library).copied().unwrap_or_default(),
        }
    }

    /// Transfer one value in the session's direction.
    pub fn xfer<T: Archivable + ?Sized>(&mut self, value: &mut T) -> Result<()> {
        value.archive(self)
    }

    /// Push buffered bytes through to the sink. No-op on read sessions.
    pub fn flush(&mut self) -> Result<()> {
        match &mut self.io {
            Io::Write(enc) => enc.flush(),
            Io::Read(_) => Ok(()),
        }
    }

    // ---- primitive plumbing ------------------------------------------------

    impl_xfer_primitive!(xfer_f64, f64, put_f64, get_f64);
    impl_xfer_primitive!(xfer_i16, i16, put_i16, get_i16);
    impl_xfer_primitive!(xfer_i32, i32, put_i32, get_i32);
    impl_xfer_primitive!(xfer_i64, i64, put_i64, get_i64);
    impl_xfer_primitive!(xfer_u8, u8, put_u8, get_u8);
    impl_xfer_primitive!(xfer_usize, usize, put_usize, get_usize);
    impl_xfer_primitive!(xfer_bool, bool, put_bool, get_bool);

    impl_xfer_slice!(xfer_f64_slice, f64, put_f64_slice, get_f64_slice);
    impl_xfer_slice!(xfer_i32_slice, i32, put_i32_slice, get_i32_slice);
    impl_xfer_slice!(xfer_usize_slice, usize, put_usize_slice, get_usize_slice);
    impl_xfer_slice!(xfer_u8_slice, u8, put_u8_slice, get_u8_slice);

    pub(crate) fn xfer_string(&mut self, v: &mut String) -> Result<()> {
        match &mut self.io {
            Io::Write(enc) => enc.put_str(v),
            Io::Read(dec) => {
                *v = dec.get_str()?;
                Ok(())
            }
        }
    }

    pub(crate) fn xfer_cstr(&mut self, v: &mut Option<CString>) -> Result<()> {
        match &mut self.io {
            Io::Write(enc) => enc.put_cstr(v.as_deref()),
            Io::Read(dec) => {
                *v = dec.get_cstr()?;
                Ok(())
            }
        }
    }

    // ---- protocol tokens ---------------------------------------------------

    fn emit_i32(&mut self, v: i32) -> Result<()> {
        match &mut self.io {
            Io::Write(enc) => enc.put_i32(v),
            Io::Read(_) => Err(ArchiveError::format("token emitted on a reading archive")),
        }
    }

    fn emit_bool(&mut self, v: bool) -> Result<()> {
        match &mut self.io {
            Io::Write(enc) => enc.put_bool(v),
            Io::Read(_) => Err(ArchiveError::format("token emitted on a reading archive")),
        }
    }

    fn emit_str(&mut self, v: &str) -> Result<()> {
        match &mut self.io {
            Io::Write(enc) => enc.put_str(v),
            Io::Read(_) => Err(ArchiveError::format("token emitted on a reading archive")),
        }
    }

    fn take_i32(&mut self) -> Result<i32> {
        match &mut self.io {
            Io::Read(dec) => dec.get_i32(),
            Io::Write(_) => Err(ArchiveError::format("token consumed on a writing archive")),
        }
    }

    fn take_bool(&mut self) -> Result<bool> {
        match &mut self.io {
            Io::Read(dec) => dec.get_bool(),
            Io::Write(_) => Err(ArchiveError::format("token consumed on a writing archive")),
        }
    }

    fn take_str(&mut self) -> Result<String> {
        match &mut self.io {
            Io::Read(dec) => dec.get_str(),
            Io::Write(_) => Err(ArchiveError::format("token consumed on a writing archive")),
        }
    }

    // ---- identity bookkeeping ----------------------------------------------

    /// Most-derived type of the referent. Consults the identity tables first
    /// so that references met while their target's body is being transferred
    /// never re-borrow the target.
    fn write_identity<P: Archivable + ?Sized>(
        &self,
        key: usize,
        rc: &Rc<RefCell<P>>,
    ) -> (TypeId, &'static str) {
        if let Some(entry) = self.shared_ids.get(&key) {
            return (entry.concrete, entry.concrete_name);
        }
        if let Some(entry) = self.raw_ids.get(&key) {
            return (entry.concrete, entry.concrete_name);
        }
        let value = rc.borrow();
        (value.concrete_type_id(), value.concrete_type_name())
    }

    fn record_shared(&mut self, key: usize, concrete: TypeId, concrete_name: &'static str) {
        let id = self.shared_ids.len() as i32;
        self.shared_ids.insert(
            key,
            WriteEntry {
                id,
                concrete,
                concrete_name,
            },
        );
    }

    fn record_raw(&mut self, key: usize, concrete: TypeId, concrete_name: &'static str) {
        let id = self.raw_ids.len() as i32;
        self.raw_ids.insert(
            key,
            WriteEntry {
                id,
                concrete,
                concrete_name,
            },
        );
    }

    fn shared_slot(&self, id: i32) -> Result<SharedObj> {
        self.shared_slots
            .get(id as usize)
            .cloned()
            .ok_or_else(|| ArchiveError::format(format!("shared back-reference {} out of range", id)))
    }

    fn raw_slot(&self, id: i32) -> Result<SharedObj> {
        self.raw_slots
            .get(id as usize)
            .cloned()
            .ok_or_else(|| ArchiveError::format(format!("back-reference {} out of range", id)))
    }

    /// Registered stream name for an erased reference, `None` for an exact
    /// one.
    fn stream_name(
        erased: bool,
        concrete: TypeId,
        concrete_name: &'static str,
    ) -> Result<Option<&'static str>> {
        if !erased {
            return Ok(None);
        }
        registry::name_by_id(concrete)
            .map(Some)
            .ok_or_else(|| ArchiveError::unregistered(concrete_name))
    }

    /// View `canonical` as `P` through the registered links of `name`.
    fn upcast_to<P: Archivable + ?Sized>(name: &str, canonical: &SharedObj) -> Result<Rc<RefCell<P>>> {
        let entry = registry::lookup(name)?;
        let view = entry.upcast_shared(TypeId::of::<P>(), std::any::type_name::<P>(), canonical)?;
        view.downcast::<Rc<RefCell<P>>>()
            .map(|boxed| *boxed)
            .map_err(|_| ArchiveError::CastFailure {
                from: name.to_string(),
                to: std::any::type_name::<P>(),
            })
    }

    fn exact_view<P: Pointee + ?Sized>(canonical: &SharedObj) -> Result<Rc<RefCell<P>>> {
        P::from_canonical(canonical).ok_or_else(|| {
            ArchiveError::format("back-referenced object does not match the destination type")
        })
    }

    // ---- shared references -------------------------------------------------

    /// Transfer an owning shared reference.
    pub fn xfer_shared<P: Pointee + ?Sized>(&mut self, slot: &mut Option<Rc<RefCell<P>>>) -> Result<()> {
        if self.is_writing() {
            self.write_shared(&*slot)
        } else {
            self.read_shared(slot)
        }
    }

    fn write_shared<P: Pointee + ?Sized>(&mut self, src: &Option<Rc<RefCell<P>>>) -> Result<()> {
        let Some(rc) = src else {
            return self.emit_i32(ID_NULL);
        };
        let key = identity_key(rc);
        let (concrete, concrete_name) = self.write_identity(key, rc);
        let erased = concrete != TypeId::of::<P>();
        let name = Self::stream_name(erased, concrete, concrete_name)?;

        if let Some(id) = self.shared_ids.get(&key).map(|e| e.id) {
            self.emit_i32(id)?;
            self.emit_bool(erased)?;
            if let Some(name) = name {
                self.emit_str(name)?;
            }
            return Ok(());
        }

        self.emit_i32(ID_INLINE)?;
        self.emit_bool(erased)?;
        let fill = self.write_raw_role(key, concrete, concrete_name, erased, name)?;
        self.record_shared(key, concrete, concrete_name);
        if fill {
            rc.borrow_mut().archive(self)?;
        }
        if let Some(name) = name {
            self.emit_str(name)?;
        }
        Ok(())
    }

    /// Inner raw-role transfer of a shared first occurrence, and the whole of
    /// a weak transfer. Returns whether the body must follow.
    fn write_raw_role(
        &mut self,
        key: usize,
        concrete: TypeId,
        concrete_name: &'static str,
        erased: bool,
        name: Option<&'static str>,
    ) -> Result<bool> {
        if let Some(id) = self.raw_ids.get(&key).map(|e| e.id) {
            self.emit_i32(id)?;
            self.emit_bool(erased)?;
            if let Some(name) = name {
                self.emit_str(name)?;
            }
            return Ok(false);
        }
        self.record_raw(key, concrete, concrete_name);
        match name {
            Some(name) => {
                self.emit_i32(ID_POLY)?;
                self.emit_str(name)?;
            }
            None => self.emit_i32(ID_INLINE)?,
        }
        Ok(true)
    }

    fn read_shared<P: Pointee + ?Sized>(&mut self, dest: &mut Option<Rc<RefCell<P>>>) -> Result<()> {
        let id = self.take_i32()?;
        if id == ID_NULL {
            *dest = None;
            return Ok(());
        }
        if id >= 0 {
            let canonical = self.shared_slot(id)?;
            let erased = self.take_bool()?;
            let typed = if erased {
                let name = self.take_str()?;
                Self::upcast_to::<P>(&name, &canonical)?
            } else {
                Self::exact_view::<P>(&canonical)?
            };
            *dest = Some(typed);
            return Ok(());
        }
        if id != ID_INLINE {
            return Err(ArchiveError::format(format!("unexpected shared reference tag {}", id)));
        }

        let erased = self.take_bool()?;
        let inner = self.take_i32()?;
        let (typed, fill) = match inner {
            ID_INLINE => {
                let (typed, canonical) = P::allocate()?;
                self.raw_slots.push(Rc::clone(&canonical));
                self.shared_slots.push(canonical);
                (typed, true)
            }
            ID_POLY => {
                let name = self.take_str()?;
                let entry = registry::lookup(&name)?;
                let canonical = entry.construct()?;
                self.raw_slots.push(Rc::clone(&canonical));
                let typed = Self::upcast_to::<P>(&name, &canonical)?;
                self.shared_slots.push(canonical);
                (typed, true)
            }
            n if n >= 0 => {
                let canonical = self.raw_slot(n)?;
                let inner_erased = self.take_bool()?;
                let typed = if inner_erased {
                    let name = self.take_str()?;
                    Self::upcast_to::<P>(&name, &canonical)?
                } else {
                    Self::exact_view::<P>(&canonical)?
                };
                self.shared_slots.push(canonical);
                (typed, false)
            }
            other => {
                return Err(ArchiveError::format(format!("unexpected inner reference tag {}", other)))
            }
        };
        if fill {
            typed.borrow_mut().archive(self)?;
        }
        if erased {
            // trailing most-derived name, already applied through the inner
            // transfer
            let _ = self.take_str()?;
        }
        *dest = Some(typed);
        Ok(())
    }

    // ---- weak references ---------------------------------------------------

    /// Transfer a non-owning reference.
    ///
    /// Writing transfers the target inline on first encounter, exactly as a
    /// raw pointer would; a dangling or unset weak reference writes as null.
    pub fn xfer_weak<P: Pointee + ?Sized>(&mut self, slot: &mut Option<Weak<RefCell<P>>>) -> Result<()> {
        if self.is_writing() {
            self.write_weak(&*slot)
        } else {
            self.read_weak(slot)
        }
    }

    fn write_weak<P: Pointee + ?Sized>(&mut self, src: &Option<Weak<RefCell<P>>>) -> Result<()> {
        let Some(rc) = src.as_ref().and_then(|weak| weak.upgrade()) else {
            return self.emit_i32(ID_NULL);
        };
        let key = identity_key(&rc);
        let (concrete, concrete_name) = self.write_identity(key, &rc);
        let erased = concrete != TypeId::of::<P>();
        let name = Self::stream_name(erased, concrete, concrete_name)?;
        let fill = self.write_raw_role(key, concrete, concrete_name, erased, name)?;
        if fill {
            rc.borrow_mut().archive(self)?;
        }
        Ok(())
    }

    fn read_weak<P: Pointee + ?Sized>(&mut self, dest: &mut Option<Weak<RefCell<P>>>) -> Result<()> {
        let id = self.take_i32()?;
        match id {
            ID_NULL => {
                *dest = None;
                Ok(())
            }
            ID_INLINE => {
                let (typed, canonical) = P::allocate()?;
                self.raw_slots.push(canonical);
                *dest = Some(Rc::downgrade(&typed));
                let result = typed.borrow_mut().archive(self);
                result
            }
            ID_POLY => {
                let name = self.take_str()?;
                let entry = registry::lookup(&name)?;
                let canonical = entry.construct()?;
                self.raw_slots.push(Rc::clone(&canonical));
                let typed = Self::upcast_to::<P>(&name, &canonical)?;
                *dest = Some(Rc::downgrade(&typed));
                let result = typed.borrow_mut().archive(self);
                result
            }
            n if n >= 0 => {
                let canonical = self.raw_slot(n)?;
                let erased = self.take_bool()?;
                let typed = if erased {
                    let name = self.take_str()?;
                    Self::upcast_to::<P>(&name, &canonical)?
                } else {
                    Self::exact_view::<P>(&canonical)?
                };
                *dest = Some(Rc::downgrade(&typed));
                Ok(())
            }
            other => Err(ArchiveError::format(format!("unexpected reference tag {}", other))),
        }
    }

    // ---- unique references -------------------------------------------------

    /// Transfer a uniquely-owned reference.
    ///
    /// A `Box` target cannot be aliased, so it takes no part in identity
    /// bookkeeping; the body is always inline.
    pub fn xfer_boxed<P: Pointee + ?Sized>(&mut self, slot: &mut Option<Box<P>>) -> Result<()> {
        if self.is_writing() {
            self.write_box(slot)
        } else {
            self.read_box(slot)
        }
    }

    fn write_box<P: Pointee + ?Sized>(&mut self, src: &mut Option<Box<P>>) -> Result<()> {
        let Some(value) = src else {
            return self.emit_i32(ID_NULL);
        };
        let concrete = (**value).concrete_type_id();
        let erased = concrete != TypeId::of::<P>();
        if erased {
            let name = registry::name_by_id(concrete)
                .ok_or_else(|| ArchiveError::unregistered((**value).concrete_type_name()))?;
            self.emit_i32(ID_POLY)?;
            self.emit_str(name)?;
        } else {
            self.emit_i32(ID_INLINE)?;
        }
        (**value).archive(self)
    }

    fn read_box<P: Pointee + ?Sized>(&mut self, dest: &mut Option<Box<P>>) -> Result<()> {
        let id = self.take_i32()?;
        match id {
            ID_NULL => {
                *dest = None;
                Ok(())
            }
            ID_INLINE => {
                let mut fresh = P::allocate_boxed()?;
                (*fresh).archive(self)?;
                *dest = Some(fresh);
                Ok(())
            }
            ID_POLY => {
                let name = self.take_str()?;
                let entry = registry::lookup(&name)?;
                let view = entry.construct_boxed(TypeId::of::<P>(), std::any::type_name::<P>())?;
                let mut fresh = view
                    .downcast::<Box<P>>()
                    .map(|boxed| *boxed)
                    .map_err(|_| ArchiveError::CastFailure {
                        from: name.clone(),
                        to: std::any::type_name::<P>(),
                    })?;
                (*fresh).archive(self)?;
                *dest = Some(fresh);
                Ok(())
            }
            n if n >= 0 => Err(ArchiveError::format(
                "unique reference cannot share an object with an earlier reference",
            )),
            other => Err(ArchiveError::format(format!("unexpected reference tag {}", other))),
        }
    }
}

/// Canonical identity key: the allocation address with pointer metadata
/// discarded. Every view of one object, concrete or erased, yields the same
/// key.
fn identity_key<P: ?Sized>(rc: &Rc<RefCell<P>>) -> usize {
    Rc::as_ptr(rc).cast::<()>() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clonable in-memory sink; the archive owns one handle, the test keeps
    /// another to inspect the bytes.
    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_direction_is_fixed() {
        let ar = Archive::binary_writer(SharedSink::default()).expect("writer opens");
        assert_eq!(ar.direction(), Direction::Writing);
        assert!(ar.is_writing());
        assert!(!ar.is_reading());
    }

    #[test]
    fn test_empty_stream_round_trips_header_only() {
        let sink = SharedSink::default();
        drop(Archive::binary_writer(sink.clone()).expect("writer opens"));
        let bytes = sink.0.borrow().clone();
        let ar = Archive::binary_reader(std::io::Cursor::new(bytes)).expect("reader opens");
        assert_eq!(ar.direction(), Direction::Reading);
    }

    #[test]
    fn test_reader_on_garbage_fails() {
        let result = Archive::binary_reader(std::io::Cursor::new([0xFFu8; 3]));
        assert!(result.is_err(), "truncated header must not open");
    }
}
