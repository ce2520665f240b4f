//! Handle System
//!
//! Opaque integer handles for resources and scene nodes.
//!
//! # Design Principles
//! - Handles are plain `i32` values wrapped in typed newtypes, so a resource handle
//!   can never be passed where a node handle is expected
//! - `0` is reserved and always means "none"
//! - A slot's numeric value is only recycled after the object stored in it has been
//!   removed from its [`HandleTable`]

use std::fmt;

/// Conversion between a typed handle and its raw integer value.
pub trait RawHandle: Copy + Eq {
    /// Wraps a raw value.
    fn from_raw(raw: i32) -> Self;
    /// Returns the raw value.
    fn raw(self) -> i32;
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(i32);

        impl $name {
            /// The reserved "no object" handle.
            pub const NONE: Self = Self(0);

            /// Wraps a raw handle value.
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: i32) -> Self {
                Self(raw)
            }

            /// Returns the raw handle value.
            #[inline]
            #[must_use]
            pub const fn raw(self) -> i32 {
                self.0
            }

            /// Returns `true` for the reserved zero handle.
            #[inline]
            #[must_use]
            pub const fn is_none(self) -> bool {
                self.0 == 0
            }
        }

        impl RawHandle for $name {
            #[inline]
            fn from_raw(raw: i32) -> Self {
                Self(raw)
            }

            #[inline]
            fn raw(self) -> i32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_handle!(
    /// Handle to a resource in the resource manager.
    ResHandle,
    "ResHandle"
);

define_handle!(
    /// Handle to a node in the scene graph.
    NodeHandle,
    "NodeHandle"
);

impl NodeHandle {
    /// The scene root. It is the first node created by every scene and
    /// therefore always occupies the first slot.
    pub const ROOT: Self = Self(1);
}

/// Slot storage mapping handles to objects.
///
/// Handle values are `slot index + 1`. Freed slots go on a free list and are
/// handed out again (most recently freed first) by later insertions.
#[derive(Debug, Clone)]
pub struct HandleTable<H: RawHandle, T> {
    slots: Vec<Option<T>>,
    free: Vec<u32>,
    len: usize,
    _marker: std::marker::PhantomData<H>,
}

impl<H: RawHandle, T> Default for HandleTable<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: RawHandle, T> HandleTable<H, T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Stores an object and returns its new handle.
    pub fn insert(&mut self, value: T) -> H {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(value);
            return H::from_raw(index as i32 + 1);
        }
        self.slots.push(Some(value));
        H::from_raw(self.slots.len() as i32)
    }

    #[inline]
    fn index_of(handle: H) -> Option<usize> {
        let raw = handle.raw();
        if raw <= 0 {
            None
        } else {
            Some(raw as usize - 1)
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, handle: H) -> Option<&T> {
        self.slots.get(Self::index_of(handle)?)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        self.slots.get_mut(Self::index_of(handle)?)?.as_mut()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    /// Removes an object, making its handle value available for reuse.
    pub fn remove(&mut self, handle: H) -> Option<T> {
        let index = Self::index_of(handle)?;
        let value = self.slots.get_mut(index)?.take()?;
        self.free.push(index as u32);
        self.len -= 1;
        Some(value)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates live objects in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (H::from_raw(i as i32 + 1), v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (H::from_raw(i as i32 + 1), v)))
    }

    /// Drops every object and resets handle numbering.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }
}
