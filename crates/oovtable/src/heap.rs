//! Object storage.
//!
//! Every object and every private block lives in a [`Heap`]. Objects are addressed through
//! [`Handle`]s: an allocation id plus a byte offset into the allocation, so a handle to an
//! embedded base points at the same allocation as the handle to its owner, just further in.
//! Ids carry a generation, and a stale handle never resolves once its allocation is freed.

use core::any::{Any, TypeId};
use core::fmt;
use core::marker::PhantomData;

use crate::error::{Error, Result};

/// A class instance that can live in a [`Heap`].
///
/// Implemented by `define_class!`. `locate` walks the embedded bases to find the sub-object
/// of type `ty` starting `offset` bytes into `self`.
pub trait Object: Any {
    fn as_any(&self) -> &dyn Any;

    fn locate(&self, offset: usize, ty: TypeId) -> Option<&dyn Any>;

    fn locate_mut(&mut self, offset: usize, ty: TypeId) -> Option<&mut dyn Any>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    index: u32,
    generation: u32,
}

/// Identity of a heap allocation holding an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocId(Key);

/// Identity of a private block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(Key);

struct Entry<T: ?Sized> {
    generation: u32,
    value: Option<Box<T>>,
}

/// Most slots an arena will ever create; indices must fit a `u32`
const MAX_ENTRIES: usize = u32::MAX as usize;

/// Generational slot storage with a free list
struct Arena<T: ?Sized> {
    entries: Vec<Entry<T>>,
    free: Vec<u32>,
    live: usize,
    max_entries: usize,
}

impl<T: ?Sized> Arena<T> {
    const fn new() -> Self {
        Self::with_max_entries(MAX_ENTRIES)
    }

    const fn with_max_entries(max_entries: usize) -> Self {
        Arena {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
            max_entries,
        }
    }

    fn insert(&mut self, value: Box<T>) -> Result<Key> {
        if let Some(index) = self.free.pop()
            && let Some(entry) = self.entries.get_mut(index as usize)
        {
            entry.value = Some(value);
            self.live += 1;
            return Ok(Key {
                index,
                generation: entry.generation,
            });
        }

        let index = match u32::try_from(self.entries.len()) {
            Ok(index) if (index as usize) < self.max_entries => index,
            _ => {
                log::error!(
                    "no memory, all {} slots are in use or retired",
                    self.entries.len()
                );
                return Err(Error::OutOfMemory);
            }
        };
        self.entries.push(Entry {
            generation: 0,
            value: Some(value),
        });
        self.live += 1;
        Ok(Key {
            index,
            generation: 0,
        })
    }

    fn get(&self, key: Key) -> Option<&T> {
        self.entries
            .get(key.index as usize)
            .filter(|entry| entry.generation == key.generation)
            .and_then(|entry| entry.value.as_deref())
    }

    fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        self.entries
            .get_mut(key.index as usize)
            .filter(|entry| entry.generation == key.generation)
            .and_then(|entry| entry.value.as_deref_mut())
    }

    fn remove(&mut self, key: Key) -> Option<Box<T>> {
        let entry = self.entries.get_mut(key.index as usize)?;
        if entry.generation != key.generation {
            return None;
        }
        let value = entry.value.take()?;
        self.live -= 1;
        // A slot whose generation is exhausted is retired, never reused
        if let Some(next) = entry.generation.checked_add(1) {
            entry.generation = next;
            self.free.push(key.index);
        }
        Some(value)
    }

    fn len(&self) -> usize {
        self.live
    }
}

/// Typed reference to an object, or to a base embedded in one.
///
/// Handles are plain values: copying one does not copy the object, and a handle outlives
/// nothing. Resolving it through [`Heap::get`] checks that the allocation is still live and
/// that a `T` really sits at the handle's offset.
pub struct Handle<T> {
    alloc: AllocId,
    offset: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Offset that no sub-object can start at
    const DANGLING: usize = usize::MAX;

    const fn new(alloc: AllocId, offset: usize) -> Self {
        Handle {
            alloc,
            offset,
            marker: PhantomData,
        }
    }

    #[inline]
    pub const fn alloc(self) -> AllocId {
        self.alloc
    }

    /// Byte offset of the referenced sub-object within its allocation
    #[inline]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Handle to the sub-object `offset` bytes into this one.
    #[inline]
    pub const fn embedded<U>(self, offset: usize) -> Handle<U> {
        match self.offset.checked_add(offset) {
            Some(total) => Handle::new(self.alloc, total),
            None => Handle::new(self.alloc, Handle::<U>::DANGLING),
        }
    }

    /// Handle to the object this one is embedded in, `offset` bytes further back.
    ///
    /// A handle that does not sit that far into its allocation yields a handle that never
    /// resolves.
    #[inline]
    pub const fn enclosing<U>(self, offset: usize) -> Handle<U> {
        match self.offset.checked_sub(offset) {
            Some(start) if self.offset != Self::DANGLING => Handle::new(self.alloc, start),
            _ => Handle::new(self.alloc, Handle::<U>::DANGLING),
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.alloc == other.alloc && self.offset == other.offset
    }
}

impl<T> Eq for Handle<T> {}

impl<T> core::hash::Hash for Handle<T> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.alloc.hash(state);
        self.offset.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = core::any::type_name::<T>();
        let name = name.rsplit("::").next().unwrap_or(name);
        write!(
            f,
            "Handle<{}>(#{}v{}+{})",
            name, self.alloc.0.index, self.alloc.0.generation, self.offset
        )
    }
}

/// Heap limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapConfig {
    /// Maximum number of live allocations (objects and private blocks together)
    pub capacity: Option<usize>,
}

impl HeapConfig {
    pub const fn new() -> Self {
        HeapConfig { capacity: None }
    }

    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// Storage for objects and their private blocks
pub struct Heap {
    objects: Arena<dyn Object>,
    blocks: Arena<dyn Any>,
    config: HeapConfig,
    fail_after: Option<usize>,
}

impl Heap {
    pub const fn new() -> Self {
        Self::with_config(HeapConfig::new())
    }

    pub const fn with_config(config: HeapConfig) -> Self {
        Heap {
            objects: Arena::new(),
            blocks: Arena::new(),
            config,
            fail_after: None,
        }
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Let `n` more allocations succeed, then fail the next one with `OutOfMemory`.
    ///
    /// The fail point fires once and is then cleared.
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after = Some(n);
    }

    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn live_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn reserve(&mut self, what: &str) -> Result<()> {
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                log::error!("no memory for {what}: injected allocation failure");
                return Err(Error::OutOfMemory);
            }
            Some(n) => self.fail_after = Some(n - 1),
            None => {}
        }

        if let Some(capacity) = self.config.capacity
            && self.live_objects() + self.live_blocks() >= capacity
        {
            log::error!("no memory for {what}: capacity of {capacity} allocations reached");
            return Err(Error::OutOfMemory);
        }

        Ok(())
    }

    /// Allocate a zero-state object of class `C`.
    pub fn allocate<C: Object + Default>(&mut self) -> Result<Handle<C>> {
        self.reserve(core::any::type_name::<C>())?;
        let key = self.objects.insert(Box::new(C::default()))?;
        let this = Handle::new(AllocId(key), 0);
        log::debug!("allocated {this:?}");
        Ok(this)
    }

    /// Release the allocation `this` roots.
    ///
    /// `this` must be the handle the allocation was created with; handles to embedded bases
    /// and stale handles are refused. Private blocks are not touched.
    pub fn free<C: Object>(&mut self, this: Handle<C>) -> bool {
        let is_root = this.offset == 0
            && self
                .objects
                .get(this.alloc.0)
                .is_some_and(|object| object.as_any().is::<C>());
        if !is_root {
            log::error!("invalid input, {this:?} is not a live allocation");
            return false;
        }

        self.objects.remove(this.alloc.0);
        log::debug!("freed {this:?}");
        true
    }

    /// True when `this` resolves
    pub fn contains<C: Object>(&self, this: Handle<C>) -> bool {
        self.resolve(this).is_some()
    }

    fn resolve<C: Object>(&self, this: Handle<C>) -> Option<&C> {
        self.objects
            .get(this.alloc.0)?
            .locate(this.offset, TypeId::of::<C>())?
            .downcast_ref::<C>()
    }

    pub fn get<C: Object>(&self, this: Handle<C>) -> Result<&C> {
        self.resolve(this).ok_or_else(|| {
            log::error!("invalid input, {this:?} does not resolve");
            Error::InvalidArgument
        })
    }

    pub fn get_mut<C: Object>(&mut self, this: Handle<C>) -> Result<&mut C> {
        let found = self
            .objects
            .get_mut(this.alloc.0)
            .and_then(|object| object.locate_mut(this.offset, TypeId::of::<C>()))
            .and_then(|any| any.downcast_mut::<C>());
        match found {
            Some(object) => Ok(object),
            None => {
                log::error!("invalid input, {this:?} does not resolve");
                Err(Error::InvalidArgument)
            }
        }
    }

    pub(crate) fn alloc_block<T: Any>(&mut self, value: T) -> Result<BlockId> {
        self.reserve(core::any::type_name::<T>())?;
        let id = BlockId(self.blocks.insert(Box::new(value))?);
        log::debug!("allocated block {id:?}");
        Ok(id)
    }

    pub(crate) fn block<T: Any>(&self, id: BlockId) -> Result<&T> {
        self.blocks
            .get(id.0)
            .and_then(|block| block.downcast_ref::<T>())
            .ok_or_else(|| {
                log::error!("invalid input, private block {id:?} does not resolve");
                Error::InvalidArgument
            })
    }

    pub(crate) fn block_mut<T: Any>(&mut self, id: BlockId) -> Result<&mut T> {
        match self.blocks.get_mut(id.0).and_then(|block| block.downcast_mut::<T>()) {
            Some(block) => Ok(block),
            None => {
                log::error!("invalid input, private block {id:?} does not resolve");
                Err(Error::InvalidArgument)
            }
        }
    }

    pub(crate) fn free_block(&mut self, id: BlockId) -> bool {
        let freed = self.blocks.remove(id.0).is_some();
        if freed {
            log::debug!("freed block {id:?}");
        }
        freed
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("live_objects", &self.live_objects())
            .field("live_blocks", &self.live_blocks())
            .field("config", &self.config)
            .finish()
    }
}
