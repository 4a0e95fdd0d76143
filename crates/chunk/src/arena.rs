//! Fixed-capacity pool of chunk slots.
//!
//! The arena pre-allocates every slot (a header plus a buffer) when it is
//! created. [`ChunkArena::allocate`] pops a slot off the free list and
//! leases it out as an [`ArenaSlot`]; dropping the slot, or the [`Chunk`]
//! built on it, zeroes the storage and pushes it back. Only the push and pop
//! run under the lock.

use crate::chunk::{Chunk, ChunkHeader, CHUNK_HEADER_SIZE};
use crate::meas::SeriesId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Default memory budget of an arena (64 MiB).
pub const DEFAULT_ARENA_BYTES: usize = 64 * 1024 * 1024;

/// Default chunk buffer size in bytes.
pub const DEFAULT_CHUNK_BUFFER_SIZE: usize = 512;

/// Arena sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Memory budget in bytes, headers included.
    pub max_bytes: usize,
    /// Size of each slot's buffer in bytes.
    pub buffer_size: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_ARENA_BYTES,
            buffer_size: DEFAULT_CHUNK_BUFFER_SIZE,
        }
    }
}

impl ArenaConfig {
    /// Creates a config with the given budget and buffer size.
    pub fn new(max_bytes: usize, buffer_size: usize) -> Self {
        Self {
            max_bytes,
            buffer_size,
        }
    }

    /// Number of slots that fit in the budget.
    pub fn slot_count(&self) -> usize {
        self.max_bytes / (CHUNK_HEADER_SIZE + self.buffer_size)
    }
}

struct FreeSlot {
    index: usize,
    header: ChunkHeader,
    buffer: Box<[u8]>,
}

struct Shared {
    free: Mutex<Vec<FreeSlot>>,
    capacity: usize,
    buffer_size: usize,
}

impl Shared {
    fn release(&self, mut slot: FreeSlot) {
        slot.header = ChunkHeader::zeroed();
        slot.buffer.fill(0);
        trace!("Arena slot {} freed", slot.index);
        self.free.lock().push(slot);
    }
}

/// A pool of fixed-size chunk slots shared by clones of the arena.
#[derive(Clone)]
pub struct ChunkArena {
    shared: Arc<Shared>,
}

impl ChunkArena {
    /// Creates an arena and allocates all of its slots.
    pub fn new(config: ArenaConfig) -> Self {
        let capacity = config.slot_count();
        // popped from the back, so slot 0 is handed out first
        let free = (0..capacity)
            .rev()
            .map(|index| FreeSlot {
                index,
                header: ChunkHeader::zeroed(),
                buffer: vec![0u8; config.buffer_size].into_boxed_slice(),
            })
            .collect();

        debug!(
            "Created chunk arena with {} slots of {} bytes",
            capacity, config.buffer_size
        );

        Self {
            shared: Arc::new(Shared {
                free: Mutex::new(free),
                capacity,
                buffer_size: config.buffer_size,
            }),
        }
    }

    /// Leases a zeroed slot, or returns `None` when every slot is in use.
    pub fn allocate(&self) -> Option<ArenaSlot> {
        let Some(slot) = self.shared.free.lock().pop() else {
            debug!("Chunk arena exhausted: {} slots in use", self.shared.capacity);
            return None;
        };
        trace!("Arena slot {} allocated", slot.index);

        Some(ArenaSlot {
            index: slot.index,
            header: slot.header,
            buffer: slot.buffer,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Leases a slot and builds an empty chunk for `id` in it.
    pub fn allocate_chunk(&self, id: SeriesId) -> Option<Chunk> {
        self.allocate().map(|slot| Chunk::with_slot(id, slot))
    }

    /// Returns a slot to the arena it was leased from.
    ///
    /// Same as dropping it.
    pub fn free(&self, slot: ArenaSlot) {
        drop(slot);
    }

    /// Discards a chunk; its slot, if it has one, goes back to the free list.
    pub fn free_chunk(&self, chunk: Chunk) {
        drop(chunk);
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of slots currently leased.
    pub fn allocated(&self) -> usize {
        self.shared.capacity - self.available()
    }

    /// Number of slots on the free list.
    pub fn available(&self) -> usize {
        self.shared.free.lock().len()
    }

    /// Size of each slot's buffer in bytes.
    pub fn buffer_size(&self) -> usize {
        self.shared.buffer_size
    }
}

impl fmt::Debug for ChunkArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkArena")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("buffer_size", &self.buffer_size())
            .finish()
    }
}

/// A slot leased from a [`ChunkArena`].
///
/// The slot is zeroed and returned to the free list when dropped.
pub struct ArenaSlot {
    index: usize,
    header: ChunkHeader,
    buffer: Box<[u8]>,
    shared: Arc<Shared>,
}

impl ArenaSlot {
    /// Index of the slot within its arena.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Header storage of the slot.
    pub fn header(&self) -> &ChunkHeader {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut ChunkHeader {
        &mut self.header
    }

    /// Buffer storage of the slot.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }
}

impl AsRef<[u8]> for ArenaSlot {
    fn as_ref(&self) -> &[u8] {
        &self.buffer
    }
}

impl AsMut<[u8]> for ArenaSlot {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

impl Drop for ArenaSlot {
    fn drop(&mut self) {
        self.shared.release(FreeSlot {
            index: self.index,
            header: self.header,
            buffer: std::mem::take(&mut self.buffer),
        });
    }
}

impl fmt::Debug for ArenaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaSlot")
            .field("index", &self.index)
            .field("buffer_size", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meas::Sample;

    fn small_arena(slots: usize) -> ChunkArena {
        ChunkArena::new(ArenaConfig::new(slots * (CHUNK_HEADER_SIZE + 32), 32))
    }

    #[test]
    fn test_slot_count() {
        let config = ArenaConfig::default();
        assert_eq!(config.slot_count(), DEFAULT_ARENA_BYTES / (CHUNK_HEADER_SIZE + 512));
        assert_eq!(ArenaConfig::new(100, 32).slot_count(), 0);
    }

    #[test]
    fn test_allocate_until_exhausted() {
        let arena = small_arena(3);
        assert_eq!(arena.capacity(), 3);

        let slots: Vec<_> = (0..3).map(|_| arena.allocate().unwrap()).collect();
        assert_eq!(arena.allocated(), 3);
        assert_eq!(arena.available(), 0);
        assert!(arena.allocate().is_none());

        let mut indices: Vec<_> = slots.iter().map(ArenaSlot::index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);

        drop(slots);
        assert_eq!(arena.available(), 3);
    }

    #[test]
    fn test_free_returns_zeroed_slot() {
        let arena = small_arena(1);

        let mut chunk = arena.allocate_chunk(4).unwrap();
        assert!(chunk.is_arena_backed());
        chunk.append(&Sample::new(4, 10, 1.0, 1)).unwrap();
        chunk.append(&Sample::new(4, 20, 2.0, 1)).unwrap();
        assert!(chunk.raw_buffer().iter().any(|&b| b != 0));
        drop(chunk);

        let slot = arena.allocate().unwrap();
        assert_eq!(slot.header(), &ChunkHeader::zeroed());
        assert!(slot.buffer().iter().all(|&b| b == 0));
        assert_eq!(slot.buffer().len(), 32);
    }

    #[test]
    fn test_explicit_free() {
        let arena = small_arena(2);
        let slot = arena.allocate().unwrap();
        assert_eq!(arena.allocated(), 1);
        arena.free(slot);
        assert_eq!(arena.allocated(), 0);
    }

    #[test]
    fn test_clones_share_slots() {
        let arena = small_arena(2);
        let other = arena.clone();
        let _a = arena.allocate().unwrap();
        let _b = other.allocate().unwrap();
        assert!(arena.allocate().is_none());
        assert_eq!(other.allocated(), 2);
    }

    #[test]
    fn test_concurrent_allocate_free() {
        let arena = small_arena(8);

        std::thread::scope(|s| {
            for t in 0..4u64 {
                let arena = arena.clone();
                s.spawn(move || {
                    for i in 0..200u64 {
                        if let Some(mut chunk) = arena.allocate_chunk(t) {
                            chunk.append(&Sample::new(t, i, i as f64, 0)).unwrap();
                            assert_eq!(chunk.count(), 1);
                        }
                    }
                });
            }
        });

        assert_eq!(arena.available(), 8);
    }
}
