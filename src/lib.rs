//! # tagalloc - A Boundary-Tag Free-List Allocator
//!
//! This crate provides a general purpose **first-fit allocator** that manages
//! a single contiguous, growable byte arena. It offers the classic
//! `malloc`/`free`/`realloc` triad as `allocate`/`release`/`resize`, keeping
//! all of its bookkeeping inside the arena itself.
//!
//! ## Overview
//!
//! Every block carries a boundary tag at both ends. Free blocks are also
//! threaded onto a circular free list through their (otherwise unused)
//! payload bytes:
//!
//! ```text
//!   Heap Layout:
//!
//!   low bound                                                    high bound
//!   ┌──────────┬─────────────┬──────────────────┬─────────┬──────────────┐
//!   │ sentinel │ allocated A │      free B      │ alloc C │    free D    │
//!   │  32 | 1  │             │                  │         │              │
//!   └──────────┴─────────────┴──────────────────┴─────────┴──────────────┘
//!        │                      ▲                             ▲
//!        │      free list       │                             │
//!        └──────────────────────┴─────────────────────────────┘
//!                  (ring, most recently freed first)
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── arena      - Arena trait and the heap-reserved MemArena
//!   ├── sbrk       - SbrkArena, grown with sbrk(2)
//!   ├── block      - Block/Payload handles and boundary tags
//!   ├── raw        - Bounds-checked metadata word access (internal)
//!   ├── free_list  - The free-list ring (internal)
//!   ├── manager    - FreeSpaceManager: allocate, release, resize
//!   ├── check      - Heap walk and consistency checker
//!   ├── config     - ManagerConfig
//!   └── error      - AllocError, GrowError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{FreeSpaceManager, ManagerConfig, MemArena};
//!
//! let arena = MemArena::new(1 << 20);
//! let mut heap = FreeSpaceManager::initialize(arena, ManagerConfig::default())?;
//!
//! // Allocate 16 bytes and use them.
//! let p = heap.allocate(16)?;
//! heap.payload_mut(p)?.copy_from_slice(b"boundary tags!!!");
//!
//! // Grow it; the contents move along.
//! let p = heap.resize(Some(p), 64)?.expect("non-zero resize");
//! assert_eq!(&heap.payload(p)?[..16], b"boundary tags!!!");
//!
//! heap.release(p)?;
//! heap.check_heap()?;
//! # Ok::<(), tagalloc::AllocError>(())
//! ```
//!
//! ## How It Works
//!
//! * **Allocation** rounds the request up to an 8-byte multiple plus 16 bytes
//!   of tags, walks the free list and takes the *first* block that is large
//!   enough. Leftovers of at least 32 bytes are split off as a new free block.
//! * **Misses** grow the arena by at least [`ManagerConfig::chunk_size`]. The
//!   new bytes are merged with a free block at the old top of the arena.
//! * **Release** clears the allocated bit and merges the block with free
//!   neighbors on either side. The left neighbor is found through its footer,
//!   which sits right before the block's header:
//!
//! ```text
//!   ┌─────┬────────────┬─────┐┌─────┬────────────┬─────┐
//!   │ hdr │  previous  │ ftr ││ hdr │   block    │ ftr │
//!   └─────┴────────────┴─────┘└─────┴────────────┴─────┘
//!                         ▲     ▲
//!                         │     └─ block offset
//!                         └─ block offset - 8: previous block's size
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: wrap the whole manager in one lock to share it
//! - **Grow-only**: the arena never shrinks and memory is never returned
//! - **First fit over one list**: O(free blocks) placement, no size classes
//!
//! ## Safety
//!
//! The manager itself is safe code working on byte offsets. The only
//! `unsafe` lives in the arena backends, which turn their reserved memory
//! into byte slices.

pub mod align;
pub mod arena;
pub mod block;
pub mod check;
pub mod config;
pub mod error;
mod free_list;
pub mod manager;
mod raw;
pub mod sbrk;

pub use arena::{Arena, MemArena};
pub use block::{Block, Payload};
pub use check::{BlockInfo, HeapStats};
pub use config::ManagerConfig;
pub use error::{AllocError, GrowError};
pub use manager::FreeSpaceManager;
pub use sbrk::SbrkArena;
