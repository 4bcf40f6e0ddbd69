use proptest::prelude::*;

use tagalloc::{AllocError, Arena, FreeSpaceManager, ManagerConfig, MemArena, Payload};

#[derive(Clone, Debug)]
enum Op {
  Allocate(usize),
  Release(usize),
  Resize(usize, usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
  prop_oneof![
    3 => (1usize..300).prop_map(Op::Allocate),
    2 => any::<usize>().prop_map(Op::Release),
    1 => (any::<usize>(), 0usize..400).prop_map(|(i, size)| Op::Resize(i, size)),
  ]
}

fn arb_chunk() -> impl Strategy<Value = usize> {
  prop_oneof![Just(0), Just(64), Just(100), Just(4096)]
}

/// A live allocation and the byte it was filled with.
struct Live {
  payload: Payload,
  len: usize,
  fill: u8,
}

fn fill(
  heap: &mut FreeSpaceManager,
  live: &Live,
) {
  heap.payload_mut(live.payload).unwrap()[..live.len].fill(live.fill);
}

fn assert_invariants(
  heap: &FreeSpaceManager,
  live: &[Live],
) -> Result<(), TestCaseError> {
  let stats = heap.check_heap();
  prop_assert!(stats.is_ok(), "{:?}", stats);
  let stats = stats.unwrap();

  // Conservation: every byte of the arena belongs to exactly one block.
  let walked: usize = heap.blocks().map(|info| info.unwrap().size).sum();
  prop_assert_eq!(walked, heap.arena().len());
  prop_assert_eq!(stats.allocated_blocks, live.len());

  let mut spans = Vec::new();
  for entry in live {
    let capacity = heap.payload_capacity(entry.payload).unwrap();
    prop_assert!(capacity >= entry.len);

    let bytes = &heap.payload(entry.payload).unwrap()[..entry.len];
    prop_assert!(bytes.iter().all(|&b| b == entry.fill));

    spans.push((entry.payload.offset(), entry.payload.offset() + capacity));
  }

  spans.sort_unstable();
  for pair in spans.windows(2) {
    prop_assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
  }

  Ok(())
}

proptest! {
  #[test]
  fn test_random_operations_keep_heap_consistent(
    chunk in arb_chunk(),
    ops in proptest::collection::vec(arb_op(), 1..80),
  ) {
    let config = ManagerConfig::new().with_chunk_size(chunk);
    let mut heap = FreeSpaceManager::initialize(MemArena::new(1 << 20), config).unwrap();
    let mut live: Vec<Live> = Vec::new();
    let mut next_fill = 1u8;

    for op in ops {
      match op {
        Op::Allocate(size) => {
          let payload = heap.allocate(size).unwrap();
          let entry = Live { payload, len: size, fill: next_fill };
          fill(&mut heap, &entry);
          live.push(entry);
        }
        Op::Release(i) if !live.is_empty() => {
          let entry = live.swap_remove(i % live.len());
          heap.release(entry.payload).unwrap();
        }
        Op::Resize(i, size) if !live.is_empty() => {
          let index = i % live.len();
          let old = &live[index];
          let kept = old.len.min(size);
          let old_fill = old.fill;

          match heap.resize(Some(old.payload), size).unwrap() {
            Some(payload) => {
              let prefix = &heap.payload(payload).unwrap()[..kept];
              prop_assert!(prefix.iter().all(|&b| b == old_fill));

              live[index] = Live { payload, len: size, fill: next_fill };
              fill(&mut heap, &live[index]);
            }
            None => {
              prop_assert_eq!(size, 0);
              live.swap_remove(index);
            }
          }
        }
        Op::Release(_) | Op::Resize(..) => {}
      }

      next_fill = next_fill.wrapping_add(1).max(1);
      assert_invariants(&heap, &live)?;
    }

    for entry in live.drain(..) {
      heap.release(entry.payload).unwrap();
    }
    let stats = heap.check_heap().unwrap();
    prop_assert_eq!(stats.allocated_blocks, 0);
    prop_assert!(stats.free_blocks <= 1);
  }

  #[test]
  fn test_allocation_meets_requested_size(size in 1usize..10_000) {
    let mut heap = FreeSpaceManager::with_capacity(1 << 16).unwrap();

    let payload = heap.allocate(size).unwrap();

    prop_assert!(heap.payload_capacity(payload).unwrap() >= size);
    prop_assert_eq!(payload.offset() % 8, 0);
  }

  #[test]
  fn test_exhausted_arena_stays_usable(
    sizes in proptest::collection::vec(1usize..200, 1..40),
  ) {
    let config = ManagerConfig::new().with_chunk_size(0);
    let mut heap = FreeSpaceManager::initialize(MemArena::new(2048), config).unwrap();
    let mut live = Vec::new();

    for size in sizes {
      match heap.allocate(size) {
        Ok(payload) => live.push((payload, size)),
        Err(AllocError::OutOfMemory { .. }) => {
          prop_assert!(heap.check_heap().is_ok());
          if let Some((payload, size)) = live.pop() {
            heap.release(payload).unwrap();
            let again = heap.allocate(size);
            prop_assert!(again.is_ok());
            live.push((again.unwrap(), size));
          }
        }
        Err(e) => return Err(TestCaseError::fail(e.to_string())),
      }
    }

    prop_assert!(heap.check_heap().is_ok());
  }
}
