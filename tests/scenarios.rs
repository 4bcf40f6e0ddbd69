use tagalloc::{AllocError, Arena, FreeSpaceManager, GrowError, ManagerConfig, MemArena};

/// Manager whose misses grow the arena by exactly the block they need.
fn exact_growth(capacity: usize) -> FreeSpaceManager {
  let config = ManagerConfig::new().with_chunk_size(0);
  FreeSpaceManager::initialize(MemArena::new(capacity), config).unwrap()
}

#[test]
fn test_first_fit_reuses_released_block() {
  let mut heap = FreeSpaceManager::with_capacity(1 << 16).unwrap();

  let p1 = heap.allocate(16).unwrap();
  let p2 = heap.allocate(16).unwrap();
  assert_ne!(p1, p2);

  heap.release(p1).unwrap();
  let len = heap.arena().len();
  let p3 = heap.allocate(8).unwrap();

  assert_eq!(p3, p1);
  assert_eq!(heap.arena().len(), len);
  heap.check_heap().unwrap();
}

#[test]
fn test_released_block_is_split_for_smaller_requests() {
  let mut heap = exact_growth(1 << 16);

  let p = heap.allocate(100).unwrap();
  let old_capacity = heap.payload_capacity(p).unwrap();
  heap.release(p).unwrap();
  let len = heap.arena().len();

  let a = heap.allocate(40).unwrap();
  let b = heap.allocate(40).unwrap();

  assert_eq!(a, p);
  assert!(b.offset() > a.offset());
  assert!(b.offset() + 40 <= p.offset() + old_capacity);
  assert_eq!(heap.arena().len(), len);
  heap.check_heap().unwrap();
}

#[test]
fn test_releasing_neighbors_merges_them() {
  let mut heap = exact_growth(1 << 16);

  let a = heap.allocate(32).unwrap();
  let b = heap.allocate(32).unwrap();
  assert_eq!(b.offset(), a.offset() + 48);

  heap.release(a).unwrap();
  heap.release(b).unwrap();

  let stats = heap.check_heap().unwrap();
  assert_eq!(stats.free_blocks, 1);
  assert_eq!(stats.free_bytes, 96);

  let len = heap.arena().len();
  let c = heap.allocate(56).unwrap();

  assert_eq!(c, a);
  assert_eq!(heap.arena().len(), len);
}

#[test]
fn test_releasing_middle_block_merges_three() {
  let mut heap = exact_growth(1 << 16);

  let a = heap.allocate(16).unwrap();
  let b = heap.allocate(16).unwrap();
  let c = heap.allocate(16).unwrap();
  let _d = heap.allocate(16).unwrap();

  heap.release(a).unwrap();
  heap.release(c).unwrap();
  assert_eq!(heap.check_heap().unwrap().free_blocks, 2);

  heap.release(b).unwrap();

  let stats = heap.check_heap().unwrap();
  assert_eq!(stats.free_blocks, 1);
  assert_eq!(stats.free_bytes, 96);
  assert_eq!(stats.allocated_blocks, 1);
}

#[test]
fn test_exhaustion_fails_cleanly() {
  let mut heap = exact_growth(1024);
  let mut live = Vec::new();

  let err = loop {
    match heap.allocate(64) {
      Ok(p) => {
        heap.payload_mut(p).unwrap().fill(live.len() as u8);
        live.push(p);
      }
      Err(e) => break e,
    }
  };

  // 32 byte sentinel + 12 blocks of 80 leaves 32 bytes.
  assert_eq!(live.len(), 12);
  assert_eq!(
    err,
    AllocError::OutOfMemory {
      requested: 80,
      cause: Some(GrowError::Exhausted {
        requested: 80,
        remaining: 32,
      }),
    }
  );
  assert_eq!(heap.arena().len(), 992);
  heap.check_heap().unwrap();

  for (i, &p) in live.iter().enumerate() {
    assert!(heap.payload(p).unwrap().iter().all(|&b| b == i as u8));
  }

  let victim = live.swap_remove(5);
  heap.release(victim).unwrap();
  let again = heap.allocate(64).unwrap();

  assert_eq!(again, victim);
  heap.check_heap().unwrap();
}

#[test]
fn test_resize_preserves_common_prefix() {
  let mut heap = FreeSpaceManager::with_capacity(1 << 16).unwrap();
  let p = heap.allocate(24).unwrap();
  for (i, byte) in heap.payload_mut(p).unwrap().iter_mut().enumerate() {
    *byte = i as u8 + 1;
  }

  let q = heap.resize(Some(p), 200).unwrap().unwrap();

  let expected: Vec<u8> = (1..=24).collect();
  assert_eq!(&heap.payload(q).unwrap()[..24], &expected[..]);
  assert!(heap.payload_capacity(q).unwrap() >= 200);
  assert!(heap.payload(p).is_err());
  heap.check_heap().unwrap();
}

#[test]
fn test_failed_resize_keeps_original() {
  let mut heap = exact_growth(256);
  let p = heap.allocate(16).unwrap();
  heap.payload_mut(p).unwrap().fill(0x5A);

  let err = heap.resize(Some(p), 4096).unwrap_err();

  assert!(matches!(err, AllocError::OutOfMemory { .. }));
  assert!(heap.payload(p).unwrap().iter().all(|&b| b == 0x5A));
  assert_eq!(heap.check_heap().unwrap().allocated_blocks, 1);
}

#[test]
fn test_resize_edge_cases() {
  let mut heap = FreeSpaceManager::with_capacity(1 << 16).unwrap();

  let p = heap.resize(None, 10).unwrap().unwrap();
  assert!(heap.payload_capacity(p).unwrap() >= 10);

  assert_eq!(heap.resize(Some(p), 0).unwrap(), None);
  assert_eq!(heap.check_heap().unwrap().allocated_blocks, 0);

  assert!(matches!(
    heap.resize(None, 0),
    Err(AllocError::InvalidRequest { .. })
  ));
}

#[test]
fn test_zero_size_allocation_is_invalid() {
  let mut heap = FreeSpaceManager::with_capacity(1 << 16).unwrap();

  assert!(matches!(
    heap.allocate(0),
    Err(AllocError::InvalidRequest { .. })
  ));
  assert_eq!(heap.arena().len(), 32);
}

#[test]
fn test_managers_are_independent() {
  let mut first = FreeSpaceManager::with_capacity(1 << 16).unwrap();
  let mut second = FreeSpaceManager::with_capacity(1 << 16).unwrap();

  let a = first.allocate(16).unwrap();
  let b = second.allocate(16).unwrap();
  first.payload_mut(a).unwrap().fill(1);
  second.payload_mut(b).unwrap().fill(2);

  // Same offsets, different arenas.
  assert_eq!(a, b);
  assert!(first.payload(a).unwrap().iter().all(|&x| x == 1));
  assert!(second.payload(b).unwrap().iter().all(|&x| x == 2));

  first.release(a).unwrap();
  assert!(second.payload(b).is_ok());
}
