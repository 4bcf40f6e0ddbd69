use std::io::Read;

use tagalloc::{Arena, FreeSpaceManager, ManagerConfig, Payload, SbrkArena, sbrk::program_break};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break next to the arena's bounds.
fn print_program_break(
  label: &str,
  heap: &FreeSpaceManager<SbrkArena>,
) {
  println!(
    "[{}] PID = {}, program break = {:#x}, arena = {:#x}..{:#x}",
    label,
    std::process::id(),
    program_break(),
    heap.arena().low_bound(),
    heap.arena().high_bound(),
  );
}

fn print_alloc(
  heap: &FreeSpaceManager<SbrkArena>,
  size: usize,
  payload: Payload,
) {
  println!(
    "Allocated {} bytes at {}, address = {:#x}, usable = {:?}",
    size,
    payload,
    heap.arena().low_bound() + payload.offset(),
    heap.payload_capacity(payload),
  );
}

/// Prints every block in address order and the heap's utilization.
fn print_heap(heap: &FreeSpaceManager<SbrkArena>) {
  for info in heap.blocks() {
    match info {
      Ok(info) => println!(
        "  {} block at {}, size {}",
        if info.allocated { "allocated" } else { "free" },
        info.block,
        info.size
      ),
      Err(e) => println!("  {e}"),
    }
  }
  match heap.check_heap() {
    Ok(stats) => println!("  utilization = {:.1}%", stats.utilization() * 100.0),
    Err(e) => println!("  {e}"),
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let arena = SbrkArena::with_limit(1 << 20)?;
  let mut heap = FreeSpaceManager::initialize(arena, ManagerConfig::default())?;

  print_program_break("start", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate space for a u32. The first request always grows the
  //    arena, by one 4 KiB chunk.
  // --------------------------------------------------------------------
  let first = heap.allocate(4)?;
  println!("\n[1] Allocate u32");
  print_alloc(&heap, 4, first);
  heap.payload_mut(first)?[..4].copy_from_slice(&0xDEADBEEFu32.to_ne_bytes());
  print_program_break("after first alloc", &heap);
  print_heap(&heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Allocate 12 bytes. It is carved from the free remainder of the
  //    chunk, right after the first block.
  // --------------------------------------------------------------------
  let second = heap.allocate(12)?;
  println!("\n[2] Allocate [u8; 12]");
  print_alloc(&heap, 12, second);
  heap.payload_mut(second)?.fill(0xAB);
  print_heap(&heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Release the first block, then ask for 2 bytes. First fit hands the
  //    released block straight back.
  // --------------------------------------------------------------------
  heap.release(first)?;
  println!("\n[3] Released {first}");
  let third = heap.allocate(2)?;
  print_alloc(&heap, 2, third);
  println!(
    "[3] third == first? {}",
    if third == first {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Resize the 12 byte block to 64 KiB. The contents move with it and
  //    the arena grows by exactly what the block needs.
  // --------------------------------------------------------------------
  print_program_break("before large resize", &heap);
  let Some(big) = heap.resize(Some(second), 64 * 1024)? else {
    return Ok(());
  };
  println!("\n[4] Resize to 64 KiB");
  print_alloc(&heap, 64 * 1024, big);
  println!("[4] first byte still 0x{:X}", heap.payload(big)?[0]);
  print_program_break("after large resize", &heap);

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Release everything. Neighbors merge back into one free block, but
  //    the program break stays where it is.
  // --------------------------------------------------------------------
  heap.release(third)?;
  heap.release(big)?;
  println!("\n[5] Released everything");
  print_heap(&heap);
  print_program_break("end", &heap);

  println!("\n[6] End of example. Process will exit and the OS will reclaim all memory.");
  Ok(())
}
