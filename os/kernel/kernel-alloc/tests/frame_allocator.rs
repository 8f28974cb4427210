use kernel_alloc::frame_alloc::FrameAllocator;
use kernel_alloc::phys_mapper::{DirectMapPhysMapper, FrameBytes, PhysMapper};
use kernel_alloc::ram::BootRam;
use kernel_alloc::{FrameAlloc, FrameAllocError};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, VirtualAddress};
use kernel_sync::SoftInterrupts;
use proptest::prelude::*;

const RAM_BASE: PhysicalAddress = PhysicalAddress::new(0x0010_0000);

#[repr(C, align(4096))]
struct Frame(FrameBytes);

type Alloc = FrameAllocator<BootRam, DirectMapPhysMapper, SoftInterrupts>;

/// An allocator over `frames` frames of leaked host memory posing as RAM.
fn machine(frames: u32) -> Alloc {
    let ram: &'static mut [Frame] = Vec::leak(
        (0..frames)
            .map(|_| Frame([0xA5; PAGE_SIZE as usize]))
            .collect(),
    );
    let mapper = DirectMapPhysMapper::for_host_buffer(RAM_BASE, ram.as_mut_ptr().cast());
    let ram = BootRam::new(RAM_BASE, RAM_BASE.add_frames(frames));
    unsafe { FrameAllocator::new(ram, mapper, SoftInterrupts::new()) }
}

#[test]
fn steals_before_bootstrap() {
    let alloc = machine(8);
    assert!(!alloc.is_ready());
    assert_eq!(alloc.stats(), None);

    assert_eq!(alloc.alloc_frames(1), Some(RAM_BASE));
    assert_eq!(alloc.alloc_frames(2), Some(RAM_BASE.add_frames(1)));
    assert_eq!(
        alloc.free_frames(RAM_BASE),
        Err(FrameAllocError::NotBootstrapped)
    );

    // The pool starts after the stolen frames and one metadata frame.
    let stats = alloc.bootstrap().unwrap();
    assert_eq!(stats.base, RAM_BASE.add_frames(4));
    assert_eq!(stats.total, 4);
    assert_eq!(stats.free, 4);
    assert!(alloc.is_ready());
}

#[test]
fn bootstrap_happens_once() {
    let alloc = machine(8);
    alloc.bootstrap().unwrap();
    let run = alloc.alloc_frames(2).unwrap();
    assert_eq!(alloc.bootstrap(), Err(FrameAllocError::AlreadyBootstrapped));
    // The existing pool survives the rejected call.
    assert_eq!(alloc.free_frames(run), Ok(2));
}

#[test]
fn bootstrap_without_ram_fails() {
    let alloc = machine(2);
    alloc.alloc_frames(1).unwrap();
    assert_eq!(alloc.bootstrap(), Err(FrameAllocError::InsufficientRam));
    assert!(!alloc.is_ready());
    // The failed attempt claimed nothing; the last frame can still be stolen.
    assert_eq!(alloc.alloc_frames(1), Some(RAM_BASE.add_frames(1)));
    assert_eq!(alloc.alloc_frames(1), None);
}

#[test]
fn allocator_lock_is_taken_with_interrupts_raised() {
    let alloc = machine(16);
    let stolen = alloc.alloc_frames(1).unwrap();
    assert_eq!(alloc.irq().raise_count(), 1);

    alloc.bootstrap().unwrap();
    let run = alloc.alloc_frames(2).unwrap();
    alloc.free_frames(run).unwrap();
    assert_eq!(alloc.free_frames(stolen), Err(FrameAllocError::OutOfRange(stolen)));
    assert_eq!(alloc.irq().raise_count(), 5);
    assert!(alloc.irq().enabled());

    // Interrupts stay off for as long as the lock is held.
    let enabled_inside = alloc.with_coremap(|_| alloc.irq().enabled());
    assert_eq!(enabled_inside, Some(false));
    assert!(alloc.irq().enabled());
}

#[test]
fn tag_array_starts_zeroed() {
    let alloc = machine(16);
    alloc.bootstrap().unwrap();
    let tags_clear = alloc.with_coremap(|map| map.tags().iter().all(|&t| t == 0));
    assert_eq!(tags_clear, Some(true));
}

#[test]
fn run_accounting_follows_outstanding_runs() {
    let alloc = machine(32);
    let base = alloc.bootstrap().unwrap().base;

    let a = alloc.alloc_frames(3).unwrap();
    let b = alloc.alloc_frames(1).unwrap();
    let c = alloc.alloc_frames(4).unwrap();
    assert_eq!((a, b, c), (base, base.add_frames(3), base.add_frames(4)));

    alloc.free_frames(b).unwrap();
    let tags = alloc.with_coremap(|map| map.tags()[..8].to_vec()).unwrap();
    assert_eq!(tags, [1, 2, 3, 0, 1, 2, 3, 4]);

    // First fit: the one-frame hole is reused before the tail.
    assert_eq!(alloc.alloc_frames(1), Some(b));
    // Nothing of length 2 fits below c, so it lands after it.
    assert_eq!(alloc.alloc_frames(2), Some(base.add_frames(8)));

    let outstanding = 3 + 1 + 4 + 2;
    let stats = alloc.stats().unwrap();
    assert_eq!(stats.total - stats.free, outstanding);
}

#[test]
fn release_leaves_neighbours_alone() {
    let alloc = machine(16);
    let base = alloc.bootstrap().unwrap().base;
    let total = alloc.stats().unwrap().total;

    let left = alloc.alloc_frames(1).unwrap();
    let mid = alloc.alloc_frames(2).unwrap();
    let right = alloc.alloc_frames(total - 3).unwrap();
    assert_eq!(alloc.stats().unwrap().free, 0);
    assert_eq!(alloc.alloc_frames(1), None);

    assert_eq!(alloc.free_frames(mid), Ok(2));
    let tags = alloc.with_coremap(|map| map.tags()[..4].to_vec()).unwrap();
    assert_eq!(tags, [1, 0, 0, 1]);

    assert_eq!(alloc.free_frames(left), Ok(1));
    // The last run ends on the pool's last frame.
    assert_eq!(alloc.free_frames(right), Ok(total - 3));
    assert_eq!(alloc.stats().unwrap().free, total);
    assert_eq!(alloc.alloc_frames(total), Some(base));
}

#[test]
fn invalid_release_is_rejected() {
    let alloc = machine(8);
    let base = alloc.bootstrap().unwrap().base;
    let run = alloc.alloc_frames(2).unwrap();

    assert_eq!(
        alloc.free_frames(run.add_frames(1)),
        Err(FrameAllocError::NotRunStart(run.add_frames(1)))
    );
    assert_eq!(
        alloc.free_frames(RAM_BASE),
        Err(FrameAllocError::OutOfRange(RAM_BASE))
    );
    assert_eq!(
        alloc.free_frames(base + 4),
        Err(FrameAllocError::Unaligned(base + 4))
    );
    assert_eq!(alloc.free_frames(run), Ok(2));
    assert_eq!(
        alloc.free_frames(run),
        Err(FrameAllocError::NotRunStart(run))
    );
}

#[test]
fn kpages_are_kseg0_addresses() {
    let alloc = machine(8);
    let base = alloc.bootstrap().unwrap().base;

    let kva = alloc.alloc_kpages(2).unwrap();
    assert_eq!(kva, VirtualAddress::new(0x8000_0000 + base.as_u32()));
    assert_eq!(alloc.free_kpages(kva), Ok(2));

    let user = VirtualAddress::new(0x0040_0000);
    assert!(matches!(
        alloc.free_kpages(user),
        Err(FrameAllocError::OutOfRange(_))
    ));
}

#[test]
fn frames_are_reachable_through_the_mapper() {
    let alloc = machine(8);
    alloc.bootstrap().unwrap();
    let pa = alloc.alloc_frames(1).unwrap();

    unsafe { alloc.mapper().zero_frame(pa) };
    let frame: &mut FrameBytes = unsafe { alloc.mapper().phys_to_mut(pa) };
    assert!(frame.iter().all(|&b| b == 0));
}

#[test]
fn concurrent_callers_get_disjoint_runs() {
    let alloc = machine(128);
    alloc.bootstrap().unwrap();

    let mut runs: Vec<PhysicalAddress> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    (0..10)
                        .map(|_| alloc.alloc_frames(2).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
    });

    runs.sort();
    runs.dedup();
    assert_eq!(runs.len(), 40);
    for pair in runs.windows(2) {
        assert!(pair[1].as_u32() - pair[0].as_u32() >= 2 * PAGE_SIZE);
    }
    for run in runs {
        assert_eq!(alloc.free_frames(run), Ok(2));
    }
}

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    /// Release the outstanding run at this index, modulo the run count.
    Free(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1usize..6).prop_map(Op::Alloc),
        any::<usize>().prop_map(Op::Free),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tags_track_outstanding_runs(ops in prop::collection::vec(arb_op(), 1..64)) {
        let alloc = machine(40);
        let stats = alloc.bootstrap().unwrap();
        let mut runs: Vec<(PhysicalAddress, usize)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(n) => {
                    if let Some(pa) = alloc.alloc_frames(n) {
                        runs.push((pa, n));
                    }
                }
                Op::Free(i) if !runs.is_empty() => {
                    let (pa, n) = runs.swap_remove(i % runs.len());
                    prop_assert_eq!(alloc.free_frames(pa), Ok(n));
                }
                Op::Free(_) => {}
            }

            let mut expected = vec![0_u32; stats.total];
            for &(pa, n) in &runs {
                let start = ((pa.as_u32() - stats.base.as_u32()) / PAGE_SIZE) as usize;
                for (k, tag) in expected[start..start + n].iter_mut().enumerate() {
                    prop_assert_eq!(*tag, 0, "runs overlap at frame {}", start + k);
                    *tag = u32::try_from(k + 1).unwrap();
                }
            }
            let tags = alloc.with_coremap(|map| map.tags().to_vec()).unwrap();
            prop_assert_eq!(tags, expected);

            let used: usize = runs.iter().map(|&(_, n)| n).sum();
            prop_assert_eq!(alloc.stats().unwrap().free, stats.total - used);
        }
    }
}
