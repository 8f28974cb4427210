//! # Coremap
//!
//! One `u32` tag per managed frame:
//!
//! * `0` means the frame is free.
//! * `k >= 1` means the frame is the k-th frame of an allocated run.
//!
//! A run of length `L` starting at index `s` is therefore tagged `1, 2, ..., L`
//! and carries no separate length field. Releasing a run clears its first tag
//! and keeps clearing while the next tag is neither `0` (free) nor `1` (the
//! start of the following run). Two runs may abut; the `1` of the second one
//! stops the walk.
//!
//! ```text
//!  index:  0   1   2   3   4   5   6   7
//!  tags:  [1] [2] [3] [1] [0] [0] [1] [2]
//!          └─ run A ─┘ └B┘         └ C ┘
//! ```
//!
//! The tag array itself lives in the lowest frames of the probed RAM range.
//! Those frames are reserved before the pool is handed out, so they can never
//! be allocated over.

use crate::FrameAllocError;
use crate::phys_mapper::PhysMapper;
use core::fmt;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, align_down, align_up};

/// Tags that fit in one metadata frame.
const TAGS_PER_FRAME: u32 = PAGE_SIZE / (u32::BITS / 8);

/// First-fit run allocator over a contiguous pool of frames.
pub struct Coremap<'a> {
    /// Physical address of pool frame 0.
    base: PhysicalAddress,
    tags: &'a mut [u32],
}

impl<'a> Coremap<'a> {
    /// Build a coremap over the RAM range `[first, last)`.
    ///
    /// The range is trimmed to whole frames. Enough frames to hold one tag per
    /// remaining frame are reserved at the bottom and zeroed; the pool starts
    /// right after them.
    ///
    /// # Errors
    /// [`FrameAllocError::InsufficientRam`] if no frame is left for the pool.
    ///
    /// # Safety
    /// - `mapper` must map every frame in `[first, last)`.
    /// - Nothing else may use that range for `'a`.
    pub unsafe fn new_in<M: PhysMapper>(
        mapper: &M,
        first: PhysicalAddress,
        last: PhysicalAddress,
    ) -> Result<Self, FrameAllocError> {
        let start = align_up(first.as_u32(), PAGE_SIZE);
        let end = align_down(last.as_u32(), PAGE_SIZE);
        if end <= start {
            return Err(FrameAllocError::InsufficientRam);
        }

        let total = (end - start) / PAGE_SIZE;
        // m metadata frames hold m * TAGS_PER_FRAME tags for total - m frames.
        let meta = total.div_ceil(TAGS_PER_FRAME + 1);
        let frames = total - meta;
        if frames == 0 {
            return Err(FrameAllocError::InsufficientRam);
        }

        let first = PhysicalAddress::new(start);
        for i in 0..meta {
            unsafe { mapper.zero_frame(first.add_frames(i)) };
        }
        let tags = unsafe {
            core::slice::from_raw_parts_mut(
                mapper.phys_to_ptr(first).cast::<u32>(),
                frames as usize,
            )
        };

        Ok(Self {
            base: first.add_frames(meta),
            tags,
        })
    }

    /// Wrap an existing tag array for the pool starting at `base`.
    ///
    /// # Panics
    /// If `base` is not page aligned.
    pub fn from_parts(base: PhysicalAddress, tags: &'a mut [u32]) -> Self {
        assert!(base.is_page_aligned(), "coremap base {base} is not page aligned");
        Self { base, tags }
    }

    /// Physical address of pool frame 0.
    #[must_use]
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// Number of frames in the pool.
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.tags.len()
    }

    /// Number of frames currently free.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.tags.iter().filter(|&&t| t == 0).count()
    }

    /// The raw tag array.
    #[must_use]
    pub fn tags(&self) -> &[u32] {
        self.tags
    }

    /// Whether `pa` lies inside the pool.
    #[must_use]
    pub fn contains(&self, pa: PhysicalAddress) -> bool {
        self.index_of(pa).is_some()
    }

    /// Allocate `npages` contiguous frames, lowest address first.
    ///
    /// Returns `None` for `npages == 0` or when no free run is long enough.
    pub fn alloc(&mut self, npages: usize) -> Option<PhysicalAddress> {
        if npages == 0 {
            return None;
        }
        let start = self.find_free_run(npages)?;
        for (tag, k) in self.tags[start..start + npages].iter_mut().zip(1u32..) {
            *tag = k;
        }
        Some(self.frame_addr(start))
    }

    /// Release the run starting at `pa` and return its length.
    ///
    /// # Errors
    /// - [`FrameAllocError::Unaligned`] if `pa` is not page aligned.
    /// - [`FrameAllocError::OutOfRange`] if `pa` is outside the pool.
    /// - [`FrameAllocError::NotRunStart`] if the frame is free or in the
    ///   middle of a run.
    ///
    /// Nothing changes when an error is returned.
    pub fn release(&mut self, pa: PhysicalAddress) -> Result<usize, FrameAllocError> {
        if !pa.is_page_aligned() {
            return Err(FrameAllocError::Unaligned(pa));
        }
        let start = self.index_of(pa).ok_or(FrameAllocError::OutOfRange(pa))?;
        if self.tags[start] != 1 {
            return Err(FrameAllocError::NotRunStart(pa));
        }

        self.tags[start] = 0;
        let mut len = 1;
        for tag in &mut self.tags[start + 1..] {
            if *tag == 0 || *tag == 1 {
                break;
            }
            len += 1;
            debug_assert_eq!(*tag as usize, len, "coremap run at {pa} is not ascending");
            *tag = 0;
        }
        Ok(len)
    }

    /// Index of the first run of `npages` free frames.
    fn find_free_run(&self, npages: usize) -> Option<usize> {
        let mut run = 0;
        for (i, &tag) in self.tags.iter().enumerate() {
            if tag == 0 {
                run += 1;
                if run == npages {
                    return Some(i + 1 - npages);
                }
            } else {
                run = 0;
            }
        }
        None
    }

    fn index_of(&self, pa: PhysicalAddress) -> Option<usize> {
        let offset = pa.as_u32().checked_sub(self.base.as_u32())?;
        let index = (offset / PAGE_SIZE) as usize;
        (index < self.tags.len()).then_some(index)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn frame_addr(&self, index: usize) -> PhysicalAddress {
        // index < frame_count, and frame_count came from a u32.
        self.base.add_frames(index as u32)
    }
}

impl fmt::Debug for Coremap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coremap")
            .field("base", &self.base)
            .field("frames", &self.frame_count())
            .field("free", &self.free_count())
            .finish_non_exhaustive()
    }
}
