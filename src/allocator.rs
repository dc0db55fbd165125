use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::contract::{Dimensions, FrameAllocator, VideoFormat};
use crate::error::AllocError;

pub const DEFAULT_ROW_ALIGNMENT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub offset: usize,
    pub stride: usize,
}

#[derive(Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
    planes: [PlaneLayout; VideoFormat::PLANE_COUNT],
    _lease: Option<CreditLease>,
}

impl FrameBuffer {
    pub fn from_parts(
        data: Vec<u8>,
        planes: [PlaneLayout; VideoFormat::PLANE_COUNT],
        rows: [usize; VideoFormat::PLANE_COUNT],
    ) -> Result<Self, AllocError> {
        for (index, (layout, rows)) in planes.iter().zip(rows).enumerate() {
            let end = layout
                .stride
                .checked_mul(rows)
                .and_then(|len| len.checked_add(layout.offset))
                .ok_or_else(|| AllocError::InvalidSize(format!("plane {index} overflows")))?;
            if end > data.len() {
                return Err(AllocError::InvalidSize(format!(
                    "plane {index} ends at {end}, buffer holds {}",
                    data.len()
                )));
            }
        }
        Ok(Self {
            data,
            planes,
            _lease: None,
        })
    }

    fn with_lease(mut self, lease: CreditLease) -> Self {
        self._lease = Some(lease);
        self
    }

    #[must_use]
    pub fn layout(&self, plane: usize) -> Option<PlaneLayout> {
        self.planes.get(plane).copied()
    }

    #[must_use]
    pub fn plane(&self, plane: usize, rows: usize) -> Option<&[u8]> {
        let layout = self.layout(plane)?;
        let len = layout.stride.checked_mul(rows)?;
        self.data.get(layout.offset..layout.offset.checked_add(len)?)
    }

    pub fn plane_mut(&mut self, plane: usize, rows: usize) -> Option<&mut [u8]> {
        let layout = self.layout(plane)?;
        let len = layout.stride.checked_mul(rows)?;
        let end = layout.offset.checked_add(len)?;
        self.data.get_mut(layout.offset..end)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HeapAllocator {
    row_alignment: usize,
}

impl HeapAllocator {
    #[must_use]
    pub fn new(row_alignment: usize) -> Self {
        Self {
            row_alignment: row_alignment.max(1),
        }
    }

    #[must_use]
    pub fn row_alignment(&self) -> usize {
        self.row_alignment
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_ALIGNMENT)
    }
}

impl FrameAllocator for HeapAllocator {
    fn allocate(&self, format: VideoFormat, dims: Dimensions) -> Result<FrameBuffer, AllocError> {
        if dims.width == 0 || dims.height == 0 {
            return Err(AllocError::InvalidSize(format!("cannot allocate {dims} frame")));
        }
        let mut planes = [PlaneLayout {
            offset: 0,
            stride: 0,
        }; VideoFormat::PLANE_COUNT];
        let mut rows = [0; VideoFormat::PLANE_COUNT];
        let mut total = 0usize;
        for (plane, layout) in planes.iter_mut().enumerate() {
            let stride = align_up(format.row_bytes(plane, dims), self.row_alignment)
                .ok_or_else(|| AllocError::InvalidSize(format!("stride overflow for {dims}")))?;
            rows[plane] = format.plane_rows(plane, dims);
            *layout = PlaneLayout {
                offset: total,
                stride,
            };
            total = stride
                .checked_mul(rows[plane])
                .and_then(|len| total.checked_add(len))
                .ok_or_else(|| AllocError::InvalidSize(format!("size overflow for {dims}")))?;
        }
        FrameBuffer::from_parts(vec![0_u8; total], planes, rows)
    }
}

fn align_up(value: usize, alignment: usize) -> Option<usize> {
    let rem = value % alignment;
    if rem == 0 {
        Some(value)
    } else {
        value.checked_add(alignment - rem)
    }
}

#[derive(Debug)]
pub struct InFlightCredits {
    capacity: usize,
    used: AtomicUsize,
}

impl InFlightCredits {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            used: AtomicUsize::new(0),
        }
    }

    pub fn try_acquire(&self) -> bool {
        loop {
            let used = self.used.load(Ordering::Relaxed);
            if used >= self.capacity {
                return false;
            }
            if self
                .used
                .compare_exchange_weak(used, used + 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn release(&self) {
        loop {
            let used = self.used.load(Ordering::Relaxed);
            if used == 0 {
                return;
            }
            if self
                .used
                .compare_exchange_weak(used, used - 1, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    pub fn snapshot(&self) -> (usize, usize) {
        (self.used.load(Ordering::Relaxed), self.capacity)
    }
}

#[derive(Debug)]
struct CreditLease {
    credits: Arc<InFlightCredits>,
}

impl Drop for CreditLease {
    fn drop(&mut self) {
        self.credits.release();
    }
}

#[derive(Debug, Clone)]
pub struct BudgetedAllocator {
    inner: HeapAllocator,
    credits: Arc<InFlightCredits>,
}

impl BudgetedAllocator {
    #[must_use]
    pub fn new(inner: HeapAllocator, max_in_flight: usize) -> Self {
        Self {
            inner,
            credits: Arc::new(InFlightCredits::new(max_in_flight)),
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> (usize, usize) {
        self.credits.snapshot()
    }
}

impl FrameAllocator for BudgetedAllocator {
    fn allocate(&self, format: VideoFormat, dims: Dimensions) -> Result<FrameBuffer, AllocError> {
        if !self.credits.try_acquire() {
            let (in_flight, capacity) = self.credits.snapshot();
            return Err(AllocError::Exhausted {
                in_flight,
                capacity,
            });
        }
        let lease = CreditLease {
            credits: Arc::clone(&self.credits),
        };
        // On failure the lease drops here and hands the credit back.
        let buffer = self.inner.allocate(format, dims)?;
        Ok(buffer.with_lease(lease))
    }
}
