use crate::allocator::FrameBuffer;
use crate::contract::{Dimensions, Picture, VideoFormat};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CopyError {
    #[error("source plane {plane} too short: {len} bytes, {needed} needed")]
    SourceTooShort {
        plane: usize,
        len: usize,
        needed: usize,
    },
    #[error("destination plane {plane} too short: {len} bytes, {needed} needed")]
    DestinationTooShort {
        plane: usize,
        len: usize,
        needed: usize,
    },
    #[error("plane {plane} stride {stride} is narrower than {row_bytes} byte rows")]
    StrideTooNarrow {
        plane: usize,
        stride: usize,
        row_bytes: usize,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PlaneCopy {
    pub plane: usize,
    pub row_bytes: usize,
    pub rows: usize,
    pub src_stride: usize,
    pub dst_stride: usize,
}

impl PlaneCopy {
    fn span(stride: usize, row_bytes: usize, rows: usize) -> Option<usize> {
        match rows {
            0 => Some(0),
            _ => stride.checked_mul(rows - 1)?.checked_add(row_bytes),
        }
    }
}

pub fn copy_plane(src: &[u8], dst: &mut [u8], copy: PlaneCopy) -> Result<(), CopyError> {
    let PlaneCopy {
        plane,
        row_bytes,
        rows,
        src_stride,
        dst_stride,
    } = copy;
    if rows == 0 || row_bytes == 0 {
        return Ok(());
    }
    for stride in [src_stride, dst_stride] {
        if stride < row_bytes {
            return Err(CopyError::StrideTooNarrow {
                plane,
                stride,
                row_bytes,
            });
        }
    }
    let src_needed = PlaneCopy::span(src_stride, row_bytes, rows).unwrap_or(usize::MAX);
    if src.len() < src_needed {
        return Err(CopyError::SourceTooShort {
            plane,
            len: src.len(),
            needed: src_needed,
        });
    }
    let dst_needed = PlaneCopy::span(dst_stride, row_bytes, rows).unwrap_or(usize::MAX);
    if dst.len() < dst_needed {
        return Err(CopyError::DestinationTooShort {
            plane,
            len: dst.len(),
            needed: dst_needed,
        });
    }

    if src_stride == dst_stride {
        dst[..src_needed].copy_from_slice(&src[..src_needed]);
        return Ok(());
    }

    for (src_row, dst_row) in src
        .chunks(src_stride)
        .zip(dst.chunks_mut(dst_stride))
        .take(rows)
    {
        dst_row[..row_bytes].copy_from_slice(&src_row[..row_bytes]);
    }
    Ok(())
}

pub fn transfer_picture(picture: &Picture<'_>, buffer: &mut FrameBuffer) -> Result<(), CopyError> {
    for (plane, source) in picture.planes.iter().enumerate() {
        let row_bytes = picture.format.row_bytes(plane, picture.dims);
        let rows = picture.format.plane_rows(plane, picture.dims);
        let dst_stride = buffer.layout(plane).map_or(0, |layout| layout.stride);
        let dst_len = buffer.len();
        let dst = buffer
            .plane_mut(plane, rows)
            .ok_or(CopyError::DestinationTooShort {
                plane,
                len: dst_len,
                needed: dst_stride.saturating_mul(rows),
            })?;
        copy_plane(
            source.data,
            dst,
            PlaneCopy {
                plane,
                row_bytes,
                rows,
                src_stride: source.stride,
                dst_stride,
            },
        )?;
    }
    Ok(())
}

pub fn make_marked_planes(
    format: VideoFormat,
    width: u32,
    height: u32,
    padding: usize,
    seed: u8,
) -> [(Vec<u8>, usize); VideoFormat::PLANE_COUNT] {
    let dims = Dimensions::new(width, height);
    std::array::from_fn(|plane| {
        let row_bytes = format.row_bytes(plane, dims);
        let rows = format.plane_rows(plane, dims);
        let stride = row_bytes + padding;
        let mut data = vec![0xEE_u8; stride * rows];
        for (row, chunk) in data.chunks_mut(stride).enumerate() {
            for (x, byte) in chunk[..row_bytes].iter_mut().enumerate() {
                *byte = if x == 0 {
                    row_marker(seed, plane, row)
                } else {
                    ((x + row + plane * 7) % 200) as u8
                };
            }
        }
        (data, stride)
    })
}

#[inline]
pub fn row_marker(seed: u8, plane: usize, row: usize) -> u8 {
    seed.wrapping_mul(31)
        .wrapping_add((plane as u8).wrapping_mul(67))
        .wrapping_add(row as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::HeapAllocator;
    use crate::contract::{FrameAllocator, PlaneRef, Timestamp};

    #[test]
    fn copy_plane_reconciles_different_strides() {
        let src = [1, 2, 3, 0, 0, 4, 5, 6, 0, 0, 7, 8, 9];
        let mut dst = [0xAA_u8; 12];
        copy_plane(
            &src,
            &mut dst,
            PlaneCopy {
                plane: 0,
                row_bytes: 3,
                rows: 3,
                src_stride: 5,
                dst_stride: 4,
            },
        )
        .unwrap();
        assert_eq!(dst, [1, 2, 3, 0xAA, 4, 5, 6, 0xAA, 7, 8, 9, 0xAA]);
    }

    #[test]
    fn copy_plane_fast_path_copies_tight_span() {
        let src = [1, 2, 9, 3, 4];
        let mut dst = [0_u8; 6];
        copy_plane(
            &src,
            &mut dst,
            PlaneCopy {
                plane: 1,
                row_bytes: 2,
                rows: 2,
                src_stride: 3,
                dst_stride: 3,
            },
        )
        .unwrap();
        assert_eq!(dst, [1, 2, 9, 3, 4, 0]);
    }

    #[test]
    fn copy_plane_rejects_short_buffers() {
        let mut dst = [0_u8; 4];
        let err = copy_plane(
            &[1, 2, 3],
            &mut dst,
            PlaneCopy {
                plane: 2,
                row_bytes: 2,
                rows: 2,
                src_stride: 2,
                dst_stride: 2,
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            CopyError::SourceTooShort {
                plane: 2,
                len: 3,
                needed: 4
            }
        );

        let err = copy_plane(
            &[1, 2, 3, 4],
            &mut dst[..3],
            PlaneCopy {
                plane: 0,
                row_bytes: 2,
                rows: 2,
                src_stride: 2,
                dst_stride: 2,
            },
        )
        .unwrap_err();
        assert!(matches!(err, CopyError::DestinationTooShort { .. }));
    }

    #[test]
    fn copy_plane_reports_overflowing_stride_as_short_source() {
        let mut dst = [0_u8; 16];
        let err = copy_plane(
            &[0; 16],
            &mut dst,
            PlaneCopy {
                plane: 0,
                row_bytes: 4,
                rows: 4,
                src_stride: usize::MAX / 2,
                dst_stride: 4,
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            CopyError::SourceTooShort {
                plane: 0,
                len: 16,
                needed: usize::MAX
            }
        );
    }

    #[test]
    fn copy_plane_with_empty_rows_is_a_no_op() {
        let mut dst = [7_u8; 4];
        copy_plane(
            &[],
            &mut dst,
            PlaneCopy {
                plane: 1,
                row_bytes: 0,
                rows: 3,
                src_stride: 0,
                dst_stride: 2,
            },
        )
        .unwrap();
        assert_eq!(dst, [7; 4]);
    }

    #[test]
    fn transfer_picture_keeps_row_markers_with_wider_destination() {
        let format = VideoFormat::Yv12;
        let dims = Dimensions::new(10, 6);
        let planes = make_marked_planes(format, dims.width, dims.height, 0, 3);
        let picture = Picture {
            format,
            dims,
            timestamp: Timestamp(0),
            planes: std::array::from_fn(|i| PlaneRef {
                data: &planes[i].0,
                stride: planes[i].1,
            }),
        };
        let mut buffer = HeapAllocator::new(16).allocate(format, dims).unwrap();
        transfer_picture(&picture, &mut buffer).unwrap();

        for plane in 0..VideoFormat::PLANE_COUNT {
            let rows = format.plane_rows(plane, dims);
            let row_bytes = format.row_bytes(plane, dims);
            let stride = buffer.layout(plane).unwrap().stride;
            assert!(stride > row_bytes);
            let out = buffer.plane(plane, rows).unwrap();
            for row in 0..rows {
                let expected = &planes[plane].0[row * row_bytes..(row + 1) * row_bytes];
                assert_eq!(&out[row * stride..row * stride + row_bytes], expected);
                assert_eq!(out[row * stride], row_marker(3, plane, row));
            }
        }
    }
}
