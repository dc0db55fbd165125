use crate::contract::{DecoderConfig, Dimensions, Picture, VideoFormat};

pub const MAX_DIMENSION: u32 = (1 << 15) - 1;
pub const MAX_CANVAS: u64 = 1 << (14 * 2);

#[must_use]
pub fn is_valid_output_config(format: VideoFormat, dims: Dimensions) -> bool {
    matches!(format, VideoFormat::I420 | VideoFormat::Yv12)
        && dims.width > 0
        && dims.height > 0
        && dims.width % 2 == 0
        && dims.height % 2 == 0
        && dims.width <= MAX_DIMENSION
        && dims.height <= MAX_DIMENSION
        && u64::from(dims.width) * u64::from(dims.height) <= MAX_CANVAS
}

pub(crate) fn check_picture(config: &DecoderConfig, picture: &Picture<'_>) -> Result<(), String> {
    if picture.format != config.format {
        return Err(format!(
            "engine emitted {} but session was negotiated for {}",
            picture.format, config.format
        ));
    }
    if picture.dims != config.coded_size {
        return Err(format!(
            "engine emitted {} picture but session was negotiated for {}",
            picture.dims, config.coded_size
        ));
    }
    if !is_valid_output_config(picture.format, picture.dims) {
        return Err(format!(
            "engine emitted unsupported output {} at {}",
            picture.format, picture.dims
        ));
    }
    for (index, plane) in picture.planes.iter().enumerate() {
        let width = picture.format.row_bytes(index, picture.dims);
        let rows = picture.format.plane_rows(index, picture.dims);
        if plane.stride < width {
            return Err(format!(
                "plane {index} stride {} is narrower than its {width} byte rows",
                plane.stride
            ));
        }
        let Some(needed) = plane
            .stride
            .checked_mul(rows - 1)
            .and_then(|len| len.checked_add(width))
        else {
            return Err(format!(
                "plane {index} stride {} overflows over {rows} rows",
                plane.stride
            ));
        };
        if plane.data.len() < needed {
            return Err(format!(
                "plane {index} holds {} bytes, {needed} needed",
                plane.data.len()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::contract::{Codec, PlaneRef, Timestamp};

    #[rstest]
    #[case(VideoFormat::I420, 1920, 1080)]
    #[case(VideoFormat::Yv12, 2, 2)]
    #[case(VideoFormat::Yv12, 16384, 16384)]
    #[case(VideoFormat::I420, 32766, 8192)]
    fn accepts_even_sizes_within_limits(
        #[case] format: VideoFormat,
        #[case] width: u32,
        #[case] height: u32,
    ) {
        assert!(is_valid_output_config(format, Dimensions::new(width, height)));
    }

    #[rstest]
    #[case(0, 1080)]
    #[case(1920, 0)]
    #[case(1921, 1080)]
    #[case(1920, 1081)]
    #[case(32768, 2)]
    #[case(2, 32768)]
    #[case(16386, 16384)]
    fn rejects_odd_empty_or_oversized(#[case] width: u32, #[case] height: u32) {
        assert!(!is_valid_output_config(
            VideoFormat::I420,
            Dimensions::new(width, height)
        ));
    }

    #[test]
    fn check_picture_flags_short_planes() {
        let config = DecoderConfig::new(Codec::Vp8, Dimensions::new(4, 2), VideoFormat::I420);
        let luma = [0_u8; 8];
        let chroma = [0_u8; 2];
        let mut picture = Picture {
            format: VideoFormat::I420,
            dims: Dimensions::new(4, 2),
            timestamp: Timestamp(0),
            planes: [
                PlaneRef { data: &luma, stride: 4 },
                PlaneRef { data: &chroma, stride: 2 },
                PlaneRef { data: &chroma, stride: 2 },
            ],
        };
        assert_eq!(check_picture(&config, &picture), Ok(()));

        picture.planes[0] = PlaneRef {
            data: &luma[..7],
            stride: 4,
        };
        assert!(check_picture(&config, &picture).is_err());

        picture.planes[0] = PlaneRef { data: &luma, stride: 3 };
        assert!(check_picture(&config, &picture).unwrap_err().contains("narrower"));
    }

    #[test]
    fn check_picture_rejects_overflowing_stride() {
        let config = DecoderConfig::new(Codec::Vp8, Dimensions::new(4, 4), VideoFormat::I420);
        let data = [0_u8; 16];
        let picture = Picture {
            format: VideoFormat::I420,
            dims: Dimensions::new(4, 4),
            timestamp: Timestamp(0),
            planes: [
                PlaneRef {
                    data: &data,
                    stride: usize::MAX / 2,
                },
                PlaneRef { data: &data, stride: 2 },
                PlaneRef { data: &data, stride: 2 },
            ],
        };
        assert!(check_picture(&config, &picture).unwrap_err().contains("overflows"));
    }

    #[test]
    fn check_picture_flags_format_drift() {
        let config = DecoderConfig::new(Codec::Vp8, Dimensions::new(2, 2), VideoFormat::Yv12);
        let data = [0_u8; 4];
        let picture = Picture {
            format: VideoFormat::I420,
            dims: Dimensions::new(2, 2),
            timestamp: Timestamp(0),
            planes: [
                PlaneRef { data: &data, stride: 2 },
                PlaneRef { data: &data, stride: 1 },
                PlaneRef { data: &data, stride: 1 },
            ],
        };
        let err = check_picture(&config, &picture).unwrap_err();
        assert!(err.contains("i420"));
    }
}
