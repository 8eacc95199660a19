#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
use approx::assert_relative_eq;
use ndarray::{ArrayD, IxDyn};
use planetile_core::{
    decode, DType, Error, PixelArray, Plane, RawArraySlice, RawPlaneRecord, Scalar, ScalarCodec,
};

const SHAPE: [usize; 5] = [32, 16, 2, 3, 4];
const OFFSETS: [usize; 5] = [4, 8, 1, 2, 1];
const DELTAS: [usize; 5] = [10, 6, 1, 1, 2];

/// Deterministic pseudo-random sequence (64-bit LCG).
fn lcg(n: usize) -> impl Iterator<Item = u64> {
    let mut state = 0x2545_f491_4f6c_dd1d_u64;
    (0..n).map(move |_| {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        state >> 11
    })
}

fn typed<T: Scalar>(deltas: &[usize], f: impl Fn(u64) -> T) -> PixelArray {
    let n: usize = deltas.iter().product();
    ArrayD::from_shape_vec(IxDyn(deltas), lcg(n).map(f).collect())
        .unwrap()
        .into()
}

fn block(dtype: DType, deltas: &[usize]) -> PixelArray {
    match dtype {
        DType::Int8 => typed(deltas, |v| v as i8),
        DType::UInt8 => typed(deltas, |v| v as u8),
        DType::Int16 => typed(deltas, |v| v as i16),
        DType::UInt16 => typed(deltas, |v| v as u16),
        DType::Int32 => typed(deltas, |v| v as i32),
        DType::UInt32 => typed(deltas, |v| v as u32),
        DType::Float32 => typed(deltas, |v| (v as f32 / 1e9) - 1000.0),
        DType::Float64 => typed(deltas, |v| (v as f64 / 1e12) - 1000.0),
    }
}

#[test]
fn test_roundtrip_all_dtypes_both_byte_orders() {
    for dtype in DType::ALL {
        for little_endian in [false, true] {
            let pixels = block(dtype, &DELTAS);
            let raw =
                RawArraySlice::encode(&pixels, SHAPE.to_vec(), OFFSETS.to_vec(), little_endian)
                    .unwrap();
            assert_eq!(raw.data.len(), pixels.len() * dtype.byte_width());

            let decoded = decode(&raw).unwrap();
            assert_eq!(decoded.shape(), &SHAPE);
            assert_eq!(decoded.offsets(), &OFFSETS);
            assert_eq!(decoded.deltas(), &DELTAS);
            assert_eq!(decoded.pixels(), &pixels, "{dtype} le={little_endian}");

            let codec = ScalarCodec::new(dtype, little_endian);
            assert_eq!(codec.encode(decoded.pixels()).unwrap(), raw.data);
        }
    }
}

#[test]
fn test_byte_order_matters_for_wide_types() {
    for dtype in DType::ALL {
        let pixels = block(dtype, &[4]);
        let big = RawArraySlice::encode_whole(&pixels, false).unwrap();
        let little = RawArraySlice::encode_whole(&pixels, true).unwrap();
        if dtype.byte_width() == 1 {
            assert_eq!(big.data, little.data);
        } else {
            assert_ne!(big.data, little.data);
        }
    }
}

#[test]
fn test_dtype_tag_is_case_insensitive() {
    let pixels = block(DType::Float64, &[3]);
    let mut raw = RawArraySlice::encode_whole(&pixels, true).unwrap();
    raw.dtype = "float64".into();
    let decoded = decode(&raw).unwrap();
    let a = decoded.as_array::<f64>().unwrap();
    let b = pixels.view_as::<f64>().unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*x, *y);
    }
}

#[test]
fn test_valid_sub_blocks_decode() {
    let shape = [3, 4];
    for o0 in 0..=3 {
        for d0 in 0..=(3 - o0) {
            for o1 in 0..=4 {
                for d1 in 0..=(4 - o1) {
                    let raw = RawArraySlice {
                        shape: shape.to_vec(),
                        offsets: vec![o0, o1],
                        deltas: vec![d0, d1],
                        dtype: "UINT8".into(),
                        little_endian: true,
                        data: vec![0; d0 * d1],
                    };
                    assert!(decode(&raw).is_ok(), "{raw:?}");
                }
            }
        }
    }
}

#[test]
fn test_out_of_bounds_names_dimension() {
    let shape = [3, 4, 5];
    for dimension in 0..3 {
        let mut offsets = vec![0, 0, 0];
        let deltas = vec![1, 1, 1];
        offsets[dimension] = shape[dimension];
        let raw = RawArraySlice {
            shape: shape.to_vec(),
            offsets: offsets.clone(),
            deltas,
            dtype: "UINT8".into(),
            little_endian: true,
            data: vec![0],
        };
        assert_eq!(
            decode(&raw).unwrap_err(),
            Error::BoundaryViolation {
                dimension,
                offset: shape[dimension],
                delta: 1,
                shape: shape[dimension],
            }
        );
    }
}

#[test]
fn test_extract_plane_from_volume_record() {
    let deltas = [10, 6, 1, 1, 1];
    let pixels = block(DType::Int16, &deltas);
    let record = RawPlaneRecord {
        name: "img".into(),
        dimension_order: "XYTZC".into(),
        series: 0,
        pixel_data: RawArraySlice::encode(&pixels, SHAPE.to_vec(), OFFSETS.to_vec(), true)
            .unwrap(),
    };
    let plane = Plane::extract(&record).unwrap();
    // Z, C, T sit at positions 3, 4, 2 of "XYTZC".
    assert_eq!((plane.z(), plane.c(), plane.t()), (2, 1, 1));

    let source = pixels.view_as::<i16>().unwrap();
    let xy = plane.xy::<i16>().unwrap();
    assert_eq!(xy.dim(), (10, 6));
    for x in 0..10 {
        for y in 0..6 {
            assert_eq!(xy[[x, y]], source[IxDyn(&[x, y, 0, 0, 0])]);
        }
    }
}
