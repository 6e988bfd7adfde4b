use microbnn::tensor::{BitTensor, BitVec, ConvWeights, DenseWeights, Thresholds};
use microbnn::Error;

#[test]
fn bitvec_get_set() {
    let mut bits = BitVec::new(130);
    bits.set(0, true);
    bits.set(64, true);
    bits.set(129, true);
    assert!(bits.get(0) && bits.get(64) && bits.get(129));
    assert!(!bits.get(1));
    assert_eq!(bits.count_ones(), 3);

    bits.set(64, false);
    assert_eq!(bits.count_ones(), 2);
}

#[test]
fn bitvec_xnor_count_matches_bitwise_definition() {
    let a: BitVec = (0..100).map(|i| i % 3 == 0).collect();
    let b: BitVec = (0..100).map(|i| i % 5 == 0).collect();
    let expected = (0..100).filter(|&i| (i % 3 == 0) == (i % 5 == 0)).count();
    assert_eq!(a.xnor_count(&b), expected);
    assert_eq!(a.xnor_count(&a), 100);
    assert_eq!(a.hamming_distance(&b), 100 - expected);
}

#[test]
fn bit_tensor_layout_is_chw() {
    let mut t = BitTensor::new(2, 3, 4);
    t.set(1, 2, 3, true);
    assert!(t.get(1, 2, 3));
    assert!(t.bits().get(1 * 12 + 2 * 4 + 3));
    assert_eq!(t.count_ones(), 1);
    assert_eq!(t.to_string(), "2x3x4 (bits)");
}

#[test]
fn bit_tensor_from_bits_checks_length() {
    let err = BitTensor::from_bits(2, 2, 2, BitVec::new(7)).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    assert!(BitTensor::from_bits(2, 2, 2, BitVec::new(8)).is_ok());
}

#[test]
fn bit_tensor_crop_and_resize() {
    let t = BitTensor::from_fn(1, 4, 4, |_, y, x| y == x);
    let crop = t.crop(1, 1, 2, 2);
    assert!(crop.get(0, 0, 0) && crop.get(0, 1, 1));
    assert!(!crop.get(0, 0, 1));

    let down = t.resize_nearest(2, 2);
    assert!(down.get(0, 0, 0) && down.get(0, 1, 1));
    assert!(!down.get(0, 1, 0));
    assert_eq!(t.resize_nearest(4, 4), t);
}

#[test]
#[should_panic(expected = "exceeds")]
fn bit_tensor_crop_outside_region_panics() {
    // Channel 1 is all ones; a crop running past the bottom edge must not read it.
    let t = BitTensor::from_fn(2, 2, 2, |c, _, _| c == 1);
    t.crop(1, 0, 2, 2);
}

#[test]
#[should_panic(expected = "out of bounds")]
fn bit_tensor_get_checks_each_coordinate() {
    let t = BitTensor::new(2, 2, 2);
    // Flat index 4 is valid, but row 2 is not.
    t.get(0, 2, 0);
}

#[test]
fn conv_weights_from_flat_uses_in_out_row_col_order() {
    // 2 input channels, 3 output channels, 2x2 kernel; set exactly (m=1, n=2, r=0, c=1).
    let (m, n, f) = (2, 3, 2);
    let mut flat = vec![0u8; m * n * f * f];
    flat[(1 * n + 2) * f * f + 0 * f + 1] = 1;
    let weights = ConvWeights::from_flat(m, n, f, &flat).unwrap();

    assert!(weights.get(1, 2, 0, 1));
    assert_eq!(weights.kernel(2).count_ones(), 1);
    assert_eq!(weights.kernel(0).count_ones(), 0);
    assert_eq!(weights.window_len(), 8);
    // Kernel bits are packed (row, col, channel).
    assert!(weights.kernel(2).get((0 * f + 1) * m + 1));
}

#[test]
fn conv_weights_reject_bad_input() {
    let err = ConvWeights::from_flat(1, 2, 3, &[0u8; 17]).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    let mut flat = vec![0u8; 18];
    flat[4] = 2;
    let err = ConvWeights::from_flat(1, 2, 3, &flat).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn dense_weights_from_flat_is_row_major_in_out() {
    let flat = [1u8, 0, 0, 1, 1, 1];
    let weights = DenseWeights::from_flat(3, 2, &flat).unwrap();
    assert!(weights.get(0, 0) && !weights.get(0, 1));
    assert!(!weights.get(1, 0) && weights.get(1, 1));
    assert!(weights.get(2, 0) && weights.get(2, 1));
    assert_eq!(weights.column(1).count_ones(), 2);

    assert!(DenseWeights::from_flat(3, 3, &flat).is_err());
}

#[test]
fn thresholds_basics() {
    let t = Thresholds::uniform(3, -2);
    assert_eq!(t.len(), 3);
    assert_eq!(t.get(2), -2);
    let t: Thresholds = vec![1, 2].into();
    assert_eq!(t.as_slice(), &[1, 2]);
}
