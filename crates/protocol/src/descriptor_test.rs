//! Tests for the field and descriptor model

use crate::{Descriptor, DescriptorReader, Field, FieldType, ProtocolError};

// =============================================================================
// FieldType tests
// =============================================================================

#[test]
fn test_field_type_wire_codes_round_trip() {
    for code in 0u8..=5 {
        let ftype = FieldType::from_wire(code).unwrap();
        assert_eq!(ftype.to_wire(), code);
    }
}

#[test]
fn test_field_type_unknown_code() {
    for code in 6u8..=7 {
        match FieldType::from_wire(code) {
            Err(ProtocolError::UnknownFieldType(c)) => assert_eq!(c, code),
            other => panic!("expected UnknownFieldType, got {other:?}"),
        }
    }
}

#[test]
fn test_field_type_sizes() {
    assert_eq!(FieldType::Int8.elem_size(), 1);
    assert_eq!(FieldType::Int16.elem_size(), 2);
    assert_eq!(FieldType::Int32.elem_size(), 4);
    assert_eq!(FieldType::Int64.elem_size(), 8);
    assert_eq!(FieldType::Var.elem_size(), 2);
    assert_eq!(FieldType::Int128.elem_size(), 16);
}

#[test]
fn test_var_fields_align_to_two() {
    assert_eq!(FieldType::Var.alignment(), 2);
    assert_eq!(FieldType::Int64.alignment(), 8);
    assert_eq!(FieldType::Int128.alignment(), 16);
}

// =============================================================================
// Descriptor construction
// =============================================================================

#[test]
fn test_descriptor_derives_var_field_count() {
    let desc = Descriptor::new(
        7,
        vec![
            Field::scalar(1, FieldType::Int32),
            Field::scalar(2, FieldType::Var),
            Field::scalar(3, FieldType::Var),
        ],
    );
    assert_eq!(desc.n_var_fields(), 2);
    assert!(desc.is_dynamic());
}

#[test]
fn test_descriptor_without_var_fields_is_static() {
    let desc = Descriptor::new(7, vec![Field::scalar(1, FieldType::Int64)]);
    assert_eq!(desc.n_var_fields(), 0);
    assert!(!desc.is_dynamic());
}

#[test]
fn test_descriptor_field_lookup() {
    let desc = Descriptor::new(
        3,
        vec![
            Field::scalar(4, FieldType::Int16),
            Field::array(9, FieldType::Int8, 12),
        ],
    );
    assert_eq!(desc.field(9).unwrap().n_elems, 12);
    assert!(desc.field(5).is_none());
}

// =============================================================================
// Wire encoding round trip
// =============================================================================

#[test]
fn test_to_wire_round_trip() {
    let desc = Descriptor::new(
        42,
        vec![
            Field::scalar(1, FieldType::Int32),
            Field::array(2, FieldType::Int8, 16),
            Field::scalar(3, FieldType::Var),
        ],
    );

    let parsed = DescriptorReader::read(&desc.to_wire()).unwrap();
    assert_eq!(parsed.rpc_id(), 42);
    assert_eq!(parsed.fields(), desc.fields());
    assert_eq!(parsed.n_var_fields(), 1);
}

#[test]
fn test_to_wire_header_layout() {
    let desc = Descriptor::new(
        0x0102,
        vec![
            Field::scalar(5, FieldType::Int64),
            Field::array(6, FieldType::Int16, 3),
        ],
    );
    let bytes = desc.to_wire();

    // flags, rpc_id, n_fields, n_arrays
    assert_eq!(&bytes[0..2], &[0x00, 0x00]);
    assert_eq!(&bytes[2..4], &[0x02, 0x01]);
    assert_eq!(&bytes[4..6], &[0x02, 0x00]);
    assert_eq!(&bytes[6..8], &[0x01, 0x00]);

    // field word: type Int64 (3) in bits 14..12, id 5 in bits 11..0
    let word0 = u16::from_le_bytes([bytes[8], bytes[9]]);
    assert_eq!(word0, (3 << 12) | 5);

    // field word: array bit set, type Int16 (1), id 6
    let word1 = u16::from_le_bytes([bytes[10], bytes[11]]);
    assert_eq!(word1, (1 << 15) | (1 << 12) | 6);

    // array length word
    let len = u16::from_le_bytes([bytes[12], bytes[13]]);
    assert_eq!(len, 3);
}
