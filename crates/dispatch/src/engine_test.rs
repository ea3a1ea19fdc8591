//! Tests for the copy-list transform engine

use skew_protocol::{Descriptor, Field, FieldType};

use crate::engine::{CopyListTransform, Transform};
use crate::{DispatchError, TransformBuilder};

/// Target with one Int16 scalar (id 1) and the given variable fields
fn blob_descriptor(rpc_id: u32, var_ids: &[u16]) -> Descriptor {
    let mut fields = vec![Field::scalar(1, FieldType::Int16)];
    fields.extend(var_ids.iter().map(|&id| Field::scalar(id, FieldType::Var)));
    Descriptor::new(rpc_id, fields)
}

/// Build a transform where the peer and target schemas are given explicitly
fn make_transform(target: Descriptor, peer: Descriptor) -> CopyListTransform {
    let mut builder = TransformBuilder::new();
    builder.add_descriptor(target).unwrap();
    let plan = builder.build_plan(&peer.to_wire()).unwrap();
    CopyListTransform::new(plan)
}

/// Wire message for `blob_descriptor` peers: rpc-id, total length, scalar,
/// blob-5 length prefix, then the two payloads
fn dyn_message(rpc_id: u16, id1: u16, b5: &[u8], b6: &[u8]) -> Vec<u8> {
    let total = (8 + b5.len() + b6.len()) as u16;
    let mut msg = Vec::new();
    msg.extend_from_slice(&rpc_id.to_le_bytes());
    msg.extend_from_slice(&total.to_le_bytes());
    msg.extend_from_slice(&id1.to_le_bytes());
    msg.extend_from_slice(&(b5.len() as u16).to_le_bytes());
    msg.extend_from_slice(b5);
    msg.extend_from_slice(b6);
    msg
}

fn scratch_for(transform: &CopyListTransform) -> (Vec<u8>, Vec<Option<crate::BlobSpan>>) {
    (
        vec![0; transform.output_size() as usize],
        vec![None; transform.blob_slots()],
    )
}

// =============================================================================
// Static messages
// =============================================================================

fn static_descriptor(rpc_id: u32) -> Descriptor {
    Descriptor::new(
        rpc_id,
        vec![
            Field::scalar(1, FieldType::Int32),
            Field::scalar(2, FieldType::Int16),
        ],
    )
}

#[test]
fn test_static_identity_copies_every_field() {
    let transform = make_transform(static_descriptor(10), static_descriptor(10));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let mut msg = vec![10, 0];
    msg.extend_from_slice(&0xdead_beefu32.to_le_bytes());
    msg.extend_from_slice(&0x0102u16.to_le_bytes());

    let consumed = transform.apply(&msg, &mut fixed, &mut blobs).unwrap();
    assert_eq!(consumed, 8);
    assert_eq!(&fixed[2..6], &0xdead_beefu32.to_le_bytes());
    assert_eq!(&fixed[6..8], &0x0102u16.to_le_bytes());
}

#[test]
fn test_static_consumes_fixed_size_ignoring_tail() {
    let transform = make_transform(static_descriptor(10), static_descriptor(10));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    // Extra bytes after the message belong to the next one
    let mut msg = vec![0u8; 8];
    msg.extend_from_slice(&[0xff; 4]);
    let consumed = transform.apply(&msg, &mut fixed, &mut blobs).unwrap();
    assert_eq!(consumed, 8);
}

#[test]
fn test_short_fixed_part_needs_more_data() {
    let transform = make_transform(static_descriptor(10), static_descriptor(10));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    match transform.apply(&[0u8; 5], &mut fixed, &mut blobs) {
        Err(DispatchError::NeedMoreData {
            expected: 8,
            actual: 5,
        }) => {}
        other => panic!("expected NeedMoreData, got {other:?}"),
    }
}

#[test]
fn test_unmatched_target_fields_keep_defaults() {
    // Peer only sends field 1
    let peer = Descriptor::new(10, vec![Field::scalar(1, FieldType::Int32)]);
    let transform = make_transform(static_descriptor(10), peer);
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let mut msg = vec![10, 0];
    msg.extend_from_slice(&7u32.to_le_bytes());

    transform.apply(&msg, &mut fixed, &mut blobs).unwrap();
    assert_eq!(&fixed[2..6], &7u32.to_le_bytes());
    assert_eq!(&fixed[6..8], &[0, 0], "field 2 keeps its default");
}

// =============================================================================
// Dynamic messages
// =============================================================================

#[test]
fn test_dynamic_resolves_both_blobs() {
    let transform = make_transform(blob_descriptor(11, &[5, 6]), blob_descriptor(11, &[5, 6]));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let msg = dyn_message(11, 42, b"hello", b"world!");
    let consumed = transform.apply(&msg, &mut fixed, &mut blobs).unwrap();

    assert_eq!(consumed as usize, msg.len());
    assert_eq!(blobs[0].unwrap().resolve(&msg).unwrap(), b"hello");
    assert_eq!(blobs[1].unwrap().resolve(&msg).unwrap(), b"world!");

    // Scalar landed at the target position, prefix length at the slot,
    // implicit trailing length written by the engine
    assert_eq!(&fixed[2..4], &42u16.to_le_bytes());
    assert_eq!(&fixed[4..6], &5u16.to_le_bytes());
    assert_eq!(&fixed[6..8], &6u16.to_le_bytes());
}

#[test]
fn test_dynamic_empty_trailing_blob() {
    let transform = make_transform(blob_descriptor(11, &[5, 6]), blob_descriptor(11, &[5, 6]));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let msg = dyn_message(11, 1, b"x", b"");
    let consumed = transform.apply(&msg, &mut fixed, &mut blobs).unwrap();
    assert_eq!(consumed as usize, msg.len());
    assert_eq!(blobs[1].unwrap().resolve(&msg).unwrap(), b"");
    assert_eq!(&fixed[6..8], &[0, 0]);
}

#[test]
fn test_dropped_blob_still_advances_cursor() {
    // Target lacks blob 5; blob 6 must still land after blob 5's payload
    let transform = make_transform(blob_descriptor(11, &[6]), blob_descriptor(11, &[5, 6]));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let msg = dyn_message(11, 1, b"dropped", b"kept");
    transform.apply(&msg, &mut fixed, &mut blobs).unwrap();

    assert_eq!(transform.blob_slots(), 1);
    assert_eq!(blobs[0].unwrap().resolve(&msg).unwrap(), b"kept");
}

#[test]
fn test_trimmed_trailing_blob_still_counts_toward_length() {
    // Target lacks the trailing blob; the declared total still covers it
    let transform = make_transform(blob_descriptor(11, &[5]), blob_descriptor(11, &[5, 6]));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let msg = dyn_message(11, 1, b"kept", b"trimmed");
    let consumed = transform.apply(&msg, &mut fixed, &mut blobs).unwrap();
    assert_eq!(consumed as usize, msg.len());
    assert_eq!(blobs[0].unwrap().resolve(&msg).unwrap(), b"kept");
}

#[test]
fn test_declared_total_beyond_buffer_needs_more_data() {
    let transform = make_transform(blob_descriptor(11, &[5, 6]), blob_descriptor(11, &[5, 6]));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let full = dyn_message(11, 1, b"hello", b"world");
    let truncated = &full[..full.len() - 3];

    match transform.apply(truncated, &mut fixed, &mut blobs) {
        Err(DispatchError::NeedMoreData { expected, actual }) => {
            assert_eq!(expected, full.len());
            assert_eq!(actual, truncated.len());
        }
        other => panic!("expected NeedMoreData, got {other:?}"),
    }
}

#[test]
fn test_declared_total_below_fixed_part_is_malformed() {
    let transform = make_transform(blob_descriptor(11, &[5, 6]), blob_descriptor(11, &[5, 6]));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let mut msg = dyn_message(11, 1, b"", b"");
    msg[2..4].copy_from_slice(&3u16.to_le_bytes());

    assert!(matches!(
        transform.apply(&msg, &mut fixed, &mut blobs),
        Err(DispatchError::MalformedMessage(_))
    ));
}

#[test]
fn test_blob_prefix_overrunning_total_is_malformed() {
    let transform = make_transform(blob_descriptor(11, &[5, 6]), blob_descriptor(11, &[5, 6]));
    let (mut fixed, mut blobs) = scratch_for(&transform);

    let mut msg = dyn_message(11, 1, b"ab", b"cd");
    // Blob 5 claims more bytes than the message holds
    msg[6..8].copy_from_slice(&100u16.to_le_bytes());

    assert!(matches!(
        transform.apply(&msg, &mut fixed, &mut blobs),
        Err(DispatchError::MalformedMessage(_))
    ));
}
