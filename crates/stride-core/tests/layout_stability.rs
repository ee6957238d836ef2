//! Stability tests for the binary descriptor layout
//!
//! The hex snapshots pin field offsets and widths of layout version 1. A
//! change here breaks every foreign caller that reads descriptors, so an
//! updated snapshot must come with a `LAYOUT_VERSION` bump.

use stride_core::constants::{CFI_VERSION, LAYOUT_VERSION};
use stride_core::{
    size_for_rank, size_in_bytes, Attribute, DeclaredType, DerivedType, Descriptor, MaxRankDescriptor, Ownership,
    RawDescriptor, Result, StaticDescriptor, TypeCode, MAX_DESCRIPTOR_BYTES, MAX_RANK,
};

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let hex = chunk.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ");
            format!("{:04x}: {}", i * 16, hex)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unbound_matrix() -> Result<Descriptor> {
    let mut d = Descriptor::establish_intrinsic(TypeCode::real(8), 2, Attribute::Pointer)?;
    d.set_bounds(0, 1, 3);
    d.set_bounds(1, 0, 1);
    Ok(d)
}

#[test]
fn test_layout_version() {
    assert_eq!(LAYOUT_VERSION, 1);
    assert_eq!(CFI_VERSION, 20240719);
}

#[cfg(target_endian = "little")]
#[test]
fn test_rank2_image_snapshot() -> Result<()> {
    let bytes = unbound_matrix()?.to_raw().to_bytes()?;
    assert_eq!(bytes.len(), size_for_rank(2));
    insta::assert_snapshot!(hex_dump(&bytes), @r"
    0000: 00 00 00 00 00 00 00 00 08 00 00 00 00 00 00 00
    0010: 4f d9 34 01 02 1c 01 00 01 00 00 00 00 00 00 00
    0020: 03 00 00 00 00 00 00 00 08 00 00 00 00 00 00 00
    0030: 00 00 00 00 00 00 00 00 02 00 00 00 00 00 00 00
    0040: 18 00 00 00 00 00 00 00
    ");
    Ok(())
}

#[cfg(target_endian = "little")]
#[test]
fn test_unlimited_scalar_image_snapshot() -> Result<()> {
    let d = Descriptor::establish_unlimited(0, Attribute::Pointer)?;
    let bytes = d.to_raw().to_bytes()?;
    assert_eq!(bytes.len(), size_in_bytes(0, true));
    insta::assert_snapshot!(hex_dump(&bytes), @r"
    0000: 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
    0010: 4f d9 34 01 00 ff 01 01 00 00 00 00 00 00 00 00
    ");
    Ok(())
}

#[test]
fn test_static_buffer_fits_every_rank() {
    assert_eq!(MaxRankDescriptor::byte_size(), MAX_DESCRIPTOR_BYTES);
    for rank in 0..=MAX_RANK {
        assert!(size_in_bytes(rank, true) <= MaxRankDescriptor::byte_size());
        if rank > 0 {
            assert!(size_for_rank(rank) >= size_for_rank(rank - 1));
        }
    }
}

#[test]
fn test_store_rejects_rank_beyond_buffer() -> Result<()> {
    let d = unbound_matrix()?;
    let mut small = StaticDescriptor::<1>::new();
    assert!(small.store(&d).is_err());
    assert!(small.as_bytes().iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn test_binary_round_trip_through_static_buffer() -> Result<()> {
    let mut d = unbound_matrix()?;
    d.allocate()?;
    d.fill(1.25f64)?;

    let mut image = MaxRankDescriptor::new();
    image.store(&d)?;
    let raw = image.load()?;
    assert_eq!(raw, d.to_raw());

    let view = unsafe { Descriptor::from_raw(&raw)? };
    assert_eq!(view.ownership(), Ownership::Aliased);
    assert_eq!(view.base_address(), d.base_address());
    assert_eq!(view.dimensions(), d.dimensions());
    assert_eq!(
        view.declared_type(),
        DeclaredType::Intrinsic {
            type_code: TypeCode::real(8),
            element_bytes: 8
        }
    );
    assert_eq!(view.to_vec::<f64>()?, vec![1.25; 6]);
    assert!(view.is_associated_with(&d));
    Ok(())
}

static NODE: DerivedType = DerivedType::new("node", 24, 8);

#[test]
fn test_addendum_carries_derived_type_address() -> Result<()> {
    let d = Descriptor::establish_polymorphic(&NODE, 1, Attribute::Pointer)?;
    let raw = d.to_raw();
    assert_eq!(raw.addendum, Some(&NODE as *const DerivedType as usize as u64));
    assert_eq!(raw.to_bytes()?.len(), size_in_bytes(1, true));

    let imported = unsafe { Descriptor::from_raw(&raw)? };
    assert_eq!(imported.derived_type(), Some(&NODE));
    assert_eq!(imported.declared_type(), DeclaredType::Polymorphic(&NODE));
    assert!(!imported.is_associated());
    Ok(())
}

#[test]
fn test_json_round_trip() -> Result<()> {
    let raw = unbound_matrix()?.to_raw();
    let json = raw.to_json()?;
    assert!(json.contains("\"elem_len\": 8"));
    assert_eq!(RawDescriptor::from_json(&json)?, raw);
    Ok(())
}

#[test]
fn test_json_rejects_inconsistent_rank() {
    let json =
        r#"{"base_addr":0,"elem_len":4,"version":20240719,"rank":2,"type":27,"attribute":1,"extra":0,"dims":[]}"#;
    assert!(RawDescriptor::from_json(json).is_err());
}
