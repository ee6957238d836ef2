//! Integration tests for the pointer runtime entry points
//!
//! Each test mirrors one `ALLOCATE` / `DEALLOCATE` / pointer assignment
//! statement sequence as generated code would issue it.

use stride_core::entry::*;
use stride_core::stat::{StatMode, CFI_ERROR_BASE_ADDR_NULL, CFI_INVALID_EXTENT, STAT_OK};
use stride_core::{
    size_in_bytes, source_location, Attribute, Descriptor, MaxRankDescriptor, Ownership, Result, TypeCode,
};

fn real4_pointer(rank: usize) -> Result<Descriptor> {
    Descriptor::establish_intrinsic(TypeCode::real(4), rank, Attribute::Pointer)
}

fn integer4_matrix(rows: i64, values: &[i32]) -> Result<Descriptor> {
    let cols = values.len() as i64 / rows;
    let mut b =
        Descriptor::establish_intrinsic(TypeCode::integer(4), 2, Attribute::Allocatable)?.with_extents(&[rows, cols]);
    b.allocate()?;
    for (index, &value) in values.iter().enumerate() {
        let index = index as i64;
        b.set_element(&[index % rows + 1, index / rows + 1], value)?;
    }
    Ok(b)
}

#[test]
fn test_basic_allocate_deallocate() -> Result<()> {
    stride_tracing::init_test_tracing();

    // REAL(4), POINTER :: p(:);  ALLOCATE(p(2:11))
    let mut p = real4_pointer(1)?;
    assert!(!pointer_is_associated(&p));
    pointer_set_bounds(&mut p, 0, 2, 11);
    assert_eq!(pointer_allocate(&mut p, StatMode::Abort, source_location!()), STAT_OK);
    assert!(pointer_is_associated(&p));
    assert_eq!(p.elements(), 10);
    assert_eq!(p.dimension(0).lower_bound(), 2);
    assert_eq!(p.dimension(0).upper_bound(), 11);

    // DEALLOCATE(p)
    assert_eq!(pointer_deallocate(&mut p, StatMode::Abort, source_location!()), STAT_OK);
    assert!(!pointer_is_associated(&p));
    Ok(())
}

#[test]
fn test_apply_mold_allocation() -> Result<()> {
    stride_tracing::init_test_tracing();

    // REAL(4), POINTER :: m;  ALLOCATE(m)
    let mut m = real4_pointer(0)?;
    pointer_allocate(&mut m, StatMode::Abort, source_location!());

    // CLASS(*), POINTER :: p;  ALLOCATE(p, MOLD=m)
    let mut p = Descriptor::establish_unlimited(0, Attribute::Pointer)?;
    assert_eq!(p.element_bytes(), 0);
    assert_eq!(pointer_apply_mold(&mut p, &m, StatMode::Abort, source_location!()), STAT_OK);
    assert_eq!(pointer_allocate(&mut p, StatMode::Abort, source_location!()), STAT_OK);

    assert_eq!(p.element_bytes(), m.element_bytes());
    assert_eq!(p.type_code(), m.type_code());
    assert_eq!(p.rank(), 0);
    Ok(())
}

#[test]
fn test_deallocate_polymorphic() -> Result<()> {
    stride_tracing::init_test_tracing();

    // CLASS(*), POINTER :: p;  ALLOCATE(INTEGER :: p)
    let mold = Descriptor::establish_intrinsic(TypeCode::integer(4), 0, Attribute::Other)?;
    let mut p = Descriptor::establish_unlimited(0, Attribute::Pointer)?;
    p.allocate_with_mold(&mold)?;
    assert_eq!(p.type_code(), TypeCode::integer(4));

    // DEALLOCATE(p)
    assert_eq!(pointer_deallocate_polymorphic(&mut p, StatMode::Abort, source_location!()), STAT_OK);
    assert!(!p.is_associated());
    assert_eq!(p.type_code(), TypeCode::OTHER);
    Ok(())
}

#[test]
fn test_allocate_from_scalar_source() -> Result<()> {
    stride_tracing::init_test_tracing();

    let mut storage = 3.4f32;
    let mut s = real4_pointer(0)?;
    let base = std::ptr::NonNull::new((&mut storage as *mut f32).cast::<u8>()).expect("stack address");
    unsafe { s.associate_storage(base)? };

    // ALLOCATE(p(2:11), SOURCE=3.4)
    let mut p = real4_pointer(1)?;
    pointer_set_bounds(&mut p, 0, 2, 11);
    assert_eq!(pointer_allocate_source(&mut p, &s, StatMode::Abort, source_location!()), STAT_OK);
    assert!(pointer_is_associated(&p));
    assert_eq!(p.elements(), 10);
    assert_eq!(p.dimension(0).lower_bound(), 2);
    assert_eq!(p.dimension(0).upper_bound(), 11);
    assert_eq!(p.element::<f32>(&[2])?, 3.4);
    assert!(p.to_vec::<f32>()?.iter().all(|&x| x == 3.4));
    assert_eq!(p.ownership(), Ownership::Owned);
    Ok(())
}

#[test]
fn test_allocate_source_zero_size() -> Result<()> {
    stride_tracing::init_test_tracing();

    // REAL(4) :: s(-1:-2) = 0.
    let mut storage = 0.0f32;
    let mut s = real4_pointer(1)?.with_extents(&[0]);
    let base = std::ptr::NonNull::new((&mut storage as *mut f32).cast::<u8>()).expect("stack address");
    unsafe { s.associate_storage(base)? };

    // ALLOCATE(p(-1:-2), SOURCE=s)
    let mut p = real4_pointer(1)?;
    pointer_set_bounds(&mut p, 0, -1, -2);
    assert_eq!(pointer_allocate_source(&mut p, &s, StatMode::Abort, source_location!()), STAT_OK);
    assert!(pointer_is_associated(&p));
    assert_eq!(p.elements(), 0);
    assert_eq!(p.dimension(0).lower_bound(), 1);
    assert_eq!(p.dimension(0).upper_bound(), 0);
    Ok(())
}

#[test]
fn test_associate_remapping_leaves_trailing_bytes() -> Result<()> {
    stride_tracing::init_test_tracing();

    let mut image = MaxRankDescriptor::new();

    // REAL(4), POINTER :: p(:)
    let mut p = real4_pointer(1)?.with_extents(&[1]);
    let size = image.store(&p)?;
    assert_eq!(size, size_in_bytes(1, false));
    assert!(size <= MaxRankDescriptor::byte_size());

    // REAL(4), CONTIGUOUS, POINTER :: t(:,:,:);  ALLOCATE(t(1,1,1))
    let mut t = real4_pointer(3)?;
    for dim in 0..3 {
        pointer_set_bounds(&mut t, dim, 1, 1);
    }
    pointer_allocate(&mut t, StatMode::Abort, source_location!());
    assert!(pointer_is_associated(&t));

    // p(1:1) => t
    let b = integer4_matrix(2, &[1, 1])?;
    let stat = unsafe { pointer_associate_remapping(&mut p, &t, &b, StatMode::Abort, source_location!()) };
    assert_eq!(stat, STAT_OK);
    assert!(pointer_is_associated(&p));
    assert_eq!(p.rank(), 1);
    assert_eq!(p.elements(), 1);

    let written = image.store(&p)?;
    assert_eq!(written, size);
    let trailing = &image.as_bytes()[written..];
    if let Some(offset) = trailing.iter().position(|&byte| byte != 0) {
        panic!("byte {} after pointer descriptor was written", written + offset);
    }

    let raw = image.load()?;
    assert_eq!(raw.rank, 1);
    assert_eq!(raw.base_addr, t.base_address() as usize as u64);
    Ok(())
}

#[test]
fn test_remap_element_count_must_match() -> Result<()> {
    stride_tracing::init_test_tracing();

    let mut t = real4_pointer(1)?;
    pointer_set_bounds(&mut t, 0, 1, 2);
    pointer_allocate(&mut t, StatMode::Abort, source_location!());

    let mut p = real4_pointer(1)?;
    let mut errmsg = [0u8; 64];
    let stat = unsafe {
        pointer_associate_remapping(
            &mut p,
            &t,
            &integer4_matrix(2, &[1, 1])?,
            StatMode::report_into(&mut errmsg),
            source_location!(),
        )
    };
    assert_eq!(stat, CFI_INVALID_EXTENT);
    assert!(errmsg.starts_with(b"shape mismatch"));
    assert!(!p.is_associated());

    let stat = unsafe {
        pointer_associate_remapping(&mut p, &t, &integer4_matrix(2, &[1, 2])?, StatMode::report(), source_location!())
    };
    assert_eq!(stat, STAT_OK);
    assert_eq!(p.rank(), 1);
    assert_eq!(p.elements(), 2);
    Ok(())
}

#[test]
fn test_remap_with_overflowing_bounds_reports_status() -> Result<()> {
    stride_tracing::init_test_tracing();

    let mut t = real4_pointer(1)?;
    pointer_set_bounds(&mut t, 0, 1, 2);
    pointer_allocate(&mut t, StatMode::Abort, source_location!());

    let mut b = Descriptor::establish_intrinsic(TypeCode::integer(8), 2, Attribute::Allocatable)?.with_extents(&[2, 3]);
    b.allocate()?;
    for column in 1..=3 {
        b.set_element(&[1, column], 1i64)?;
        b.set_element(&[2, column], i64::MAX)?;
    }

    let mut p = real4_pointer(1)?;
    let stat = unsafe { pointer_associate_remapping(&mut p, &t, &b, StatMode::report(), source_location!()) };
    assert_eq!(stat, CFI_INVALID_EXTENT);
    assert!(!p.is_associated());
    Ok(())
}

#[test]
fn test_lifecycle_for_several_shapes() -> Result<()> {
    stride_tracing::init_test_tracing();

    for bounds in [vec![], vec![(1, 1)], vec![(0, 4), (-2, 2)], vec![(3, 2), (1, 5)]] {
        let mut p = real4_pointer(bounds.len())?;
        for (dim, &(lower, upper)) in bounds.iter().enumerate() {
            pointer_set_bounds(&mut p, dim, lower, upper);
        }
        assert!(!pointer_is_associated(&p));
        pointer_allocate(&mut p, StatMode::Abort, source_location!());
        assert!(pointer_is_associated(&p));
        pointer_deallocate(&mut p, StatMode::Abort, source_location!());
        assert!(!pointer_is_associated(&p));
    }
    Ok(())
}

#[test]
fn test_deallocate_unassociated_reports_status() -> Result<()> {
    stride_tracing::init_test_tracing();

    let mut p = real4_pointer(1)?;
    let mut errmsg = [b'x'; 40];
    let stat = pointer_deallocate(&mut p, StatMode::report_into(&mut errmsg), source_location!());
    assert_eq!(stat, CFI_ERROR_BASE_ADDR_NULL);
    assert_eq!(&errmsg[..28], b"descriptor is not associated");
    assert!(errmsg[28..].iter().all(|&b| b == b' '));
    Ok(())
}

#[test]
#[should_panic(expected = "pointer_runtime.rs")]
fn test_deallocate_unassociated_aborts() {
    stride_tracing::init_test_tracing();

    let mut p = Descriptor::establish_intrinsic(TypeCode::real(4), 1, Attribute::Pointer).unwrap();
    pointer_deallocate(&mut p, StatMode::Abort, source_location!());
}
