//! The objects behind the shape interfaces.  These are allocated with `malloc`, as a C library
//! would, and count their own references atomically.

use crate::{ICircle, ICircleVtbl, IScalable, IScalableVtbl, IShape, IShapeVtbl};
use comrc_ptr::{IUnknown, IUnknownVtbl, Iid, Interface, Status};
use log::trace;
use std::ffi::c_void;
use std::mem::{self, offset_of};
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicU32, AtomicU64, AtomicUsize, Ordering};

static LIVE_OBJECTS: AtomicUsize = AtomicUsize::new(0);

/// Get the number of shape objects that have been created and not yet destroyed.
pub fn live_objects() -> usize {
    LIVE_OBJECTS.load(Ordering::SeqCst)
}

/// Allocate and initialize an object with malloc, returning None if allocation fails.
fn alloc<T>(value: T) -> Option<NonNull<T>> {
    // SAFETY: malloc returns NULL or memory suitably aligned for any fundamental type
    let ptr = NonNull::new(unsafe { libc::malloc(mem::size_of::<T>()) } as *mut T)?;
    // SAFETY: ptr is valid for a write of one T
    unsafe { ptr.as_ptr().write(value) };
    LIVE_OBJECTS.fetch_add(1, Ordering::SeqCst);
    Some(ptr)
}

/// Drop and free an object created with [`alloc`].
///
/// # Safety
///
/// * `ptr` must have come from `alloc`, and must not be used after this call.
unsafe fn free<T>(ptr: *mut T) {
    // SAFETY: see docstring
    unsafe {
        ptr::drop_in_place(ptr);
        libc::free(ptr as *mut c_void);
    }
    LIVE_OBJECTS.fetch_sub(1, Ordering::SeqCst);
    trace!("destroyed {} at {:p}", std::any::type_name::<T>(), ptr);
}

fn add_ref(refs: &AtomicU32) -> u32 {
    refs.fetch_add(1, Ordering::Relaxed) + 1
}

/// Decrement the count, returning the remaining count.  When this returns zero, the caller
/// must destroy the object.
fn release(refs: &AtomicU32) -> u32 {
    let remaining = refs.fetch_sub(1, Ordering::Release) - 1;
    if remaining == 0 {
        fence(Ordering::Acquire);
    }
    remaining
}

/// Write a query result, adding the reference it represents.
///
/// # Safety
///
/// * `out` must be valid for a pointer write.
unsafe fn found(refs: &AtomicU32, ptr: *mut c_void, out: *mut *mut c_void) -> Status {
    add_ref(refs);
    // SAFETY: see docstring
    unsafe { *out = ptr };
    Status::OK
}

/// # Safety
///
/// * `out` must be valid for a pointer write.
unsafe fn not_found(out: *mut *mut c_void) -> Status {
    // SAFETY: see docstring
    unsafe { *out = ptr::null_mut() };
    Status::NO_INTERFACE
}

// --- Circle

/// A circle implements IShape and ICircle at its start, and IScalable in a second vtable.
#[repr(C)]
pub(crate) struct Circle {
    circle: ICircle,
    scalable: IScalable,
    refs: AtomicU32,
    // f64 bits
    radius: AtomicU64,
}

impl Circle {
    /// Create a new circle, returning its sole reference.
    pub(crate) fn new(radius: f64) -> Option<NonNull<ICircle>> {
        let circle = alloc(Circle {
            circle: ICircle {
                vtbl: &CIRCLE_VTBL,
            },
            scalable: IScalable {
                vtbl: &CIRCLE_SCALABLE_VTBL,
            },
            refs: AtomicU32::new(1),
            radius: AtomicU64::new(radius.to_bits()),
        })?;
        Some(circle.cast())
    }

    fn radius(&self) -> f64 {
        f64::from_bits(self.radius.load(Ordering::Relaxed))
    }

    fn from_scalable<T>(this: *mut T) -> *mut Circle {
        (this as *mut u8).wrapping_sub(offset_of!(Circle, scalable)) as *mut Circle
    }

    unsafe fn query_interface(this: *mut Circle, iid: *const Iid, out: *mut *mut c_void) -> Status {
        if iid.is_null() || out.is_null() {
            return Status::POINTER;
        }
        // SAFETY: this is live, iid and out are valid (QueryInterface contract)
        unsafe {
            let refs = &(*this).refs;
            match *iid {
                iid if iid == IUnknown::IID || iid == IShape::IID || iid == ICircle::IID => {
                    found(refs, ptr::addr_of_mut!((*this).circle) as *mut c_void, out)
                }
                iid if iid == IScalable::IID => {
                    found(refs, ptr::addr_of_mut!((*this).scalable) as *mut c_void, out)
                }
                _ => not_found(out),
            }
        }
    }

    unsafe fn release(this: *mut Circle) -> u32 {
        // SAFETY: this is live until its count reaches zero
        let remaining = release(unsafe { &(*this).refs });
        if remaining == 0 {
            // SAFETY: the last reference is gone
            unsafe { free(this) };
        }
        remaining
    }
}

static CIRCLE_VTBL: ICircleVtbl = ICircleVtbl {
    shape: IShapeVtbl {
        unknown: IUnknownVtbl {
            query_interface: circle_query_interface,
            add_ref: circle_add_ref,
            release: circle_release,
        },
        area: circle_area,
        sides: circle_sides,
    },
    radius: circle_radius,
};

static CIRCLE_SCALABLE_VTBL: IScalableVtbl = IScalableVtbl {
    unknown: IUnknownVtbl {
        query_interface: circle_scalable_query_interface,
        add_ref: circle_scalable_add_ref,
        release: circle_scalable_release,
    },
    scale: circle_scale,
};

unsafe extern "system" fn circle_query_interface(
    this: *mut IUnknown,
    iid: *const Iid,
    out: *mut *mut c_void,
) -> Status {
    unsafe { Circle::query_interface(this as *mut Circle, iid, out) }
}

unsafe extern "system" fn circle_add_ref(this: *mut IUnknown) -> u32 {
    add_ref(unsafe { &(*(this as *mut Circle)).refs })
}

unsafe extern "system" fn circle_release(this: *mut IUnknown) -> u32 {
    unsafe { Circle::release(this as *mut Circle) }
}

unsafe extern "system" fn circle_area(this: *mut IShape) -> f64 {
    let radius = unsafe { (*(this as *mut Circle)).radius() };
    std::f64::consts::PI * radius * radius
}

unsafe extern "system" fn circle_sides(_this: *mut IShape) -> u32 {
    0
}

unsafe extern "system" fn circle_radius(this: *mut ICircle) -> f64 {
    unsafe { (*(this as *mut Circle)).radius() }
}

unsafe extern "system" fn circle_scalable_query_interface(
    this: *mut IUnknown,
    iid: *const Iid,
    out: *mut *mut c_void,
) -> Status {
    unsafe { Circle::query_interface(Circle::from_scalable(this), iid, out) }
}

unsafe extern "system" fn circle_scalable_add_ref(this: *mut IUnknown) -> u32 {
    add_ref(unsafe { &(*Circle::from_scalable(this)).refs })
}

unsafe extern "system" fn circle_scalable_release(this: *mut IUnknown) -> u32 {
    unsafe { Circle::release(Circle::from_scalable(this)) }
}

unsafe extern "system" fn circle_scale(this: *mut IScalable, factor: f64) -> Status {
    if !(factor > 0.0) {
        return Status::INVALID_ARG;
    }
    let circle = unsafe { &*Circle::from_scalable(this) };
    circle
        .radius
        .store((circle.radius() * factor).to_bits(), Ordering::Relaxed);
    Status::OK
}

// --- Square

/// A square implements only IShape.
#[repr(C)]
pub(crate) struct Square {
    shape: IShape,
    refs: AtomicU32,
    side: f64,
}

impl Square {
    /// Create a new square, returning its sole reference.
    pub(crate) fn new(side: f64) -> Option<NonNull<IShape>> {
        let square = alloc(Square {
            shape: IShape {
                vtbl: &SQUARE_VTBL,
            },
            refs: AtomicU32::new(1),
            side,
        })?;
        Some(square.cast())
    }
}

static SQUARE_VTBL: IShapeVtbl = IShapeVtbl {
    unknown: IUnknownVtbl {
        query_interface: square_query_interface,
        add_ref: square_add_ref,
        release: square_release,
    },
    area: square_area,
    sides: square_sides,
};

unsafe extern "system" fn square_query_interface(
    this: *mut IUnknown,
    iid: *const Iid,
    out: *mut *mut c_void,
) -> Status {
    if iid.is_null() || out.is_null() {
        return Status::POINTER;
    }
    let this = this as *mut Square;
    // SAFETY: this is live, iid and out are valid (QueryInterface contract)
    unsafe {
        let iid = *iid;
        if iid == IUnknown::IID || iid == IShape::IID {
            found(&(*this).refs, this as *mut c_void, out)
        } else {
            not_found(out)
        }
    }
}

unsafe extern "system" fn square_add_ref(this: *mut IUnknown) -> u32 {
    add_ref(unsafe { &(*(this as *mut Square)).refs })
}

unsafe extern "system" fn square_release(this: *mut IUnknown) -> u32 {
    let this = this as *mut Square;
    let remaining = release(unsafe { &(*this).refs });
    if remaining == 0 {
        // SAFETY: the last reference is gone
        unsafe { free(this) };
    }
    remaining
}

unsafe extern "system" fn square_area(this: *mut IShape) -> f64 {
    let side = unsafe { (*(this as *mut Square)).side };
    side * side
}

unsafe extern "system" fn square_sides(_this: *mut IShape) -> u32 {
    4
}
