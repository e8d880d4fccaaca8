use crate::{Iid, Status};
use std::ffi::c_void;
use std::ptr::NonNull;

/// Interface is implemented by every type that a [`crate::ComPtr`] can point to.
///
/// An interface type is never instantiated by Rust code: it describes the layout of a
/// foreign object, which begins with a pointer to a vtable whose first three entries are
/// those of [`IUnknownVtbl`].  The object counts its own references, so all lifetime
/// management is delegated to those three entries.
///
/// Implementations are usually generated with [`crate::interface`].
///
/// # Safety
///
/// * `Self` must be `#[repr(C)]` (or `#[repr(transparent)]`) with a first field that is a
///   pointer to a vtable beginning with the fields of [`IUnknownVtbl`], in order.
/// * `IID` must uniquely identify this interface: an object answering `QueryInterface`
///   for `IID` must return a pointer that is valid as a `*mut Self`.
pub unsafe trait Interface: Sized {
    /// The identifier passed to `QueryInterface` to obtain this interface.
    const IID: Iid;
}

/// Inherits indicates that an interface statically extends another, so that every `*mut Self`
/// is also a valid `*mut U`.  This is what makes [`crate::ComPtr::upcast`] infallible.
///
/// Every interface inherits [`IUnknown`].
///
/// # Safety
///
/// `Self`'s vtable must begin with all of `U`'s vtable entries, in order, with the same
/// signatures.
pub unsafe trait Inherits<U: Interface>: Interface {}

// SAFETY: the Interface contract requires an IUnknownVtbl prefix
unsafe impl<T: Interface> Inherits<IUnknown> for T {}

/// The vtable prefix shared by every interface.
///
/// ```c
/// typedef struct unknown_vtbl_t {
///     status_t (*query_interface)(unknown_t *self, const iid_t *iid, void **out);
///     uint32_t (*add_ref)(unknown_t *self);
///     uint32_t (*release)(unknown_t *self);
/// } unknown_vtbl_t;
/// ```
#[repr(C)]
pub struct IUnknownVtbl {
    /// Write a new reference to the requested interface to `*out`, or NULL on failure.
    pub query_interface:
        unsafe extern "system" fn(this: *mut IUnknown, iid: *const Iid, out: *mut *mut c_void) -> Status,
    /// Increment the reference count, returning the new count.
    pub add_ref: unsafe extern "system" fn(this: *mut IUnknown) -> u32,
    /// Decrement the reference count, destroying the object when it reaches zero.  Returns
    /// the remaining count.
    pub release: unsafe extern "system" fn(this: *mut IUnknown) -> u32,
}

/// The root interface.
#[repr(C)]
pub struct IUnknown {
    pub vtbl: *const IUnknownVtbl,
}

// SAFETY: IUnknown is the vtable prefix itself
unsafe impl Interface for IUnknown {
    const IID: Iid = Iid::from_u128(0x00000000_0000_0000_c000_000000000046);
}

impl IUnknown {
    /// Call the object's `add_ref`.
    ///
    /// # Safety
    ///
    /// * `this` must point to a live object implementing `T`.
    pub(crate) unsafe fn add_ref<T: Interface>(this: NonNull<T>) -> u32 {
        let this = this.cast::<IUnknown>().as_ptr();
        // SAFETY:
        //  - this is live (see docstring)
        //  - T begins with an IUnknownVtbl pointer (Interface contract)
        unsafe { ((*(*this).vtbl).add_ref)(this) }
    }

    /// Call the object's `release`.
    ///
    /// # Safety
    ///
    /// * `this` must point to a live object implementing `T`.
    /// * the caller must own one reference, which is consumed by this call.  The object may
    ///   not be used afterward unless another reference is held.
    pub(crate) unsafe fn release<T: Interface>(this: NonNull<T>) -> u32 {
        let this = this.cast::<IUnknown>().as_ptr();
        // SAFETY:
        //  - this is live (see docstring)
        //  - T begins with an IUnknownVtbl pointer (Interface contract)
        unsafe { ((*(*this).vtbl).release)(this) }
    }

    /// Call the object's `query_interface`.
    ///
    /// # Safety
    ///
    /// * `this` must point to a live object implementing `T`.
    /// * `out` must not be NULL and must point to valid, properly aligned memory for a pointer.
    pub(crate) unsafe fn query_interface<T: Interface>(
        this: NonNull<T>,
        iid: &Iid,
        out: *mut *mut c_void,
    ) -> Status {
        debug_assert!(!out.is_null());
        let this = this.cast::<IUnknown>().as_ptr();
        // SAFETY:
        //  - this is live (see docstring)
        //  - T begins with an IUnknownVtbl pointer (Interface contract)
        //  - out is valid (see docstring)
        unsafe { ((*(*this).vtbl).query_interface)(this, iid, out) }
    }
}
