use crate::{ComPtr, Interface};
use log::trace;
use std::ffi::c_void;

/// OutParam lets a [`ComPtr`] be filled in by a function that returns a new reference through
/// a `T**` "output parameter".
///
/// The OutParam holds a slot, initially containing the ComPtr's current pointer, and exposes
/// the slot's address with [`OutParam::as_mut_ptr`].  When the OutParam is dropped, if the
/// slot no longer contains the original pointer, the ComPtr adopts the new value (without
/// incrementing it) and its previous reference is released.  If the slot is unchanged, the
/// ComPtr is left alone.
///
/// The ComPtr is mutably borrowed for the life of the OutParam, so it cannot be observed in an
/// intermediate state.  OutParams are not Clone; moving one moves the responsibility to
/// update the ComPtr along with it.
///
/// It is most convenient to create an OutParam as a temporary, which is dropped at the end of
/// the statement containing the call:
///
/// ```
/// # use comrc_ptr::{ComPtr, IUnknown, Status};
/// # unsafe extern "C" fn make_widget(_size: u32, out: *mut *mut IUnknown) -> Status {
/// #     unsafe { *out = std::ptr::null_mut() };
/// #     Status::OK
/// # }
/// let mut widget: ComPtr<IUnknown> = ComPtr::null();
/// // SAFETY: make_widget writes an owned reference or NULL
/// let status = unsafe { make_widget(10, widget.out_param().as_mut_ptr()) };
/// ```
///
/// # Safety
///
/// Although creating and dropping an OutParam is safe, whatever is written to the slot is
/// adopted by the ComPtr.  The code writing to the slot (necessarily `unsafe`) must write
/// either NULL or a pointer to a live object implementing `T`, representing a reference that
/// it transfers to the caller.  It must not release the reference that was in the slot.
pub struct OutParam<'a, T: Interface> {
    target: &'a mut ComPtr<T>,
    original: *mut T,
    slot: *mut T,
}

impl<'a, T: Interface> OutParam<'a, T> {
    pub(crate) fn bind(target: &'a mut ComPtr<T>) -> Self {
        let original = target.as_ptr();
        OutParam {
            target,
            original,
            slot: original,
        }
    }

    /// Get a pointer to the slot, suitable for passing as a `T**` argument.
    ///
    /// The pointer is valid until the OutParam is moved or dropped.
    pub fn as_mut_ptr(&mut self) -> *mut *mut T {
        &mut self.slot
    }

    /// Get a pointer to the slot, suitable for passing as a `void**` argument, such as the
    /// output of `QueryInterface`.
    ///
    /// The pointer is valid until the OutParam is moved or dropped.
    pub fn as_void_ptr(&mut self) -> *mut *mut c_void {
        self.as_mut_ptr() as *mut *mut c_void
    }

    /// Get the slot's current value.
    pub fn get(&self) -> *mut T {
        self.slot
    }

    /// Check whether the slot has been written with a different pointer.
    pub fn is_changed(&self) -> bool {
        self.slot != self.original
    }
}

impl<T: Interface> Drop for OutParam<'_, T> {
    fn drop(&mut self) {
        if !self.is_changed() {
            return;
        }
        trace!(
            "out param replaced {:p} with {:p}",
            self.original,
            self.slot
        );
        // SAFETY: the writer of the slot transferred ownership of this reference (see the
        // type's docstring)
        unsafe { self.target.reset(self.slot) };
    }
}
