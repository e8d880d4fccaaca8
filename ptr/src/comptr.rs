use crate::{IUnknown, Iid, Inherits, Interface, OutParam, Status};
use log::debug;
use std::ffi::c_void;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

/// ComPtr owns one reference to an object that counts its own references.
///
/// Cloning a ComPtr calls the object's `add_ref`, and dropping it calls `release`.  Moving a
/// ComPtr moves the reference without touching the count.  A ComPtr may also be null, in which
/// case it owns nothing and makes no calls.
///
/// A ComPtr has the same size and representation as `*mut T`.
///
/// # Creating a ComPtr
///
/// A raw pointer can become a ComPtr in two ways, and the difference matters:
///
/// * [`ComPtr::from_raw`] _adopts_ a reference that the caller already owns, such as one
///   returned from a constructor.  The count is not changed, and the ComPtr will release it.
/// * [`ComPtr::from_raw_shared`] _shares_ a reference owned by someone else, such as a
///   borrowed argument.  The count is incremented first.
///
/// Functions that return a new reference through an output parameter are handled with
/// [`ComPtr::out_param`] or [`ComPtr::produce`].
///
/// # Conversions
///
/// Conversion to a base interface is infallible, and available as [`ComPtr::upcast`] or
/// through `From<&ComPtr<T>>`.  Conversion to any other interface goes through
/// `QueryInterface` and can fail; it is only available explicitly, as [`ComPtr::query`] or
/// [`ComPtr::try_query`].
///
/// # Threads
///
/// ComPtr is `Send` and `Sync` only when the interface type is.  Declaring an interface as
/// such asserts that the object's count is updated atomically.
#[repr(transparent)]
pub struct ComPtr<T: Interface> {
    ptr: Option<NonNull<T>>,
    _phantom: PhantomData<T>,
}

// SAFETY: the object is shared, never the ComPtr's own storage; T asserts thread safety
unsafe impl<T: Interface + Send + Sync> Send for ComPtr<T> {}
// SAFETY: as above
unsafe impl<T: Interface + Send + Sync> Sync for ComPtr<T> {}

impl<T: Interface> ComPtr<T> {
    /// Create a null ComPtr.
    pub const fn null() -> Self {
        ComPtr {
            ptr: None,
            _phantom: PhantomData,
        }
    }

    /// Create a ComPtr that adopts the reference represented by `ptr`, without incrementing
    /// the count.  A NULL pointer results in a null ComPtr.
    ///
    /// # Safety
    ///
    /// * If not NULL, `ptr` must point to a live object implementing `T`.
    /// * The caller must own the reference represented by `ptr`, and must not use it after
    ///   this call.  The ComPtr will release it.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        ComPtr {
            ptr: NonNull::new(ptr),
            _phantom: PhantomData,
        }
    }

    /// Create a ComPtr that shares the reference represented by `ptr`, incrementing the count.
    /// A NULL pointer results in a null ComPtr.
    ///
    /// # Safety
    ///
    /// * If not NULL, `ptr` must point to a live object implementing `T`.
    /// * Ownership of the caller's reference remains with the caller.
    pub unsafe fn from_raw_shared(ptr: *mut T) -> Self {
        if let Some(ptr) = NonNull::new(ptr) {
            // SAFETY: ptr is live (see docstring)
            unsafe { IUnknown::add_ref(ptr) };
        }
        // SAFETY: the reference adopted here is the one just added
        unsafe { Self::from_raw(ptr) }
    }

    /// Check whether this ComPtr is null.
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Check whether this ComPtr holds a reference.
    pub fn is_some(&self) -> bool {
        self.ptr.is_some()
    }

    /// Get the raw pointer, without affecting ownership.  The result is NULL for a null
    /// ComPtr.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Borrow the interface, or None if this ComPtr is null.
    pub fn as_ref(&self) -> Option<&T> {
        // SAFETY: the held reference keeps the object alive for the lifetime of &self
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Return the raw pointer, transferring ownership of the reference to the caller.
    ///
    /// The count is not changed.  To avoid a leak, the caller must eventually release the
    /// reference, for example by passing it back to [`ComPtr::from_raw`].
    #[must_use = "losing the pointer will leak the reference"]
    pub fn into_raw(mut self) -> *mut T {
        self.detach()
    }

    /// Like [`ComPtr::into_raw`], but leaves this ComPtr null instead of consuming it.
    #[must_use = "losing the pointer will leak the reference"]
    pub fn detach(&mut self) -> *mut T {
        self.ptr.take().map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// Take the reference out of this ComPtr, leaving it null.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Release the held reference, if any, and adopt `ptr`.
    ///
    /// The new value is stored before the old reference is released, so this is correct
    /// even when `ptr` is the currently-held pointer.
    ///
    /// # Safety
    ///
    /// As for [`ComPtr::from_raw`].
    pub unsafe fn reset(&mut self, ptr: *mut T) {
        // SAFETY: see docstring
        let new = unsafe { Self::from_raw(ptr) };
        drop(mem::replace(self, new));
    }

    /// Release the held reference, if any, leaving this ComPtr null.
    pub fn clear(&mut self) {
        drop(self.take());
    }

    /// Increment the object's count, returning the new count.
    ///
    /// This is rarely needed: clone the ComPtr instead.  The added reference is not owned by
    /// any ComPtr and will leak unless released separately.
    ///
    /// Calling this on a null ComPtr is a programming error.  It panics in debug builds and
    /// returns 0 otherwise.
    pub fn add_ref(&self) -> u32 {
        debug_assert!(self.is_some(), "add_ref on a null ComPtr");
        match self.ptr {
            // SAFETY: the held reference keeps the object alive
            Some(ptr) => unsafe { IUnknown::add_ref(ptr) },
            None => 0,
        }
    }

    /// Release the held reference, leaving this ComPtr null, and return the object's
    /// remaining count.  A null ComPtr returns 0.
    pub fn release(&mut self) -> u32 {
        match self.ptr.take() {
            // SAFETY: this ComPtr owned the reference, and no longer refers to it
            Some(ptr) => unsafe { IUnknown::release(ptr) },
            None => 0,
        }
    }

    /// Exchange the references held by two ComPtrs.  No counts are changed.
    pub fn swap(&mut self, other: &mut ComPtr<T>) {
        mem::swap(&mut self.ptr, &mut other.ptr);
    }

    /// Convert to a base interface, sharing the reference.  This always succeeds, and
    /// increments the count unless this ComPtr is null.
    pub fn upcast<U: Interface>(&self) -> ComPtr<U>
    where
        T: Inherits<U>,
    {
        // SAFETY:
        //  - a *mut T is a valid *mut U (Inherits contract)
        //  - the held reference keeps the object alive during this call
        unsafe { ComPtr::from_raw_shared(self.as_ptr() as *mut U) }
    }

    /// Convert to a base interface, moving the reference.  No counts are changed.
    pub fn into_upcast<U: Interface>(self) -> ComPtr<U>
    where
        T: Inherits<U>,
    {
        // SAFETY:
        //  - a *mut T is a valid *mut U (Inherits contract)
        //  - into_raw transfers the reference to the new ComPtr
        unsafe { ComPtr::from_raw(self.into_raw() as *mut U) }
    }

    /// Query the object for interface `U`, storing the result in `out`.
    ///
    /// Whatever `out` held before is released once the query returns, and `out` holds the new
    /// reference on success and is null on failure.  A null ComPtr returns
    /// [`Status::POINTER`] without calling the object, and leaves `out` unchanged.
    pub fn query_interface<U: Interface>(&self, out: &mut ComPtr<U>) -> Status {
        let ptr = match self.ptr {
            Some(ptr) => ptr,
            None => return Status::POINTER,
        };
        // the query adds a reference even when it returns the pointer `out` already holds, so
        // it must land in a fresh ComPtr
        let mut fresh: ComPtr<U> = ComPtr::null();
        let status = {
            let mut slot = fresh.out_param();
            // SAFETY:
            //  - the held reference keeps the object alive
            //  - the out param slot is valid for a pointer write
            unsafe { IUnknown::query_interface(ptr, &U::IID, slot.as_void_ptr()) }
        };
        *out = fresh;
        status
    }

    /// Query the object for interface `U`.
    ///
    /// This is an explicit, fallible conversion: the result is null if the object does not
    /// support `U`, or if this ComPtr is null.  In the latter case, the object is not called.
    /// Use [`ComPtr::try_query`] to learn why a query failed.
    pub fn query<U: Interface>(&self) -> ComPtr<U> {
        self.try_query().unwrap_or_default()
    }

    /// Query the object for interface `U`, returning the failure status if the object does not
    /// support it.  A null ComPtr fails with [`Status::POINTER`] without calling the object.
    pub fn try_query<U: Interface>(&self) -> Result<ComPtr<U>, Status> {
        let mut out: ComPtr<U> = ComPtr::null();
        let status = self.query_interface(&mut out);
        if status.is_err() {
            if self.is_some() {
                debug!("query for {} failed: {}", U::IID, status);
            }
            return Err(status);
        }
        if out.is_null() {
            // a success code with no pointer is a broken object; treat it as unsupported
            debug!("query for {} succeeded without a pointer", U::IID);
            return Err(Status::NO_INTERFACE);
        }
        Ok(out)
    }

    /// Query the object for an interface identified only at runtime, writing a new reference
    /// to `*out`.
    ///
    /// A null ComPtr returns [`Status::POINTER`] without calling the object or writing to
    /// `out`.  This is a programming error, and panics in debug builds.
    ///
    /// # Safety
    ///
    /// * `out` must not be NULL, and must point to valid, properly aligned memory for a
    ///   pointer value.
    /// * The caller owns any reference written to `*out`, and must eventually release it.
    pub unsafe fn query_raw(&self, iid: &Iid, out: *mut *mut c_void) -> Status {
        debug_assert!(self.is_some(), "query_raw on a null ComPtr");
        debug_assert!(!out.is_null());
        match self.ptr {
            // SAFETY:
            //  - the held reference keeps the object alive
            //  - out is valid (see docstring)
            Some(ptr) => unsafe { IUnknown::query_interface(ptr, iid, out) },
            None => Status::POINTER,
        }
    }

    /// Bind an [`OutParam`] to this ComPtr, for passing to a function that returns a new
    /// reference through a `T**` output parameter.
    ///
    /// ```
    /// # use comrc_ptr::{ComPtr, IUnknown, Status};
    /// # unsafe extern "C" fn get_thing(out: *mut *mut IUnknown) -> Status {
    /// #     unsafe { *out = std::ptr::null_mut() };
    /// #     Status::OK
    /// # }
    /// let mut thing: ComPtr<IUnknown> = ComPtr::null();
    /// let status = unsafe { get_thing(thing.out_param().as_mut_ptr()) };
    /// assert!(status.is_ok());
    /// ```
    pub fn out_param(&mut self) -> OutParam<'_, T> {
        OutParam::bind(self)
    }

    /// Call a function that returns a new reference through a `T**` output parameter, and
    /// return that reference as a ComPtr.
    ///
    /// A failure status is returned as an error.  If the function reports success without
    /// writing a pointer, the result is a null ComPtr.  Anything written to the output
    /// parameter is released if the function fails.
    ///
    /// ```
    /// # use comrc_ptr::{ComPtr, IUnknown, Status};
    /// # unsafe extern "C" fn open_thing(_path: u32, out: *mut *mut IUnknown) -> Status {
    /// #     unsafe { *out = std::ptr::null_mut() };
    /// #     Status::FAIL
    /// # }
    /// let res = ComPtr::<IUnknown>::produce(|out| unsafe { open_thing(1, out) });
    /// assert_eq!(res.err(), Some(Status::FAIL));
    /// ```
    pub fn produce<F>(f: F) -> Result<ComPtr<T>, Status>
    where
        F: FnOnce(*mut *mut T) -> Status,
    {
        let mut result: ComPtr<T> = ComPtr::null();
        let status = {
            let mut out = result.out_param();
            f(out.as_mut_ptr())
        };
        status.ok()?;
        Ok(result)
    }
}

/// Create a ComPtr adopting `ptr`.  This is equivalent to [`ComPtr::from_raw`], but infers
/// the interface type.
///
/// # Safety
///
/// As for [`ComPtr::from_raw`].
pub unsafe fn adopt<T: Interface>(ptr: *mut T) -> ComPtr<T> {
    // SAFETY: see docstring
    unsafe { ComPtr::from_raw(ptr) }
}

/// Exchange the references held by two ComPtrs.
pub fn swap<T: Interface>(a: &mut ComPtr<T>, b: &mut ComPtr<T>) {
    a.swap(b);
}

impl<T: Interface> Clone for ComPtr<T> {
    fn clone(&self) -> Self {
        if let Some(ptr) = self.ptr {
            // SAFETY: the held reference keeps the object alive
            unsafe { IUnknown::add_ref(ptr) };
        }
        ComPtr {
            ptr: self.ptr,
            _phantom: PhantomData,
        }
    }
}

impl<T: Interface> Drop for ComPtr<T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: this ComPtr owned the reference
            unsafe { IUnknown::release(ptr) };
        }
    }
}

impl<T: Interface> Default for ComPtr<T> {
    fn default() -> Self {
        ComPtr::null()
    }
}

impl<T: Interface> Deref for ComPtr<T> {
    type Target = T;

    /// Borrow the interface.
    ///
    /// This will panic on a null ComPtr.  Use [`ComPtr::as_ref`] where the ComPtr may be null.
    fn deref(&self) -> &T {
        self.as_ref().expect("dereferenced a null ComPtr")
    }
}

impl<T: Inherits<U>, U: Interface> From<&ComPtr<T>> for ComPtr<U> {
    fn from(ptr: &ComPtr<T>) -> ComPtr<U> {
        ptr.upcast()
    }
}

impl<T: Interface> PartialEq for ComPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: Interface> Eq for ComPtr<T> {}

impl<T: Interface> Hash for ComPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ptr().hash(state);
    }
}

impl<T: Interface> fmt::Debug for ComPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComPtr({:p})", self.as_ptr())
    }
}

impl<T: Interface> fmt::Pointer for ComPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}
