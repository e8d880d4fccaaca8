#![warn(unsafe_op_in_unsafe_fn)]
#![allow(unused_unsafe)]
#![allow(clippy::missing_safety_doc)]

/// A tally counter with a COM-style interface.  This module stands in for a foreign library
/// that hands out reference-counted objects through output parameters.
mod tally {
    use comrc_ptr::{interface, IUnknown, IUnknownVtbl, Iid, Interface, Status};
    use std::cell::Cell;
    use std::ffi::c_void;

    /// ```c
    /// typedef struct counter_t { const counter_vtbl_t *vtbl; } counter_t;
    /// ```
    #[interface("9e2c4b1d-52a7-4c0e-8f61-0b8d7e3a6c10")]
    #[repr(C)]
    pub struct ICounter {
        vtbl: *const ICounterVtbl,
    }

    #[repr(C)]
    struct ICounterVtbl {
        unknown: IUnknownVtbl,
        hit: unsafe extern "system" fn(this: *mut ICounter) -> u32,
    }

    impl ICounter {
        /// Count a hit, returning the new total.
        pub fn hit(&self) -> u32 {
            let this = self as *const ICounter as *mut ICounter;
            // SAFETY: self is a live ICounter
            unsafe { ((*self.vtbl).hit)(this) }
        }
    }

    #[repr(C)]
    struct Counter {
        counter: ICounter,
        refs: Cell<u32>,
        hits: Cell<u32>,
    }

    static COUNTER_VTBL: ICounterVtbl = ICounterVtbl {
        unknown: IUnknownVtbl {
            query_interface,
            add_ref,
            release,
        },
        hit,
    };

    unsafe extern "system" fn query_interface(
        this: *mut IUnknown,
        iid: *const Iid,
        out: *mut *mut c_void,
    ) -> Status {
        // SAFETY: this, iid, and out are valid (QueryInterface contract)
        unsafe {
            if *iid == IUnknown::IID || *iid == ICounter::IID {
                add_ref(this);
                *out = this as *mut c_void;
                Status::OK
            } else {
                *out = std::ptr::null_mut();
                Status::NO_INTERFACE
            }
        }
    }

    unsafe extern "system" fn add_ref(this: *mut IUnknown) -> u32 {
        let counter = unsafe { &*(this as *mut Counter) };
        counter.refs.set(counter.refs.get() + 1);
        counter.refs.get()
    }

    unsafe extern "system" fn release(this: *mut IUnknown) -> u32 {
        let remaining = {
            let counter = unsafe { &*(this as *mut Counter) };
            counter.refs.set(counter.refs.get() - 1);
            counter.refs.get()
        };
        if remaining == 0 {
            println!("counter destroyed");
            drop(unsafe { Box::from_raw(this as *mut Counter) });
        }
        remaining
    }

    unsafe extern "system" fn hit(this: *mut ICounter) -> u32 {
        let counter = unsafe { &*(this as *mut Counter) };
        counter.hits.set(counter.hits.get() + 1);
        counter.hits.get()
    }

    /// Create a new counter.
    ///
    /// ```c
    /// status_t counter_new(uint32_t start, counter_t **counter_out);
    /// ```
    pub unsafe extern "C" fn counter_new(start: u32, counter_out: *mut *mut ICounter) -> Status {
        if counter_out.is_null() {
            return Status::POINTER;
        }
        if start > 1000 {
            unsafe { *counter_out = std::ptr::null_mut() };
            return Status::INVALID_ARG;
        }
        let counter = Box::new(Counter {
            counter: ICounter {
                vtbl: &COUNTER_VTBL,
            },
            refs: Cell::new(1),
            hits: Cell::new(start),
        });
        unsafe { *counter_out = Box::into_raw(counter) as *mut ICounter };
        Status::OK
    }
}

use comrc_ptr::{ComPtr, IUnknown};
use tally::{counter_new, ICounter};

fn main() {
    // produce a handle from a function with an output parameter
    let counter = ComPtr::<ICounter>::produce(|out| unsafe { counter_new(10, out) })
        .expect("counter_new failed");
    println!("hit -> {}", counter.hit());

    // clones share the object
    let other = counter.clone();
    println!("hit via clone -> {}", other.hit());

    // query through IUnknown and back
    let unknown: ComPtr<IUnknown> = counter.upcast();
    let again: ComPtr<ICounter> = unknown.query();
    println!("hit via query -> {}", again.hit());

    // an output parameter replaces what a handle already holds
    let mut slot = other;
    let status = unsafe { counter_new(0, slot.out_param().as_mut_ptr()) };
    println!("replaced: {} (first hit on new counter -> {})", status, slot.hit());

    // failures come back as a Status
    match ComPtr::<ICounter>::produce(|out| unsafe { counter_new(5000, out) }) {
        Ok(_) => println!("unexpected success"),
        Err(status) => println!("counter_new(5000) failed: {}", status),
    }

    drop((counter, unknown, again));
    println!("dropping the last handle");
    drop(slot);
}
