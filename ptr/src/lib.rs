#![warn(unsafe_op_in_unsafe_fn)]
#![allow(unused_unsafe)]
#![doc = include_str!("crate-doc.md")]

// lets `#[interface]` expansions name `::comrc_ptr` from inside this crate, too
extern crate self as comrc_ptr;

mod comptr;
mod iid;
mod out_param;
mod status;
mod unknown;

pub use comptr::*;
pub use iid::*;
pub use out_param::*;
pub use status::*;
pub use unknown::*;

/// Declare a COM-layout struct as an [`Interface`].
///
/// See the crate documentation for the accepted arguments.
pub use comrc_macros::interface;
