use std::error::Error;
use std::fmt;

/// Status is the result code returned across the interface boundary, compatible with an
/// `HRESULT`: a value is a success if it is non-negative, and a failure otherwise.
///
/// Only a few codes have names here; any other value may be carried and compared.
///
/// ```c
/// typedef int32_t status_t;
/// ```
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    /// The operation succeeded.
    pub const OK: Status = Status(0);
    /// The operation succeeded, with a negative answer.
    pub const FALSE: Status = Status(1);
    /// The object does not support the requested interface.
    pub const NO_INTERFACE: Status = Status(0x8000_4002_u32 as i32);
    /// A required pointer was NULL.
    pub const POINTER: Status = Status(0x8000_4003_u32 as i32);
    /// Unspecified failure.
    pub const FAIL: Status = Status(0x8000_4005_u32 as i32);
    /// Memory could not be allocated.
    pub const OUT_OF_MEMORY: Status = Status(0x8007_000E_u32 as i32);
    /// One or more arguments are not valid.
    pub const INVALID_ARG: Status = Status(0x8007_0057_u32 as i32);

    /// Check whether this is a success code.
    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// Check whether this is a failure code.
    pub const fn is_err(self) -> bool {
        !self.is_ok()
    }

    /// Convert this status into a Result, so that failures can be propagated with `?`.
    ///
    /// Note that all success codes, including [`Status::FALSE`], become `Ok(())`.
    pub fn ok(self) -> Result<(), Status> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Status::OK => "success",
            Status::FALSE => "success (false)",
            Status::NO_INTERFACE => "interface not supported",
            Status::POINTER => "invalid NULL pointer",
            Status::FAIL => "unspecified failure",
            Status::OUT_OF_MEMORY => "out of memory",
            Status::INVALID_ARG => "invalid argument",
            _ => return None,
        })
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::OK
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(desc) => write!(f, "{} (0x{:08X})", desc, self.0 as u32),
            None => write!(f, "status 0x{:08X}", self.0 as u32),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status(0x{:08X})", self.0 as u32)
    }
}

impl Error for Status {}
