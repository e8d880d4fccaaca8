use std::error::Error;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// An Iid identifies an interface, and is the tag passed to `QueryInterface`.
///
/// The layout matches the C `GUID` struct, so a `*const Iid` can be handed directly to
/// foreign code expecting a `REFIID`.  Note that this is _not_ the same byte order as
/// [`Uuid::as_bytes`]: the first three fields are native-endian integers.
///
/// ```c
/// typedef struct iid_t {
///     uint32_t data1;
///     uint16_t data2;
///     uint16_t data3;
///     uint8_t data4[8];
/// } iid_t;
/// ```
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Iid {
    /// Build an Iid from its 128-bit big-endian value, as written in the registry form.
    ///
    /// ```
    /// # use comrc_ptr::{Iid, IUnknown, Interface};
    /// const IID_IUNKNOWN: Iid = Iid::from_u128(0x00000000_0000_0000_c000_000000000046);
    /// assert_eq!(IID_IUNKNOWN, IUnknown::IID);
    /// ```
    pub const fn from_u128(value: u128) -> Self {
        Iid {
            data1: (value >> 96) as u32,
            data2: (value >> 80) as u16,
            data3: (value >> 64) as u16,
            data4: (value as u64).to_be_bytes(),
        }
    }

    /// Get the 128-bit big-endian value of this Iid.
    pub const fn as_u128(&self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | (u64::from_be_bytes(self.data4) as u128)
    }
}

impl From<Uuid> for Iid {
    fn from(uuid: Uuid) -> Iid {
        Iid::from_u128(uuid.as_u128())
    }
}

impl From<Iid> for Uuid {
    fn from(iid: Iid) -> Uuid {
        Uuid::from_u128(iid.as_u128())
    }
}

impl FromStr for Iid {
    type Err = InvalidIidError;

    /// Parse any of the forms accepted by [`Uuid::parse_str`], including the braced
    /// registry form.
    fn from_str(s: &str) -> Result<Iid, InvalidIidError> {
        Uuid::parse_str(s)
            .map(Iid::from)
            .map_err(|_| InvalidIidError)
    }
}

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uuid: Uuid = (*self).into();
        // registry form: braced and upper-case
        write!(f, "{:X}", uuid.braced())
    }
}

impl fmt::Debug for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iid({})", self)
    }
}

/// InvalidIidError indicates that a string could not be parsed as an interface identifier.
#[derive(Eq, PartialEq, Debug)]
pub struct InvalidIidError;

impl fmt::Display for InvalidIidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value is not a valid interface identifier")
    }
}

impl Error for InvalidIidError {}
