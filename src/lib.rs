//! Verify untrusted dex containers before handing them to a runtime
//!
//! A dex file is an offset-addressed container: a fixed header, a handful of id tables (strings,
//! types, prototypes, fields, methods, class definitions) and a data area holding variable-length
//! items (string data, code, class data, debug info, annotations, ...) which refer to each other
//! through table indices and absolute offsets. Everything downstream of the verifier uses those
//! indices and offsets without checking them again, so [`dex::verify`] has to reject anything
//! that is not perfectly well-formed.
//!
//! ```
//! use dexverify::dex::{verify, ErrorKind};
//!
//! let not_a_dex = b"PK\x03\x04 definitely a zip file";
//! let err = verify(not_a_dex, "classes.dex").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Bounds);
//! ```

pub mod dex;
pub mod util;

pub use dex::{verify, VerifyError};
