//! Verify dex files
//!
//! Verification happens in two passes over the same immutable buffer, after the header and the
//! map have been validated:
//!
//!   1. The _intra-item_ pass walks every section listed in the map, in file order. It checks that
//!      each item is well-formed on its own (bounds, alignment, padding, LEB128 and MUTF-8
//!      encodings, counts, indices into the id tables) and records the kind of every data item in
//!      an [`OffsetMap`].
//!
//!   2. The _inter-item_ pass walks the sections again and checks the references between items:
//!      that offsets point at items of the right kind, that the id tables are sorted and unique,
//!      that prototypes agree with their shorties, that class data and annotations belong to the
//!      classes using them, etc. Every offset is classified through the [`OffsetMap`] before
//!      anything is read from it, so the second pass only ever reads bytes which the first pass
//!      already checked.
//!
//! Verification stops at the first problem found. Callers only get one reason per file.
//!
//! See <https://source.android.com/docs/core/runtime/dex-format> for the format itself.

mod access_flags;
mod binary_format;
mod class_data;
mod descriptors;
mod errors;
mod header;
mod items;
mod map;
mod names;
mod offset_map;
mod verifier;

pub use access_flags::*;
pub use binary_format::*;
pub use class_data::*;
pub use descriptors::*;
pub use errors::*;
pub use header::*;
pub use items::*;
pub use map::*;
pub use names::*;
pub use offset_map::*;
pub use verifier::*;

/// Verify that a buffer holds a well-formed dex file
///
/// The `location` is only used to label the failure (typically it is the path the buffer was read
/// from, or something like `base.apk!classes2.dex`).
pub fn verify(data: &[u8], location: &str) -> std::result::Result<(), VerifyError> {
    log::debug!("Verifying '{}' ({} bytes)", location, data.len());
    match Verifier::new(data).and_then(Verifier::run) {
        Ok(_) => {
            log::debug!("Verified '{}'", location);
            Ok(())
        }
        Err(error) => {
            log::debug!("Rejected '{}': {}", location, error);
            Err(VerifyError::new(location, error))
        }
    }
}
