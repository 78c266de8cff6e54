//! Configuration identity.
//!
//! A [`Coordinate`] names a configuration; an [`ExternalId`] is the stable
//! identifier derived from it and embedded into deployed remote objects.

mod coordinate;
mod external_id;

pub use coordinate::Coordinate;
pub use external_id::{DOCUMENT_ID_PREFIX, EXTERNAL_ID_PREFIX, ExternalId, MAX_EXTERNAL_ID_LEN};
