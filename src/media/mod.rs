//! Media references embedded in posts and comments.
//!
//! - [`extract`] scans free text for media links
//! - [`MediaRef::resolve`] maps a reference to its fetch URL and local filename

mod extractor;
mod reference;

pub use extractor::extract;
pub use reference::{MediaRef, ResolvedMedia};
pub(crate) use reference::sanitize_filename;
