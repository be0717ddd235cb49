//! PDF side of the stamping: rendering the stamp and merging it onto pages.

pub mod content;
pub mod document;
pub mod fonts;
pub mod resources;
pub mod stamp;

pub use document::{add_signature_stamp, stamp_document, PageSelection, StampReport};
pub use stamp::{PageSize, StampRenderer};
