//! Overlay a simple electronic signature stamp onto pages of an existing PDF.
//!
//! ```no_run
//! use sign_stamp::config::{StampSettings, UserData};
//! use sign_stamp::pdf::{add_signature_stamp, PageSelection};
//! use std::path::Path;
//!
//! let user = UserData {
//!     name: "Jane Doe".to_string(),
//!     signature_hash: "kfkasdhfjaksdhjf1234567890abcdef".to_string(),
//! };
//! add_signature_stamp(
//!     Path::new("input.pdf"),
//!     Path::new("output.pdf"),
//!     &user,
//!     PageSelection::from_options(false, None),
//!     &StampSettings::default(),
//! )?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod pdf;
