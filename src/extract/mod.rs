//! Best-effort content extraction from arbitrary publisher HTML.
//!
//! Two independent concerns: [`text`] pulls the main article text out of an
//! unknown-schema document, [`image`] picks a representative image URL.
//! Both are pure functions over an HTML string, no network and no state,
//! and both degrade instead of failing.

pub mod image;
pub mod text;

pub use image::resolve_image;
pub use text::extract_main_text;
