//! SEO metadata derived from a post caption.
//!
//! Both halves are pure text transforms:
//! - `sanitize`: bounded, single-line normalization of free text
//! - `generator`: caption → title, description and tag list
//!
//! Nothing here touches the network or the filesystem, so the same caption
//! always yields the same metadata.

pub mod generator;
pub mod sanitize;

pub use generator::{
    generate, SeoMetadata, DEFAULT_TITLE, DESCRIPTION_FOOTER, MAX_TAGS, STOPWORDS,
    TITLE_MAX_CHARS,
};
pub use sanitize::sanitize;
