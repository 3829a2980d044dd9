//! Content module - raw records, normalized posts and fragment sanitizing

mod model;
mod post;
mod sanitize;

pub use model::{
    parse_timestamp, QueryResponse, RawFragment, RawImage, RawPostData, RawRecord, RawSection,
};
pub use post::{is_routable_uid, post_path, PostDetail, PostSummary, Section};
pub use sanitize::sanitize_html;
