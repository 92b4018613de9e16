//! HTTP protocol layer module
//!
//! Protocol-level helpers shared by the page and upload handlers, decoupled
//! from the upload business logic.

pub mod query;
pub mod response;

// Re-export commonly used helpers
pub use query::{parse_query_param, percent_decode};
pub use response::{
    build_404_response, build_405_response, build_413_response, build_500_response,
    build_html_response, build_options_response, build_upload_ok_response,
};
