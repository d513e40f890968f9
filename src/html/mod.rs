//! HTML processing module
//!
//! Generated pages (table of contents, directory listings) and the reader
//! view rewriting of book documents. Rewriting uses lol_html.

mod listing;
mod rewrite;
mod toc;

pub use listing::{format_size, render_listing, ListingEntry};
pub use rewrite::{decorate, reader_url, LinkAction, NavBar, ReaderLinks, RewriteError};
pub use toc::render_toc;
