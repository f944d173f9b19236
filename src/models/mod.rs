pub mod client;
pub mod common;
pub mod draft;
pub mod invoice;
pub mod line_item;
pub mod totals;

pub use client::*;
pub use common::*;
pub use draft::*;
pub use invoice::*;
pub use line_item::*;
pub use totals::*;
