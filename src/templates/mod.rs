pub mod catalog;
pub mod helpers;
pub mod html;
pub mod layout;
pub mod template_engine;
pub mod view;

pub use catalog::{CategorySummary, TemplateCatalog, TemplateCategory, TemplateDescriptor, CATALOG};
pub use html::HtmlRenderer;
pub use layout::*;
pub use template_engine::*;
pub use view::*;
