//! Format discovery and selection.

pub mod aspect;
pub mod catalog;
pub mod selector;

pub use aspect::AspectRatioClass;
pub use catalog::{list_formats, FormatCatalog};
pub use selector::{
    select_best_format, select_format, FormatSelection, SelectionCriteria, SelectionFallback,
    DEFAULT_ASPECT_TOLERANCE,
};
