pub mod extractor;

pub use extractor::{parse_selectors, FieldExtractor, FieldSelectors};
