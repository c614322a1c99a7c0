pub mod markup;
pub mod normalize;
pub mod style;

pub use markup::{parse_fragment, serialize, serialize_minified, Element, Node};
pub use normalize::{normalize, printable_nodes, resolve_columns, Normalized};
pub use style::{minify_css, Stylesheet};
