mod decode;
pub mod evidence;
mod names;
mod report;
mod result;
mod scanner;
mod searcher;
pub mod signature;
pub mod validation;

pub use decode::*;
pub use names::{FIRST_NAME, preview_names};
pub use report::SearchReport;
pub use result::*;
pub use scanner::PatternCursor;
pub use searcher::*;
pub use signature::{BYTE_PROPERTY, SignatureSet};
