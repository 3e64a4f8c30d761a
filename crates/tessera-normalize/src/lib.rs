//! Tessera Normalize
//!
//! Turns the loosely-structured text a generation service returns into a
//! well-formed record, never failing:
//!
//! 1. [`strip_wrappers`] removes fenced-code delimiters, `<json>` tags and
//!    surrounding prose.
//! 2. [`extract_json`] isolates the first balanced JSON object or array.
//! 3. [`repair_truncated`] closes strings and brackets a cut-off response
//!    left open.
//! 4. [`normalize`] projects the parsed value onto a defaults object, field
//!    by field, substituting the default wherever a field is missing or has
//!    the wrong type.
//!
//! Typed consumers implement [`Normalize`] and call [`normalize_as`], or
//! [`normalize_into`] when some fields come from context rather than from
//! the response.

mod extract;
mod normalize;
mod result;

pub use extract::{extract_json, repair_truncated, strip_wrappers};
pub use normalize::{Normalize, normalize, normalize_as, normalize_into};
pub use result::{Issue, NormalizedResult};
