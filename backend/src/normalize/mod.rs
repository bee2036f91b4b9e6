//! Value normalizers.
//!
//! Pure conversions from raw cells into canonical representations:
//! - `number`: locale-aware decimal parsing
//! - `scale`: named scaled-integer rules (integer cents, milligrams)
//! - `date`: multi-format date parsing

pub mod date;
pub mod number;
pub mod scale;

pub use date::{canonical_date, from_serial, parse_date, parse_date_str};
pub use number::{parse_number, parse_number_str};
pub use scale::{ScaleOutcome, ScaleRule};
