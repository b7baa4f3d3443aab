pub mod intake;
pub mod intake_link;
pub mod lease;
pub mod patient;
pub mod red_flag;
pub mod summary;

pub use intake::*;
pub use intake_link::*;
pub use lease::*;
pub use patient::*;
pub use red_flag::*;
pub use summary::*;

use std::str::FromStr;

use rusqlite::types::Type;
use uuid::Uuid;

use super::DatabaseError;

/// Parse a TEXT column back into a Uuid inside a row mapper.
pub(crate) fn text_uuid(idx: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a TEXT column back into one of the str_enum types.
pub(crate) fn text_enum<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    raw.parse()
        .map_err(|e: DatabaseError| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })
}
