//! Cell Addressing
//!
//! Column-letter / column-index conversion for the backing-store cell API.
//! The mapping is the usual spreadsheet bijection: index 0 ↔ "A",
//! 25 ↔ "Z", 26 ↔ "AA".

use crate::utils::error::{EngineError, EngineResult};

/// Convert a 0-based column index to its letter form.
pub fn column_index_to_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    // Only ASCII uppercase bytes are pushed above
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert a column letter (e.g. "F", "AA") to its 0-based index.
///
/// Rejects empty strings and non-alphabetic characters with a
/// configuration error; lowercase input is accepted.
pub fn column_letter_to_index(letters: &str) -> EngineResult<usize> {
    if letters.is_empty() {
        return Err(EngineError::configuration("empty column letter"));
    }

    let mut index: usize = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(EngineError::configuration(format!(
                "invalid column letter: {}",
                letters
            )));
        }
        let digit = (ch.to_ascii_uppercase() as usize) - ('A' as usize) + 1;
        index = index * 26 + digit;
    }

    Ok(index - 1)
}

/// Offset a column letter by a number of columns to the right.
pub fn offset_column(letters: &str, offset: usize) -> EngineResult<String> {
    let index = column_letter_to_index(letters)?;
    Ok(column_index_to_letter(index + offset))
}
