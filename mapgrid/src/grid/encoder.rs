//! UTF-grid text encoding.
//!
//! Each distinct join value is given one character. Codes are handed out in
//! the order values are first met while walking the raster row by row,
//! starting at U+0020 and skipping characters that would need escaping in a
//! JSON string (`"` and `\`) as well as the surrogate block, which has no
//! `char` representation.
//!
//! The empty join value (no feature) is an ordinary value here: it takes
//! whichever code is next when it is first met, and it appears in the key
//! list at that position. A client recovers the key index of a character
//! with:
//!
//! ```text
//! code = char as u32
//! if code >= 93 { code -= 1 }
//! if code >= 35 { code -= 1 }
//! index = code - 32
//! ```

use std::collections::HashMap;

use super::raster::{FeatureKeyTable, IndexedRaster};
use crate::error::{MapError, MapResult};

/// First code handed out.
pub const FIRST_CODE: u32 = 32;

/// `"`
const QUOTE: u32 = 34;
/// `\`
const BACKSLASH: u32 = 92;

const SURROGATES: std::ops::RangeInclusive<u32> = 0xD800..=0xDFFF;

/// Returns true when `code` may be emitted inside a JSON string unescaped.
pub fn is_safe_code(code: u32) -> bool {
    code >= FIRST_CODE && code != QUOTE && code != BACKSLASH && char::from_u32(code).is_some()
}

/// Join value → assigned character, plus the values in assignment order.
#[derive(Debug, Clone)]
pub struct CodeTable {
    codes: HashMap<String, char>,
    order: Vec<String>,
    next: u32,
}

impl Default for CodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeTable {
    pub fn new() -> Self {
        Self {
            codes: HashMap::new(),
            order: Vec::new(),
            next: FIRST_CODE,
        }
    }

    /// Code for `key`, assigning the next free one on first use.
    pub fn code_for(&mut self, key: &str) -> MapResult<char> {
        if let Some(&c) = self.codes.get(key) {
            return Ok(c);
        }
        let c = self.allocate()?;
        self.codes.insert(key.to_string(), c);
        self.order.push(key.to_string());
        Ok(c)
    }

    fn allocate(&mut self) -> MapResult<char> {
        let mut code = self.next;
        while code == QUOTE || code == BACKSLASH || SURROGATES.contains(&code) {
            code += 1;
        }
        let c = char::from_u32(code).ok_or_else(|| {
            MapError::Render("too many distinct keys to encode in one grid".to_string())
        })?;
        self.next = code + 1;
        Ok(c)
    }

    /// Values in the order their codes were assigned.
    pub fn key_order(&self) -> &[String] {
        &self.order
    }

    pub fn into_key_order(self) -> Vec<String> {
        self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Encoded rows and the key order that decodes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRows {
    pub rows: Vec<String>,
    pub keys: Vec<String>,
}

/// Walks `raster` row-major and emits one character per cell.
///
/// # Errors
///
/// `Render` if a cell holds an id the key table does not know, or if the
/// number of distinct values exceeds the character space.
pub fn encode(raster: &IndexedRaster, keys: &FeatureKeyTable) -> MapResult<EncodedRows> {
    let mut table = CodeTable::new();
    let mut rows = Vec::with_capacity(raster.height() as usize);

    for y in 0..raster.height() {
        let mut line = String::with_capacity(raster.width() as usize);
        for &id in raster.row(y) {
            let key = keys.key(id).ok_or_else(|| {
                MapError::Render(format!("feature id {} missing from key table", id))
            })?;
            line.push(table.code_for(key)?);
        }
        rows.push(line);
    }

    Ok(EncodedRows {
        rows,
        keys: table.into_key_order(),
    })
}
