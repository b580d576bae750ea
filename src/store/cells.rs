//! Typed cell accessors.
//!
//! Integers are stored as lowercase hex text, booleans as `0`/`1`, strings as UTF-8.
//! A cell that was never written reads as `None`; a cell that can't be decoded is
//! logged and also reads as `None`, so callers fall back to their default.

use super::{RowId, RowStore, Token};
use crate::error::StoreError;

impl RowStore {
    pub fn get_string(&self, row: RowId, token: Token) -> Result<Option<String>, StoreError> {
        let Some(bytes) = self.get_cell(row, token)? else {
            return Ok(None);
        };
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(Some(s.to_string())),
            Err(e) => {
                tracing::warn!(
                    "Cell {} of row {:?} is not UTF-8: {}",
                    self.token_name(token).unwrap_or("?"),
                    row,
                    e
                );
                Ok(None)
            }
        }
    }

    pub fn get_u32(&self, row: RowId, token: Token) -> Result<Option<u32>, StoreError> {
        Ok(self
            .get_hex(row, token)?
            .and_then(|value| match u32::try_from(value) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Cell value {:x} of row {:?} overflows u32", value, row);
                    None
                }
            }))
    }

    pub fn get_u64(&self, row: RowId, token: Token) -> Result<Option<u64>, StoreError> {
        self.get_hex(row, token)
    }

    pub fn get_bool(&self, row: RowId, token: Token) -> Result<Option<bool>, StoreError> {
        Ok(self.get_u32(row, token)?.map(|v| v != 0))
    }

    fn get_hex(&self, row: RowId, token: Token) -> Result<Option<u64>, StoreError> {
        let Some(bytes) = self.get_cell(row, token)? else {
            return Ok(None);
        };
        let parsed = std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| u64::from_str_radix(s, 16).ok());
        if parsed.is_none() {
            tracing::warn!(
                "Cell {} of row {:?} is not a hex integer: {:?}",
                self.token_name(token).unwrap_or("?"),
                row,
                String::from_utf8_lossy(bytes)
            );
        }
        Ok(parsed)
    }

    pub fn set_string(&mut self, row: RowId, token: Token, value: &str) -> Result<(), StoreError> {
        self.set_cell(row, token, value.as_bytes())
    }

    pub fn set_u32(&mut self, row: RowId, token: Token, value: u32) -> Result<(), StoreError> {
        self.set_u64(row, token, u64::from(value))
    }

    pub fn set_u64(&mut self, row: RowId, token: Token, value: u64) -> Result<(), StoreError> {
        self.set_cell(row, token, format!("{value:x}").as_bytes())
    }

    pub fn set_bool(&mut self, row: RowId, token: Token, value: bool) -> Result<(), StoreError> {
        self.set_u32(row, token, u32::from(value))
    }

    //
    // Named properties: resolve the name once, then go through the token
    //

    pub fn get_property(&mut self, row: RowId, name: &str) -> Result<Option<String>, StoreError> {
        let token = self.token(name);
        self.get_string(row, token)
    }

    pub fn set_property(&mut self, row: RowId, name: &str, value: &str) -> Result<(), StoreError> {
        let token = self.token(name);
        self.set_string(row, token, value)
    }

    pub fn get_u32_property(
        &mut self,
        row: RowId,
        name: &str,
        default: u32,
    ) -> Result<u32, StoreError> {
        let token = self.token(name);
        Ok(self.get_u32(row, token)?.unwrap_or(default))
    }

    pub fn set_u32_property(
        &mut self,
        row: RowId,
        name: &str,
        value: u32,
    ) -> Result<(), StoreError> {
        let token = self.token(name);
        self.set_u32(row, token, value)
    }

    pub fn get_u64_property(
        &mut self,
        row: RowId,
        name: &str,
        default: u64,
    ) -> Result<u64, StoreError> {
        let token = self.token(name);
        Ok(self.get_u64(row, token)?.unwrap_or(default))
    }

    pub fn set_u64_property(
        &mut self,
        row: RowId,
        name: &str,
        value: u64,
    ) -> Result<(), StoreError> {
        let token = self.token(name);
        self.set_u64(row, token, value)
    }

    pub fn get_bool_property(
        &mut self,
        row: RowId,
        name: &str,
        default: bool,
    ) -> Result<bool, StoreError> {
        let token = self.token(name);
        Ok(self.get_bool(row, token)?.unwrap_or(default))
    }

    pub fn set_bool_property(
        &mut self,
        row: RowId,
        name: &str,
        value: bool,
    ) -> Result<(), StoreError> {
        let token = self.token(name);
        self.set_bool(row, token, value)
    }
}
