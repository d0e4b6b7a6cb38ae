//! Storage key validation shared by every backend.
//!
//! Keys become file names in the filesystem backend, so the rules are the
//! strictest any backend needs: non-empty, at most 255 bytes, no path
//! separators, no NUL, and no leading `.` (reserved for temp files).

use crate::error::StoreError;

const MAX_KEY_LEN: usize = 255;

pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let ok = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && !key.contains(['/', '\\', '\0']);
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
