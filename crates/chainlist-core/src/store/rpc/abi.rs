//! Contract ABI for the TodoList contract
//!
//! ```text
//! function addTodo(string _text)
//! function toggleTodo(uint256 _index)
//! function deleteTodo(uint256 _index)
//! function getTodos() view returns (tuple(string text, bool completed)[])
//! ```
//!
//! Only the handful of shapes these four functions need are encoded and
//! decoded here: a single dynamic string argument, a single uint256
//! argument, and a dynamic array of `(string, bool)` tuples.

use crate::error::StoreError;
use crate::models::Entry;

/// Size of one ABI word
const WORD: usize = 32;

/// First four bytes of keccak256("addTodo(string)")
pub const ADD_TODO: [u8; 4] = [0x95, 0xff, 0xeb, 0xf5];
/// First four bytes of keccak256("toggleTodo(uint256)")
pub const TOGGLE_TODO: [u8; 4] = [0xdc, 0x00, 0x28, 0x2c];
/// First four bytes of keccak256("deleteTodo(uint256)")
pub const DELETE_TODO: [u8; 4] = [0x6e, 0x3c, 0x67, 0x38];
/// First four bytes of keccak256("getTodos()")
pub const GET_TODOS: [u8; 4] = [0xc3, 0x39, 0x26, 0xcb];

pub fn encode_add_todo(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;

    let mut data = Vec::with_capacity(4 + 2 * WORD + padded);
    data.extend_from_slice(&ADD_TODO);
    // Head: offset of the string's tail, which starts right after the one head word
    data.extend_from_slice(&word(WORD as u64));
    data.extend_from_slice(&word(bytes.len() as u64));
    data.extend_from_slice(bytes);
    data.resize(4 + 2 * WORD + padded, 0);
    data
}

pub fn encode_toggle_todo(index: usize) -> Vec<u8> {
    encode_index_call(TOGGLE_TODO, index)
}

pub fn encode_delete_todo(index: usize) -> Vec<u8> {
    encode_index_call(DELETE_TODO, index)
}

pub fn encode_get_todos() -> Vec<u8> {
    GET_TODOS.to_vec()
}

fn encode_index_call(selector: [u8; 4], index: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + WORD);
    data.extend_from_slice(&selector);
    data.extend_from_slice(&word(index as u64));
    data
}

/// Decode the return data of `getTodos()`
///
/// Layout: a head word pointing at the array; the array's length; one
/// offset per tuple (relative to the first offset word); each tuple is a
/// string offset (relative to the tuple) and a bool word.
pub fn decode_todos(data: &[u8]) -> Result<Vec<Entry>, StoreError> {
    if data.is_empty() {
        return Err(StoreError::Decode(
            "empty return data (is the contract address right?)".to_string(),
        ));
    }

    let array_at = read_usize(data, 0)?;
    let len = read_usize(data, array_at)?;
    let heads_at = checked(array_at, WORD)?;

    // Every tuple needs at least one head word; refuse absurd lengths early
    if len > data.len() / WORD {
        return Err(StoreError::Decode(format!(
            "array length {} exceeds return data",
            len
        )));
    }

    let mut entries = Vec::with_capacity(len);
    for i in 0..len {
        let tuple_at = checked(heads_at, read_usize(data, checked(heads_at, i * WORD)?)?)?;
        let text_at = checked(tuple_at, read_usize(data, tuple_at)?)?;
        let completed = read_bool(data, checked(tuple_at, WORD)?)?;
        let text = read_string(data, text_at)?;
        entries.push(Entry { text, completed });
    }
    Ok(entries)
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn from_hex(s: &str) -> Result<Vec<u8>, StoreError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| StoreError::Decode(format!("invalid hex: {}", e)))
}

/// Parse a JSON-RPC quantity such as `"0x1b4"`
pub fn parse_quantity(s: &str) -> Result<u64, StoreError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| StoreError::Decode(format!("invalid quantity '{}': {}", s, e)))
}

fn word(value: u64) -> [u8; WORD] {
    let mut out = [0u8; WORD];
    out[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    out
}

fn checked(base: usize, offset: usize) -> Result<usize, StoreError> {
    base.checked_add(offset)
        .ok_or_else(|| StoreError::Decode("offset overflow".to_string()))
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], StoreError> {
    let end = checked(at, WORD)?;
    data.get(at..end).ok_or_else(|| {
        StoreError::Decode(format!(
            "word at {} runs past end of data ({} bytes)",
            at,
            data.len()
        ))
    })
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, StoreError> {
    let w = read_word(data, at)?;
    if w[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(StoreError::Decode(format!("value at {} does not fit in 64 bits", at)));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&w[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(low))
        .map_err(|_| StoreError::Decode(format!("value at {} does not fit in usize", at)))
}

fn read_bool(data: &[u8], at: usize) -> Result<bool, StoreError> {
    match read_usize(data, at)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::Decode(format!("invalid bool {} at {}", other, at))),
    }
}

fn read_string(data: &[u8], at: usize) -> Result<String, StoreError> {
    let len = read_usize(data, at)?;
    let start = checked(at, WORD)?;
    let end = checked(start, len)?;
    let bytes = data
        .get(start..end)
        .ok_or_else(|| StoreError::Decode(format!("string at {} runs past end of data", at)))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| StoreError::Decode(format!("string at {} is not UTF-8: {}", at, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u64]) -> Vec<u8> {
        values.iter().flat_map(|v| word(*v)).collect()
    }

    fn padded_text(text: &str) -> Vec<u8> {
        let mut out = text.as_bytes().to_vec();
        out.resize(text.len().div_ceil(WORD) * WORD, 0);
        out
    }

    #[test]
    fn test_encode_add_todo_layout() {
        let data = encode_add_todo("buy milk");

        assert_eq!(&data[..4], &ADD_TODO);
        assert_eq!(data.len(), 4 + 3 * WORD);
        assert_eq!(&data[4..4 + WORD], &word(32));
        assert_eq!(&data[4 + WORD..4 + 2 * WORD], &word(8));
        assert_eq!(&data[4 + 2 * WORD..4 + 2 * WORD + 8], b"buy milk");
        assert!(data[4 + 2 * WORD + 8..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_add_todo_exact_word() {
        let text = "x".repeat(32);
        assert_eq!(encode_add_todo(&text).len(), 4 + 3 * WORD);
        assert_eq!(encode_add_todo("").len(), 4 + 2 * WORD);
    }

    #[test]
    fn test_encode_index_calls() {
        assert_eq!(
            to_hex(&encode_toggle_todo(2)),
            "0xdc00282c0000000000000000000000000000000000000000000000000000000000000002"
        );
        assert_eq!(&encode_delete_todo(0)[..4], &DELETE_TODO);
        assert_eq!(to_hex(&encode_get_todos()), "0xc33926cb");
    }

    #[test]
    fn test_decode_single_entry() {
        // [("x", true)]
        let mut data = words(&[0x20, 1, 0x20, 0x40, 1, 1]);
        data.extend(padded_text("x"));

        let entries = decode_todos(&data).unwrap();
        assert_eq!(entries, vec![Entry::done("x")]);
    }

    #[test]
    fn test_decode_two_entries() {
        // [("buy milk", false), ("walk dog", true)]
        let mut data = words(&[0x20, 2, 0x40, 0xc0]);
        data.extend(words(&[0x40, 0, 8]));
        data.extend(padded_text("buy milk"));
        data.extend(words(&[0x40, 1, 8]));
        data.extend(padded_text("walk dog"));

        let entries = decode_todos(&data).unwrap();
        assert_eq!(
            entries,
            vec![Entry::new("buy milk"), Entry::done("walk dog")]
        );
    }

    #[test]
    fn test_decode_empty_list() {
        let data = words(&[0x20, 0]);
        assert!(decode_todos(&data).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_truncated_data() {
        let mut data = words(&[0x20, 1, 0x20, 0x40, 0, 5]);
        data.extend_from_slice(b"ab");
        assert!(matches!(decode_todos(&data), Err(StoreError::Decode(_))));

        assert!(decode_todos(&[]).is_err());
        assert!(decode_todos(&words(&[0x20, 1_000_000])).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_bool() {
        let mut data = words(&[0x20, 1, 0x20, 0x40, 7, 1]);
        data.extend(padded_text("x"));
        assert!(decode_todos(&data).is_err());
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(from_hex("0x0aff").unwrap(), vec![0x0a, 0xff]);
        assert!(from_hex("0xzz").is_err());
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("0x").is_err());
    }
}
