use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decode `data` if it looks like standard base64, otherwise return it as is.
///
/// Integers and short strings without `=` padding are never decoded. This is
/// a heuristic: plain words of the right length can still be mistaken for
/// base64.
pub fn base64_smart_decode(data: &str) -> String {
    if data.is_empty() || data.parse::<i64>().is_ok() {
        return data.to_string();
    }

    if data.len() < 5 && !data.ends_with('=') {
        return data.to_string();
    }

    STANDARD
        .decode(data)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| data.to_string())
}
