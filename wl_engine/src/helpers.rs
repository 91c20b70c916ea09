use std::sync::OnceLock;

use rand::RngCore;
use regex::Regex;

/// Mints a 24 character lowercase hex identifier.
pub fn new_object_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Turns a product name into a URL slug: lowercase, whitespace runs become `-`, anything that isn't a word character
/// or `-` is dropped, and repeated dashes are collapsed.
pub fn slugify(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    static DASHES: OnceLock<Regex> = OnceLock::new();
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    let non_word = NON_WORD.get_or_init(|| Regex::new(r"[^\w\-]+").expect("static regex"));
    let dashes = DASHES.get_or_init(|| Regex::new(r"\-\-+").expect("static regex"));

    let lower = text.to_lowercase();
    let s = whitespace.replace_all(lower.trim(), "-");
    let s = non_word.replace_all(&s, "");
    dashes.replace_all(&s, "-").into_owned()
}
