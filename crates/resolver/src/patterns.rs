use cellbank_config::Config;
use regex::bytes::Regex;

/// The five reference-form patterns, compiled once per top-level [`crate::resolve`] call
/// and threaded through the recursion (the prefix character and numeral base are
/// configurable, so these cannot be `static`).
pub struct Patterns {
    pub file_include: Regex,
    pub same_bank: Regex,
    pub prefixed_triad: Regex,
    pub two_part: Regex,
    pub numeric_triad: Regex,
}

impl Patterns {
    pub fn compile(config: &Config) -> Self {
        let prefix = regex::escape(&config.prefix.to_string());
        let digit = digit_class(config.base);

        Self {
            file_include: Regex::new(r"@file\(([^()]*)\)").expect("valid regex"),
            same_bank: Regex::new(&format!(r"r([{digit}]+)\.([{digit}]+)")).expect("valid regex"),
            prefixed_triad: Regex::new(&format!(r"{prefix}([{digit}]+)\.([{digit}]+)\.([{digit}]+)"))
                .expect("valid regex"),
            two_part: Regex::new(&format!(r"{prefix}([{digit}]+)\.([{digit}]+)")).expect("valid regex"),
            numeric_triad: Regex::new(r"([0-9]+)\.([0-9]+)\.([0-9]+)").expect("valid regex"),
        }
    }
}

/// Builds a regex character class matching exactly the digits valid in `base` (case
/// insensitive), so a token pattern can never stray into ordinary letters. For example
/// base 10 yields `0-9`; base 16 yields `0-9A-Fa-f`; base 36 yields `0-9A-Za-z`.
fn digit_class(base: u32) -> String {
    let base = cellbank_numeral::normalize_base(base);

    let mut class = String::new();
    let highest_decimal_digit = base.min(10) - 1;
    class.push_str("0-");
    class.push(char::from_digit(highest_decimal_digit, 10).expect("single decimal digit"));

    if base > 10 {
        let letter_count = (base - 10) as u8;
        let last_upper = (b'A' + letter_count - 1) as char;
        let last_lower = (b'a' + letter_count - 1) as char;
        class.push_str("A-");
        class.push(last_upper);
        class.push_str("a-");
        class.push(last_lower);
    }

    class
}
