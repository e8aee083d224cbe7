use cellbank_config::Config;
use cellbank_numeral::is_valid_digits;
use cellbank_numeral::parse_uint;

use crate::error::GrammarError;
use crate::model::Bank;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Parses a bank from its textual representation.
///
/// See the grammar in the bank codec specification: a header (`<prefix><id> (<title>)`,
/// possibly wrapped over several lines) followed by `{`, an indented body of register and
/// address lines, and a closing `}`.
pub fn parse_bank(input: &[u8], config: &Config) -> Result<Bank, GrammarError> {
    let input = strip_bom(input);
    if input.is_empty() {
        return Err(GrammarError::EmptyInput);
    }

    let brace_idx = input.iter().position(|&b| b == b'{').ok_or(GrammarError::MissingOpenBrace)?;
    let header_raw = &input[..brace_idx];
    let body_raw = &input[brace_idx + 1..];

    let (id, title) = parse_header(header_raw, config)?;

    let mut bank = Bank::new(id, title);
    parse_body(body_raw, config, &mut bank)?;

    Ok(bank)
}

fn strip_bom(input: &[u8]) -> &[u8] {
    input.strip_prefix(UTF8_BOM).unwrap_or(input)
}

fn parse_header(header_raw: &[u8], config: &Config) -> Result<(u64, Vec<u8>), GrammarError> {
    let header = String::from_utf8_lossy(header_raw);
    let trimmed_end = header.trim_end();

    if !trimmed_end.ends_with(')') {
        return Err(GrammarError::MalformedParens { header: trimmed_end.to_owned() });
    }

    let open_paren = trimmed_end.find('(').ok_or_else(|| GrammarError::MalformedParens { header: trimmed_end.to_owned() })?;

    let id_part = trimmed_end[..open_paren].trim();
    let title = trimmed_end[open_paren + 1..trimmed_end.len() - 1].as_bytes().to_vec();

    let mut chars = id_part.chars();
    let first = chars.next().ok_or_else(|| GrammarError::NoHeader { found: id_part.to_owned() })?;
    if first != config.prefix {
        return Err(GrammarError::NoHeader { found: id_part.to_owned() });
    }

    let id_token = chars.as_str();
    if !is_valid_digits(id_token, config.base) {
        return Err(GrammarError::BadBankId { token: id_token.to_owned() });
    }

    let id = parse_uint(id_token, config.base).map_err(|_| GrammarError::BadBankId { token: id_token.to_owned() })?;

    Ok((id, title))
}

fn parse_body(body_raw: &[u8], config: &Config, bank: &mut Bank) -> Result<(), GrammarError> {
    let body = match body_raw.iter().position(|&b| b == b'}') {
        Some(close_idx) => &body_raw[..close_idx],
        None => body_raw,
    };

    let mut current_reg: u64 = 1;

    for raw_line in body.split(|&b| b == b'\n') {
        let line = strip_trailing_cr(raw_line);
        if line.is_empty() {
            continue;
        }

        if is_indent_byte(line[0]) {
            let (addr, value) = parse_address_line(line, config)?;
            bank.regs.entry(current_reg).or_default().insert(addr, value);
        } else {
            let token = String::from_utf8_lossy(line);
            let token = token.trim();
            if !is_valid_digits(token, config.base) {
                return Err(GrammarError::BadRegisterId { token: token.to_owned() });
            }

            current_reg =
                parse_uint(token, config.base).map_err(|_| GrammarError::BadRegisterId { token: token.to_owned() })?;
            bank.regs.entry(current_reg).or_default();
        }
    }

    Ok(())
}

fn parse_address_line<'a>(line: &'a [u8], config: &Config) -> Result<(u64, Vec<u8>), GrammarError> {
    let mut i = 0;
    while i < line.len() && is_indent_byte(line[i]) {
        i += 1;
    }
    let rest = &line[i..];

    let ws_idx = rest.iter().position(|&b| b == b'\t' || b == b' ');
    let (id_bytes, value) = match ws_idx {
        Some(idx) => (&rest[..idx], rest[idx + 1..].to_vec()),
        None => (rest, Vec::new()),
    };

    let token = String::from_utf8_lossy(id_bytes);
    let token = token.as_ref();
    if !is_valid_digits(token, config.base) {
        return Err(GrammarError::BadAddressId { token: token.to_owned() });
    }

    let addr = parse_uint(token, config.base).map_err(|_| GrammarError::BadAddressId { token: token.to_owned() })?;

    Ok((addr, value))
}

fn is_indent_byte(b: u8) -> bool {
    b == b'\t' || b == b' '
}

fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((&b'\r', rest)) => rest,
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> Config {
        Config::default()
    }

    #[test]
    fn parses_single_register_bank() {
        let input = b"x00001\t(demo){\n\t0001\thello\n}\n";
        let bank = parse_bank(input, &default_config()).unwrap();

        assert_eq!(bank.id, 1);
        assert_eq!(bank.title, b"demo");
        assert_eq!(bank.get(1, 1), Some(&b"hello"[..]));
    }

    #[test]
    fn parses_multi_register_bank() {
        let input = b"x00001\t(demo){\n1\n\t0001\ta\n2\n\t0000\tb\n}\n";
        let bank = parse_bank(input, &default_config()).unwrap();

        assert_eq!(bank.get(1, 1), Some(&b"a"[..]));
        assert_eq!(bank.get(2, 0), Some(&b"b"[..]));
    }

    #[test]
    fn strips_leading_bom() {
        let mut input = UTF8_BOM.to_vec();
        input.extend_from_slice(b"x00001\t(demo){\n\t0001\thello\n}\n");

        let bank = parse_bank(&input, &default_config()).unwrap();
        assert_eq!(bank.id, 1);
    }

    #[test]
    fn tolerates_wrapped_header() {
        let input = b"x00001\n\t(demo)\n{\n\t0001\thello\n}\n";
        let bank = parse_bank(input, &default_config()).unwrap();
        assert_eq!(bank.id, 1);
        assert_eq!(bank.title, b"demo");
    }

    #[test]
    fn rejects_missing_open_brace() {
        let input = b"x00001 (demo)";
        assert!(matches!(parse_bank(input, &default_config()), Err(GrammarError::MissingOpenBrace)));
    }

    #[test]
    fn rejects_header_without_prefix() {
        let input = b"00001 (demo){\n}\n";
        assert!(matches!(parse_bank(input, &default_config()), Err(GrammarError::NoHeader { .. })));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(parse_bank(b"", &default_config()), Err(GrammarError::EmptyInput)));
    }

    #[test]
    fn tolerates_trailing_cr_in_body_lines() {
        let input = b"x00001 (demo){\r\n\t0001\thello\r\n}\r\n";
        let bank = parse_bank(input, &default_config()).unwrap();
        assert_eq!(bank.get(1, 1), Some(&b"hello"[..]));
    }
}
