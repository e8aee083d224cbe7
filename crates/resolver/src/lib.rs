//! Recursive expansion of the bank grammar's reference forms inside a value, in the fixed
//! five-pass order, with cycle detection via a visited set of canonical reference keys.
//!
//! ```text
//! 1. @file(NAME)                     — not recursively resolved
//! 2. r<REG>.<ADDR>                   — same bank
//! 3. <prefix><BANK>.<REG>.<ADDR>     — prefixed triad
//! 4. <prefix><BANK>.<ADDR>           — two-part, register defaults to 1
//! 5. <BANK>.<REG>.<ADDR>             — decimal triad, no prefix
//! ```
//!
//! Each coordinate form is recursively resolved once its target value is fetched; `@file`
//! substitutes raw bytes with no further expansion. This asymmetry is the source format's
//! observable behavior and is preserved deliberately (see the specification's design notes).

mod patterns;

use std::collections::HashSet;
use std::fs;

use cellbank_config::Config;
use cellbank_numeral::is_valid_digits;
use cellbank_numeral::parse_uint;
use cellbank_store::Workspace;
use regex::bytes::Captures;

use patterns::Patterns;

/// Resolves every reference inside `value`, recursively, starting from `current_bank`.
///
/// Lazily loads banks it needs to follow a reference into, via `workspace`. The return
/// value is always well-formed UTF-8-agnostic bytes: unresolvable references are inlined
/// as bracketed sentinel strings rather than raised as errors.
pub fn resolve(workspace: &mut Workspace, config: &Config, current_bank: u64, value: &[u8]) -> Vec<u8> {
    let patterns = Patterns::compile(config);
    resolve_with(workspace, config, &patterns, current_bank, value, &HashSet::new())
}

fn resolve_with(
    workspace: &mut Workspace,
    config: &Config,
    patterns: &Patterns,
    current_bank: u64,
    value: &[u8],
    visited: &HashSet<String>,
) -> Vec<u8> {
    let mut current = value.to_vec();

    current = apply_file_include(workspace, &patterns.file_include, &current);
    current = apply_same_bank(workspace, config, patterns, current_bank, &current, visited);
    current = apply_prefixed_triad(workspace, config, patterns, &current, visited);
    current = apply_two_part(workspace, config, patterns, &current, visited);
    current = apply_numeric_triad(workspace, config, patterns, &current, visited);

    current
}

/// Walks `re`'s non-overlapping matches over `input`, calling `handler` for each. The
/// handler returns `Some(replacement)` to substitute the match, or `None` to leave the
/// original matched bytes untouched.
fn replace_matches(
    re: &regex::bytes::Regex,
    input: &[u8],
    mut handler: impl FnMut(&Captures, usize) -> Option<Vec<u8>>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut last = 0;

    for caps in re.captures_iter(input) {
        let whole = caps.get(0).expect("capture group 0 always matches");
        out.extend_from_slice(&input[last..whole.start()]);

        match handler(&caps, whole.end()) {
            Some(replacement) => out.extend_from_slice(&replacement),
            None => out.extend_from_slice(whole.as_bytes()),
        }

        last = whole.end();
    }

    out.extend_from_slice(&input[last..]);
    out
}

fn group_str<'a>(caps: &'a Captures, index: usize) -> &'a str {
    std::str::from_utf8(caps.get(index).expect("capture group present").as_bytes()).unwrap_or("")
}

fn whole_match_str(caps: &Captures) -> String {
    String::from_utf8_lossy(caps.get(0).expect("capture group 0 always matches").as_bytes()).into_owned()
}

fn missing(token: &str) -> Vec<u8> {
    format!("[Missing {token}]").into_bytes()
}

fn bad_ref(token: &str) -> Vec<u8> {
    format!("[BadRef {token}]").into_bytes()
}

fn circular(token: &str) -> Vec<u8> {
    format!("[Circular Ref: {token}]").into_bytes()
}

fn apply_file_include(workspace: &Workspace, re: &regex::bytes::Regex, input: &[u8]) -> Vec<u8> {
    replace_matches(re, input, |caps, _end| {
        let name = group_str(caps, 1);
        let path = workspace.files_dir().join(name);

        Some(match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                format!("[Missing file: {name}]").into_bytes()
            }
            Err(_) => format!("[Cannot open file: {name}]").into_bytes(),
        })
    })
}

fn apply_same_bank(
    workspace: &mut Workspace,
    config: &Config,
    patterns: &Patterns,
    current_bank: u64,
    input: &[u8],
    visited: &HashSet<String>,
) -> Vec<u8> {
    let matches: Vec<(usize, usize, String, String, String)> = patterns
        .same_bank
        .captures_iter(input)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            (whole.start(), whole.end(), whole_match_str(&caps), group_str(&caps, 1).to_owned(), group_str(&caps, 2).to_owned())
        })
        .collect();

    stitch(input, matches.into_iter().map(|(start, end, token, reg_tok, addr_tok)| {
        let replacement = if !is_valid_digits(&reg_tok, config.base) || !is_valid_digits(&addr_tok, config.base) {
            bad_ref(&token)
        } else {
            let reg = parse_uint(&reg_tok, config.base).unwrap();
            let addr = parse_uint(&addr_tok, config.base).unwrap();
            let key = format!("{current_bank}.{reg}.{addr}");

            if visited.contains(&key) {
                circular(&token)
            } else {
                resolve_target(workspace, config, patterns, current_bank, current_bank, reg, addr, &token, visited, &key)
            }
        };
        (start, end, replacement)
    }))
}

fn apply_prefixed_triad(
    workspace: &mut Workspace,
    config: &Config,
    patterns: &Patterns,
    input: &[u8],
    visited: &HashSet<String>,
) -> Vec<u8> {
    let matches: Vec<(usize, usize, String, String, String, String)> = patterns
        .prefixed_triad
        .captures_iter(input)
        .map(|caps| {
            let whole = caps.get(0).unwrap();
            (
                whole.start(),
                whole.end(),
                whole_match_str(&caps),
                group_str(&caps, 1).to_owned(),
                group_str(&caps, 2).to_owned(),
                group_str(&caps, 3).to_owned(),
            )
        })
        .collect();

    stitch(input, matches.into_iter().map(|(start, end, token, bank_tok, reg_tok, addr_tok)| {
        let valid = is_valid_digits(&bank_tok, config.base)
            && is_valid_digits(&reg_tok, config.base)
            && is_valid_digits(&addr_tok, config.base);

        let replacement = if !valid {
            bad_ref(&token)
        } else {
            let bank = parse_uint(&bank_tok, config.base).unwrap();
            let reg = parse_uint(&reg_tok, config.base).unwrap();
            let addr = parse_uint(&addr_tok, config.base).unwrap();
            let key = format!("{}{bank}.{reg}.{addr}", config.prefix);

            if visited.contains(&key) {
                circular(&token)
            } else {
                resolve_target(workspace, config, patterns, bank, bank, reg, addr, &token, visited, &key)
            }
        };
        (start, end, replacement)
    }))
}

fn apply_two_part(
    workspace: &mut Workspace,
    config: &Config,
    patterns: &Patterns,
    input: &[u8],
    visited: &HashSet<String>,
) -> Vec<u8> {
    let matches: Vec<(usize, usize, String, String, String)> = patterns
        .two_part
        .captures_iter(input)
        .filter_map(|caps| {
            let whole = caps.get(0).unwrap();
            // Non-'.' look-ahead: never shadow the three-part form.
            if input.get(whole.end()) == Some(&b'.') {
                return None;
            }
            Some((whole.start(), whole.end(), whole_match_str(&caps), group_str(&caps, 1).to_owned(), group_str(&caps, 2).to_owned()))
        })
        .collect();

    stitch(input, matches.into_iter().map(|(start, end, token, bank_tok, addr_tok)| {
        let replacement = if !is_valid_digits(&bank_tok, config.base) || !is_valid_digits(&addr_tok, config.base) {
            bad_ref(&token)
        } else {
            let bank = parse_uint(&bank_tok, config.base).unwrap();
            let addr = parse_uint(&addr_tok, config.base).unwrap();
            let key = format!("{}{bank}.{addr}", config.prefix);

            if visited.contains(&key) {
                circular(&token)
            } else {
                resolve_target(workspace, config, patterns, bank, bank, 1, addr, &token, visited, &key)
            }
        };
        (start, end, replacement)
    }))
}

fn apply_numeric_triad(
    workspace: &mut Workspace,
    config: &Config,
    patterns: &Patterns,
    input: &[u8],
    visited: &HashSet<String>,
) -> Vec<u8> {
    const DECIMAL_BASE: u32 = 10;

    let matches: Vec<(usize, usize, String, String, String, String)> = patterns
        .numeric_triad
        .captures_iter(input)
        .filter_map(|caps| {
            let whole = caps.get(0).unwrap();
            // Boundary rule: must not be preceded by an alphanumeric character, so we
            // don't capture the tail of a prefixed token like `x00001.02.0003`.
            if whole.start() > 0 {
                let preceding = input[whole.start() - 1];
                if preceding.is_ascii_alphanumeric() {
                    return None;
                }
            }
            Some((
                whole.start(),
                whole.end(),
                whole_match_str(&caps),
                group_str(&caps, 1).to_owned(),
                group_str(&caps, 2).to_owned(),
                group_str(&caps, 3).to_owned(),
            ))
        })
        .collect();

    stitch(input, matches.into_iter().map(|(start, end, token, bank_tok, reg_tok, addr_tok)| {
        // The numeric triad is always decimal, independent of the configured base.
        let bank = parse_uint(&bank_tok, DECIMAL_BASE).unwrap();
        let reg = parse_uint(&reg_tok, DECIMAL_BASE).unwrap();
        let addr = parse_uint(&addr_tok, DECIMAL_BASE).unwrap();
        let key = format!("{bank}.{reg}.{addr}");

        let replacement = if visited.contains(&key) {
            circular(&token)
        } else {
            resolve_target(workspace, config, patterns, bank, bank, reg, addr, &token, visited, &key)
        };
        (start, end, replacement)
    }))
}

/// Loads `bank` if necessary, fetches `(bank, reg, addr)`, and — if present — recursively
/// resolves it with `new_current_bank` and `visited ∪ {key}`.
fn resolve_target(
    workspace: &mut Workspace,
    config: &Config,
    patterns: &Patterns,
    bank: u64,
    new_current_bank: u64,
    reg: u64,
    addr: u64,
    token: &str,
    visited: &HashSet<String>,
    key: &str,
) -> Vec<u8> {
    if workspace.ensure_loaded(bank).is_err() {
        return missing(token);
    }

    let Some(raw) = workspace.get(bank).and_then(|b| b.get(reg, addr)) else {
        return missing(token);
    };
    let raw = raw.to_vec();

    let mut descended = visited.clone();
    descended.insert(key.to_owned());

    resolve_with(workspace, config, patterns, new_current_bank, &raw, &descended)
}

/// Applies a sequence of `(start, end, replacement)` spans — in ascending, non-overlapping
/// order — over `input`, copying the untouched gaps between them.
fn stitch(input: &[u8], spans: impl Iterator<Item = (usize, usize, Vec<u8>)>) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut last = 0;

    for (start, end, replacement) in spans {
        out.extend_from_slice(&input[last..start]);
        out.extend_from_slice(&replacement);
        last = end;
    }

    out.extend_from_slice(&input[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellbank_config::Config;

    fn workspace_with_bank(dir: &std::path::Path, config: Config, id: u64, cells: &[(u64, u64, &str)]) -> Workspace {
        let mut ws = Workspace::new(dir, config);
        ws.open(id).unwrap();
        for &(reg, addr, value) in cells {
            ws.get_mut(id).unwrap().set(reg, addr, value.as_bytes());
        }
        ws
    }

    #[test]
    fn resolves_same_bank_shorthand() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut ws = workspace_with_bank(dir.path(), config, 1, &[(1, 1, "alpha"), (2, 0, "r01.0001")]);

        let out = resolve(&mut ws, &config, 1, b"r02.0000");
        assert_eq!(out, b"alpha");
    }

    #[test]
    fn file_include_is_not_recursively_resolved() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("files")).unwrap();
        std::fs::write(dir.path().join("files").join("hello.txt"), b"1.1.1").unwrap();

        let config = Config::default();
        let mut ws = Workspace::new(dir.path(), config);

        let out = resolve(&mut ws, &config, 1, b"@file(hello.txt)");
        assert_eq!(out, b"1.1.1");
    }

    #[test]
    fn detects_direct_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut ws = workspace_with_bank(dir.path(), config, 1, &[(1, 1, "1.1.2"), (1, 2, "1.1.1")]);

        let out = resolve(&mut ws, &config, 1, b"1.1.1");
        assert_eq!(out, b"[Circular Ref: 1.1.1]");
    }

    #[test]
    fn boundary_rule_does_not_swallow_prefixed_triad_tail() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut ws = workspace_with_bank(dir.path(), config, 1, &[(1, 1, "seen")]);

        let out = resolve(&mut ws, &config, 1, b"prefix x00001.01.0001 tail 1.1.1");
        assert_eq!(out, b"prefix seen tail seen");
    }

    #[test]
    fn missing_target_produces_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut ws = Workspace::new(dir.path(), config);

        let out = resolve(&mut ws, &config, 1, b"1.1.1");
        assert_eq!(out, b"[Missing 1.1.1]");
    }

    #[test]
    fn bad_digits_produce_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config { base: 10, ..Config::default() };
        let mut ws = Workspace::new(dir.path(), config);

        let out = resolve(&mut ws, &config, 1, b"r0g.0001");
        assert_eq!(out, b"[BadRef r0g.0001]");
    }

    #[test]
    fn two_part_form_never_shadows_three_part_form() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut ws = workspace_with_bank(dir.path(), config, 1, &[(2, 3, "deep")]);

        let out = resolve(&mut ws, &config, 1, b"x00001.02.0003");
        assert_eq!(out, b"deep");
    }

    #[test]
    fn two_part_form_defaults_to_register_one() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut ws = workspace_with_bank(dir.path(), config, 1, &[(1, 5, "shallow")]);

        let out = resolve(&mut ws, &config, 99, b"x00001.0005");
        assert_eq!(out, b"shallow");
    }
}
