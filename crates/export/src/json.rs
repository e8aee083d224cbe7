use cellbank_config::Config;
use cellbank_numeral::format_uint;
use cellbank_store::Workspace;

/// Emits the JSON export of bank `id`, with every value resolved first.
///
/// Values are not assumed to be valid UTF-8, so this writes bytes directly rather than
/// building a `String`/`serde_json::Value` (which would reject non-UTF-8 input and would
/// not reproduce the exact escaping rule below): backslash and double-quote are
/// backslash-escaped, newline becomes `\n`, and every other byte — including raw control
/// bytes and invalid UTF-8 — passes through unchanged.
pub fn export_json(workspace: &mut Workspace, id: u64) -> Vec<u8> {
    let config = *workspace.config();
    let Some(bank) = workspace.get(id) else {
        return b"null".to_vec();
    };

    let title = bank.title.clone();
    let regs: Vec<(u64, Vec<(u64, Vec<u8>)>)> = bank
        .regs
        .iter()
        .map(|(&reg, addrs)| (reg, addrs.iter().map(|(&addr, value)| (addr, value.clone())).collect()))
        .collect();

    let bank_name = format!("{}{}", config.prefix, format_uint(id, config.base, config.width_bank));

    let mut out = Vec::new();
    out.extend_from_slice(b"{\"bank\": ");
    write_json_string(&mut out, bank_name.as_bytes());
    out.extend_from_slice(b", \"title\": ");
    write_json_string(&mut out, &title);
    out.extend_from_slice(b", \"registers\": [");

    for (i, (reg, addrs)) in regs.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        out.extend_from_slice(b"{\"id\": ");
        write_json_string(&mut out, format_uint(*reg, config.base, config.width_reg).as_bytes());
        out.extend_from_slice(b", \"addresses\": [");

        for (j, (addr, value)) in addrs.iter().enumerate() {
            if j > 0 {
                out.push(b',');
            }
            let resolved = cellbank_resolver::resolve(workspace, &config, id, value);
            out.extend_from_slice(b"{\"id\": ");
            write_json_string(&mut out, format_uint(*addr, config.base, config.width_addr).as_bytes());
            out.extend_from_slice(b", \"value\": ");
            write_json_string(&mut out, &resolved);
            out.push(b'}');
        }

        out.extend_from_slice(b"]}");
    }

    out.extend_from_slice(b"]}");
    out
}

fn write_json_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'"');
    for &byte in bytes {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\n' => out.extend_from_slice(b"\\n"),
            other => out.push(other),
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_backslash_quote_and_newline() {
        let mut out = Vec::new();
        write_json_string(&mut out, b"a\\b\"c\nd");
        assert_eq!(out, b"\"a\\\\b\\\"c\\nd\"");
    }

    #[test]
    fn passes_non_utf8_bytes_through_raw() {
        let mut out = Vec::new();
        write_json_string(&mut out, &[0xff, 0x41, 0xfe]);
        assert_eq!(out, [b'"', 0xff, b'A', 0xfe, b'"']);
    }

    #[test]
    fn exports_bank_with_resolved_values() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let mut ws = Workspace::new(dir.path(), config);

        ws.open(1).unwrap();
        ws.get_mut(1).unwrap().set(1, 1, *b"alpha");
        ws.get_mut(1).unwrap().set(2, 0, *b"r01.0001");

        let out = export_json(&mut ws, 1);
        let expected = b"{\"bank\": \"x00001\", \"title\": \"\", \"registers\": [\
{\"id\": \"01\", \"addresses\": [{\"id\": \"0001\", \"value\": \"alpha\"}]},\
{\"id\": \"02\", \"addresses\": [{\"id\": \"0000\", \"value\": \"alpha\"}]}]}";
        assert_eq!(out, expected.as_slice());
    }

    #[test]
    fn missing_bank_exports_null() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new(dir.path(), Config::default());

        assert_eq!(export_json(&mut ws, 1), b"null");
    }
}
