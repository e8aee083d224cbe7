use cellbank_config::Config;
use cellbank_numeral::format_uint;

use crate::model::Bank;

/// Serializes `bank` back into the bank text format, using `config` for the prefix
/// character, base, and zero-pad widths.
///
/// If the bank has only register `1`, its address lines are emitted directly with no
/// register line (the grammar's implicit-register-1 shorthand). Otherwise every register
/// gets its own non-indented line before its address lines.
pub fn serialize_bank(bank: &Bank, config: &Config) -> Vec<u8> {
    let mut out = Vec::new();

    out.push(config.prefix as u8);
    out.extend_from_slice(format_uint(bank.id, config.base, config.width_bank).as_bytes());
    out.push(b'\t');
    out.push(b'(');
    out.extend_from_slice(&bank.title);
    out.push(b')');
    out.push(b'{');
    out.push(b'\n');

    let only_register_one = bank.regs.len() == 1 && bank.regs.contains_key(&1);

    for (&reg_id, addresses) in &bank.regs {
        if !only_register_one {
            out.extend_from_slice(format_uint(reg_id, config.base, config.width_reg).as_bytes());
            out.push(b'\n');
        }

        for (&addr_id, value) in addresses {
            out.push(b'\t');
            out.extend_from_slice(format_uint(addr_id, config.base, config.width_addr).as_bytes());
            out.push(b'\t');
            out.extend_from_slice(value);
            out.push(b'\n');
        }
    }

    out.push(b'}');
    out.push(b'\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_bank;

    #[test]
    fn serializes_single_register_without_register_line() {
        let mut bank = Bank::new(1, *b"demo");
        bank.set(1, 1, *b"hello");

        let out = serialize_bank(&bank, &Config::default());
        assert_eq!(out, b"x00001\t(demo){\n\t0001\thello\n}\n");
    }

    #[test]
    fn serializes_multiple_registers_with_register_lines() {
        let mut bank = Bank::new(1, *b"demo");
        bank.set(1, 1, *b"a");
        bank.set(2, 0, *b"b");

        let out = serialize_bank(&bank, &Config::default());
        assert_eq!(out, b"x00001\t(demo){\n01\n\t0001\ta\n02\n\t0000\tb\n}\n");
    }

    #[test]
    fn parse_then_serialize_round_trips_exact_bytes() {
        let input: &[u8] = b"x00001\t(demo){\n\t0001\thello\n}\n";
        let config = Config::default();

        let bank = parse_bank(input, &config).unwrap();
        let out = serialize_bank(&bank, &config);

        assert_eq!(out, input);
    }
}
