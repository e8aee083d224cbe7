use cellbank_config::Config;
use cellbank_numeral::format_uint;
use cellbank_store::Workspace;

/// Re-serializes bank `id` with every value replaced by its resolved form.
///
/// Unlike [`cellbank_grammar::serialize_bank`], this always uses the multi-register
/// layout (a register-id line before its address lines) even when the bank holds only
/// register `1`, so that the ordering of a resolved export is never ambiguous.
pub fn export_resolved_text(workspace: &mut Workspace, id: u64) -> Vec<u8> {
    let config = *workspace.config();
    let Some(bank) = workspace.get(id) else {
        return Vec::new();
    };

    let title = bank.title.clone();
    let cells: Vec<(u64, u64, Vec<u8>)> = bank
        .regs
        .iter()
        .flat_map(|(&reg, addrs)| addrs.iter().map(move |(&addr, value)| (reg, addr, value.clone())))
        .collect();

    let mut out = Vec::new();
    out.push(config.prefix as u8);
    out.extend_from_slice(format_uint(id, config.base, config.width_bank).as_bytes());
    out.push(b'\t');
    out.push(b'(');
    out.extend_from_slice(&title);
    out.push(b')');
    out.push(b'{');
    out.push(b'\n');

    let mut current_reg = None;
    for (reg, addr, value) in cells {
        if current_reg != Some(reg) {
            out.extend_from_slice(format_uint(reg, config.base, config.width_reg).as_bytes());
            out.push(b'\n');
            current_reg = Some(reg);
        }

        let resolved = cellbank_resolver::resolve(workspace, &config, id, &value);
        out.push(b'\t');
        out.extend_from_slice(format_uint(addr, config.base, config.width_addr).as_bytes());
        out.push(b'\t');
        out.extend_from_slice(&resolved);
        out.push(b'\n');
    }

    out.push(b'}');
    out.push(b'\n');
    out
}
