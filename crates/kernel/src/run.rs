use std::fs;
use std::fs::File;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use cellbank_numeral::format_uint;
use cellbank_store::StoreError;
use cellbank_store::Workspace;

use crate::error::KernelError;
use crate::manifest::Plugin;

/// What a plugin run produced: the raw bytes of `output.json`, plus a report for
/// diagnostics regardless of whether the run is judged a success.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output: Vec<u8>,
    pub report: RunReport,
}

/// Exit status and captured stdio of a plugin invocation. Non-zero exit is not itself a
/// failure; only a missing `output.json` is ([`KernelError::NoOutput`]).
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunReport {
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Stages a run directory for `plugin` against cell `(bank, reg, addr)`, resolves the
/// cell's value, launches the plugin, and collects its result.
pub fn run(
    workspace: &mut Workspace,
    plugin: &Plugin,
    bank: u64,
    reg: u64,
    addr: u64,
    stdin_arg: &str,
) -> Result<RunOutcome, KernelError> {
    match workspace.ensure_loaded(bank) {
        Ok(()) => {}
        Err(StoreError::NotLoaded { .. }) => return Err(KernelError::NoValue { bank, reg, addr }),
        Err(other) => return Err(other.into()),
    }

    let config = *workspace.config();
    let raw = workspace
        .get(bank)
        .and_then(|b| b.get(reg, addr))
        .ok_or(KernelError::NoValue { bank, reg, addr })?
        .to_vec();

    let resolved = cellbank_resolver::resolve(workspace, &config, bank, &raw);

    let entry_rel = plugin.entry_for_host();
    if entry_rel.is_empty() {
        return Err(KernelError::NoEntry { plugin: plugin.name.clone() });
    }

    let entry_path = plugin.dir.join(entry_rel);
    if !entry_path.exists() {
        return Err(KernelError::EntryNotFound { path: entry_path });
    }

    let title = workspace.get(bank).map(|bank| bank.title.clone()).unwrap_or_default();

    let bank_name = format!("{}{}", config.prefix, format_uint(bank, config.base, config.width_bank));
    let reg_name = format_uint(reg, config.base, config.width_reg);
    let addr_name = format_uint(addr, config.base, config.width_addr);

    let run_dir = workspace
        .root()
        .join("files")
        .join("out")
        .join("plugins")
        .join(&bank_name)
        .join(format!("r{reg_name}a{addr_name}"))
        .join(&plugin.name);
    fs::create_dir_all(&run_dir)?;

    let code_path = run_dir.join("code.txt");
    fs::write(&code_path, &resolved)?;

    let stdin_bytes = resolve_stdin_arg(stdin_arg)?;

    let input_path = run_dir.join("input.json");
    let code_path_abs = fs::canonicalize(&code_path)?;
    let input_bytes = build_input_json(&bank_name, &reg_name, &addr_name, &title, &code_path_abs, &stdin_bytes);
    fs::write(&input_path, &input_bytes)?;

    let entry_abs = fs::canonicalize(&entry_path)?;
    let input_abs = fs::canonicalize(&input_path)?;
    let run_dir_abs = fs::canonicalize(&run_dir)?;

    let log_path = run_dir.join("run.log");
    let err_path = run_dir.join("run.err");

    if cfg!(target_os = "windows") {
        let breadcrumb = format!(
            "cmd /S /C \"\"{}\" \"{}\" \"{}\" > run.log 2> run.err\"\n",
            entry_abs.display(),
            input_abs.display(),
            run_dir_abs.display(),
        );
        fs::write(run_dir.join("run.cmd"), breadcrumb)?;
    }

    let status = Command::new(&entry_abs)
        .arg(&input_abs)
        .arg(&run_dir_abs)
        .current_dir(&run_dir)
        .stdout(Stdio::from(File::create(&log_path)?))
        .stderr(Stdio::from(File::create(&err_path)?))
        .status()?;

    let report = RunReport {
        exit_code: status.code(),
        stdout: fs::read(&log_path).unwrap_or_default(),
        stderr: fs::read(&err_path).unwrap_or_default(),
    };

    let output_path = run_dir.join("output.json");
    if !output_path.exists() {
        return Err(KernelError::NoOutput { report });
    }

    let output = fs::read(&output_path)?;
    Ok(RunOutcome { output, report })
}

/// Resolves the `stdin-arg` parameter: an existing file's bytes, inline JSON text, or
/// `{}` for the empty string.
fn resolve_stdin_arg(stdin_arg: &str) -> Result<Vec<u8>, KernelError> {
    if stdin_arg.is_empty() {
        return Ok(b"{}".to_vec());
    }

    let candidate = Path::new(stdin_arg);
    if candidate.is_file() {
        return Ok(fs::read(candidate)?);
    }

    Ok(stdin_arg.as_bytes().to_vec())
}

fn build_input_json(
    bank_name: &str,
    reg_name: &str,
    addr_name: &str,
    title: &[u8],
    code_path: &Path,
    stdin: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"{\"bank\": ");
    write_json_string(&mut out, bank_name.as_bytes());
    out.extend_from_slice(b", \"reg\": ");
    write_json_string(&mut out, reg_name.as_bytes());
    out.extend_from_slice(b", \"addr\": ");
    write_json_string(&mut out, addr_name.as_bytes());
    out.extend_from_slice(b", \"title\": ");
    write_json_string(&mut out, title);
    out.extend_from_slice(b", \"code_file\": ");
    write_json_string(&mut out, path_bytes(code_path));
    out.extend_from_slice(b", \"stdin\": ");
    out.extend_from_slice(stdin);
    out.push(b'}');
    out
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> &[u8] {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> &[u8] {
    // Lossy on non-UTF-8 paths, which do not occur on Windows in practice.
    Box::leak(path.to_string_lossy().into_owned().into_boxed_str()).as_bytes()
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
