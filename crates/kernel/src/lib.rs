//! Plugin discovery and invocation.
//!
//! A plugin is an external program declared by a `plugins/<name>/plugin.json` manifest.
//! Running one against a cell resolves that cell's value, stages a per-invocation run
//! directory, launches the platform-appropriate entry, and returns whatever bytes it
//! wrote to `output.json`.

mod error;
mod manifest;
mod run;

use cellbank_store::Workspace;

pub use error::KernelError;
pub use manifest::Plugin;
pub use manifest::discover_plugins;
pub use manifest::find_plugin;
pub use run::RunOutcome;
pub use run::RunReport;

/// Looks up `plugin_name` in `workspace`'s `plugins/` directory and runs it against
/// cell `(bank, reg, addr)`.
pub fn run_plugin(
    workspace: &mut Workspace,
    plugin_name: &str,
    bank: u64,
    reg: u64,
    addr: u64,
    stdin_arg: &str,
) -> Result<RunOutcome, KernelError> {
    let plugin = find_plugin(&workspace.plugins_dir(), plugin_name)
        .ok_or_else(|| KernelError::PluginNotFound { name: plugin_name.to_owned() })?;

    run::run(workspace, &plugin, bank, reg, addr, stdin_arg)
}
