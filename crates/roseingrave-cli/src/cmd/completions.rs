use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `roseingrave completions`.
///
/// The script goes to stdout; for bash, for example:
/// `roseingrave completions bash > ~/.local/share/bash-completion/completions/roseingrave`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to `out`, named after the
/// command's binary.
///
/// # Errors
///
/// Returns an error if flushing `out` fails.
pub fn run_completions(shell: Shell, command: &mut clap::Command, out: &mut dyn Write) -> Result<()> {
    let name = command.get_name().to_string();
    generate(shell, command, name, out);
    out.flush()?;
    Ok(())
}

/// [`run_completions`] to stdout.
///
/// # Errors
///
/// Returns an error if stdout cannot be flushed.
pub fn print_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    run_completions(shell, command, &mut io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn scripts_complete_every_subcommand() {
        let mut command = crate::Cli::command();
        let mut out = Vec::new();
        run_completions(Shell::Zsh, &mut command, &mut out).unwrap();
        let script = String::from_utf8(out).unwrap();
        assert!(script.contains("#compdef roseingrave"));
        for sub in ["create-sheets", "volunteer-summary", "export-master"] {
            assert!(script.contains(sub), "{sub} missing");
        }
    }
}
