//! Command handlers and the state they share.
//!
//! Every handler validates its path overrides first, then loads what it
//! needs through [`Context`], runs one pipeline stage from
//! `roseingrave-core`, writes its outputs, and hands a [`Report`] back to
//! `main` for rendering.

pub mod check;
pub mod compile_pieces;
pub mod completions;
pub mod create_sheets;
pub mod export_master;
pub mod fix_input;
pub mod import_master;
pub mod piece_summary;
pub mod volunteer_summary;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use indexmap::IndexMap;
use roseingrave_core::settings::{Settings, SettingsFile};
use roseingrave_core::sheet::Workbook;
use roseingrave_core::store::{self, PathTemplate, Placeholder, StoreError};
use roseingrave_core::{
    Checked, Location, PieceDefinitions, StrictError, Template, VolunteerDefinitions, Warning,
    WarningKind, Warnings, load_template,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Spreadsheets index key of the master workbook.
pub const MASTER_KEY: &str = "MASTER";

/// Volunteer email (or [`MASTER_KEY`]) to workbook file.
pub type SpreadsheetsIndex = IndexMap<String, String>;

/// Per-invocation state: resolved settings, flags, and the warnings
/// recorded so far.
#[derive(Debug)]
pub struct Context {
    pub settings_file: SettingsFile,
    pub settings: Settings,
    pub strict: bool,
    pub output: OutputMode,
    pub quiet: bool,
    warnings: Warnings,
}

impl Context {
    /// Read and validate the settings file in `root`.
    ///
    /// # Errors
    ///
    /// Fails when the settings file cannot be parsed or names invalid paths.
    pub fn load(root: &Path, strict: bool, output: OutputMode, quiet: bool) -> Result<Self> {
        let settings_file = SettingsFile::discover(root)?;
        let settings = settings_file.resolve()?;
        Ok(Self {
            settings_file,
            settings,
            strict,
            output,
            quiet,
            warnings: Warnings::new(),
        })
    }

    /// Take the value out of a core result, failing in strict mode when it
    /// carries warnings.
    ///
    /// # Errors
    ///
    /// Returns [`StrictError`] in strict mode when `checked` has warnings.
    pub fn settle<T>(&mut self, checked: Checked<T>) -> Result<T, StrictError> {
        let checked = checked.escalate(self.strict)?;
        Ok(checked.absorb(&mut self.warnings))
    }

    /// Record a warning found by the command itself.
    pub fn warn(&mut self, location: Location, kind: WarningKind) {
        self.warnings.push(location, kind);
    }

    /// Fail in strict mode if the command recorded any warning.
    ///
    /// # Errors
    ///
    /// Returns [`StrictError`] holding every warning recorded so far.
    pub fn escalate(&self) -> Result<(), StrictError> {
        Checked::new((), self.warnings.clone())
            .escalate(self.strict)
            .map(|_| ())
    }

    /// Validate a placeholder override, falling back to the configured
    /// template.
    ///
    /// # Errors
    ///
    /// Fails when the override lacks the placeholder or doesn't end in `.json`.
    pub fn path_template(
        override_path: Option<&str>,
        configured: &PathTemplate,
        placeholder: Placeholder,
    ) -> Result<PathTemplate, StoreError> {
        override_path.map_or_else(
            || Ok(configured.clone()),
            |raw| PathTemplate::new(raw, placeholder),
        )
    }

    /// # Errors
    ///
    /// Fails when the file is unreadable or the template has fatal problems.
    pub fn template(&mut self, path: Option<&Path>) -> Result<Template> {
        let path = path.unwrap_or(&self.settings.template).to_path_buf();
        let raw = store::read_json(&path).context("reading template definitions file")?;
        let checked = load_template(&raw)
            .with_context(|| format!("loading template definitions from {}", path.display()))?;
        Ok(self.settle(checked)?)
    }

    /// # Errors
    ///
    /// Fails when the file is unreadable or the definitions are invalid.
    pub fn pieces(&mut self, path: Option<&Path>) -> Result<PieceDefinitions> {
        let path = path.unwrap_or(&self.settings.pieces).to_path_buf();
        let raw = store::read_json(&path).context("reading piece definitions file")?;
        let checked = PieceDefinitions::from_json(&raw)
            .with_context(|| format!("loading piece definitions from {}", path.display()))?;
        Ok(self.settle(checked)?)
    }

    /// # Errors
    ///
    /// Fails when the file is unreadable or the definitions are invalid.
    pub fn volunteers(
        &mut self,
        path: Option<&Path>,
        pieces: &PieceDefinitions,
    ) -> Result<VolunteerDefinitions> {
        let path = path.unwrap_or(&self.settings.volunteers).to_path_buf();
        let raw = store::read_json(&path).context("reading volunteer definitions file")?;
        let checked = VolunteerDefinitions::from_json(&raw, pieces)
            .with_context(|| format!("loading volunteer definitions from {}", path.display()))?;
        Ok(self.settle(checked)?)
    }

    /// Path of the spreadsheets index, honoring an override.
    pub fn index_path(&self, path: Option<&Path>) -> PathBuf {
        path.unwrap_or(&self.settings.spreadsheets_index).to_path_buf()
    }

    /// A report for `command` carrying every warning recorded so far.
    pub fn report(&self, command: &'static str) -> Report {
        Report {
            command,
            counts: IndexMap::new(),
            written: Vec::new(),
            skipped: Vec::new(),
            warnings: self.warnings.iter().cloned().collect(),
        }
    }
}

/// Read the spreadsheets index; a missing file is an empty index.
///
/// # Errors
///
/// Fails when the file exists but is not a JSON object of strings.
pub fn read_index(path: &Path) -> Result<SpreadsheetsIndex> {
    match store::read_json(path) {
        Ok(raw) => serde_json::from_value(raw)
            .with_context(|| format!("{} must map keys to workbook paths", path.display())),
        Err(StoreError::NotFound { .. }) => {
            debug!(path = %path.display(), "no spreadsheets index yet");
            Ok(SpreadsheetsIndex::new())
        }
        Err(err) => Err(err.into()),
    }
}

/// # Errors
///
/// Fails when the file cannot be written.
pub fn write_index(path: &Path, index: &SpreadsheetsIndex) -> Result<()> {
    info!(path = %path.display(), entries = index.len(), "writing spreadsheets index");
    store::write_json(path, index)?;
    Ok(())
}

/// # Errors
///
/// Fails when the file is unreadable or isn't a workbook.
pub fn read_workbook(path: &Path) -> Result<Workbook> {
    let raw: Value = store::read_json(path)?;
    serde_json::from_value(raw).with_context(|| format!("{} is not a workbook", path.display()))
}

/// # Errors
///
/// Fails when the file cannot be written.
pub fn write_workbook(path: &Path, workbook: &Workbook) -> Result<()> {
    debug!(path = %path.display(), sheets = workbook.sheets.len(), "writing workbook");
    store::write_json(path, workbook)?;
    Ok(())
}

/// What a command did, rendered in every output mode.
#[derive(Debug, Serialize)]
pub struct Report {
    pub command: &'static str,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub counts: IndexMap<&'static str, usize>,
    pub written: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl Report {
    pub fn wrote(&mut self, path: &Path) {
        self.written.push(path.display().to_string());
    }

    pub fn count(&mut self, key: &'static str, value: usize) {
        self.counts.insert(key, value);
    }

    /// # Errors
    ///
    /// Fails when stdout cannot be written.
    pub fn render(&self, mode: OutputMode, quiet: bool) -> Result<()> {
        if quiet && !mode.is_json() {
            return Ok(());
        }
        render_mode(mode, self, render_text, render_pretty)
    }
}

fn render_text(report: &Report, w: &mut dyn Write) -> io::Result<()> {
    for (key, value) in &report.counts {
        writeln!(w, "{key}\t{value}")?;
    }
    for path in &report.written {
        writeln!(w, "wrote\t{path}")?;
    }
    for item in &report.skipped {
        writeln!(w, "skipped\t{item}")?;
    }
    writeln!(w, "warnings\t{}", report.warnings.len())
}

fn render_pretty(report: &Report, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, report.command)?;
    for (key, value) in &report.counts {
        pretty_kv(w, key, value.to_string())?;
    }
    for path in &report.written {
        pretty_kv(w, "wrote", path)?;
    }
    for item in &report.skipped {
        pretty_kv(w, "skipped", item)?;
    }
    if report.warnings.is_empty() {
        pretty_kv(w, "warnings", "none")
    } else {
        pretty_kv(w, "warnings", report.warnings.len().to_string())?;
        for warning in &report.warnings {
            writeln!(w, "  - {warning}")?;
        }
        Ok(())
    }
}
