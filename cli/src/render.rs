use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use interpreter::{Interpreter, RuntimeValue};
use stencil::{Copier, CopyError, PatternError, PatternSet};

use crate::scan;

/// The copier used for `.tpl`-style templates: backquoted expressions,
/// `# ` statements, `#\` continuations and `#>` / `#=` / `#<` compounds.
pub fn copier() -> Result<Copier<Interpreter>, PatternError> {
    Ok(Copier::new(PatternSet::conventional()?, Interpreter::new()))
}

/// Globals every template sees: `path`, `files`, `date` and `scanfile`.
pub fn template_globals(path: &str, files: &[String]) -> HashMap<String, RuntimeValue> {
    let files = files
        .iter()
        .map(|file| RuntimeValue::from(file.as_str()))
        .collect();
    HashMap::from([
        ("path".to_string(), RuntimeValue::from(path)),
        ("files".to_string(), RuntimeValue::List(files)),
        (
            "date".to_string(),
            RuntimeValue::String(chrono::Local::now().format("%Y-%m-%d").to_string()),
        ),
        ("scanfile".to_string(), scan::scanfile_function()),
    ])
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error("cannot write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Copy `lines` and write the result to `output`. The file is only touched
/// once the whole copy has succeeded.
pub fn render_to_file(
    copier: &Copier<Interpreter>,
    lines: &[&str],
    globals: &HashMap<String, RuntimeValue>,
    output: &Path,
) -> Result<(), RenderError> {
    let text = copier.copy(lines, globals)?.concat();
    std::fs::write(output, text).map_err(|source| RenderError::Write {
        path: output.to_path_buf(),
        source,
    })
}

pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// The template's name without its final extension, or `None` when there
/// is no extension to strip.
pub fn output_name(template: &Path) -> Option<PathBuf> {
    template.extension()?;
    Some(template.with_extension(""))
}
