//! Header scanner for plain-text documents with RFC 822 style headers,
//! exposed to templates as `scanfile(path, file)`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use interpreter::{RuntimeError, RuntimeValue};
use tracing::debug;

/// Fields found in a document's header block, plus a one-line summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub fields: BTreeMap<String, String>,
    pub summary: String,
}

impl Metadata {
    /// `(fields, summary)` as a template value.
    pub fn into_value(self) -> RuntimeValue {
        let fields = self
            .fields
            .into_iter()
            .map(|(key, value)| (key, RuntimeValue::String(value)))
            .collect();
        RuntimeValue::Tuple(vec![
            RuntimeValue::Dict(fields),
            RuntimeValue::String(self.summary),
        ])
    }
}

/// Scan the leading header block of `text`.
pub fn scan_text(text: &str) -> Metadata {
    let mut raw: Vec<(String, String)> = Vec::new();
    let mut seen_header = false;
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        if is_overline(line) {
            let title = lines.next().unwrap_or_default();
            lines.next(); // underline
            raw.push(("title".to_string(), title.trim().to_string()));
        } else if let Some((key, value)) = header(line) {
            seen_header = true;
            raw.push((key.to_string(), value.to_string()));
        } else if line.trim().is_empty() {
            if seen_header {
                break;
            }
        } else if line.starts_with([' ', '\t']) && seen_header {
            if let Some((_, value)) = raw.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else {
            break;
        }
    }

    let mut fields: BTreeMap<String, String> = raw
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect();
    let summary = derive(&mut fields);
    Metadata { fields, summary }
}

/// Read `path/file` and scan it.
pub fn scanfile(path: &Path, file: &str) -> io::Result<Metadata> {
    let filename = normalize(&path.join(file));
    debug!(file = %filename.display(), "scanning headers");
    let text = std::fs::read_to_string(&filename)?;
    Ok(scan_text(&text.replace("\r\n", "\n").replace('\r', "\n")))
}

/// `scanfile` as a function templates can call.
pub fn scanfile_function() -> RuntimeValue {
    RuntimeValue::function("scanfile", |args| {
        let [RuntimeValue::String(path), RuntimeValue::String(file)] = args else {
            return Err(match args.len() {
                2 => RuntimeError::type_error("str, str", describe(args)),
                got => RuntimeError::Arity {
                    name: "scanfile".to_string(),
                    expected: "2".to_string(),
                    got,
                },
            });
        };
        scanfile(Path::new(path), file)
            .map(Metadata::into_value)
            .map_err(|e| RuntimeError::IoError(format!("cannot scan '{}': {}", file, e)))
    })
}

fn describe(args: &[RuntimeValue]) -> String {
    args.iter()
        .map(RuntimeValue::type_name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_overline(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '=')
}

/// `Key: value` at the very start of the line.
fn header(line: &str) -> Option<(&str, &str)> {
    let end = line.find([' ', ':'])?;
    if end == 0 {
        return None;
    }
    let value = line[end..].strip_prefix(": ")?;
    Some((&line[..end], value.trim()))
}

/// Fill in derived fields and build the summary line.
fn derive(fields: &mut BTreeMap<String, String>) -> String {
    if !fields.contains_key("date") {
        if let Some(created) = fields.get("created").cloned() {
            fields.insert("date".to_string(), created);
        }
    }
    if let Some(modified) = fields.get("last-modified").cloned() {
        fields.insert("date".to_string(), modified);
    }

    let mut info = Vec::new();
    if let Some(date) = fields.get_mut("date") {
        if date.starts_with("$Date:") {
            *date = date.chars().skip(7).take(10).collect::<String>().replace('/', "-");
        }
        info.push(format!("Date: {}.", date));
    }
    if let Some(version) = fields.get("version") {
        let version = if version.starts_with("$Revision:") {
            // Drop "$Revision: " and the trailing " $".
            let chars: Vec<char> = version.chars().collect();
            chars
                .get(11..chars.len().saturating_sub(2))
                .map(|kept| kept.iter().collect())
                .unwrap_or_default()
        } else {
            version.clone()
        };
        info.push(format!("Version: {}.", version));
    }
    if let Some(status) = fields.get("status") {
        info.push(format!("Status: {}.", status));
    }
    if let Some(pep) = fields.get("pep").cloned() {
        let title = match fields.get("title") {
            Some(title) => format!("PEP {}: {}", pep, title),
            None => format!("PEP {}", pep),
        };
        fields.insert("title".to_string(), title);
    }
    info.join(" ")
}

/// Lexically collapse `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEP: &str = "\
PEP: 258
Title: DPS Generic Implementation Details
Version: $Revision: 1.2 $
Last-Modified: $Date: 2001/08/04 15:07:26 $
Author: goodger@users.sourceforge.net (David Goodger)
Status: Draft
Type: Standards Track
Created: 31-May-2001
Post-History:

Abstract

    This PEP documents implementation details.
";

    #[test]
    fn pep_headers() {
        let meta = scan_text(PEP);
        assert_eq!(meta.fields["pep"], "258");
        assert_eq!(meta.fields["title"], "PEP 258: DPS Generic Implementation Details");
        assert_eq!(meta.fields["date"], "2001-08-04");
        assert_eq!(meta.fields["created"], "31-May-2001");
        assert_eq!(meta.fields["version"], "$Revision: 1.2 $");
        assert!(!meta.fields.contains_key("abstract"));
        assert_eq!(meta.summary, "Date: 2001-08-04. Version: 1.2. Status: Draft.");
    }

    #[test]
    fn overlined_title_and_blank_lead() {
        let meta = scan_text("\n=====\n Intro \n=====\n\nAuthor: someone\nDate: 2001-07-01\n\nbody: not a header\n");
        assert_eq!(meta.fields["title"], "Intro");
        assert_eq!(meta.fields["author"], "someone");
        assert!(!meta.fields.contains_key("body"));
        assert_eq!(meta.summary, "Date: 2001-07-01.");
    }

    #[test]
    fn indented_lines_continue_the_previous_value() {
        let meta = scan_text("Author: one,\n    two\nCreated: 2001\n");
        assert_eq!(meta.fields["author"], "one, two");
        assert_eq!(meta.fields["date"], "2001");
    }

    #[test]
    fn prose_ends_the_scan() {
        let meta = scan_text("Just a paragraph.\nKey: value\n");
        assert!(meta.fields.is_empty());
        assert_eq!(meta.summary, "");
    }

    #[test]
    fn short_keyword_values_keep_what_is_there() {
        let meta = scan_text("Date: $Date: 2001$\nVersion: $Revision: 7\n");
        assert_eq!(meta.fields["date"], "2001$");
        assert_eq!(meta.summary, "Date: 2001$. Version: .");

        let meta = scan_text("Version: $Revision: 1.10 $\n");
        assert_eq!(meta.summary, "Version: 1.10.");
    }

    #[test]
    fn header_needs_colon_space() {
        assert_eq!(header("Key: value "), Some(("Key", "value")));
        assert_eq!(header("Key:value"), None);
        assert_eq!(header(" Key: value"), None);
        assert_eq!(header("two words: no"), None);
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize(Path::new("a/./b/../c.txt")), PathBuf::from("a/c.txt"));
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn scanfile_returns_fields_and_summary() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::write(dir.path().join("pep.txt"), PEP.replace('\n', "\r\n")).unwrap();
        let value = scanfile_function();
        let RuntimeValue::Function(function) = value else {
            panic!("not a function");
        };
        let path = RuntimeValue::from(dir.path().to_string_lossy().into_owned());
        let result = function.call(&[path, RuntimeValue::from("sub/../pep.txt")]).unwrap();
        let RuntimeValue::Tuple(items) = result else {
            panic!("not a tuple");
        };
        assert_eq!(items[1], RuntimeValue::from("Date: 2001-08-04. Version: 1.2. Status: Draft."));

        let missing = function.call(&[RuntimeValue::from("."), RuntimeValue::from("nope.txt")]);
        assert!(matches!(missing, Err(RuntimeError::IoError(_))));
    }
}
