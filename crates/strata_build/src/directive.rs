//! The default line-directive processor.
//!
//! Source files are plain text. Lines starting with `@` are directives,
//! everything else is body text copied into the generated file:
//!
//! | directive           | meaning                                                 |
//! |---------------------|---------------------------------------------------------|
//! | `@depends <path>`   | depends on another file, relative to this file's folder |
//! | `@uses <type>`      | refers to a qualified type                              |
//! | `@group <name>`     | this type is a member of a type group                   |
//! | `@collects <name>`  | the output lists the members of a type group            |
//! | `@nocompile`        | the output is not submitted to the toolchain            |
//! | `@error <message>`  | reports a parse error on this line                      |
//!
//! Each file generates one output at its type's path, e.g. `app.model.Customer`
//! becomes `app/model/Customer.gen`.

use std::path::Path;

use strata_common::name::dotted_to_path;
use strata_source::SourceEntry;

use crate::phase::Phase;
use crate::processor::{
    FileProcessor, GenerateContext, GenerateError, GeneratedFile, ParseError, ParsedFile,
};

/// Handles the configured source extensions in the [`Phase::Process`] phase.
pub struct DirectiveProcessor {
    extensions: Vec<String>,
}

impl DirectiveProcessor {
    /// Creates a processor for files with the given extensions.
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

impl FileProcessor for DirectiveProcessor {
    fn name(&self) -> &str {
        "directive"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn phase(&self) -> Phase {
        Phase::Process
    }

    fn parse(&self, entry: &SourceEntry) -> Result<ParsedFile, ParseError> {
        let text = std::fs::read_to_string(&entry.abs_path).map_err(|e| ParseError {
            path: entry.abs_path.clone(),
            line: None,
            message: format!("cannot read file: {e}"),
        })?;
        let dir = entry.abs_path.parent().unwrap_or(Path::new(""));
        let mut parsed = ParsedFile {
            defined_types: vec![entry.type_name.as_str().to_string()],
            needs_compile: true,
            ..ParsedFile::default()
        };

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx as u32 + 1;
            let Some(directive) = line.trim_start().strip_prefix('@') else {
                parsed.body.push(line.to_string());
                continue;
            };
            let (keyword, arg) = match directive.split_once(char::is_whitespace) {
                Some((k, a)) => (k, a.trim()),
                None => (directive.trim_end(), ""),
            };
            let error = |message: String| ParseError {
                path: entry.abs_path.clone(),
                line: Some(lineno),
                message,
            };
            match keyword {
                "depends" | "uses" | "group" | "collects" if arg.is_empty() => {
                    return Err(error(format!("@{keyword} needs an argument")));
                }
                "depends" => parsed.file_deps.push(dir.join(arg)),
                "uses" => parsed.type_deps.push(arg.to_string()),
                "group" => parsed.groups.push(arg.to_string()),
                "collects" => parsed.group_deps.push(arg.to_string()),
                "nocompile" => parsed.needs_compile = false,
                "error" => return Err(error(arg.to_string())),
                other => return Err(error(format!("unknown directive '@{other}'"))),
            }
        }
        Ok(parsed)
    }

    fn generate(
        &self,
        entry: &SourceEntry,
        parsed: &ParsedFile,
        ctx: &GenerateContext<'_>,
    ) -> Result<Vec<GeneratedFile>, GenerateError> {
        let type_name = entry.type_name.as_str();
        let mut out = format!("// generated from {type_name}\n");
        for line in &parsed.body {
            out.push_str(line);
            out.push('\n');
        }
        for group in &parsed.group_deps {
            let members = ctx.groups.get(group).map(Vec::as_slice).unwrap_or_default();
            out.push_str(&format!("// group {group}: {}\n", members.join(", ")));
        }
        let rel_path = dotted_to_path(type_name).with_extension(ctx.generated_extension);
        Ok(vec![GeneratedFile {
            rel_path,
            contents: out.into_bytes(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;
    use strata_common::LayerId;

    fn entry(root: &Path, rel: &str, body: &str) -> SourceEntry {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        SourceEntry::new(LayerId::from_raw(0), "app", root, PathBuf::from(rel))
    }

    fn processor() -> DirectiveProcessor {
        DirectiveProcessor::new(vec!["sc".to_string()])
    }

    #[test]
    fn parses_directives() {
        let tmp = tempfile::tempdir().unwrap();
        let e = entry(
            tmp.path(),
            "model/Customer.sc",
            "@depends Order.sc\n@uses app.util.Money\n@group entities\nfield name\n",
        );
        let parsed = processor().parse(&e).unwrap();
        assert_eq!(parsed.defined_types, vec!["app.model.Customer"]);
        assert_eq!(parsed.file_deps, vec![tmp.path().join("model/Order.sc")]);
        assert_eq!(parsed.type_deps, vec!["app.util.Money"]);
        assert_eq!(parsed.groups, vec!["entities"]);
        assert_eq!(parsed.body, vec!["field name"]);
        assert!(parsed.needs_compile);
    }

    #[test]
    fn error_directive_fails_with_line() {
        let tmp = tempfile::tempdir().unwrap();
        let e = entry(tmp.path(), "Bad.sc", "ok\n@error broken here\n");
        let err = processor().parse(&e).unwrap_err();
        assert_eq!(err.line, Some(2));
        assert_eq!(err.message, "broken here");
    }

    #[test]
    fn unknown_directive_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let e = entry(tmp.path(), "Odd.sc", "@frobnicate\n");
        let err = processor().parse(&e).unwrap_err();
        assert!(err.message.contains("@frobnicate"));
    }

    #[test]
    fn nocompile_clears_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let e = entry(tmp.path(), "Doc.sc", "@nocompile\n");
        assert!(!processor().parse(&e).unwrap().needs_compile);
    }

    #[test]
    fn generate_writes_type_path_and_group_members() {
        let tmp = tempfile::tempdir().unwrap();
        let e = entry(tmp.path(), "Registry.sc", "@collects entities\nbody\n");
        let p = processor();
        let parsed = p.parse(&e).unwrap();
        let groups = BTreeMap::from([(
            "entities".to_string(),
            vec!["app.A".to_string(), "app.B".to_string()],
        )]);
        let ctx = GenerateContext {
            output_root: tmp.path(),
            generated_extension: "gen",
            groups: &groups,
        };
        let files = p.generate(&e, &parsed, &ctx).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path, PathBuf::from("app/Registry.gen"));
        let text = String::from_utf8(files[0].contents.clone()).unwrap();
        assert_eq!(
            text,
            "// generated from app.Registry\nbody\n// group entities: app.A, app.B\n"
        );
    }

    #[test]
    fn identical_sources_generate_identical_bytes() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let ea = entry(a.path(), "Same.sc", "x\n");
        let eb = entry(b.path(), "Same.sc", "x\n");
        let p = processor();
        let groups = BTreeMap::new();
        let ctx = GenerateContext {
            output_root: a.path(),
            generated_extension: "gen",
            groups: &groups,
        };
        let ga = p.generate(&ea, &p.parse(&ea).unwrap(), &ctx).unwrap();
        let gb = p.generate(&eb, &p.parse(&eb).unwrap(), &ctx).unwrap();
        assert_eq!(ga, gb);
    }
}
