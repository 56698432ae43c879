//! Module programs
//!
//! The host-execution primitive the loader adapters delegate to. A module
//! source is a flat list of statements:
//!
//! ```text
//! // comment
//! var PI = 3.14;
//! var name = "euler";
//! import pkg.sub;
//! import pkg.sub as s;
//! ```
//!
//! Executing a program creates the module, registers it in the cache
//! *before* running the body (so import cycles terminate), and evaluates
//! each statement against the registry. Top-level imports go through the
//! full import pipeline and may themselves produce placeholders.

use std::path::PathBuf;

use crate::error::LoadError;
use crate::module::{Module, ModuleRef, ModuleSlot, Value};
use crate::registry::ModuleRegistry;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Var { name: String, value: Value },
    Import { path: String, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Program {
    pub stmts: Vec<Stmt>,
}

pub(crate) struct ParseIssue {
    pub line: usize,
    pub message: String,
}

fn issue(line: usize, message: impl Into<String>) -> ParseIssue {
    ParseIssue {
        line,
        message: message.into(),
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_module_path(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_ident)
}

fn unescape(s: &str, line: usize) -> Result<String, ParseIssue> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            other => {
                return Err(issue(
                    line,
                    format!("invalid escape sequence '\\{}'", other.unwrap_or(' ')),
                ))
            }
        }
    }
    Ok(out)
}

fn parse_literal(s: &str, line: usize) -> Result<Value, ParseIssue> {
    if let Some(inner) = s.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .ok_or_else(|| issue(line, "unterminated string literal"))?;
        return Ok(Value::Str(unescape(inner, line)?));
    }
    match s {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    if let Ok(x) = s.parse::<f64>() {
        return Ok(Value::Float(x));
    }
    Err(issue(line, format!("invalid literal '{}'", s)))
}

/// Parse a module source. `str::lines` strips `\r\n` pairs, so sources
/// written on any platform parse identically.
pub(crate) fn parse(source: &str) -> Result<Program, ParseIssue> {
    let mut stmts = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let stmt = line
            .strip_suffix(';')
            .ok_or_else(|| issue(line_no, "missing ';'"))?
            .trim();

        if let Some(rest) = stmt.strip_prefix("var ") {
            let (name, value) = rest
                .split_once('=')
                .ok_or_else(|| issue(line_no, "expected '=' in var statement"))?;
            let name = name.trim();
            if !is_ident(name) {
                return Err(issue(line_no, format!("invalid variable name '{}'", name)));
            }
            let value = parse_literal(value.trim(), line_no)?;
            stmts.push(Stmt::Var {
                name: name.to_string(),
                value,
            });
        } else if let Some(rest) = stmt.strip_prefix("import ") {
            let rest = rest.trim();
            let (path, alias) = match rest.split_once(" as ") {
                Some((p, a)) => (p.trim(), Some(a.trim().to_string())),
                None => (rest, None),
            };
            if !is_module_path(path) {
                return Err(issue(line_no, format!("invalid import path '{}'", path)));
            }
            if let Some(a) = &alias {
                if !is_ident(a) {
                    return Err(issue(line_no, format!("invalid import alias '{}'", a)));
                }
            }
            stmts.push(Stmt::Import {
                path: path.to_string(),
                alias,
            });
        } else {
            return Err(issue(line_no, format!("unrecognized statement '{}'", stmt)));
        }
    }
    Ok(Program { stmts })
}

/// Execute a module source against the registry.
///
/// With `target` set, the source is re-executed into the existing module
/// object (reload); otherwise a fresh module is created. The cache holds
/// the `Ready` entry for the whole execution; on failure a fresh load is
/// removed from the cache, a reload keeps the target entry.
pub(crate) fn execute(
    reg: &mut ModuleRegistry,
    name: &str,
    source: &str,
    origin: Option<PathBuf>,
    target: Option<&ModuleRef>,
) -> Result<ModuleRef, LoadError> {
    let program = parse(source).map_err(|e| LoadError::Parse {
        path: origin
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("<{}>", name))),
        line: e.line,
        message: e.message,
    })?;

    let module = match target {
        Some(existing) => {
            existing.borrow().clear_attrs();
            existing.clone()
        }
        None => Module::new(name, origin),
    };
    reg.cache_insert(name, ModuleSlot::Ready(module.clone()));

    for stmt in &program.stmts {
        let result = match stmt {
            Stmt::Var { name: var, value } => {
                module.borrow().set_attr(var.clone(), value.clone());
                Ok(())
            }
            Stmt::Import { path, alias } => run_import(reg, &module, path, alias.as_deref()),
        };
        if let Err(e) = result {
            match target {
                Some(existing) => reg.cache_insert(name, ModuleSlot::Ready(existing.clone())),
                None => reg.cache_remove(name),
            }
            return Err(e);
        }
    }
    Ok(module)
}

/// A top-level `import` statement: run the import, then bind the result
/// into the module's scope through the registry so the bind site is
/// registered for later rewriting.
fn run_import(
    reg: &mut ModuleRegistry,
    module: &ModuleRef,
    path: &str,
    alias: Option<&str>,
) -> Result<(), LoadError> {
    let slot = reg.import(path)?;
    let scope = module.borrow().attrs();
    match alias {
        // `import a.b as c;` binds the leaf module under the alias.
        Some(alias) => reg.bind(&scope, alias, slot),
        // `import a.b;` binds the root package name, as the host's import
        // statement does.
        None => {
            let root = path.split('.').next().unwrap_or(path);
            let root_slot = reg.cached(root).unwrap_or(slot);
            reg.bind(&scope, root, root_slot);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_literals() {
        let program = parse(
            "var a = 1;\nvar b = 2.5;\nvar c = \"hi\";\nvar d = true;\nvar e = null;\n",
        )
        .unwrap_or_else(|e| panic!("line {}: {}", e.line, e.message));

        assert_eq!(program.stmts.len(), 5);
        assert_eq!(
            program.stmts[0],
            Stmt::Var {
                name: "a".to_string(),
                value: Value::Int(1)
            }
        );
        assert_eq!(
            program.stmts[2],
            Stmt::Var {
                name: "c".to_string(),
                value: Value::Str("hi".to_string())
            }
        );
    }

    #[test]
    fn test_parse_imports() {
        let program = parse("import pkg.sub;\nimport pkg.sub as s;\n").unwrap_or_else(|e| {
            panic!("line {}: {}", e.line, e.message)
        });
        assert_eq!(
            program.stmts[0],
            Stmt::Import {
                path: "pkg.sub".to_string(),
                alias: None
            }
        );
        assert_eq!(
            program.stmts[1],
            Stmt::Import {
                path: "pkg.sub".to_string(),
                alias: Some("s".to_string())
            }
        );
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let program = parse("// header\n\n  // indented comment\nvar x = 1;\n").unwrap_or_else(
            |e| panic!("line {}: {}", e.line, e.message),
        );
        assert_eq!(program.stmts.len(), 1);
    }

    #[test]
    fn test_parse_crlf_sources() {
        let program = parse("var x = 1;\r\nvar y = 2;\r\n")
            .unwrap_or_else(|e| panic!("line {}: {}", e.line, e.message));
        assert_eq!(program.stmts.len(), 2);
    }

    #[test]
    fn test_parse_string_escapes() {
        let program = parse("var s = \"a\\n\\\"b\\\"\";").unwrap_or_else(|e| {
            panic!("line {}: {}", e.line, e.message)
        });
        assert_eq!(
            program.stmts[0],
            Stmt::Var {
                name: "s".to_string(),
                value: Value::Str("a\n\"b\"".to_string())
            }
        );
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        let err = parse("var x = 1;\nvar broken\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("missing ';'"));

        let err = parse("var x = @;").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("invalid literal"));

        let err = parse("frobnicate;").unwrap_err();
        assert!(err.message.contains("unrecognized statement"));
    }

    #[test]
    fn test_parse_rejects_bad_import_paths() {
        assert!(parse("import 1bad;").is_err());
        assert!(parse("import a..b;").is_err());
        assert!(parse("import a.b as 2c;").is_err());
    }
}
