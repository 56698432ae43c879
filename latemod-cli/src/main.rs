//! Latemod CLI
//!
//! Project-based execution - all configuration from latemod.json

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

mod logging;

use latemod_config::RegistryConfig;
use latemod_core::{ModuleRegistry, Value};
use latemod_vfs::NativeStore;
use logging::LogFormat;

/// latemod.json structure
#[derive(Debug, serde::Deserialize)]
struct ProjectJson {
    /// Entry module identifier (dotted)
    entry: String,
    /// Registry configuration: search roots, ignore sets, report mode
    #[serde(default)]
    registry: RegistryConfig,
    /// Import behavior options
    #[serde(default)]
    import: ImportOptions,
}

/// Import behavior options
#[derive(Debug, Default, serde::Deserialize)]
struct ImportOptions {
    /// Whether to install the lazy import hook (default: true)
    lazy: Option<bool>,
    /// Log level: "silent", "error", "warn", "info", "debug", "trace"
    log_level: Option<String>,
    /// Log format: "pretty", "compact", "json"
    log_format: Option<String>,
}

#[derive(Parser)]
#[command(
    name = "latemod",
    about = "Lazy module importing - project-based execution",
    version = "0.1.0"
)]
struct Cli {
    /// Configuration file path (default: ./latemod.json)
    #[arg(value_name = "CONFIG", default_value = "latemod.json")]
    config: PathBuf,

    /// Print the entry module's attributes after the import completes
    #[arg(long)]
    dump: bool,

    /// Emit the import report on exit, overriding the configured mode
    #[arg(long)]
    report: bool,
}

fn main() {
    let cli = Cli::parse();

    let project = match read_project_json(&cli.config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    init_logging(&project.import);

    // Search roots are relative to the project file's directory.
    let base_dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let mut config = project.registry.clone();
    config.search_roots = config
        .search_roots
        .iter()
        .map(|root| base_dir.join(root))
        .collect();
    if cli.report {
        config.report = latemod_config::ReportMode::Verbose;
    }

    let store = Arc::new(NativeStore::new());
    let mut reg = match ModuleRegistry::new(store, &config) {
        Ok(reg) => reg,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    if project.import.lazy.unwrap_or(true) {
        reg.install();
    }

    let slot = match reg.import(&project.entry) {
        Ok(slot) => slot,
        Err(e) => {
            eprintln!("Error: failed to import '{}': {}", project.entry, e);
            process::exit(1);
        }
    };
    // The entry module is the program; force it so its body runs.
    let module = match slot.force(&mut reg) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("Error: failed to load '{}': {}", project.entry, e);
            process::exit(1);
        }
    };

    if cli.dump {
        dump_module(&project.entry, &module);
    }

    reg.report("shutdown");
}

/// Print the module's attributes, one per line, sorted by name.
fn dump_module(name: &str, module: &latemod_core::ModuleRef) {
    println!("[{}]", name);
    let names = module.borrow().attr_names();
    for key in names {
        let value = module.borrow().get_attr(&key);
        match value {
            Some(Value::Module(slot)) => {
                // Modules print by identity; dumping must not force loads.
                println!("{} = {:?}", key, slot)
            }
            Some(value) => println!("{} = {}", key, value),
            None => {}
        }
    }
}

/// Read and parse latemod.json
fn read_project_json(path: &Path) -> Result<ProjectJson, String> {
    if !path.exists() {
        return Err(format!(
            "'{}' not found\n\nThe current directory is not a latemod project.\nHint: create '{}' with an 'entry' field",
            path.display(),
            path.display()
        ));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;

    let project: ProjectJson = serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse '{}': {}", path.display(), e))?;

    if project.entry.is_empty() {
        return Err(format!("'entry' in '{}' must not be empty", path.display()));
    }

    Ok(project)
}

/// Initialize logging from the project options, defaulting to warnings in
/// compact format.
fn init_logging(options: &ImportOptions) {
    let level = options
        .log_level
        .as_deref()
        .and_then(logging::parse_level)
        .unwrap_or(LevelFilter::WARN);
    let format = options
        .log_format
        .as_deref()
        .and_then(logging::parse_format)
        .unwrap_or(LogFormat::Compact);
    logging::init(level, format);
}
