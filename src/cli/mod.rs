pub mod bench;
pub mod mask;
pub mod partition;

use std::path::Path;
use std::process;

use tpcmask::diagnostic::Diagnostic;
use tpcmask::directive::{parse_directives, render_directive_errors, KernelMap};
use tpcmask::project::Project;

/// Load the project file: `--config` if given, otherwise tpcmask.toml in
/// the input's directory or an ancestor. No file means defaults.
pub fn load_project(config: Option<&Path>, input: &Path) -> Project {
    let toml_path = match config {
        Some(path) => Some(path.to_path_buf()),
        None => Project::find(input.parent().unwrap_or(Path::new("."))),
    };
    let Some(toml_path) = toml_path else {
        return Project::default();
    };
    match Project::load(&toml_path) {
        Ok(p) => p,
        Err(e) => exit_with(&e),
    }
}

/// Resolve project directives followed by command-line ones, so the
/// command line wins for a kernel named in both.
pub fn resolve_kernels(project: &Project, cli: &[String]) -> KernelMap {
    let directives: Vec<&String> = project.kernels.iter().chain(cli).collect();
    if directives.is_empty() {
        eprintln!("error: no kernel directives given");
        eprintln!("  help: pass -k name:spec or add a [kernels] section to tpcmask.toml");
        process::exit(1);
    }
    match parse_directives(directives) {
        Ok(kernels) => kernels,
        Err(errors) => {
            render_directive_errors(&errors);
            eprintln!("error: incorrectly formatted kernel directives, nothing was written");
            process::exit(1);
        }
    }
}

/// Render a span-less diagnostic and exit with status 1.
pub fn exit_with(diag: &Diagnostic) -> ! {
    diag.render("", "");
    process::exit(1);
}
