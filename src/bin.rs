use std::{
    fs,
    path::{Path, PathBuf},
};

use bfc::{
    compile, compile_native,
    toolchain::{assemble_and_link, ToolchainError},
    CompileOptions,
};
use clap::Parser;
use color_eyre::{
    eyre::{bail, Context as _},
    Result,
};

#[derive(Parser, Debug)]
#[command(name = "bfc")]
#[command(about = "Brainfuck x86-64 compiler")]
struct Args {
    /// Brainfuck program file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Memory size in bytes
    #[arg(
        short,
        long,
        default_value_t = 512,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    memsize: u64,

    /// Base name of the generated files; defaults to the input without `.b`
    #[arg(short, long, value_name = "BASE")]
    output: Option<PathBuf>,

    /// Generate object file and executable (requires NASM and ld)
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    build: bool,

    /// Write an executable directly, without NASM and ld
    #[arg(long, action = clap::ArgAction::SetTrue)]
    native: bool,
}

/// Base name for the generated files: the input without `.b`, else without
/// its extension, else with `.out` appended.
fn base_name(input: &Path) -> PathBuf {
    if let Some(stem) = input.to_str().and_then(|s| s.strip_suffix(".b")) {
        if !stem.is_empty() && !stem.ends_with('/') {
            return PathBuf::from(stem);
        }
    }

    let stripped = input.with_extension("");
    if stripped != input {
        return stripped;
    }

    let mut out = input.as_os_str().to_owned();
    out.push(".out");
    PathBuf::from(out)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

fn same_file(a: &Path, b: &Path) -> bool {
    a == b
        || matches!(
            (fs::canonicalize(a), fs::canonicalize(b)),
            (Ok(a), Ok(b)) if a == b
        )
}

/// Picks the executable base and listing path, refusing any choice that
/// would overwrite the input.
fn output_paths(
    input: &Path,
    output: Option<&Path>,
) -> Result<(PathBuf, PathBuf)> {
    let base = output.map_or_else(|| base_name(input), Path::to_path_buf);
    let asm = with_suffix(&base, ".asm");
    let object = with_suffix(&base, ".o");

    for path in [&base, &asm, &object] {
        if same_file(path, input) {
            bail!(
                "output {} would overwrite the input file",
                path.display()
            );
        }
    }

    Ok((base, asm))
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let options = CompileOptions {
        memory_size: args.memsize,
    };

    let source = fs::read_to_string(&args.input)
        .wrap_err_with(|| format!("could not read {}", args.input.display()))?;

    let (base, asm) = output_paths(&args.input, args.output.as_deref())?;

    let listing = compile(&source, &options).wrap_err_with(|| {
        format!("could not compile {}", args.input.display())
    })?;

    fs::write(&asm, listing.to_string())
        .wrap_err_with(|| format!("could not write {}", asm.display()))?;

    if args.native {
        let binary = compile_native(&source, &options)?;
        fs::write(&base, binary)
            .wrap_err_with(|| format!("could not write {}", base.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&base, fs::Permissions::from_mode(0o755))?;
        }
    }

    if args.build {
        match assemble_and_link(&asm, &base) {
            Ok(_) => {}
            Err(ToolchainError::Unsupported) => {
                eprintln!("bfc: warning: building only works on POSIX systems");
            }
            Err(e) => return Err(e).wrap_err("build failed"),
        }
    }

    println!("DONE");

    Ok(())
}
