//! segasm – two-pass segment assembler (CLI)

use anyhow::Result;
use clap::Parser;
use std::{fs, io, path::PathBuf, process::ExitCode};
use tracing::Level;

use segasm::error::AsmError;

/// CLI options
#[derive(Parser, Debug)]
#[command(author, version, about = "Segment assembler: listing + object code")]
struct Cli {
    /// Input ASM source
    input: PathBuf,

    /// Listing file (default: stdout)
    #[arg(short, long)]
    listing: Option<PathBuf>,

    /// Object code file
    #[arg(short, long, default_value = "program.obj")]
    output: PathBuf,

    /// Write raw object bytes instead of binary-digit text
    #[arg(long)]
    binary: bool,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        tracing::error!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: &Cli) -> Result<()> {
    let src = fs::read_to_string(&cli.input)?;
    tracing::info!("assemble {}", cli.input.display());

    let out = segasm::compile(&src)
        .ok_or_else(|| AsmError::EmptySource(cli.input.display().to_string()))?;

    match &cli.listing {
        Some(path) => fs::write(path, &out.listing)?,
        None => println!("{}", out.listing),
    }

    let (Some(bytes), Some(text)) = (&out.object_bytes, &out.object_code) else {
        return Err(AsmError::Rejected(out.diagnostics.error_count()).into());
    };
    if cli.binary {
        fs::write(&cli.output, bytes)?;
    } else {
        fs::write(&cli.output, text)?;
    }
    tracing::info!("object code: {} bytes -> {}", bytes.len(), cli.output.display());
    Ok(())
}
