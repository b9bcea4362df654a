/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use anyhow::{Context, Result, bail};
use clap::Parser as clap_parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use viperc::Compiler;

#[derive(clap_parser)]
#[clap(
    version = "0.1.0",
    about = "Compiles Viper source into x86-64 NASM assembly and links a Linux executable"
)]
struct Opts {
    /// Input source file
    src: PathBuf,
    /// Output basename (produces <dst>.asm, <dst>.o and <dst>)
    dst: PathBuf,
    /// Print every live local before exiting (links libc)
    #[clap(short, long)]
    debug: bool,
    /// Print the intermediate representation instead of compiling
    #[clap(long)]
    emit_ir: bool,
    /// Print diagnostics as JSON
    #[clap(long)]
    json: bool,
}

fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    let source = fs::read_to_string(&opts.src)
        .with_context(|| format!("Failed to read input file: {}", opts.src.display()))?;

    let compiler = Compiler::new(opts.debug);
    let outcome = if opts.emit_ir {
        compiler.compile_to_ir(&source)?
    } else {
        compiler.compile(&source)?
    };

    let Some(output) = outcome.output else {
        if opts.json {
            println!("{}", outcome.registry.to_json()?);
        } else {
            eprintln!("{}", outcome.registry.display());
        }
        std::process::exit(1);
    };
    if !outcome.registry.is_empty() {
        eprintln!("{}", outcome.registry.display());
    }

    if opts.emit_ir {
        println!("{}", output);
        return Ok(());
    }

    let asm_path = opts.dst.with_extension("asm");
    fs::write(&asm_path, &output)
        .with_context(|| format!("Failed to write assembly to {}", asm_path.display()))?;
    assemble_and_link(&opts.dst, &asm_path, opts.debug)?;

    println!(
        "Successfully compiled {} to {}",
        opts.src.display(),
        opts.dst.display()
    );
    Ok(())
}

fn assemble_and_link(dst: &Path, asm_path: &Path, debug: bool) -> Result<()> {
    let object_path = dst.with_extension("o");
    let status = Command::new("nasm")
        .arg("-felf64")
        .arg(asm_path)
        .arg("-o")
        .arg(&object_path)
        .status()
        .context("Failed to run nasm")?;
    if !status.success() {
        bail!("nasm exited with status {}", status);
    }

    let mut linker = Command::new("ld");
    linker.arg("-o").arg(dst).arg(&object_path);
    if debug {
        // the debug epilogue calls printf/exit from libc
        linker
            .arg("-lc")
            .arg("--dynamic-linker")
            .arg("/lib64/ld-linux-x86-64.so.2");
    }
    let status = linker.status().context("Failed to run ld")?;
    if !status.success() {
        bail!("ld exited with status {}", status);
    }
    Ok(())
}
