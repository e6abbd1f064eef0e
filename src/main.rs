use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::Parser;

use tinygrep::{compile, Regex};

/// Search input lines with a small regular-expression engine.
#[derive(Parser, Debug)]
#[command(name = "tinygrep", version)]
struct Args {
    /// Regular expression to search for
    #[arg(short = 'E', value_name = "PATTERN")]
    pattern: String,

    /// Recurse into directories
    #[arg(short = 'r')]
    recursive: bool,

    /// Files (or directories with -r) to search; standard input when omitted
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match run(&args, &mut out) {
        Ok(matched) => {
            if out.flush().is_err() {
                process::exit(2);
            }
            process::exit(if matched { 0 } else { 1 });
        }
        Err(err) => {
            let _ = out.flush();
            eprintln!("tinygrep: {err:#}");
            process::exit(2);
        }
    }
}

fn run(args: &Args, out: &mut impl Write) -> Result<bool> {
    let regex = compile(&args.pattern)?;

    if args.recursive {
        if args.paths.is_empty() {
            bail!("at least one path is required with -r");
        }
        let mut matched = false;
        for path in &args.paths {
            if path.is_dir() {
                matched |= walk_dir(&regex, path, out)?;
            } else {
                matched |= scan_file(&regex, path, true, out)?;
            }
        }
        Ok(matched)
    } else if !args.paths.is_empty() {
        let show_path = args.paths.len() > 1;
        let mut matched = false;
        for path in &args.paths {
            matched |= scan_file(&regex, path, show_path, out)?;
        }
        Ok(matched)
    } else {
        scan_lines(&regex, io::stdin().lock(), None, out)
    }
}

/// Recurse through `dir` in name order, scanning every file. Files and
/// directories that cannot be opened are skipped.
fn walk_dir(regex: &Regex, dir: &Path, out: &mut impl Write) -> Result<bool> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(false);
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .collect();
    paths.sort();

    let mut matched = false;
    for path in paths {
        if path.is_dir() {
            matched |= walk_dir(regex, &path, out)?;
        } else {
            matched |= scan_file(regex, &path, true, out)?;
        }
    }
    Ok(matched)
}

/// Scan one named file, skipping it quietly when it cannot be opened so the
/// remaining paths still get searched.
fn scan_file(regex: &Regex, path: &Path, show_path: bool, out: &mut impl Write) -> Result<bool> {
    let Ok(file) = File::open(path) else {
        return Ok(false);
    };
    let prefix = show_path.then_some(path);
    scan_lines(regex, BufReader::new(file), prefix, out)
}

/// Print every line of `reader` that the pattern matches, `path:`-prefixed
/// when requested. Lines are byte strings; they need not be valid UTF-8.
fn scan_lines<R: BufRead>(
    regex: &Regex,
    reader: R,
    prefix: Option<&Path>,
    out: &mut impl Write,
) -> Result<bool> {
    let mut matched = false;
    for line in reader.split(b'\n') {
        let mut line = line.context("read error")?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if regex.is_match(&line)? {
            if let Some(path) = prefix {
                write!(out, "{}:", path.display())?;
            }
            out.write_all(&line)?;
            out.write_all(b"\n")?;
            matched = true;
        }
    }
    Ok(matched)
}
