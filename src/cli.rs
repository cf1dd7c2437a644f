// Idiomatic Rust CLI for Bindelta.
//
// Uses explicit subcommands and long-form options over the binary and
// decorated delta compressors.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::binary::{BinaryDeltaCompressor, Delta, DeltaOptions, MIN_BLOCK, Op, REPLACE_THRESHOLD};
use crate::compressor::{DeltaCompressor, DeltaError};
use crate::decorated::{DecorationOp, DecoratedBinaryDeltaCompressor, Envelope};
use crate::decoration::DECO_ID_MAX;
use crate::io::sha256_hex;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Binary delta encoder/decoder for plain and decorated values.
#[derive(Parser, Debug)]
#[command(
    name = "bindelta",
    version,
    about = "Binary delta encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compute the delta from an old value to a new value.
    Encode(EncodeArgs),
    /// Apply a delta to an old value.
    Decode(DecodeArgs),
    /// Print the structure of a delta.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct EncodeTuningArgs {
    /// Minimum unchanged run worth a copy (supports K/M/G suffix).
    #[arg(long = "min-block", value_parser = parse_byte_size, default_value_t = MIN_BLOCK as u64)]
    min_block: u64,

    /// New values smaller than this are sent whole (supports K/M/G suffix).
    #[arg(long = "replace-threshold", value_parser = parse_byte_size, default_value_t = REPLACE_THRESHOLD as u64)]
    replace_threshold: u64,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Old value to diff against (default: no old value).
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    old: Option<PathBuf>,

    /// New value (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Delta output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Treat values as decorated binaries.
    #[arg(short = 'd', long)]
    decorated: bool,

    /// Check/compute only (do not write output).
    #[arg(long = "check-only")]
    no_output: bool,

    #[command(flatten)]
    tuning: EncodeTuningArgs,

    /// New value (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Delta output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Old value the delta was computed against (default: no old value).
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    old: Option<PathBuf>,

    /// Input delta file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Treat values as decorated binaries.
    #[arg(short = 'd', long)]
    decorated: bool,

    /// Check/compute only (do not write output).
    #[arg(long = "check-only")]
    no_output: bool,

    /// Input delta file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Parse the delta as a decorated envelope.
    #[arg(short = 'd', long)]
    decorated: bool,

    /// Delta input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Encode,
    Decode,
    Inspect,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    decorated: bool,
    no_output: bool,
    min_block: usize,
    replace_threshold: usize,
    old_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    json_output: bool,
}

impl Options {
    fn new(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            use_stdout: false,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            decorated: false,
            no_output: false,
            min_block: MIN_BLOCK,
            replace_threshold: REPLACE_THRESHOLD,
            old_file: None,
            input_file: None,
            output_file: None,
            json_output: cli.json_output,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    match &cli.command {
        Cmd::Encode(args) => Options {
            use_stdout: args.stdout,
            decorated: args.decorated,
            no_output: args.no_output,
            min_block: usize::try_from(args.tuning.min_block).unwrap_or(usize::MAX),
            replace_threshold: usize::try_from(args.tuning.replace_threshold)
                .unwrap_or(usize::MAX),
            old_file: args.old.clone(),
            input_file: args.input.clone().or_else(|| args.input_pos.clone()),
            output_file: args.output.clone().or_else(|| args.output_pos.clone()),
            ..Options::new(Command::Encode, &cli)
        },
        Cmd::Decode(args) => Options {
            use_stdout: args.stdout,
            decorated: args.decorated,
            no_output: args.no_output,
            old_file: args.old.clone(),
            input_file: args.input.clone().or_else(|| args.input_pos.clone()),
            output_file: args.output.clone().or_else(|| args.output_pos.clone()),
            ..Options::new(Command::Decode, &cli)
        },
        Cmd::Inspect(args) => Options {
            decorated: args.decorated,
            input_file: Some(args.input.clone()),
            ..Options::new(Command::Inspect, &cli)
        },
        Cmd::Config => Options::new(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("bindelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn print_json(json: &serde_json::Value) {
    eprintln!("{}", serde_json::to_string_pretty(json).unwrap_or_default());
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("bindelta version {version} (Rust), Copyright (C) bindelta contributors");
    eprintln!("Licensed under the MIT License");

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("MIN_BLOCK={MIN_BLOCK}");
    eprintln!("REPLACE_THRESHOLD={REPLACE_THRESHOLD}");
    eprintln!("DECO_ID_MAX={DECO_ID_MAX}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Compressor selection and I/O
// ---------------------------------------------------------------------------

fn build_compressor(opts: &Options) -> Box<dyn DeltaCompressor> {
    let inner = BinaryDeltaCompressor::with_options(DeltaOptions {
        min_block: opts.min_block,
        replace_threshold: opts.replace_threshold,
    });
    if opts.decorated {
        Box::new(DecoratedBinaryDeltaCompressor::with_inner(inner))
    } else {
        Box::new(inner)
    }
}

/// Read a whole file, or stdin when `path` is `None`.
fn read_input(path: Option<&Path>) -> io::Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn read_old(opts: &Options) -> Result<Option<Vec<u8>>, i32> {
    match &opts.old_file {
        Some(path) => match std::fs::read(path) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                eprintln!("bindelta: old file: {}: {e}", path.display());
                Err(1)
            }
        },
        None => Ok(None),
    }
}

/// Open the output destination: a file (respecting `--force`), stdout, or a
/// sink for `--check-only`.
fn open_output(opts: &Options) -> Result<Box<dyn Write>, i32> {
    if opts.no_output {
        return Ok(Box::new(io::sink()));
    }
    match (opts.use_stdout, &opts.output_file) {
        (true, _) | (_, None) => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        (false, Some(path)) => {
            if path.exists() && !opts.force {
                eprintln!(
                    "bindelta: output file exists, use -f to overwrite: {}",
                    path.display()
                );
                return Err(1);
            }
            match File::create(path) {
                Ok(f) => Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, f))),
                Err(e) => {
                    eprintln!("bindelta: output file: {}: {e}", path.display());
                    Err(1)
                }
            }
        }
    }
}

fn write_output(opts: &Options, data: &[u8]) -> i32 {
    let mut writer = match open_output(opts) {
        Ok(w) => w,
        Err(code) => return code,
    };
    if let Err(e) = writer.write_all(data).and_then(|()| writer.flush()) {
        eprintln!("bindelta: write error: {e}");
        return 1;
    }
    0
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(opts: &Options) -> i32 {
    let old = match read_old(opts) {
        Ok(old) => old,
        Err(code) => return code,
    };
    let new = match read_input(opts.input_file.as_deref()) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("bindelta: input: {e}");
            return 1;
        }
    };

    let compressor = build_compressor(opts);
    let delta = match compressor.extract_delta(old.as_deref(), &new) {
        Ok(delta) => delta,
        Err(e) => {
            eprintln!("bindelta: encode error: {e}");
            return 1;
        }
    };

    // "no change" is written as an empty delta
    let delta_bytes = delta.as_deref().unwrap_or_default();
    let code = write_output(opts, delta_bytes);
    if code != 0 {
        return code;
    }

    let old_size = old.as_ref().map_or(0, Vec::len);
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "bindelta: encoder: old size: {old_size}, new size: {}, delta size: {}{}",
            new.len(),
            delta_bytes.len(),
            if delta.is_none() { " (no change)" } else { "" }
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "encode",
            "decorated": opts.decorated,
            "old_size": old_size,
            "new_size": new.len(),
            "delta_size": delta_bytes.len(),
            "changed": delta.is_some(),
            "new_sha256": sha256_hex(&new),
            "min_block": opts.min_block,
            "replace_threshold": opts.replace_threshold,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let old = match read_old(opts) {
        Ok(old) => old,
        Err(code) => return code,
    };
    let delta = match read_input(opts.input_file.as_deref()) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("bindelta: input: {e}");
            return 1;
        }
    };

    let compressor = build_compressor(opts);
    let delta_opt = (!delta.is_empty()).then_some(delta.as_slice());
    let output = match compressor.apply_delta(old.as_deref(), delta_opt) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("bindelta: decode error: {e}");
            return 1;
        }
    };

    let code = write_output(opts, &output);
    if code != 0 {
        return code;
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "bindelta: decoder: delta size: {}, output size: {}",
            delta.len(),
            output.len()
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "decode",
            "decorated": opts.decorated,
            "old_size": old.as_ref().map_or(0, Vec::len),
            "delta_size": delta.len(),
            "output_size": output.len(),
            "output_sha256": sha256_hex(&output),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

/// Print the operations of a plain binary delta. Returns the number of
/// operations and the length of the value it produces, when known without
/// the old value.
fn print_binary_delta(delta: &[u8], indent: &str) -> Result<(usize, Option<usize>), DeltaError> {
    let parsed = Delta::parse(delta);
    println!("{indent}format:             {}", parsed.name());
    println!("{indent}delta size:         {}", delta.len());

    match parsed {
        Delta::Empty => Ok((0, Some(0))),
        Delta::Replace(value) | Delta::Literal(value) => {
            println!("{indent}value size:         {}", value.len());
            Ok((0, Some(value.len())))
        }
        Delta::BinDiff(ops) => {
            let mut count = 0;
            let mut total = 0;
            for op in ops {
                let op = op?;
                match op {
                    Op::Extract { offset, len } => {
                        println!("{indent}  {count:5}  EXTRACT  offset={offset} len={len}");
                    }
                    Op::Append(data) => {
                        println!("{indent}  {count:5}  APPEND   len={}", data.len());
                    }
                }
                count += 1;
                total += op.output_len();
            }
            println!("{indent}output size:        {total}");
            Ok((count, Some(total)))
        }
    }
}

fn print_envelope(delta: &[u8]) -> Result<(Envelope<'_>, usize), DeltaError> {
    let env = Envelope::parse(delta)?;
    let kind = if env.delete_all {
        "delete all"
    } else if env.ops.is_empty() {
        "no decoration changes"
    } else {
        "decoration changes"
    };
    println!("envelope:             {kind}");
    for op in &env.ops {
        match op {
            DecorationOp::Insert { id, value } => {
                println!("  INSERT  id={id} len={}", value.len());
            }
            DecorationOp::Update { id, delta } => {
                println!("  UPDATE  id={id} delta len={}", delta.len());
            }
            DecorationOp::Delete { id } => println!("  DELETE  id={id}"),
        }
    }

    let value_ops = match env.value_delta {
        Some(vd) => {
            println!("value:                changed");
            print_binary_delta(vd, "  ")?.0
        }
        None => {
            println!("value:                unchanged");
            0
        }
    };
    Ok((env, value_ops))
}

fn cmd_inspect(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("bindelta: inspect requires an input file");
        return 1;
    };
    let delta = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("bindelta: {}: {e}", path.display());
            return 1;
        }
    };

    if delta.is_empty() {
        println!("format:             none (no change)");
        if opts.json_output {
            print_json(&serde_json::json!({ "command": "inspect", "delta_size": 0 }));
        }
        return 0;
    }

    let json = if opts.decorated {
        match print_envelope(&delta) {
            Ok((env, value_ops)) => serde_json::json!({
                "command": "inspect",
                "delta_size": delta.len(),
                "delete_all": env.delete_all,
                "decoration_ops": env.ops.len(),
                "value_changed": env.value_delta.is_some(),
                "value_ops": value_ops,
            }),
            Err(e) => {
                eprintln!("bindelta: invalid delta: {e}");
                return 1;
            }
        }
    } else {
        match print_binary_delta(&delta, "") {
            Ok((ops, output_size)) => serde_json::json!({
                "command": "inspect",
                "delta_size": delta.len(),
                "format": Delta::parse(&delta).name(),
                "ops": ops,
                "output_size": output_size,
            }),
            Err(e) => {
                eprintln!("bindelta: invalid delta: {e}");
                return 1;
            }
        }
    };

    if opts.json_output {
        print_json(&json);
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();

    let default_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let mut opts = resolve_options(cli);

    // Warn if -c overrides output filename.
    if opts.use_stdout
        && !opts.quiet
        && let Some(path) = opts.output_file.take()
    {
        eprintln!(
            "bindelta: warning: -c option overrides output filename: {}",
            path.display()
        );
    }

    log::debug!("options: {opts:?}");

    let exit_code = match opts.command {
        Command::Encode => cmd_encode(&opts),
        Command::Decode => cmd_decode(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
