use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dxb_core::{BoardSet, ChecksumUpdate, encode, is_native, peel};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dxb-cli")]
#[command(about = "DX-Ball 2 board set unlocker – CLI tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Log layer keys and checksum details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decrypt a board set, optionally drop its password and fix the checksum
    Unlock {
        /// Path to the board set (.bdz)
        board: PathBuf,

        /// Where to write the result (default: <name>.new.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Remove the password without asking
        #[arg(long, conflicts_with = "keep_password")]
        bypass: bool,

        /// Keep the password without asking
        #[arg(long)]
        keep_password: bool,
    },

    /// Show what a board set contains without writing anything
    Inspect {
        /// Path to the board set (.bdz)
        board: PathBuf,
    },

    /// Strip the cipher layers only
    Decode {
        /// Path to the obfuscated board set
        input: PathBuf,

        /// Path to write the decoded board set
        output: PathBuf,
    },

    /// Wrap a file in cipher layers
    Encode {
        /// Path to the plain board set
        input: PathBuf,

        /// Path to write the obfuscated board set
        output: PathBuf,

        /// Hex key per layer, innermost first; the last key's length must
        /// equal the number of keys
        #[arg(short, long = "key", required = true, value_parser = parse_key)]
        keys: Vec<HexKey>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct HexKey(Vec<u8>);

fn parse_key(s: &str) -> Result<HexKey, String> {
    let bytes = hex::decode(s).map_err(|e| format!("invalid hex key '{}': {}", s, e))?;
    if bytes.is_empty() {
        return Err("key must not be empty".to_string());
    }
    Ok(HexKey(bytes))
}

/// What to do when a board set is password protected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PasswordPolicy {
    Bypass,
    Keep,
    Ask,
}

impl PasswordPolicy {
    fn from_flags(bypass: bool, keep_password: bool) -> Self {
        match (bypass, keep_password) {
            (true, _) => PasswordPolicy::Bypass,
            (false, true) => PasswordPolicy::Keep,
            (false, false) => PasswordPolicy::Ask,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Unlock {
            board,
            output,
            bypass,
            keep_password,
        } => {
            let policy = PasswordPolicy::from_flags(bypass, keep_password);
            cmd_unlock(&board, output.as_deref(), policy)?;
        }
        Commands::Inspect { board } => {
            cmd_inspect(&board)?;
        }
        Commands::Decode { input, output } => {
            cmd_decode(&input, &output)?;
        }
        Commands::Encode {
            input,
            output,
            keys,
        } => {
            cmd_encode(&input, &output, &keys)?;
        }
    }

    Ok(())
}

/// RUST_LOG wins; otherwise warnings only, or debug output with -v
fn init_logging(verbose: bool) {
    let default = if verbose { "dxb_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Insert `.new` before the extension: `levels.bdz` -> `levels.new.bdz`
fn output_path(input: &Path) -> PathBuf {
    match (input.file_stem(), input.extension()) {
        (Some(stem), Some(ext)) => {
            let mut name = stem.to_os_string();
            name.push(".new.");
            name.push(ext);
            input.with_file_name(name)
        }
        _ => {
            let mut name = input.as_os_str().to_os_string();
            name.push(".new.bdz");
            PathBuf::from(name)
        }
    }
}

fn load_board(path: &Path) -> Result<BoardSet> {
    println!("[info] opening \"{}\"", path.display());

    let raw = fs::read(path)
        .with_context(|| format!("Could not open board set: {}", path.display()))?;
    debug!("read {} bytes", raw.len());

    if !is_native(&raw) {
        println!("[info] attempting to decrypt \"{}\"", path.display());
    }

    let board = BoardSet::load(raw)
        .with_context(|| format!("Could not load board set: {}", path.display()))?;

    if board.was_obfuscated() {
        println!("[info] encryption layers: {}", board.keys().len());
        for (i, key) in board.keys().iter().enumerate() {
            debug!("key #{}: {}", i + 1, hex::encode(key));
        }
    }
    println!("[info] board set version: {}", board.version());

    Ok(board)
}

/// Ask whether to drop the password; only an exact `y` counts as yes
fn confirm_bypass<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool> {
    write!(out, "Would you like to bypass the protection? (y/n) : ")?;
    out.flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read answer")?;

    Ok(answer.trim_end_matches(['\r', '\n']) == "y")
}

/// Password handling and checksum restamp for a loaded board set
fn unlock<R: BufRead>(board: BoardSet, policy: PasswordPolicy, input: &mut R) -> Result<BoardSet> {
    let password = board.password().map(<[u8]>::to_vec);

    let mut board = match password {
        Some(password) => {
            println!("[info] this board set is password protected");
            println!("[info] password: {}", hex::encode(&password));

            let bypass = match policy {
                PasswordPolicy::Bypass => true,
                PasswordPolicy::Keep => false,
                PasswordPolicy::Ask => confirm_bypass(input, &mut io::stdout())?,
            };

            if bypass {
                println!("[ok] password removed");
                board.strip_password()
            } else {
                board
            }
        }
        None => board,
    };

    match board.restamp_checksum() {
        ChecksumUpdate::NotPresent => {
            debug!("version {} carries no checksum", board.version());
        }
        ChecksumUpdate::Unchanged(sum) => {
            println!("[info] checksum=0x{:08x}  -> OK", sum);
        }
        ChecksumUpdate::Updated { old, new } => {
            println!("[info] checksum=0x{:08x}  new checksum=0x{:08x}", old, new);
        }
    }

    Ok(board)
}

fn write_board(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes)
        .with_context(|| format!("Could not write file: {}", path.display()))?;

    println!("[ok] wrote board set -> {}", path.display());
    Ok(())
}

fn cmd_unlock(board_path: &Path, output: Option<&Path>, policy: PasswordPolicy) -> Result<PathBuf> {
    let board = load_board(board_path)?;

    let stdin = io::stdin();
    let board = unlock(board, policy, &mut stdin.lock())?;

    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output_path(board_path));
    write_board(&out_path, board.as_bytes())?;

    Ok(out_path)
}

/// Report a board set; returns whether its checksum holds, `None` below v6
fn cmd_inspect(board_path: &Path) -> Result<Option<bool>> {
    let board = load_board(board_path)?;

    if !board.has_checksum() {
        println!("[info] no password or checksum before version 6");
        return Ok(None);
    }

    match board.password() {
        Some(password) => println!("[info] password: {}", hex::encode(password)),
        None => println!("[info] no password"),
    }

    let (Some(stored), Some(calc)) = (board.stored_checksum(), board.computed_checksum()) else {
        return Ok(None);
    };

    println!(
        "[info] checksum stored=0x{:08x}  calc=0x{:08x}  -> {}",
        stored,
        calc,
        if stored == calc { "OK" } else { "MISMATCH" }
    );
    if stored != calc {
        eprintln!(
            "[warn] checksum mismatch: stored=0x{:08x} calc=0x{:08x} (run unlock to restamp)",
            stored, calc
        );
    }

    Ok(Some(stored == calc))
}

fn cmd_decode(input: &Path, output: &Path) -> Result<()> {
    let raw = fs::read(input)
        .with_context(|| format!("Failed to read file: {}", input.display()))?;

    if is_native(&raw) {
        bail!("{} is not obfuscated", input.display());
    }

    let peeled = peel(&raw).context("Could not decrypt board")?;
    println!("[info] encryption layers: {}", peeled.keys.len());
    for (i, key) in peeled.keys.iter().enumerate() {
        debug!("key #{}: {}", i + 1, hex::encode(key));
    }

    write_board(output, &peeled.payload)
}

fn cmd_encode(input: &Path, output: &Path, keys: &[HexKey]) -> Result<()> {
    let payload = fs::read(input)
        .with_context(|| format!("Failed to read file: {}", input.display()))?;

    let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.0.as_slice()).collect();
    let enc = encode(&payload, &key_refs).context("Could not encrypt board")?;

    write_board(output, &enc)
}
