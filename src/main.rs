use std::{
  fs,
  io::{self, Read},
  path::PathBuf,
  process::ExitCode
};

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use rv32i::{
  assemble_text,
  config::{DEFAULT_INSTRUCTION_WORDS, DEFAULT_MEMORY_BYTES, DEFAULT_XORID_KEY},
  disassemble_text,
  Engine,
  ExecError,
  Machine,
  MachineConfig,
  State,
  Word
};

#[derive(Parser)]
#[command(name = "rv32i", version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Assemble source text into hex lines, one per input line.
  Assemble {
    /// Source file; standard input when omitted.
    file: Option<PathBuf>,
  },
  /// Disassemble hex lines into labelled assembly.
  Disassemble {
    /// Hex file; standard input when omitted.
    file: Option<PathBuf>,
  },
  /// Load a program and execute it, printing every executed instruction.
  Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
  /// Program file; standard input when omitted.
  file: Option<PathBuf>,

  /// The program is hex lines rather than assembly.
  #[arg(long)]
  hex: bool,

  /// Stop after this many instructions.
  #[arg(long)]
  max_steps: Option<u64>,

  #[arg(long, default_value_t = DEFAULT_MEMORY_BYTES)]
  memory_bytes: usize,

  #[arg(long, default_value_t = DEFAULT_INSTRUCTION_WORDS)]
  instruction_words: usize,

  #[arg(long, default_value_t = DEFAULT_XORID_KEY)]
  xorid_key: Word,

  /// Print the register table when the run ends.
  #[arg(long)]
  dump: bool,
}

#[derive(Debug, Error)]
enum CliError {
  #[error("could not read input: {0}")]
  Io(#[from] io::Error),

  #[error(transparent)]
  Exec(#[from] ExecError),
}

fn read_input(file: &Option<PathBuf>) -> Result<String, io::Error> {
  match file {
    Some(path) => fs::read_to_string(path),
    None       => {
      let mut text = String::new();
      io::stdin().read_to_string(&mut text)?;
      Ok(text)
    }
  }
}

fn run(args: &RunArgs) -> Result<(), CliError> {
  let text   = read_input(&args.file)?;
  let config =
    MachineConfig::default()
      .with_memory_bytes(args.memory_bytes)
      .with_instruction_words(args.instruction_words)
      .with_xorid_key(args.xorid_key);

  let mut machine = Machine::new(config);
  match args.hex {
    true  => machine.load_program_from_hex(&text)?,
    false => machine.load_program_from_assembly(&text)?
  };

  #[cfg(feature = "trace_computation")]
  println!("Computation Tracing ENABLED");

  let mut engine = Engine::new(machine);
  loop {
    if let Some(max_steps) = args.max_steps {
      if engine.steps() >= max_steps {
        warn!(max_steps, "step limit reached before the program halted");
        break;
      }
    }
    let state = engine.step()?;
    if let Some(step) = engine.last_step() {
      println!("{}", step);
    }
    if state == State::Halted {
      break;
    }
  }

  if args.dump {
    println!("{}", engine.machine());
  }
  Ok(())
}

fn execute(cli: &Cli) -> Result<(), CliError> {
  match &cli.command {
    Command::Assemble { file }    => println!("{}", assemble_text(&read_input(file)?)),
    Command::Disassemble { file } => println!("{}", disassemble_text(&read_input(file)?)),
    Command::Run(args)            => run(args)?,
  }
  Ok(())
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();
  match execute(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{}", e);
      ExitCode::FAILURE
    }
  }
}
