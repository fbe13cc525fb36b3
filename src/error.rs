//! Error kinds for translation (text and binary) and for execution sessions.

use thiserror::Error;

use crate::bytecode::{Mnemonic, Word};

/// Failures of a single translation: operand parsing, the four codec transforms, and
/// hex-line parsing. Callers that work line by line catch these at the line boundary.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AsmError {
  #[error("unknown mnemonic `{0}`")]
  UnknownMnemonic(String),

  #[error("no instruction matches opcode {opcode:#09b} (funct3 {funct3:?}, funct7 {funct7:?})")]
  UnknownEncoding {
    opcode: u8,
    funct3: Option<u8>,
    funct7: Option<u8>,
  },

  #[error("opcode {opcode:#09b} (funct3 {funct3:?}, funct7 {funct7:?}) matches several instructions: {candidates:?}")]
  AmbiguousEncoding {
    opcode: u8,
    funct3: Option<u8>,
    funct7: Option<u8>,
    candidates: Vec<Mnemonic>,
  },

  #[error("unknown register `{0}`")]
  UnknownRegister(String),

  #[error("immediate `{literal}` does not fit in {width} {} bits", signedness(.signed))]
  ImmediateOutOfRange {
    literal: String,
    width: u32,
    signed: bool,
  },

  #[error("immediate `{literal}` must have its low {zero_bits} bit(s) clear")]
  ImmediateMisaligned { literal: String, zero_bits: u32 },

  #[error("malformed operands: {0}")]
  MalformedOperands(String),

  #[error("malformed hex line `{0}`: expected exactly 8 hex digits")]
  MalformedHexLine(String),
}

fn signedness(signed: &bool) -> &'static str {
  match signed {
    true  => "signed",
    false => "unsigned"
  }
}

/// A translation failure tied to the 1-based source line it came from.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("line {line}: {source}")]
pub struct LineError {
  pub line: usize,
  #[source]
  pub source: AsmError,
}

/// Inconsistencies found while building an instruction table. These are configuration
/// mistakes, never runtime conditions.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TableError {
  #[error("mnemonic {0} is listed more than once")]
  DuplicateMnemonic(Mnemonic),

  #[error("{mnemonic} has the same encoding as {existing}")]
  DuplicateEncoding { mnemonic: Mnemonic, existing: Mnemonic },

  #[error("{0} does not carry the funct fields its format requires")]
  InconsistentFields(Mnemonic),

  #[error("{0} has a funct field wider than its slot")]
  FieldOutOfRange(Mnemonic),
}

/// Errors that end an execution session or prevent one from starting.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ExecError {
  #[error("could not decode word {word:#010x} at pc {pc:#010x}")]
  Decode {
    pc: Word,
    word: Word,
    #[source]
    source: AsmError,
  },

  #[error("pc {pc:#010x} is outside the instruction store")]
  FetchOutOfRange { pc: Word },

  #[error("{mnemonic} has no execution semantics as a {format}-format instruction (pc {pc:#010x})")]
  NotExecutable {
    pc: Word,
    mnemonic: Mnemonic,
    format: crate::bytecode::Format,
  },

  #[error("program of {words} words does not fit in an instruction store of {capacity} words")]
  ProgramTooLarge { words: usize, capacity: usize },

  #[error(transparent)]
  Program(#[from] LineError),
}
