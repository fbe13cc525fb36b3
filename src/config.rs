//! Sizes and constants of a simulated machine.

use crate::bytecode::Word;

/// 64 KiB of data memory.
pub const DEFAULT_MEMORY_BYTES: usize = 1 << 16;
/// 16 Ki instruction words (64 KiB of code).
pub const DEFAULT_INSTRUCTION_WORDS: usize = 1 << 14;
/// The key `xorid` mixes into its source register.
pub const DEFAULT_XORID_KEY: Word = 123 ^ 456;

/**
  Configuration of a `Machine`. Sizes are fixed for the lifetime of the machine; a size of
  zero is clamped to one so that address wrapping is always defined.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MachineConfig {
  /// Size of the byte-addressable data memory.
  pub memory_bytes      : usize,
  /// Number of words in the instruction store.
  pub instruction_words : usize,
  pub xorid_key         : Word,
}

impl Default for MachineConfig {
  fn default() -> MachineConfig {
    MachineConfig {
      memory_bytes      : DEFAULT_MEMORY_BYTES,
      instruction_words : DEFAULT_INSTRUCTION_WORDS,
      xorid_key         : DEFAULT_XORID_KEY,
    }
  }
}

impl MachineConfig {
  pub fn with_memory_bytes(mut self, memory_bytes: usize) -> MachineConfig {
    self.memory_bytes = memory_bytes;
    self
  }

  pub fn with_instruction_words(mut self, instruction_words: usize) -> MachineConfig {
    self.instruction_words = instruction_words;
    self
  }

  pub fn with_xorid_key(mut self, xorid_key: Word) -> MachineConfig {
    self.xorid_key = xorid_key;
    self
  }

  /// Memory size actually allocated.
  pub fn effective_memory_bytes(&self) -> usize {
    self.memory_bytes.max(1)
  }

  /// Instruction store size actually allocated.
  pub fn effective_instruction_words(&self) -> usize {
    self.instruction_words.max(1)
  }
}
