//! Machine state: register file, data memory, instruction store and program counter.
//! Everything here is plain storage; the semantics of instructions live in `engine`.

use std::fmt::{Display, Formatter};

use num_enum::IntoPrimitive;
use prettytable::{format as TableFormat, Table};

use crate::bytecode::{Register, Word, ABI_NAMES};
use crate::config::MachineConfig;
use crate::error::ExecError;
use crate::translate;

pub const REGISTER_COUNT: usize = 32;

/// An effective address `rs1 + imm`, before it is reduced modulo the memory size.
pub type Address = i64;

/// Access widths of loads and stores, in bytes.
#[derive(IntoPrimitive, Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[repr(u8)]
pub enum Width {
  Byte = 1,
  Half = 2,
  Word = 4,
}

impl Width {
  pub fn bytes(&self) -> usize {
    Into::<u8>::into(*self) as usize
  }

  /// Mask selecting the low `bytes()` bytes of a word.
  pub fn mask(&self) -> Word {
    match self {
      Width::Byte => 0xFF,
      Width::Half => 0xFFFF,
      Width::Word => 0xFFFF_FFFF,
    }
  }
}

/// Thirty-two registers, with `x0` wired to zero.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterFile([Word; REGISTER_COUNT]);

impl Default for RegisterFile {
  fn default() -> RegisterFile {
    RegisterFile([0; REGISTER_COUNT])
  }
}

impl RegisterFile {
  pub fn read(&self, index: Register) -> Word {
    match index {
      0 => 0,
      i => self.0.get(i as usize).copied().unwrap_or(0)
    }
  }

  /// Writes to `x0` (and to indices past the file) are discarded.
  pub fn write(&mut self, index: Register, value: Word) {
    if index == 0 {
      return;
    }
    if let Some(slot) = self.0.get_mut(index as usize) {
      *slot = value;
    }
  }
}

pub struct Machine {
  config    : MachineConfig,

  // Registers //
  pc        : Word,
  registers : RegisterFile,

  // Memory Stores //
  memory    : Vec<u8>,   // Data memory, byte addressed
  code      : Vec<Word>, // Instruction store, word addressed
}

impl Default for Machine {
  fn default() -> Machine {
    Machine::new(MachineConfig::default())
  }
}

impl Machine {

  // region Low-level utility methods

  pub fn new(config: MachineConfig) -> Machine {
    Machine {
      config,
      pc        : 0,
      registers : RegisterFile::default(),
      memory    : vec![0; config.effective_memory_bytes()],
      code      : vec![0; config.effective_instruction_words()],
    }
  }

  pub fn config(&self) -> &MachineConfig {
    &self.config
  }

  pub fn pc(&self) -> Word {
    self.pc
  }

  pub fn set_pc(&mut self, pc: Word) {
    self.pc = pc;
  }

  pub fn memory(&self) -> &[u8] {
    &self.memory
  }

  pub fn code(&self) -> &[Word] {
    &self.code
  }

  /// Index of byte `offset` of an access at `address`, reduced modulo the memory size.
  fn wrap(&self, address: Address, offset: usize) -> usize {
    (address + offset as Address).rem_euclid(self.memory.len() as Address) as usize
  }

  // endregion

  // region Program loading

  /**
    Clears the instruction store, writes `words` into it from address 0 and resets the
    program counter. Registers and data memory are left as they are.
  */
  pub fn load_program(&mut self, words: &[Word]) -> Result<(), ExecError> {
    if words.len() > self.code.len() {
      return Err(ExecError::ProgramTooLarge{ words: words.len(), capacity: self.code.len() });
    }
    for slot in self.code.iter_mut() {
      *slot = 0;
    }
    self.code[..words.len()].copy_from_slice(words);
    self.pc = 0;
    Ok(())
  }

  /// Loads a program in the disassembler's input format: one byte-reversed hex word per
  /// non-blank line. Returns the number of words loaded.
  pub fn load_program_from_hex(&mut self, text: &str) -> Result<usize, ExecError> {
    let words = translate::parse_hex_program(text)?;
    self.load_program(&words)?;
    Ok(words.len())
  }

  /// Assembles `source` and loads it. Returns the number of words loaded.
  pub fn load_program_from_assembly(&mut self, source: &str) -> Result<usize, ExecError> {
    let words = translate::assemble_program(source)?;
    self.load_program(&words)?;
    Ok(words.len())
  }

  /// The word at `pc / 4`, or `None` past the end of the store.
  pub fn fetch(&self, pc: Word) -> Option<Word> {
    self.code.get((pc / 4) as usize).copied()
  }

  // endregion

  // region Register and memory access

  pub fn read_register(&self, index: Register) -> Word {
    self.registers.read(index)
  }

  pub fn write_register(&mut self, index: Register, value: Word) {
    self.registers.write(index, value);
  }

  /// Little-endian read of `width` bytes, wrapping around the end of memory.
  pub fn read_memory(&self, address: Address, width: Width) -> Word {
    (0..width.bytes()).fold(0, |value, i| {
      value | ((self.memory[self.wrap(address, i)] as Word) << (8 * i))
    })
  }

  /// Little-endian write of the low `width` bytes of `value`, wrapping around the end of
  /// memory.
  pub fn write_memory(&mut self, address: Address, value: Word, width: Width) {
    for i in 0..width.bytes() {
      let index = self.wrap(address, i);
      self.memory[index] = (value >> (8 * i)) as u8;
    }
  }

  // endregion

  // region Display methods

  fn make_register_table(&self, start: usize, end: usize) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Hex", ubr->"Decimal"]);

    for index in start..end {
      let value = self.registers.read(index as Register);
      table.add_row(
        row![
          r->format!("x{} ({})", index, ABI_NAMES[index]),
          format!("0x{:08X}", value),
          r->(value as i32)
        ]
      );
    }
    table
  }

  // endregion
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Machine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let low  = self.make_register_table(0, REGISTER_COUNT / 2);
    let high = self.make_register_table(REGISTER_COUNT / 2, REGISTER_COUNT);

    let mut combined_table = table!([low, high]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "PC: 0x{:08X}\n{}", self.pc, combined_table)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn register_zero_is_wired_to_zero() {
    let mut machine = Machine::default();
    machine.write_register(0, 0xDEAD_BEEF);
    assert_eq!(machine.read_register(0), 0);
    machine.write_register(31, 0xDEAD_BEEF);
    assert_eq!(machine.read_register(31), 0xDEAD_BEEF);
  }

  #[test]
  fn memory_is_little_endian() {
    let mut machine = Machine::default();
    machine.write_memory(0x100, 0x1122_3344, Width::Word);
    assert_eq!(machine.memory()[0x100..0x104], [0x44, 0x33, 0x22, 0x11]);
    assert_eq!(machine.read_memory(0x100, Width::Word), 0x1122_3344);
    assert_eq!(machine.read_memory(0x102, Width::Half), 0x1122);
    assert_eq!(machine.read_memory(0x103, Width::Byte), 0x11);
  }

  #[test]
  fn narrow_writes_keep_the_low_bytes() {
    let mut machine = Machine::default();
    machine.write_memory(8, 0xAABB_CCDD, Width::Half);
    assert_eq!(machine.read_memory(8, Width::Word), 0x0000_CCDD);
  }

  #[test]
  fn addresses_wrap_around_memory() {
    let mut machine = Machine::new(MachineConfig::default().with_memory_bytes(16));
    machine.write_memory(14, 0x0403_0201, Width::Word);
    assert_eq!(machine.memory()[14], 0x01);
    assert_eq!(machine.memory()[15], 0x02);
    assert_eq!(machine.memory()[0], 0x03);
    assert_eq!(machine.memory()[1], 0x04);
    assert_eq!(machine.read_memory(30, Width::Word), 0x0403_0201);
    assert_eq!(machine.read_memory(0xFFFF_FFFE, Width::Word), 0x0403_0201);
  }

  #[test]
  fn negative_addresses_wrap_from_the_top_of_any_size() {
    let mut machine = Machine::new(MachineConfig::default().with_memory_bytes(1000));
    machine.write_memory(-1, 0x5A, Width::Byte);
    assert_eq!(machine.memory()[999], 0x5A);

    machine.write_memory(-2, 0x4433_2211, Width::Word);
    assert_eq!(&machine.memory()[998..], &[0x11, 0x22]);
    assert_eq!(&machine.memory()[..2], &[0x33, 0x44]);
    assert_eq!(machine.read_memory(998, Width::Word), 0x4433_2211);

    machine.write_memory(0xFFFF_FFFF, 0xBEEF, Width::Half);
    assert_eq!(machine.read_memory(0xFFFF_FFFF % 1000, Width::Half), 0xBEEF);
    assert_eq!(machine.memory()[(0xFFFF_FFFFu64 % 1000) as usize + 1], 0xBE);
  }

  #[test]
  fn loading_a_program_clears_the_old_one() {
    let mut machine = Machine::default();
    machine.load_program(&[1, 2, 3]).unwrap();
    machine.set_pc(8);
    machine.load_program(&[7]).unwrap();
    assert_eq!(machine.pc(), 0);
    assert_eq!(&machine.code()[..3], &[7, 0, 0]);
    assert_eq!(machine.fetch(0), Some(7));
    assert_eq!(machine.fetch(3), Some(7));
  }

  #[test]
  fn oversized_programs_are_rejected() {
    let mut machine = Machine::new(MachineConfig::default().with_instruction_words(2));
    assert_eq!(
      machine.load_program(&[1, 2, 3]),
      Err(ExecError::ProgramTooLarge{ words: 3, capacity: 2 })
    );
    assert_eq!(machine.fetch(8), None);
  }

  #[test]
  fn programs_load_from_text() {
    let mut machine = Machine::default();
    assert_eq!(machine.load_program_from_hex("B3 00 31 00\n\n93 00 50 00\n"), Ok(2));
    assert_eq!(&machine.code()[..2], &[0x003100B3, 0x00500093]);

    assert_eq!(machine.load_program_from_assembly("addi x1, x0, 5\nhalt"), Ok(2));
    assert_eq!(&machine.code()[..2], &[0x00500093, 0]);
  }

  #[test]
  fn state_table_lists_every_register() {
    let mut machine = Machine::default();
    machine.write_register(10, 0xFFFF_FFFF);
    let dump = machine.to_string();
    assert!(dump.starts_with("PC: 0x00000000"));
    assert!(dump.contains("x10 (a0)"));
    assert!(dump.contains("0xFFFFFFFF"));
    assert!(dump.contains("x31 (t6)"));
  }
}
