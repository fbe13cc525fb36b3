/*!

  Instructions are 32 bit little-endian words in one of seven layouts (formats). Every
  layout keeps its fixed fields in the same place:

    Opcode:   bits  6..0
    rd:       bits 11..7
    funct3:   bits 14..12
    rs1:      bits 19..15
    rs2:      bits 24..20
    funct7:   bits 31..25

  A format uses the subset of these it needs and fills the remaining bits with pieces of
  the immediate. See `Instruction` for the per-format layouts.

  Translation goes through three representations: a line of assembly text, a structured
  `Instruction`, and a `Word`. The `Codec` offers the four transforms between neighbours:
  ```text
    text --decode_text--> Instruction --encode_binary--> Word
    text <--encode_text-- Instruction <--decode_binary-- Word
  ```
  Only the binary transforms consult the instruction table for encoding constants; the text
  transforms use it to learn the format of a mnemonic.

*/

mod assembly;
mod binary;
mod instruction;
mod operand;
mod spectable;

pub use assembly::{decode_text, encode_text, strip_comment, COMMENT_MARKERS};
pub use binary::{bits, decode_instruction, encode_instruction, sign_extend};
pub use instruction::{
  display_number, Format, ImmediateShape, Instruction, Mnemonic, Opcode, Register, Word,
  MNEMONIC_COLUMN
};
pub use operand::{check_immediate, parse_immediate, parse_register, ABI_NAMES};
pub use spectable::{EncodingKey, InstructionSpec, SpecTable, RV32I_SPECS, SPEC_TABLE};

use crate::error::AsmError;

/**
  The four translations, bound to an instruction table. A `Codec` is a shared reference to
  an immutable table, so it is `Copy` and can be handed to any number of engines.
*/
#[derive(Clone, Copy, Debug)]
pub struct Codec<'t> {
  table: &'t SpecTable
}

impl Default for Codec<'static> {
  fn default() -> Codec<'static> {
    Codec::new(&SPEC_TABLE)
  }
}

impl<'t> Codec<'t> {
  pub fn new(table: &'t SpecTable) -> Codec<'t> {
    Codec{ table }
  }

  pub fn table(&self) -> &'t SpecTable {
    self.table
  }

  pub fn decode_text(&self, line: &str) -> Result<Instruction, AsmError> {
    assembly::decode_text(self.table, line)
  }

  pub fn encode_binary(&self, instruction: &Instruction) -> Result<Word, AsmError> {
    binary::encode_instruction(self.table, instruction)
  }

  pub fn decode_binary(&self, word: Word) -> Result<Instruction, AsmError> {
    binary::decode_instruction(self.table, word)
  }

  pub fn encode_text(&self, instruction: &Instruction) -> String {
    assembly::encode_text(instruction)
  }

  /// Text straight to a word.
  pub fn assemble_line(&self, line: &str) -> Result<Word, AsmError> {
    self.encode_binary(&self.decode_text(line)?)
  }

  /// A word straight to canonical text.
  pub fn disassemble_word(&self, word: Word) -> Result<String, AsmError> {
    Ok(self.encode_text(&self.decode_binary(word)?))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn assemble_and_disassemble_the_reference_add() {
    let codec = Codec::default();
    assert_eq!(codec.assemble_line("ADD x1,x2,x3"), Ok(0x003100B3));
    assert_eq!(codec.disassemble_word(0x003100B3), Ok("add     x1, x2, x3".to_string()));
  }

  #[test]
  fn a_codec_over_a_custom_table() {
    let table = SpecTable::from_entries(&RV32I_SPECS[..1]).unwrap();
    let codec = Codec::new(&table);
    assert_eq!(codec.assemble_line("halt"), Ok(0));
    assert_eq!(
      codec.assemble_line("add x1, x2, x3"),
      Err(AsmError::UnknownMnemonic("add".to_string()))
    );
  }
}
