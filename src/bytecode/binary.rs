/*!
  This module is responsible for the encoding and decoding of binary instructions.

  Register and funct fields sit at fixed positions in every format; only the immediate
  moves around. Immediates are reduced to their field width (two's complement) before
  their bits are scattered, and gathered then sign-extended on the way back.
*/

use super::{Format, Instruction, Register, SpecTable, Word};
use super::operand::check_immediate;
use crate::error::AsmError;

/// Bits `high..=low` of `value`, shifted down to bit 0.
pub fn bits(value: Word, high: u32, low: u32) -> Word {
  (value >> low) & (Word::max_value() >> (31 - (high - low)))
}

/// Sign-extends the low `width` bits of `value`.
pub fn sign_extend(value: Word, width: u32) -> i32 {
  let shift = 32 - width;
  ((value << shift) as i32) >> shift
}

fn check_register(register: Register) -> Result<Word, AsmError> {
  match register {
    r if r < 32 => Ok(r as Word),
    r           => Err(AsmError::UnknownRegister(format!("x{}", r)))
  }
}

/**
  Encodes the instruction into a word. The instruction is checked first: its variant must
  be the format the table lists for its mnemonic, its registers must be in `0..=31` and
  its immediate must fit the format's field.
*/
pub fn encode_instruction(table: &SpecTable, instruction: &Instruction) -> Result<Word, AsmError> {
  let mnemonic = instruction.mnemonic();
  let spec     = table.spec_for(mnemonic)?;

  if spec.format != instruction.format() {
    return Err(AsmError::MalformedOperands(
      format!("{} is a {}-format instruction, not {}", mnemonic, spec.format, instruction.format())
    ));
  }
  for register in instruction.registers() {
    check_register(register)?;
  }
  if let (Some(shape), Some(imm)) = (spec.format.immediate_shape(), instruction.immediate()) {
    check_immediate(imm, &imm.to_string(), shape.width, shape.zero_bits, shape.signed)?;
  }

  let word =
    match *instruction {

      Instruction::R { rd, rs1, rs2, .. } => {
        ((rd as Word) << 7) | ((rs1 as Word) << 15) | ((rs2 as Word) << 20)
      }

      Instruction::I { rd, rs1, imm, .. } => {
        ((rd as Word) << 7) | ((rs1 as Word) << 15) | (bits(imm as Word, 11, 0) << 20)
      }

      Instruction::I2 { rd, rs1, shamt, .. } => {
        ((rd as Word) << 7) | ((rs1 as Word) << 15) | (bits(shamt, 11, 0) << 20)
      }

      Instruction::S { rs1, rs2, imm, .. } => {
        let imm = imm as Word;
        ((rs1 as Word) << 15) | ((rs2 as Word) << 20)
          | (bits(imm, 11, 5) << 25)
          | (bits(imm,  4, 0) << 7)
      }

      Instruction::B { rs1, rs2, imm, .. } => {
        let imm = imm as Word;
        ((rs1 as Word) << 15) | ((rs2 as Word) << 20)
          | (bits(imm, 12, 12) << 31)
          | (bits(imm, 10,  5) << 25)
          | (bits(imm,  4,  1) << 8)
          | (bits(imm, 11, 11) << 7)
      }

      Instruction::U { rd, imm, .. } => {
        ((rd as Word) << 7) | (bits(imm, 31, 12) << 12)
      }

      Instruction::J { rd, imm, .. } => {
        let imm = imm as Word;
        ((rd as Word) << 7)
          | (bits(imm, 20, 20) << 31)
          | (bits(imm, 10,  1) << 21)
          | (bits(imm, 11, 11) << 20)
          | (bits(imm, 19, 12) << 12)
      }

    };

  Ok(spec.fixed_bits() | word)
}

/**
  Decodes a word. The opcode, `funct3` and `funct7` fields are resolved to a unique
  mnemonic through the table, whose format then decides which fields are read and how the
  immediate is gathered.
*/
pub fn decode_instruction(table: &SpecTable, word: Word) -> Result<Instruction, AsmError> {
  let opcode   = bits(word, 6, 0) as u8;
  let funct3   = bits(word, 14, 12) as u8;
  let funct7   = bits(word, 31, 25) as u8;
  let mnemonic = table.resolve(opcode, Some(funct3), Some(funct7))?;
  let spec     = table.spec_for(mnemonic)?;

  let rd  = bits(word, 11, 7) as Register;
  let rs1 = bits(word, 19, 15) as Register;
  let rs2 = bits(word, 24, 20) as Register;

  let instruction =
    match spec.format {

      Format::R => Instruction::R { mnemonic, rd, rs1, rs2 },

      Format::I => Instruction::I {
        mnemonic, rd, rs1,
        imm: sign_extend(bits(word, 31, 20), 12)
      },

      Format::I2 => Instruction::I2 {
        mnemonic, rd, rs1,
        shamt: bits(word, 24, 20)
      },

      Format::S => Instruction::S {
        mnemonic, rs1, rs2,
        imm: sign_extend((bits(word, 31, 25) << 5) | bits(word, 11, 7), 12)
      },

      Format::B => Instruction::B {
        mnemonic, rs1, rs2,
        imm: sign_extend(
          (bits(word, 31, 31) << 12)
            | (bits(word, 30, 25) << 5)
            | (bits(word, 11,  8) << 1)
            | (bits(word,  7,  7) << 11),
          13
        )
      },

      Format::U => Instruction::U {
        mnemonic, rd,
        imm: bits(word, 31, 12) << 12
      },

      Format::J => Instruction::J {
        mnemonic, rd,
        imm: sign_extend(
          (bits(word, 31, 31) << 20)
            | (bits(word, 30, 21) << 1)
            | (bits(word, 20, 20) << 11)
            | (bits(word, 19, 12) << 12),
          21
        )
      },

    };

  Ok(instruction)
}
