/*!
  The human readable textual form of an instruction is called assembly. This module reads
  one line of assembly into an `Instruction`; the canonical text written back out is the
  `Display` impl of `Instruction`.

  The grammar of the operands depends only on the format of the mnemonic:
  ```text
    R           rd, rs1, rs2
    I           rd, rs1, imm          (loads and jalr: rd, imm(rs1))
    I2          rd, rs1, shamt
    S           rs2, imm(rs1)
    B           rs1, rs2, imm
    U           rd, imm               (imm is the upper 20 bits)
    J           rd, imm
  ```
*/

use nom::{
  bytes::complete::{is_not, take_till1},
  character::complete::{char as one_char, space0},
  combinator::{all_consuming, map, rest},
  error::ErrorKind,
  sequence::{delimited, pair, terminated},
  IResult
};

use super::{Format, Instruction, Mnemonic, SpecTable};
use super::operand::{parse_immediate, parse_register};
use crate::error::AsmError;

/// Markers that start a comment running to the end of the line.
pub const COMMENT_MARKERS: [&str; 3] = [";", "#", "//"];

/// Everything before the first comment marker.
pub fn strip_comment(line: &str) -> &str {
  let end =
    COMMENT_MARKERS
      .iter()
      .filter_map(|marker| line.find(marker))
      .min()
      .unwrap_or_else(|| line.len());
  &line[..end]
}

/// Splits a line into its first whitespace-delimited token and the rest.
fn mnemonic_and_operands(input: &str) -> IResult<&str, (&str, &str), (&str, ErrorKind)> {
  pair(terminated(take_till1(char::is_whitespace), space0), rest)(input)
}

/// `imm(rs1)`, with optional whitespace around every part.
fn offset_operand(input: &str) -> IResult<&str, (&str, &str), (&str, ErrorKind)> {
  all_consuming(
    pair(
      map(is_not("("), str::trim),
      terminated(
        delimited(one_char('('), map(is_not(")"), str::trim), one_char(')')),
        space0
      )
    )
  )(input)
}

fn split_offset<'a>(mnemonic: Mnemonic, operand: &'a str) -> Result<(&'a str, &'a str), AsmError> {
  match offset_operand(operand.trim()) {
    Ok((_rest, (imm, rs1))) => Ok((imm, rs1)),
    Err(_e)                 => Err(AsmError::MalformedOperands(
      format!("{} expects an operand of the form `imm(rs1)`, found `{}`", mnemonic, operand.trim())
    ))
  }
}

/// Splits the operand string on commas, requiring exactly `grammar`'s operand count.
fn split_operands<'a>(mnemonic: Mnemonic, grammar: &str, operands: &'a str)
  -> Result<Vec<&'a str>, AsmError>
{
  let expected = grammar.split(',').count();
  let found: Vec<&str> = operands.split(',').map(str::trim).collect();
  match found.len() == expected && found.iter().all(|operand| !operand.is_empty()) {
    true  => Ok(found),
    false => Err(AsmError::MalformedOperands(
      format!("{} expects `{}`, found `{}`", mnemonic, grammar, operands.trim())
    ))
  }
}

fn signed_immediate(literal: &str, width: u32, zero_bits: u32) -> Result<i32, AsmError> {
  parse_immediate(literal, width, zero_bits, true).map(|value| value as i32)
}

/**
  Reads one line of assembly. Comments are stripped, the mnemonic is case-insensitive, and
  register operands accept both `x<N>` and ABI names. A bare `halt` is accepted as
  `halt x0, 0`.
*/
pub fn decode_text(table: &SpecTable, line: &str) -> Result<Instruction, AsmError> {
  let line = strip_comment(line).trim();
  let (name, operands) =
    match mnemonic_and_operands(line) {
      Ok((_rest, parsed)) => parsed,
      Err(_e)             => return Err(AsmError::UnknownMnemonic(line.to_string()))
    };
  let spec     = table.spec_for_name(name)?;
  let mnemonic = spec.mnemonic;

  if mnemonic == Mnemonic::Halt && operands.trim().is_empty() {
    return Ok(Instruction::U { mnemonic, rd: 0, imm: 0 });
  }

  let instruction =
    match spec.format {

      Format::R => {
        let parts = split_operands(mnemonic, spec.format.grammar(), operands)?;
        Instruction::R {
          mnemonic,
          rd  : parse_register(parts[0])?,
          rs1 : parse_register(parts[1])?,
          rs2 : parse_register(parts[2])?,
        }
      }

      Format::I if mnemonic.uses_offset_syntax() => {
        let parts      = split_operands(mnemonic, "rd, imm(rs1)", operands)?;
        let (imm, rs1) = split_offset(mnemonic, parts[1])?;
        Instruction::I {
          mnemonic,
          rd  : parse_register(parts[0])?,
          rs1 : parse_register(rs1)?,
          imm : signed_immediate(imm, 12, 0)?,
        }
      }

      Format::I => {
        let parts = split_operands(mnemonic, spec.format.grammar(), operands)?;
        Instruction::I {
          mnemonic,
          rd  : parse_register(parts[0])?,
          rs1 : parse_register(parts[1])?,
          imm : signed_immediate(parts[2], 12, 0)?,
        }
      }

      Format::I2 => {
        let parts = split_operands(mnemonic, spec.format.grammar(), operands)?;
        Instruction::I2 {
          mnemonic,
          rd    : parse_register(parts[0])?,
          rs1   : parse_register(parts[1])?,
          shamt : parse_immediate(parts[2], 5, 0, false)? as u32,
        }
      }

      Format::S => {
        let parts      = split_operands(mnemonic, spec.format.grammar(), operands)?;
        let (imm, rs1) = split_offset(mnemonic, parts[1])?;
        Instruction::S {
          mnemonic,
          rs2 : parse_register(parts[0])?,
          rs1 : parse_register(rs1)?,
          imm : signed_immediate(imm, 12, 0)?,
        }
      }

      Format::B => {
        let parts = split_operands(mnemonic, spec.format.grammar(), operands)?;
        Instruction::B {
          mnemonic,
          rs1 : parse_register(parts[0])?,
          rs2 : parse_register(parts[1])?,
          imm : signed_immediate(parts[2], 13, 1)?,
        }
      }

      Format::U => {
        let parts = split_operands(mnemonic, spec.format.grammar(), operands)?;
        Instruction::U {
          mnemonic,
          rd  : parse_register(parts[0])?,
          imm : (parse_immediate(parts[1], 20, 0, false)? as u32) << 12,
        }
      }

      Format::J => {
        let parts = split_operands(mnemonic, spec.format.grammar(), operands)?;
        Instruction::J {
          mnemonic,
          rd  : parse_register(parts[0])?,
          imm : signed_immediate(parts[1], 21, 1)?,
        }
      }

    };

  Ok(instruction)
}

/// Canonical text of an instruction.
pub fn encode_text(instruction: &Instruction) -> String {
  instruction.to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::SPEC_TABLE;

  fn decode(line: &str) -> Result<Instruction, AsmError> {
    decode_text(&SPEC_TABLE, line)
  }

  #[test]
  fn comments_are_stripped_at_the_first_marker() {
    assert_eq!(strip_comment("add x1, x2, x3 ; sum"), "add x1, x2, x3 ");
    assert_eq!(strip_comment("addi x1, x0, 1 // one # uno"), "addi x1, x0, 1 ");
    assert_eq!(strip_comment("# only a comment"), "");
    assert_eq!(strip_comment("nop"), "nop");
  }

  #[test]
  fn register_register() {
    assert_eq!(
      decode("ADD x1,x2,x3"),
      Ok(Instruction::R { mnemonic: Mnemonic::Add, rd: 1, rs1: 2, rs2: 3 })
    );
    assert_eq!(
      decode("  sub  t0 , a0 ,  sp   # difference"),
      Ok(Instruction::R { mnemonic: Mnemonic::Sub, rd: 5, rs1: 10, rs2: 2 })
    );
  }

  #[test]
  fn immediate_forms() {
    assert_eq!(
      decode("addi x1, x0, -5"),
      Ok(Instruction::I { mnemonic: Mnemonic::Addi, rd: 1, rs1: 0, imm: -5 })
    );
    assert_eq!(
      decode("lw a0, -8(sp)"),
      Ok(Instruction::I { mnemonic: Mnemonic::Lw, rd: 10, rs1: 2, imm: -8 })
    );
    assert_eq!(
      decode("jalr ra, 0 ( t1 )"),
      Ok(Instruction::I { mnemonic: Mnemonic::Jalr, rd: 1, rs1: 6, imm: 0 })
    );
    assert_eq!(
      decode("slli x5, x5, 0x1F"),
      Ok(Instruction::I2 { mnemonic: Mnemonic::Slli, rd: 5, rs1: 5, shamt: 31 })
    );
  }

  #[test]
  fn store_branch_upper_and_jump() {
    assert_eq!(
      decode("sw x8, 12(x2)"),
      Ok(Instruction::S { mnemonic: Mnemonic::Sw, rs1: 2, rs2: 8, imm: 12 })
    );
    assert_eq!(
      decode("beq x0, x0, 8"),
      Ok(Instruction::B { mnemonic: Mnemonic::Beq, rs1: 0, rs2: 0, imm: 8 })
    );
    assert_eq!(
      decode("lui x1, 0x12345"),
      Ok(Instruction::U { mnemonic: Mnemonic::Lui, rd: 1, imm: 0x1234_5000 })
    );
    assert_eq!(
      decode("jal ra, -2048"),
      Ok(Instruction::J { mnemonic: Mnemonic::Jal, rd: 1, imm: -2048 })
    );
  }

  #[test]
  fn halt_with_and_without_operands() {
    let halt = Instruction::U { mnemonic: Mnemonic::Halt, rd: 0, imm: 0 };
    assert_eq!(decode("HALT"), Ok(halt));
    assert_eq!(decode("halt x0, 0"), Ok(halt));
  }

  #[test]
  fn wrong_operand_counts_are_malformed() {
    assert!(matches!(decode("add x1, x2"), Err(AsmError::MalformedOperands(_))));
    assert!(matches!(decode("add x1, x2, x3, x4"), Err(AsmError::MalformedOperands(_))));
    assert!(matches!(decode("lw x1, 4"), Err(AsmError::MalformedOperands(_))));
    assert!(matches!(decode("sw x1, (x2)"), Err(AsmError::MalformedOperands(_))));
    assert!(matches!(decode("addi x1, , 3"), Err(AsmError::MalformedOperands(_))));
  }

  #[test]
  fn operand_errors_keep_their_kind() {
    assert_eq!(decode("mul x1, x2, x3"), Err(AsmError::UnknownMnemonic("mul".to_string())));
    assert_eq!(decode("add x1, x2, q3"), Err(AsmError::UnknownRegister("q3".to_string())));
    assert!(matches!(decode("addi x1, x0, 4096"), Err(AsmError::ImmediateOutOfRange{ .. })));
    assert!(matches!(decode("beq x1, x2, 3"), Err(AsmError::ImmediateMisaligned{ .. })));
    assert!(matches!(decode("jal x1, 1"), Err(AsmError::ImmediateMisaligned{ .. })));
    assert!(matches!(decode("lui x1, -1"), Err(AsmError::ImmediateOutOfRange{ .. })));
    assert!(matches!(decode("srai x1, x1, 32"), Err(AsmError::ImmediateOutOfRange{ .. })));
    assert!(matches!(decode(""), Err(AsmError::UnknownMnemonic(_))));
  }

  #[test]
  fn canonical_text_reads_back() {
    for line in &[
      "add x1,x2,x3", "lw t0, -0x7FF(sp)", "sb a1, 3(a2)", "bgeu x4, x5, -0x1000",
      "lui x9, 0xFFFFF", "auipc x3, 1", "jal x0, 0xFFFFE", "srli x1, x2, 7", "xorid x4, x4, 0",
    ] {
      let instruction = decode(line).unwrap();
      assert_eq!(decode(&encode_text(&instruction)), Ok(instruction), "{}", line);
    }
  }
}
