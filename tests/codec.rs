use strum::IntoEnumIterator;

use rv32i::bytecode::{Codec, Format, Instruction, InstructionSpec, Mnemonic, Word, SPEC_TABLE};
use rv32i::{assemble_text, disassemble_text, AsmError};

/// A small valid instruction of the spec's format, with distinct non-zero fields.
fn sample_instruction(spec: InstructionSpec) -> Instruction {
  let mnemonic = spec.mnemonic;
  match spec.format {
    Format::R  => Instruction::R { mnemonic, rd: 1, rs1: 2, rs2: 3 },
    Format::I  => Instruction::I { mnemonic, rd: 4, rs1: 5, imm: -6 },
    Format::I2 => Instruction::I2 { mnemonic, rd: 7, rs1: 8, shamt: 9 },
    Format::S  => Instruction::S { mnemonic, rs1: 10, rs2: 11, imm: -12 },
    Format::B  => Instruction::B { mnemonic, rs1: 13, rs2: 14, imm: -16 },
    Format::U  => Instruction::U { mnemonic, rd: 17, imm: 18 << 12 },
    Format::J  => Instruction::J { mnemonic, rd: 19, imm: -20 },
  }
}

/// xorshift32, enough to spread words over every opcode.
fn next_word(state: &mut Word) -> Word {
  *state ^= *state << 13;
  *state ^= *state >> 17;
  *state ^= *state << 5;
  *state
}

#[test]
fn every_mnemonic_is_in_the_table() {
  for mnemonic in Mnemonic::iter() {
    assert!(SPEC_TABLE.spec_for(mnemonic).is_ok(), "{} is missing", mnemonic);
  }
}

#[test]
fn every_mnemonic_round_trips_through_binary_and_text() {
  let codec = Codec::default();
  for spec in SPEC_TABLE.specs() {
    let instruction = sample_instruction(spec);

    let word = codec.encode_binary(&instruction).unwrap();
    assert_eq!(codec.decode_binary(word), Ok(instruction), "{}", spec.mnemonic);

    let text = codec.encode_text(&instruction);
    assert_eq!(codec.decode_text(&text), Ok(instruction), "{}", text);
  }
}

#[test]
fn uniquely_resolving_words_round_trip() {
  let codec = Codec::default();
  let mut state: Word = 0x2545_F491;
  let mut decoded = 0;

  for _ in 0..50_000 {
    let word = next_word(&mut state);
    // Force a known opcode on half the samples so every format gets exercised.
    let word =
      match word & 1 {
        0 => (word & !0x7F) | [0x03, 0x13, 0x17, 0x23, 0x33, 0x37, 0x63, 0x67, 0x6F, 0x0B][(word >> 8) as usize % 10],
        _ => word
      };
    if let Ok(instruction) = codec.decode_binary(word) {
      decoded += 1;
      assert_eq!(codec.encode_binary(&instruction), Ok(word), "{:#010x} {}", word, instruction);
    }
  }
  assert!(decoded > 1000);
}

#[test]
fn the_reference_add_in_every_direction() {
  let codec = Codec::default();
  assert_eq!(codec.assemble_line("ADD x1,x2,x3"), Ok(0x003100B3));
  assert_eq!(assemble_text("ADD x1,x2,x3"), "B3 00 31 00");
  assert_eq!(disassemble_text("B3 00 31 00"), "_00: add     x1, x2, x3");
}

#[test]
fn branch_immediate_survives_the_round_trip() {
  let codec = Codec::default();
  let word = codec.assemble_line("BEQ x0,x0,8").unwrap();
  match codec.decode_binary(word) {
    Ok(Instruction::B { mnemonic: Mnemonic::Beq, imm, .. }) => assert_eq!(imm, 8),
    other => panic!("unexpected decode {:?}", other),
  }
}

#[test]
fn large_immediates_print_in_hex() {
  let codec = Codec::default();
  assert_eq!(codec.disassemble_word(codec.assemble_line("addi x1, x0, -2048").unwrap()),
             Ok("addi    x1, x0, -0x800".to_string()));
  assert_eq!(codec.disassemble_word(codec.assemble_line("lui x5, 0xABCDE").unwrap()),
             Ok("lui     x5, 0xABCDE".to_string()));
  assert_eq!(codec.disassemble_word(codec.assemble_line("lw x6, 999(x2)").unwrap()),
             Ok("lw      x6, 999(x2)".to_string()));
}

#[test]
fn translation_preserves_blank_lines() {
  let source = "\naddi x1, x0, 5\n\n\nnot an instruction\n";
  let hex = assemble_text(source);
  assert_eq!(hex, "\n93 00 50 00\n\n\nERROR\n");

  let listing = disassemble_text(&hex);
  assert_eq!(listing, "\n_00: addi    x1, x0, 5\n\n\n_04: ERROR\n");
}

#[test]
fn operand_errors_surface_from_the_codec() {
  let codec = Codec::default();
  assert!(matches!(codec.assemble_line("jal x1, 3"), Err(AsmError::ImmediateMisaligned{ .. })));
  assert!(matches!(codec.assemble_line("addi x1, x0, -2049"), Err(AsmError::ImmediateOutOfRange{ .. })));
  assert!(matches!(codec.assemble_line("add x1, x2, x99"), Err(AsmError::UnknownRegister(_))));
}
