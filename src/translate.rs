/*!
  Whole-text translation. These functions work line by line over a `Codec` and isolate
  failures at the line boundary: `assemble_text` and `disassemble_text` render a failed
  line as `ERROR` and carry on, and always produce exactly one output line per input line.
  `assemble_program` and `parse_hex_program` instead stop at the first bad line and report
  it as a `LineError`.

  The hex format is one word per line, written as its four bytes least significant first:
  `add x1, x2, x3` is the word `0x003100B3` and the line `B3 00 31 00`.
*/

use tracing::warn;

use crate::bytecode::{strip_comment, Codec, Word};
use crate::error::{AsmError, LineError};

const ERROR_LINE: &str = "ERROR";

/// The text after the last `:`, which drops any labels in front of an instruction.
pub fn strip_label(line: &str) -> &str {
  match line.rfind(':') {
    Some(position) => &line[position + 1..],
    None           => line
  }
}

/// The instruction part of a source line: comments and labels removed, trimmed.
fn source_instruction(line: &str) -> &str {
  strip_label(strip_comment(line)).trim()
}

/// The word's bytes in memory order, as uppercase hex pairs separated by spaces.
pub fn format_hex_word(word: Word) -> String {
  let bytes: Vec<String> = word.to_le_bytes().iter().map(|byte| format!("{:02X}", byte)).collect();
  bytes.join(" ")
}

/// A hex line with all whitespace and `_` separators removed.
fn compact_hex_line(line: &str) -> String {
  line.chars().filter(|c| !c.is_whitespace() && *c != '_').collect()
}

/**
  Reads one hex line (separators allowed) into a word. The line must hold exactly eight
  hex digits, which are the word's bytes least significant first.
*/
pub fn parse_hex_line(line: &str) -> Result<Word, AsmError> {
  let digits = compact_hex_line(line);
  if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
    return Err(AsmError::MalformedHexLine(line.trim().to_string()));
  }
  u32::from_str_radix(&digits, 16)
    .map(u32::swap_bytes)
    .map_err(|_| AsmError::MalformedHexLine(line.trim().to_string()))
}

// region Line-isolated translation

pub fn assemble_text(source: &str) -> String {
  assemble_text_with(Codec::default(), source)
}

/// Assembles each line to its hex form. Blank lines stay blank and failed lines become
/// `ERROR`.
pub fn assemble_text_with(codec: Codec<'_>, source: &str) -> String {
  let lines: Vec<String> =
    source
      .split('\n')
      .enumerate()
      .map(|(index, line)| {
        let instruction = source_instruction(line);
        if instruction.is_empty() {
          return String::new();
        }
        match codec.assemble_line(instruction) {
          Ok(word) => format_hex_word(word),
          Err(e)   => {
            warn!(line = index + 1, "{}", e);
            ERROR_LINE.to_string()
          }
        }
      })
      .collect();
  lines.join("\n")
}

pub fn disassemble_text(hex: &str) -> String {
  disassemble_text_with(Codec::default(), hex)
}

/**
  Disassembles each hex line to canonical text, prefixed by its address label `_<addr>: `.
  Addresses start at zero and advance by four per non-blank line. Blank lines stay blank
  and carry no label; failed lines become `ERROR` after their label.
*/
pub fn disassemble_text_with(codec: Codec<'_>, hex: &str) -> String {
  let mut address: Word = 0;
  let mut lines: Vec<String> = Vec::new();

  for (index, line) in hex.split('\n').enumerate() {
    if compact_hex_line(line).is_empty() {
      lines.push(String::new());
      continue;
    }

    let label = format!("_{:02X}: ", address);
    address = address.wrapping_add(4);

    let text =
      parse_hex_line(line)
        .and_then(|word| codec.disassemble_word(word))
        .unwrap_or_else(|e| {
          warn!(line = index + 1, "{}", e);
          ERROR_LINE.to_string()
        });
    lines.push(label + &text);
  }

  lines.join("\n")
}

// endregion

// region Whole-program translation

pub fn assemble_program(source: &str) -> Result<Vec<Word>, LineError> {
  assemble_program_with(Codec::default(), source)
}

/// Assembles every non-blank line into a word, stopping at the first line that fails.
pub fn assemble_program_with(codec: Codec<'_>, source: &str) -> Result<Vec<Word>, LineError> {
  let mut words = Vec::new();
  for (index, line) in source.split('\n').enumerate() {
    let instruction = source_instruction(line);
    if instruction.is_empty() {
      continue;
    }
    let word = codec.assemble_line(instruction).map_err(|source| LineError{ line: index + 1, source })?;
    words.push(word);
  }
  Ok(words)
}

/// Reads one word per non-blank hex line, stopping at the first malformed line.
pub fn parse_hex_program(text: &str) -> Result<Vec<Word>, LineError> {
  text
    .split('\n')
    .enumerate()
    .filter(|(_, line)| !compact_hex_line(line).is_empty())
    .map(|(index, line)| parse_hex_line(line).map_err(|source| LineError{ line: index + 1, source }))
    .collect()
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labels_are_everything_up_to_the_last_colon() {
    assert_eq!(strip_label("loop: add x1, x2, x3"), " add x1, x2, x3");
    assert_eq!(strip_label("a: b: halt"), " halt");
    assert_eq!(strip_label("halt"), "halt");
    assert_eq!(source_instruction("  end:   # done: really"), "");
    assert_eq!(source_instruction("start: addi x1, x0, 1 ; note: one"), "addi x1, x0, 1");
  }

  #[test]
  fn hex_words_are_written_least_significant_byte_first() {
    assert_eq!(format_hex_word(0x003100B3), "B3 00 31 00");
    assert_eq!(format_hex_word(0), "00 00 00 00");
    assert_eq!(parse_hex_line("B3 00 31 00"), Ok(0x003100B3));
    assert_eq!(parse_hex_line("  b3_00_31_00 "), Ok(0x003100B3));
  }

  #[test]
  fn malformed_hex_lines() {
    assert!(matches!(parse_hex_line("B3 00 31"), Err(AsmError::MalformedHexLine(_))));
    assert!(matches!(parse_hex_line("B3 00 31 00 00"), Err(AsmError::MalformedHexLine(_))));
    assert!(matches!(parse_hex_line("G3 00 31 00"), Err(AsmError::MalformedHexLine(_))));
    assert!(matches!(parse_hex_line("+3 00 31 00"), Err(AsmError::MalformedHexLine(_))));
  }

  #[test]
  fn assemble_the_reference_add() {
    assert_eq!(assemble_text("ADD x1,x2,x3"), "B3 00 31 00");
  }

  #[test]
  fn assembly_keeps_one_line_per_input_line() {
    let source = "start: addi x1, x0, 5\n\n  # comment only\nbogus x1\nhalt\n";
    let output = assemble_text(source);
    assert_eq!(output.split('\n').count(), source.split('\n').count());
    assert_eq!(output, "93 00 50 00\n\n\nERROR\n00 00 00 00\n");
  }

  #[test]
  fn disassemble_the_reference_add() {
    assert_eq!(disassemble_text("B3 00 31 00"), "_00: add     x1, x2, x3");
  }

  #[test]
  fn disassembly_labels_only_non_blank_lines() {
    let hex = "93 00 50 00\n\n13 81 A0 00\nB3 00 31\nFF FF FF FF\n00 00 00 00";
    let output = disassemble_text(hex);
    assert_eq!(output.split('\n').count(), hex.split('\n').count());
    assert_eq!(
      output,
      "_00: addi    x1, x0, 5\n\
       \n\
       _04: addi    x2, x1, 10\n\
       _08: ERROR\n\
       _0C: ERROR\n\
       _10: halt    x0, 0"
    );
  }

  #[test]
  fn program_assembly_stops_at_the_first_bad_line() {
    assert_eq!(
      assemble_program("addi x1, x0, 5\n\nloop: addi x2, x1, 10 // add\nhalt"),
      Ok(vec![0x00500093, 0x00A08113, 0])
    );
    assert_eq!(
      assemble_program("addi x1, x0, 5\n\nadd x1, x2"),
      Err(LineError{
        line: 3,
        source: AsmError::MalformedOperands("add expects `rd, rs1, rs2`, found `x1, x2`".to_string())
      })
    );
  }

  #[test]
  fn hex_programs_skip_blank_lines() {
    assert_eq!(parse_hex_program("93 00 50 00\n\n  \n13 81 A0 00\n"), Ok(vec![0x00500093, 0x00A08113]));
    assert!(matches!(
      parse_hex_program("93 00 50 00\n93 00"),
      Err(LineError{ line: 2, source: AsmError::MalformedHexLine(_) })
    ));
  }
}
