//! Register names and immediate literals.

use std::collections::HashMap;

use nom::{
  branch::alt,
  bytes::complete::{is_a, tag_no_case},
  character::complete::{digit1, hex_digit1, one_of},
  combinator::{all_consuming, map, opt},
  error::ErrorKind,
  sequence::{pair, preceded},
  IResult
};

use super::Register;
use crate::error::AsmError;

/// ABI names of `x0` through `x31`. `fp` is accepted as a second name for `s0`.
pub const ABI_NAMES: [&str; 32] = [
  "zero", "ra", "sp",  "gp",  "tp", "t0", "t1", "t2",
  "s0",   "s1", "a0",  "a1",  "a2", "a3", "a4", "a5",
  "a6",   "a7", "s2",  "s3",  "s4", "s5", "s6", "s7",
  "s8",   "s9", "s10", "s11", "t3", "t4", "t5", "t6",
];

lazy_static! {
  static ref REGISTER_NAMES: HashMap<String, Register> = {
    let mut names = HashMap::new();
    for (index, abi_name) in ABI_NAMES.iter().enumerate() {
      names.insert(format!("x{}", index), index as Register);
      names.insert(abi_name.to_string(), index as Register);
    }
    names.insert("fp".to_string(), 8);
    names
  };
}

/// Accepts `x<N>` and ABI names, ignoring case and surrounding whitespace.
pub fn parse_register(token: &str) -> Result<Register, AsmError> {
  REGISTER_NAMES
    .get(&token.trim().to_ascii_lowercase())
    .copied()
    .ok_or_else(|| AsmError::UnknownRegister(token.trim().to_string()))
}

/// Optional sign, then digits in base 16 (`0x`), base 2 (`0b`) or base 10.
fn number_literal(input: &str) -> IResult<&str, (Option<char>, (u32, &str)), (&str, ErrorKind)> {
  pair(
    opt(one_of("+-")),
    alt((
      map(preceded(tag_no_case("0x"), hex_digit1), |digits| (16, digits)),
      map(preceded(tag_no_case("0b"), is_a("01")),  |digits| (2, digits)),
      map(digit1,                                   |digits| (10, digits)),
    ))
  )(input)
}

/**
  Parses a decimal, `0x` hexadecimal or `0b` binary literal and validates it with
  `check_immediate`. A literal that is not a number is a malformed operand.
*/
pub fn parse_immediate(literal: &str, width: u32, zero_bits: u32, signed: bool) -> Result<i64, AsmError> {
  let literal = literal.trim();
  let (sign, (radix, digits)) =
    match all_consuming(number_literal)(literal) {
      Ok((_rest, parsed)) => parsed,
      Err(_e)             => {
        return Err(AsmError::MalformedOperands(format!("`{}` is not a number", literal)));
      }
    };

  let out_of_range = || AsmError::ImmediateOutOfRange{ literal: literal.to_string(), width, signed };
  let magnitude = i64::from_str_radix(digits, radix).map_err(|_| out_of_range())?;
  let value =
    match sign {
      Some('-') => -magnitude,
      _         => magnitude
    };

  check_immediate(value, literal, width, zero_bits, signed)
}

/**
  Validates an immediate against a field: a negative value in unsigned mode is out of
  range, then the low `zero_bits` bits must be clear, then the value must fit `width` bits
  (as two's complement when `signed`). `literal` is only used for error messages.
*/
pub fn check_immediate(value: i64, literal: &str, width: u32, zero_bits: u32, signed: bool)
  -> Result<i64, AsmError>
{
  let out_of_range = || AsmError::ImmediateOutOfRange{ literal: literal.to_string(), width, signed };

  if !signed && value < 0 {
    return Err(out_of_range());
  }
  if value & ((1i64 << zero_bits) - 1) != 0 {
    return Err(AsmError::ImmediateMisaligned{ literal: literal.to_string(), zero_bits });
  }
  let fits =
    match signed {
      true  => value >= -(1i64 << (width - 1)) && value < (1i64 << (width - 1)),
      false => value < (1i64 << width)
    };
  match fits {
    true  => Ok(value),
    false => Err(out_of_range())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registers_by_position_and_abi_name() {
    assert_eq!(parse_register("x0"), Ok(0));
    assert_eq!(parse_register(" X31 "), Ok(31));
    assert_eq!(parse_register("sp"), Ok(2));
    assert_eq!(parse_register("A7"), Ok(17));
    assert_eq!(parse_register("s11"), Ok(27));
    assert_eq!(parse_register("fp"), Ok(8));
    assert_eq!(parse_register("t6"), Ok(31));
  }

  #[test]
  fn unknown_registers_fail() {
    assert_eq!(parse_register("x32"), Err(AsmError::UnknownRegister("x32".to_string())));
    assert!(parse_register("a8").is_err());
    assert!(parse_register("").is_err());
  }

  #[test]
  fn immediates_within_range() {
    assert_eq!(parse_immediate("3", 12, 0, true), Ok(3));
    assert_eq!(parse_immediate("-2048", 12, 0, true), Ok(-2048));
    assert_eq!(parse_immediate("2047", 12, 0, true), Ok(2047));
    assert_eq!(parse_immediate("0x3", 5, 0, false), Ok(3));
    assert_eq!(parse_immediate("-0x10", 13, 1, true), Ok(-16));
    assert_eq!(parse_immediate(" 0b101 ", 5, 0, false), Ok(5));
    assert_eq!(parse_immediate("0xFFFFF", 20, 0, false), Ok(0xFFFFF));
  }

  #[test]
  fn immediates_out_of_range() {
    assert!(matches!(
      parse_immediate("-2049", 12, 0, true),
      Err(AsmError::ImmediateOutOfRange{ width: 12, signed: true, .. })
    ));
    assert!(matches!(parse_immediate("2048", 12, 0, true), Err(AsmError::ImmediateOutOfRange{ .. })));
    assert!(matches!(parse_immediate("32", 5, 0, false), Err(AsmError::ImmediateOutOfRange{ .. })));
    assert!(matches!(parse_immediate("-1", 5, 0, false), Err(AsmError::ImmediateOutOfRange{ .. })));
    assert!(matches!(
      parse_immediate("0xFFFFFFFFFFFFFFFFFF", 32, 0, false),
      Err(AsmError::ImmediateOutOfRange{ .. })
    ));
  }

  #[test]
  fn odd_branch_offsets_are_misaligned() {
    assert_eq!(
      parse_immediate("7", 13, 1, true),
      Err(AsmError::ImmediateMisaligned{ literal: "7".to_string(), zero_bits: 1 })
    );
    assert!(matches!(parse_immediate("-3", 21, 1, true), Err(AsmError::ImmediateMisaligned{ .. })));
  }

  #[test]
  fn non_numbers_are_malformed() {
    assert!(matches!(parse_immediate("ten", 12, 0, true), Err(AsmError::MalformedOperands(_))));
    assert!(matches!(parse_immediate("", 12, 0, true), Err(AsmError::MalformedOperands(_))));
    assert!(matches!(parse_immediate("0x", 12, 0, true), Err(AsmError::MalformedOperands(_))));
    assert!(matches!(parse_immediate("1 2", 12, 0, true), Err(AsmError::MalformedOperands(_))));
  }
}
