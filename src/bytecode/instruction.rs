use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

// If you change this you must also change `encode_instruction` and `decode_instruction`.
pub type Word = u32;
/// Index into the register file, `0..=31` for well formed instructions.
pub type Register = u8;

/// Column width of the mnemonic in canonical text.
pub const MNEMONIC_COLUMN: usize = 8;

/// Bit-layout families. The format decides which fields a word carries and how its
/// immediate is scattered across the word.
#[derive(StrumDisplay, IntoStaticStr, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Format {
  R,
  I,
  /// Shift by immediate: an I layout whose upper seven bits are a fixed `funct7`.
  I2,
  S,
  B,
  U,
  J,
}

/// Width, required zero low bits, and signedness of a stored immediate.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct ImmediateShape {
  pub width     : u32,
  pub zero_bits : u32,
  pub signed    : bool,
}

impl Format {
  /// Shape of the immediate as stored in a structured instruction, or `None` for formats
  /// without one.
  pub fn immediate_shape(&self) -> Option<ImmediateShape> {
    let (width, zero_bits, signed) =
      match self {
        Format::R  => return None,
        Format::I  => (12, 0, true),
        Format::S  => (12, 0, true),
        Format::I2 => (5, 0, false),
        Format::B  => (13, 1, true),
        Format::U  => (32, 12, false),
        Format::J  => (21, 1, true),
      };
    Some(ImmediateShape{ width, zero_bits, signed })
  }

  pub fn has_funct3(&self) -> bool {
    !matches!(self, Format::U | Format::J)
  }

  pub fn has_funct7(&self) -> bool {
    matches!(self, Format::R | Format::I2)
  }

  /// Operand grammar of the format in assembly text.
  pub fn grammar(&self) -> &'static str {
    match self {
      Format::R  => "rd, rs1, rs2",
      Format::I  => "rd, rs1, imm",
      Format::I2 => "rd, rs1, shamt",
      Format::S  => "rs2, imm(rs1)",
      Format::B  => "rs1, rs2, imm",
      Format::U  => "rd, imm",
      Format::J  => "rd, imm",
    }
  }
}

/**
  Major opcodes, bits [6:0] of every word. Only opcodes some mnemonic uses are listed, so
  a failed conversion from a raw 7-bit value is already an unknown encoding.
*/
#[derive(
  StrumDisplay, IntoStaticStr, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,               PartialEq,     Debug, Hash
)]
#[repr(u8)]
pub enum Opcode {
  /// The all-zero opcode, so that the zero word decodes as `halt`.
  Halt    = 0b000_0000,
  Load    = 0b000_0011,
  /// `custom-0`, home of `xorid`.
  Custom0 = 0b000_1011,
  OpImm   = 0b001_0011,
  Auipc   = 0b001_0111,
  Store   = 0b010_0011,
  Op      = 0b011_0011,
  Lui     = 0b011_0111,
  Branch  = 0b110_0011,
  Jalr    = 0b110_0111,
  Jal     = 0b110_1111,
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }
}

/**
  The closed set of mnemonics. Text is matched against the lowercase names produced by
  `strum`; callers lowercase their input first so that mnemonics are case-insensitive.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter,
  Clone,        Copy,          Eq,         PartialEq, Ord, PartialOrd, Debug, Hash
)]
#[strum(serialize_all = "lowercase")]
pub enum Mnemonic {
  Halt,

  // Register-immediate
  Addi,
  Slti,
  Sltiu,
  Xori,
  Ori,
  Andi,
  Xorid,
  Slli,
  Srli,
  Srai,

  // Upper immediate
  Lui,
  Auipc,

  // Register-register
  Add,
  Sub,
  Slt,
  Sltu,
  Xor,
  Or,
  And,
  Sll,
  Srl,
  Sra,

  // Control transfer
  Jal,
  Jalr,
  Beq,
  Bne,
  Blt,
  Bge,
  Bltu,
  Bgeu,

  // Memory
  Lb,
  Lh,
  Lw,
  Lbu,
  Lhu,
  Sb,
  Sh,
  Sw,
}

impl Mnemonic {
  pub fn name(&self) -> &'static str {
    self.into()
  }

  /// Loads and `jalr` write their I-format operands as `rd, imm(rs1)`.
  pub fn uses_offset_syntax(&self) -> bool {
    matches!(
      self,
      Mnemonic::Lb | Mnemonic::Lh | Mnemonic::Lw | Mnemonic::Lbu | Mnemonic::Lhu | Mnemonic::Jalr
    )
  }
}

/**
  Holds the unencoded components of an instruction, one variant per format. It is the
  caller's responsibility to pair a mnemonic with the variant of its format; the encoder
  checks the pairing against the instruction table.

  Immediates are kept the way the assembler reads them: sign-extended for I, S, B and J,
  unsigned with the low 12 bits clear for U (`lui x1, 1` holds `0x1000`), and a plain
  shift amount for I2.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  /// [funct7:7][rs2:5][rs1:5][funct3:3][rd:5][opcode:7]
  R {
    mnemonic : Mnemonic,
    rd       : Register,
    rs1      : Register,
    rs2      : Register,
  },
  /// [imm:12][rs1:5][funct3:3][rd:5][opcode:7]
  I {
    mnemonic : Mnemonic,
    rd       : Register,
    rs1      : Register,
    imm      : i32,
  },
  /// [funct7:7][shamt:5][rs1:5][funct3:3][rd:5][opcode:7]
  I2 {
    mnemonic : Mnemonic,
    rd       : Register,
    rs1      : Register,
    shamt    : u32,
  },
  /// [imm[11:5]:7][rs2:5][rs1:5][funct3:3][imm[4:0]:5][opcode:7]
  S {
    mnemonic : Mnemonic,
    rs1      : Register,
    rs2      : Register,
    imm      : i32,
  },
  /// [imm[12|10:5]:7][rs2:5][rs1:5][funct3:3][imm[4:1|11]:5][opcode:7]
  B {
    mnemonic : Mnemonic,
    rs1      : Register,
    rs2      : Register,
    imm      : i32,
  },
  /// [imm[31:12]:20][rd:5][opcode:7]
  U {
    mnemonic : Mnemonic,
    rd       : Register,
    imm      : u32,
  },
  /// [imm[20|10:1|11|19:12]:20][rd:5][opcode:7]
  J {
    mnemonic : Mnemonic,
    rd       : Register,
    imm      : i32,
  },
}

impl Instruction {
  pub fn mnemonic(&self) -> Mnemonic {
    match *self {
      | Instruction::R  { mnemonic, .. }
      | Instruction::I  { mnemonic, .. }
      | Instruction::I2 { mnemonic, .. }
      | Instruction::S  { mnemonic, .. }
      | Instruction::B  { mnemonic, .. }
      | Instruction::U  { mnemonic, .. }
      | Instruction::J  { mnemonic, .. } => mnemonic
    }
  }

  pub fn format(&self) -> Format {
    match self {
      Instruction::R  { .. } => Format::R,
      Instruction::I  { .. } => Format::I,
      Instruction::I2 { .. } => Format::I2,
      Instruction::S  { .. } => Format::S,
      Instruction::B  { .. } => Format::B,
      Instruction::U  { .. } => Format::U,
      Instruction::J  { .. } => Format::J,
    }
  }

  pub fn rd(&self) -> Option<Register> {
    match *self {
      | Instruction::R  { rd, .. }
      | Instruction::I  { rd, .. }
      | Instruction::I2 { rd, .. }
      | Instruction::U  { rd, .. }
      | Instruction::J  { rd, .. } => Some(rd),
      _                            => None
    }
  }

  pub fn rs1(&self) -> Option<Register> {
    match *self {
      | Instruction::R  { rs1, .. }
      | Instruction::I  { rs1, .. }
      | Instruction::I2 { rs1, .. }
      | Instruction::S  { rs1, .. }
      | Instruction::B  { rs1, .. } => Some(rs1),
      _                             => None
    }
  }

  pub fn rs2(&self) -> Option<Register> {
    match *self {
      | Instruction::R { rs2, .. }
      | Instruction::S { rs2, .. }
      | Instruction::B { rs2, .. } => Some(rs2),
      _                            => None
    }
  }

  /// The immediate widened to `i64`, which holds every format's range without loss.
  pub fn immediate(&self) -> Option<i64> {
    match *self {
      | Instruction::I { imm, .. }
      | Instruction::S { imm, .. }
      | Instruction::B { imm, .. }
      | Instruction::J { imm, .. } => Some(imm as i64),
      Instruction::I2 { shamt, .. } => Some(shamt as i64),
      Instruction::U  { imm, .. }   => Some(imm as i64),
      Instruction::R  { .. }        => None
    }
  }

  /// All register fields present in the instruction.
  pub fn registers(&self) -> Vec<Register> {
    [self.rd(), self.rs1(), self.rs2()].iter().filter_map(|r| *r).collect()
  }
}

/// Decimal below 1000 in magnitude, signed hexadecimal otherwise.
pub fn display_number(value: i64) -> String {
  match value {
    v if v > -1000 && v < 1000 => v.to_string(),
    v if v < 0                 => format!("-0x{:X}", -v),
    v                          => format!("0x{:X}", v)
  }
}

/// Canonical assembly text: lowercase mnemonic padded to `MNEMONIC_COLUMN`, positional
/// register names.
impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mnemonic = self.mnemonic();
    let operands =
      match *self {

        Instruction::R { rd, rs1, rs2, .. } => {
          format!("x{}, x{}, x{}", rd, rs1, rs2)
        }

        Instruction::I { rd, rs1, imm, .. } if mnemonic.uses_offset_syntax() => {
          format!("x{}, {}(x{})", rd, display_number(imm as i64), rs1)
        }

        Instruction::I { rd, rs1, imm, .. } => {
          format!("x{}, x{}, {}", rd, rs1, display_number(imm as i64))
        }

        Instruction::I2 { rd, rs1, shamt, .. } => {
          format!("x{}, x{}, {}", rd, rs1, shamt)
        }

        Instruction::S { rs1, rs2, imm, .. } => {
          format!("x{}, {}(x{})", rs2, display_number(imm as i64), rs1)
        }

        Instruction::B { rs1, rs2, imm, .. } => {
          format!("x{}, x{}, {}", rs1, rs2, display_number(imm as i64))
        }

        Instruction::U { rd, imm, .. } => {
          format!("x{}, {}", rd, display_number((imm >> 12) as i64))
        }

        Instruction::J { rd, imm, .. } => {
          format!("x{}, {}", rd, display_number(imm as i64))
        }

      };
    write!(f, "{:<width$}{}", mnemonic.name(), operands, width = MNEMONIC_COLUMN)
  }
}
