/*!
  The instruction table maps each mnemonic to its format and the fixed bit fields that
  identify it (opcode, and `funct3`/`funct7` where the format has them). The inverse
  direction, from the fixed fields of a word back to a mnemonic, is what the decoder uses.

  The table is really just a convenience wrapper around a `BiMap` between mnemonics and
  `EncodingKey`s. Because a key only carries the funct fields its format defines, the
  decoder looks up every key shape a word could match and requires exactly one hit.
*/

use std::collections::HashMap;
use std::convert::TryFrom;
use std::str::FromStr;

use bimap::BiMap;

use super::{Format, Mnemonic, Opcode, Word};
use crate::error::{AsmError, TableError};

/// The fixed fields identifying an instruction. Absent funct fields are `None`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct EncodingKey {
  pub opcode : Opcode,
  pub funct3 : Option<u8>,
  pub funct7 : Option<u8>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct InstructionSpec {
  pub mnemonic : Mnemonic,
  pub format   : Format,
  pub opcode   : Opcode,
  pub funct3   : Option<u8>,
  pub funct7   : Option<u8>,
}

impl InstructionSpec {
  pub const fn new(
    mnemonic : Mnemonic,
    format   : Format,
    opcode   : Opcode,
    funct3   : Option<u8>,
    funct7   : Option<u8>
  ) -> InstructionSpec {
    InstructionSpec{ mnemonic, format, opcode, funct3, funct7 }
  }

  pub fn key(&self) -> EncodingKey {
    EncodingKey{ opcode: self.opcode, funct3: self.funct3, funct7: self.funct7 }
  }

  /// The word with only the fixed fields set: opcode [6:0], funct3 [14:12], funct7 [31:25].
  pub fn fixed_bits(&self) -> Word {
    (self.opcode.code() as Word)
      | ((self.funct3.unwrap_or(0) as Word) << 12)
      | ((self.funct7.unwrap_or(0) as Word) << 25)
  }
}

// Abbreviations for the table below.
const fn r(mnemonic: Mnemonic, funct3: u8, funct7: u8) -> InstructionSpec {
  InstructionSpec::new(mnemonic, Format::R, Opcode::Op, Some(funct3), Some(funct7))
}

const fn i(mnemonic: Mnemonic, opcode: Opcode, funct3: u8) -> InstructionSpec {
  InstructionSpec::new(mnemonic, Format::I, opcode, Some(funct3), None)
}

const fn shift(mnemonic: Mnemonic, funct3: u8, funct7: u8) -> InstructionSpec {
  InstructionSpec::new(mnemonic, Format::I2, Opcode::OpImm, Some(funct3), Some(funct7))
}

const fn s(mnemonic: Mnemonic, funct3: u8) -> InstructionSpec {
  InstructionSpec::new(mnemonic, Format::S, Opcode::Store, Some(funct3), None)
}

const fn b(mnemonic: Mnemonic, funct3: u8) -> InstructionSpec {
  InstructionSpec::new(mnemonic, Format::B, Opcode::Branch, Some(funct3), None)
}

const fn u(mnemonic: Mnemonic, opcode: Opcode) -> InstructionSpec {
  InstructionSpec::new(mnemonic, Format::U, opcode, None, None)
}

/// The documented mnemonic set.
pub static RV32I_SPECS: &[InstructionSpec] = &[
  u(Mnemonic::Halt, Opcode::Halt),

  i(Mnemonic::Addi,  Opcode::OpImm,   0b000),
  i(Mnemonic::Slti,  Opcode::OpImm,   0b010),
  i(Mnemonic::Sltiu, Opcode::OpImm,   0b011),
  i(Mnemonic::Xori,  Opcode::OpImm,   0b100),
  i(Mnemonic::Ori,   Opcode::OpImm,   0b110),
  i(Mnemonic::Andi,  Opcode::OpImm,   0b111),
  i(Mnemonic::Xorid, Opcode::Custom0, 0b100),

  shift(Mnemonic::Slli, 0b001, 0b000_0000),
  shift(Mnemonic::Srli, 0b101, 0b000_0000),
  shift(Mnemonic::Srai, 0b101, 0b010_0000),

  u(Mnemonic::Lui,   Opcode::Lui),
  u(Mnemonic::Auipc, Opcode::Auipc),

  r(Mnemonic::Add,  0b000, 0b000_0000),
  r(Mnemonic::Sub,  0b000, 0b010_0000),
  r(Mnemonic::Sll,  0b001, 0b000_0000),
  r(Mnemonic::Slt,  0b010, 0b000_0000),
  r(Mnemonic::Sltu, 0b011, 0b000_0000),
  r(Mnemonic::Xor,  0b100, 0b000_0000),
  r(Mnemonic::Srl,  0b101, 0b000_0000),
  r(Mnemonic::Sra,  0b101, 0b010_0000),
  r(Mnemonic::Or,   0b110, 0b000_0000),
  r(Mnemonic::And,  0b111, 0b000_0000),

  InstructionSpec::new(Mnemonic::Jal, Format::J, Opcode::Jal, None, None),
  i(Mnemonic::Jalr, Opcode::Jalr, 0b000),

  b(Mnemonic::Beq,  0b000),
  b(Mnemonic::Bne,  0b001),
  b(Mnemonic::Blt,  0b100),
  b(Mnemonic::Bge,  0b101),
  b(Mnemonic::Bltu, 0b110),
  b(Mnemonic::Bgeu, 0b111),

  i(Mnemonic::Lb,  Opcode::Load, 0b000),
  i(Mnemonic::Lh,  Opcode::Load, 0b001),
  i(Mnemonic::Lw,  Opcode::Load, 0b010),
  i(Mnemonic::Lbu, Opcode::Load, 0b100),
  i(Mnemonic::Lhu, Opcode::Load, 0b101),

  s(Mnemonic::Sb, 0b000),
  s(Mnemonic::Sh, 0b001),
  s(Mnemonic::Sw, 0b010),
];

lazy_static! {
  /// The process-wide, read-only table of `RV32I_SPECS`.
  pub static ref SPEC_TABLE: SpecTable =
    match SpecTable::from_entries(RV32I_SPECS) {
      Ok(table) => table,
      Err(e)    => panic!("The built-in instruction table is inconsistent: {}", e)
    };
}

#[derive(Debug)]
pub struct SpecTable {
  encodings : BiMap<Mnemonic, EncodingKey>,
  formats   : HashMap<Mnemonic, Format>,
}

impl SpecTable {

  /**
    Builds a table, rejecting entries whose funct fields disagree with their format, and
    any mnemonic or encoding key listed twice.
  */
  pub fn from_entries(entries: &[InstructionSpec]) -> Result<SpecTable, TableError> {
    let mut table = SpecTable{
      encodings : BiMap::new(),
      formats   : HashMap::new(),
    };

    for spec in entries {
      if spec.format.has_funct3() != spec.funct3.is_some()
          || spec.format.has_funct7() != spec.funct7.is_some() {
        return Err(TableError::InconsistentFields(spec.mnemonic));
      }
      if spec.funct3.map_or(false, |f| f > 0b111) || spec.funct7.map_or(false, |f| f > 0b111_1111) {
        return Err(TableError::FieldOutOfRange(spec.mnemonic));
      }
      if table.formats.contains_key(&spec.mnemonic) {
        return Err(TableError::DuplicateMnemonic(spec.mnemonic));
      }
      if let Some(existing) = table.encodings.get_by_right(&spec.key()) {
        return Err(TableError::DuplicateEncoding{ mnemonic: spec.mnemonic, existing: *existing });
      }

      table.encodings.insert(spec.mnemonic, spec.key());
      table.formats.insert(spec.mnemonic, spec.format);
    }

    Ok(table)
  }

  pub fn len(&self) -> usize {
    self.formats.len()
  }

  pub fn is_empty(&self) -> bool {
    self.formats.is_empty()
  }

  pub fn spec_for(&self, mnemonic: Mnemonic) -> Result<InstructionSpec, AsmError> {
    match (self.formats.get(&mnemonic), self.encodings.get_by_left(&mnemonic)) {
      (Some(format), Some(key)) => {
        Ok(InstructionSpec::new(mnemonic, *format, key.opcode, key.funct3, key.funct7))
      }
      _ => Err(AsmError::UnknownMnemonic(mnemonic.name().to_string()))
    }
  }

  /// Looks up a mnemonic written in assembly text, ignoring case.
  pub fn spec_for_name(&self, name: &str) -> Result<InstructionSpec, AsmError> {
    match Mnemonic::from_str(&name.to_ascii_lowercase()) {
      Ok(mnemonic) => self.spec_for(mnemonic),
      Err(_)       => Err(AsmError::UnknownMnemonic(name.to_string()))
    }
  }

  /**
    Resolves the fixed fields of a word to its mnemonic. A field passed as `None` is not
    used for matching. Fails with `UnknownEncoding` when nothing matches and with
    `AmbiguousEncoding` when entries of different key shapes all match.
  */
  pub fn resolve(&self, opcode: u8, funct3: Option<u8>, funct7: Option<u8>)
    -> Result<Mnemonic, AsmError>
  {
    let unknown = || AsmError::UnknownEncoding{ opcode, funct3, funct7 };
    let major   = Opcode::try_from(opcode).map_err(|_| unknown())?;

    let mut shapes = vec![(None, None)];
    if funct3.is_some() {
      shapes.push((funct3, None));
      if funct7.is_some() {
        shapes.push((funct3, funct7));
      }
    }

    let candidates: Vec<Mnemonic> =
      shapes
        .into_iter()
        .filter_map(|(funct3, funct7)| {
          self.encodings.get_by_right(&EncodingKey{ opcode: major, funct3, funct7 })
        })
        .cloned()
        .collect();

    match candidates.len() {
      0 => Err(unknown()),
      1 => Ok(candidates[0]),
      _ => Err(AsmError::AmbiguousEncoding{ opcode, funct3, funct7, candidates })
    }
  }

  /// Every spec in the table, in no particular order.
  pub fn specs(&self) -> impl Iterator<Item = InstructionSpec> + '_ {
    self.encodings.iter().map(move |(mnemonic, key)| {
      InstructionSpec::new(*mnemonic, self.formats[mnemonic], key.opcode, key.funct3, key.funct7)
    })
  }
}
