/*!
  The fetch-decode-execute loop.

  An `Engine` owns one `Machine` for the duration of an execution session and borrows the
  instruction table through its `Codec`. Each call to `step` executes at most one
  instruction:

    1. fetch the word at `pc / 4` (past the store is fatal),
    2. the all-zero word halts,
    3. decode it (failure is fatal and halts the engine),
    4. apply its effects to the machine and advance the program counter.

  Executing an instruction yields a `Step` recording what changed, which is what the
  command line prints as the run trace.
*/

use std::fmt::{Display, Formatter};

use tracing::{debug, error, info};

use crate::bytecode::{Codec, Instruction, Mnemonic, Register, Word};
use crate::error::ExecError;
use crate::machine::{Address, Machine, Width};

#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum State {
  Running,
  Halted,
}

/// One observable change made by an instruction.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Effect {
  Register { index: Register, value: Word },
  Memory { address: Address, width: Width, value: Word },
  Jump { target: Word },
}

impl Display for Effect {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match *self {

      Effect::Register { index, value } => {
        write!(f, "x{} <= 0x{:08X} = {}", index, value, value)?;
        if value & 0x8000_0000 != 0 {
          write!(f, " = {}", value as i32)?;
        }
        Ok(())
      }

      Effect::Memory { address, width, value } => {
        let bytes = width.bytes();
        write!(
          f,
          "DataMemory[{}:{}] <= 0x{:0digits$X}",
          address + bytes as Address - 1,
          address,
          value & width.mask(),
          digits = 2 * bytes
        )
      }

      Effect::Jump { target } => write!(f, "PC <= 0x{:08X}", target),

    }
  }
}

/// An executed instruction and everything it changed.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Step {
  pub pc          : Word,
  pub instruction : Instruction,
  pub effects     : Vec<Effect>,
}

impl Display for Step {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let effects: Vec<String> = self.effects.iter().map(|effect| effect.to_string()).collect();
    write!(f, "_{:02X}: {:<30}{}", self.pc, self.instruction.to_string(), effects.join("  "))
  }
}

pub struct Engine<'t> {
  machine   : Machine,
  codec     : Codec<'t>,
  state     : State,
  steps     : u64,
  last_step : Option<Step>,
}

impl Engine<'static> {
  /// An engine decoding with the built-in RV32I table.
  pub fn new(machine: Machine) -> Engine<'static> {
    Engine::with_codec(machine, Codec::default())
  }
}

impl<'t> Engine<'t> {

  // region Session management

  pub fn with_codec(machine: Machine, codec: Codec<'t>) -> Engine<'t> {
    Engine {
      machine,
      codec,
      state     : State::Running,
      steps     : 0,
      last_step : None,
    }
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn machine(&self) -> &Machine {
    &self.machine
  }

  pub fn machine_mut(&mut self) -> &mut Machine {
    &mut self.machine
  }

  pub fn into_machine(self) -> Machine {
    self.machine
  }

  /// Number of instructions executed this session.
  pub fn steps(&self) -> u64 {
    self.steps
  }

  /// The most recently executed instruction, if the last call to `step` executed one.
  pub fn last_step(&self) -> Option<&Step> {
    self.last_step.as_ref()
  }

  /// Starts a new session at `pc = 0`. Registers and memory keep their contents.
  pub fn reset(&mut self) {
    self.machine.set_pc(0);
    self.state     = State::Running;
    self.steps     = 0;
    self.last_step = None;
  }

  fn halt(&mut self) -> State {
    self.state = State::Halted;
    info!(pc = self.machine.pc(), steps = self.steps, "halted");
    State::Halted
  }

  fn fault(&mut self, err: ExecError) -> ExecError {
    self.state = State::Halted;
    error!(steps = self.steps, "execution aborted: {}", err);
    err
  }

  // endregion

  // region Running

  /**
    Executes one instruction. Returns the state after the step; stepping a halted engine
    does nothing. Any error halts the engine.
  */
  pub fn step(&mut self) -> Result<State, ExecError> {
    self.last_step = None;
    if self.state == State::Halted {
      return Ok(State::Halted);
    }

    let pc = self.machine.pc();
    let word =
      match self.machine.fetch(pc) {
        Some(word) => word,
        None       => return Err(self.fault(ExecError::FetchOutOfRange{ pc }))
      };
    if word == 0 {
      return Ok(self.halt());
    }

    let instruction =
      match self.codec.decode_binary(word) {
        Ok(instruction) => instruction,
        Err(source)     => return Err(self.fault(ExecError::Decode{ pc, word, source }))
      };
    if instruction.mnemonic() == Mnemonic::Halt {
      return Ok(self.halt());
    }

    let effects =
      match self.execute(pc, &instruction) {
        Ok(effects) => effects,
        Err(err)    => return Err(self.fault(err))
      };

    self.steps += 1;
    let step = Step{ pc, instruction, effects };
    debug!("{}", step);

    #[cfg(feature = "trace_computation")]
    {
      println!("{}", step);
      println!("{}", self.machine);
    }

    self.last_step = Some(step);
    Ok(State::Running)
  }

  /**
    Steps until the machine halts and returns the number of instructions executed. There
    is no step limit: a program that never reaches a halt never returns. Hosts that need a
    bound use `run_bounded`.
  */
  pub fn run(&mut self) -> Result<u64, ExecError> {
    while self.step()? == State::Running {}
    Ok(self.steps)
  }

  /**
    Executes at most `max_steps` instructions. If the limit is reached and the next word is
    the halt sentinel, the engine halts anyway, so a program of exactly `max_steps`
    instructions reports `Halted`.
  */
  pub fn run_bounded(&mut self, max_steps: u64) -> Result<State, ExecError> {
    let mut executed = 0;
    while executed < max_steps {
      if self.step()? == State::Halted {
        return Ok(State::Halted);
      }
      executed += 1;
    }
    if self.state == State::Running && self.machine.fetch(self.machine.pc()) == Some(0) {
      return Ok(self.halt());
    }
    Ok(self.state)
  }

  // endregion

  // region Instruction semantics

  fn write_register(&mut self, rd: Register, value: Word, effects: &mut Vec<Effect>) {
    if rd != 0 {
      self.machine.write_register(rd, value);
      effects.push(Effect::Register{ index: rd, value });
    }
  }

  fn jump(&mut self, target: Word, effects: &mut Vec<Effect>) {
    self.machine.set_pc(target);
    effects.push(Effect::Jump{ target });
  }

  /// `rs1 + imm` without truncation to 32 bits; the machine reduces it modulo its memory.
  fn effective_address(&self, rs1: Register, imm: i32) -> Address {
    self.machine.read_register(rs1) as Address + imm as Address
  }

  fn execute(&mut self, pc: Word, instruction: &Instruction) -> Result<Vec<Effect>, ExecError> {
    let mut effects  = Vec::new();
    let next         = pc.wrapping_add(4);
    let mnemonic     = instruction.mnemonic();
    let not_executable = || ExecError::NotExecutable{ pc, mnemonic, format: instruction.format() };

    match *instruction {

      Instruction::R { rd, rs1, rs2, .. } => {
        let lhs = self.machine.read_register(rs1);
        let rhs = self.machine.read_register(rs2);
        let result = alu(mnemonic, lhs, rhs).ok_or_else(not_executable)?;
        self.write_register(rd, result, &mut effects);
        self.machine.set_pc(next);
      }

      Instruction::I { mnemonic: Mnemonic::Jalr, rd, rs1, imm } => {
        // The link is written before `rs1` is read, so `jalr x1, imm(x1)` jumps relative
        // to the new link value.
        self.write_register(rd, next, &mut effects);
        let target = self.machine.read_register(rs1).wrapping_add(imm as Word);
        self.jump(target, &mut effects);
      }

      Instruction::I { mnemonic: Mnemonic::Xorid, rd, rs1, .. } => {
        let result = self.machine.read_register(rs1) ^ self.machine.config().xorid_key;
        self.write_register(rd, result, &mut effects);
        self.machine.set_pc(next);
      }

      Instruction::I { rd, rs1, imm, .. } => {
        let result =
          match load_width(mnemonic) {
            Some((width, signed)) => {
              let value = self.machine.read_memory(self.effective_address(rs1, imm), width);
              match signed {
                true  => extend_sign(value, width),
                false => value
              }
            }
            None => alu(mnemonic, self.machine.read_register(rs1), imm as Word).ok_or_else(not_executable)?
          };
        self.write_register(rd, result, &mut effects);
        self.machine.set_pc(next);
      }

      Instruction::I2 { rd, rs1, shamt, .. } => {
        let lhs = self.machine.read_register(rs1);
        let result = alu(mnemonic, lhs, shamt).ok_or_else(not_executable)?;
        self.write_register(rd, result, &mut effects);
        self.machine.set_pc(next);
      }

      Instruction::S { rs1, rs2, imm, .. } => {
        let width   = store_width(mnemonic).ok_or_else(not_executable)?;
        let address = self.effective_address(rs1, imm);
        let value   = self.machine.read_register(rs2);
        self.machine.write_memory(address, value, width);
        effects.push(Effect::Memory{ address, width, value });
        self.machine.set_pc(next);
      }

      Instruction::B { rs1, rs2, imm, .. } => {
        let lhs = self.machine.read_register(rs1);
        let rhs = self.machine.read_register(rs2);
        match branch_taken(mnemonic, lhs, rhs).ok_or_else(not_executable)? {
          true  => self.jump(pc.wrapping_add(imm as Word), &mut effects),
          false => self.machine.set_pc(next)
        }
      }

      Instruction::U { rd, imm, .. } => {
        let result =
          match mnemonic {
            Mnemonic::Lui   => imm,
            Mnemonic::Auipc => pc.wrapping_add(imm),
            _               => return Err(not_executable())
          };
        self.write_register(rd, result, &mut effects);
        self.machine.set_pc(next);
      }

      Instruction::J { rd, imm, .. } => {
        self.write_register(rd, next, &mut effects);
        self.jump(pc.wrapping_add(imm as Word), &mut effects);
      }

    }

    Ok(effects)
  }

  // endregion
}

/// Register-register and register-immediate arithmetic. Shift amounts use the low five bits.
fn alu(mnemonic: Mnemonic, lhs: Word, rhs: Word) -> Option<Word> {
  let result =
    match mnemonic {
      Mnemonic::Add  | Mnemonic::Addi  => lhs.wrapping_add(rhs),
      Mnemonic::Sub                    => lhs.wrapping_sub(rhs),
      Mnemonic::And  | Mnemonic::Andi  => lhs & rhs,
      Mnemonic::Or   | Mnemonic::Ori   => lhs | rhs,
      Mnemonic::Xor  | Mnemonic::Xori  => lhs ^ rhs,
      Mnemonic::Slt  | Mnemonic::Slti  => ((lhs as i32) < (rhs as i32)) as Word,
      Mnemonic::Sltu | Mnemonic::Sltiu => (lhs < rhs) as Word,
      Mnemonic::Sll  | Mnemonic::Slli  => lhs << (rhs & 0x1F),
      Mnemonic::Srl  | Mnemonic::Srli  => lhs >> (rhs & 0x1F),
      Mnemonic::Sra  | Mnemonic::Srai  => ((lhs as i32) >> (rhs & 0x1F)) as Word,
      _ => return None
    };
  Some(result)
}

fn branch_taken(mnemonic: Mnemonic, lhs: Word, rhs: Word) -> Option<bool> {
  let taken =
    match mnemonic {
      Mnemonic::Beq  => lhs == rhs,
      Mnemonic::Bne  => lhs != rhs,
      Mnemonic::Blt  => (lhs as i32) < (rhs as i32),
      Mnemonic::Bge  => (lhs as i32) >= (rhs as i32),
      Mnemonic::Bltu => lhs < rhs,
      Mnemonic::Bgeu => lhs >= rhs,
      _ => return None
    };
  Some(taken)
}

/// Width and signedness of a load.
fn load_width(mnemonic: Mnemonic) -> Option<(Width, bool)> {
  match mnemonic {
    Mnemonic::Lb  => Some((Width::Byte, true)),
    Mnemonic::Lh  => Some((Width::Half, true)),
    Mnemonic::Lw  => Some((Width::Word, false)),
    Mnemonic::Lbu => Some((Width::Byte, false)),
    Mnemonic::Lhu => Some((Width::Half, false)),
    _             => None
  }
}

fn store_width(mnemonic: Mnemonic) -> Option<Width> {
  match mnemonic {
    Mnemonic::Sb => Some(Width::Byte),
    Mnemonic::Sh => Some(Width::Half),
    Mnemonic::Sw => Some(Width::Word),
    _            => None
  }
}

fn extend_sign(value: Word, width: Width) -> Word {
  let shift = 32 - 8 * width.bytes() as u32;
  (((value << shift) as i32) >> shift) as Word
}
