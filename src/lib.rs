/*!
  An RV32I toolkit: a line-oriented assembler and disassembler between assembly text, a
  structured instruction and 32 bit machine words, and a simulator that executes words
  against a register file and byte-addressable memory.

  ```text
    translate   whole-text assembly/disassembly, hex program loading
    bytecode    instruction table, codec, operand parsing
    machine     register file, data memory, instruction store
    engine      fetch-decode-execute loop and run trace
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod bytecode;
pub mod config;
pub mod engine;
pub mod error;
pub mod machine;
pub mod translate;

pub use bytecode::{Codec, Instruction, Mnemonic, SpecTable, Word, SPEC_TABLE};
pub use config::MachineConfig;
pub use engine::{Effect, Engine, State, Step};
pub use error::{AsmError, ExecError, LineError, TableError};
pub use machine::{Machine, Width};
pub use translate::{assemble_program, assemble_text, disassemble_text, parse_hex_program};
