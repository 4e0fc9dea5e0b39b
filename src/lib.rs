//! A RISC-V subset parser, assembler, and line-stepping simulator.
//!
//! This is meant as a teaching suite: programs are executed directly from
//! their source lines (one 4-byte slot per line), with the debug surface
//! a course front end needs — breakpoints, single-stepping, a live call
//! stack, and an optional data-cache model with hit/miss accounting.
//!
//! # Usage
//!
//! Source can be assembled into machine words:
//! ```
//! use rv_ensemble::asm::assemble;
//!
//! let words = assemble("addi x1, x0, 5").unwrap();
//! assert_eq!(words, vec!["00500093".to_string()]);
//! ```
//!
//! or loaded into the simulator and executed:
//! ```
//! use rv_ensemble::sim::Simulator;
//!
//! let code = "
//! addi x1, x0, 5
//! addi x2, x0, 7
//! add x3, x1, x2
//! ";
//! let mut sim = Simulator::new();
//! sim.load_program(code).unwrap();
//! sim.run().unwrap(); // <-- Result can be handled accordingly
//! ```
//!
//! Loads and stores can be routed through a cache model:
//! ```
//! use rv_ensemble::sim::Simulator;
//! use rv_ensemble::sim::cache::Cache;
//!
//! let mut sim = Simulator::new();
//! sim.attach_cache(Cache::from_spec("1024\n16\n2\nLRU\nWB").unwrap());
//! ```
//!
//! If more granularity is needed for simulation, there are also stepping
//! and breakpoint functions. See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod parse;
pub mod ast;
pub mod asm;
pub mod sim;
pub mod err;
