//! Core infrastructure for building, compiling, and running shader programs
//!
//! ```
//! use softgpu::{
//!     compiler::{Program, compile_shader},
//!     shader::ShaderBuilder,
//!     vm::{Bindings, ShaderVm, Value},
//! };
//!
//! // out = in * in + (1, 1)
//! let mut b = ShaderBuilder::new();
//! b.push_input_vec2()?;
//! b.push_output_vec2()?;
//! b.load_input(0, 0)?;
//! b.fmul(1, 0, 0)?;
//! b.load_constant_vec2(2, 1.0, 1.0)?;
//! b.fadd(3, 1, 2)?;
//! b.store(3, 0)?;
//!
//! let blob = compile_shader(&mut b)?;
//! let program = Program::from_bytes(blob.as_bytes())?;
//!
//! let mut vm = ShaderVm::new();
//! let inputs = [Value::Vec2([2.0, 3.0])];
//! let out = vm.run(&program, &inputs, &Bindings::default())?;
//! assert_eq!(out, &[Value::Vec2([5.0, 10.0])]);
//! # Ok::<(), softgpu::Error>(())
//! ```
pub mod bytecode;
pub mod compiler;
pub mod layout;
pub mod shader;
pub mod vm;
