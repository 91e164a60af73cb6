//! `softgpu` is a software GPU: a small shader instruction set, a compiler
//! which turns shader programs into opaque blobs, and a triangle pipeline
//! which runs those blobs entirely on the CPU.
//!
//! # Building shaders
//! Programs are built one instruction at a time with a
//! [`ShaderBuilder`](crate::shader::ShaderBuilder).  Registers are chosen by
//! the caller, must be defined before they're used, and can only be written
//! once; every push is checked immediately.
//!
//! ```
//! use softgpu::shader::ShaderBuilder;
//!
//! // Vertex program: vec3 position in, clip-space position out
//! let mut vs = ShaderBuilder::new();
//! vs.push_input_vec3()?;
//! vs.push_output_vertex_position()?;
//! vs.load_input(0, 0)?;
//! vs.load_constant_vec4(1, 0.0, 0.0, 0.0, 1.0)?;
//! vs.mov4(2, [(0, 0), (0, 1), (0, 2), (1, 3)])?;
//! vs.store(2, 0)?;
//!
//! // Fragment program: solid red
//! let mut fs = ShaderBuilder::new();
//! fs.push_output_vec4()?;
//! fs.load_constant_vec4(0, 1.0, 0.0, 0.0, 1.0)?;
//! fs.store(0, 0)?;
//! # Ok::<(), softgpu::Error>(())
//! ```
//!
//! # Compiling
//! [`compile_shader`](crate::compiler::compile_shader) validates a whole
//! program and encodes it as an opaque blob (see [`bytecode`]).  Vertex
//! buffer layouts are compiled the same way, using an
//! [`InputLayoutBuilder`](crate::layout::InputLayoutBuilder).
//!
//! # Drawing
//! A [`Gpu`] owns every texture and dumb buffer, keyed by caller-chosen `u64`
//! ids.  Blobs and vertex data are uploaded into dumb buffers, then a
//! [`DrawCall`] names everything by id:
//!
//! ```
//! use softgpu::{
//!     DrawCall, Gpu,
//!     compiler::compile_shader,
//!     layout::InputLayoutBuilder,
//!     shader::ShaderBuilder,
//! };
//!
//! let mut vs = ShaderBuilder::new();
//! vs.push_input_vec3()?;
//! vs.push_output_vertex_position()?;
//! vs.load_input(0, 0)?;
//! vs.load_constant_vec4(1, 0.0, 0.0, 0.0, 1.0)?;
//! vs.mov4(2, [(0, 0), (0, 1), (0, 2), (1, 3)])?;
//! vs.store(2, 0)?;
//!
//! let mut fs = ShaderBuilder::new();
//! fs.push_output_vec4()?;
//! fs.load_constant_vec4(0, 1.0, 0.0, 0.0, 1.0)?;
//! fs.store(0, 0)?;
//!
//! let mut format = InputLayoutBuilder::new();
//! format.push_vec3(0, 12)?;
//!
//! let vertices: Vec<u8> = [-1.0f32, -1.0, 0.0, 3.0, -1.0, 0.0, -1.0, 3.0, 0.0]
//!     .iter()
//!     .flat_map(|f| f.to_le_bytes())
//!     .collect();
//!
//! let mut gpu = Gpu::new();
//! gpu.upload_shader(1, &compile_shader(&mut vs)?)?;
//! gpu.upload_shader(2, &compile_shader(&mut fs)?)?;
//! gpu.resources_mut().create_dumb_from(3, &format.compile()?)?;
//! gpu.resources_mut().create_dumb_from(4, &vertices)?;
//! gpu.resources_mut().create_texture(5, 4, 4)?;
//!
//! gpu.execute(&DrawCall {
//!     vs: 1,
//!     fs: 2,
//!     format: 3,
//!     vertex_buffer: 4,
//!     ubo: None,
//!     output: 5,
//!     depth: None,
//!     sampler: None,
//!     vertex_count: 3,
//! })?;
//!
//! let image = gpu.resources().texture(5)?;
//! assert!(image.data().chunks(4).all(|p| p == [255, 0, 0, 255]));
//! # Ok::<(), softgpu::Error>(())
//! ```
//!
//! # Feature flags
#![doc = document_features::document_features!()]
#![warn(missing_docs)]

// Re-export everything from softgpu::core into the top-level namespace
mod core;
pub use crate::core::*;

mod error;
pub use error::Error;

mod gpu;
pub use gpu::{DrawCall, Gpu};

pub mod render;
pub mod resource;

#[cfg(feature = "ffi")]
pub mod ffi;
