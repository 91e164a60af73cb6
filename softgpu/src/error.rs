//! Module containing the universal error type
use crate::shader::Arity;
use thiserror::Error;

/// Universal error type for `softgpu`
///
/// Variants fall into three groups: validation errors raised while building
/// or compiling programs, resource errors raised by the
/// [`ResourceTable`](crate::resource::ResourceTable), and execution errors
/// raised while decoding blobs or running the pipeline.  None of them are
/// fatal; each aborts only the call which returned it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The builder was already finalized by a successful compile
    #[error("shader has already been compiled")]
    AlreadyCompiled,

    /// Register is not defined at this point in the program
    #[error("register {0} is not defined")]
    UndefinedRegister(u32),

    /// Register was already defined by an earlier instruction
    #[error("register {0} is already defined")]
    DuplicateRegister(u32),

    /// Channel selector is out of range for its source
    #[error("channel {0} is out of range for a {1} register")]
    BadChannel(u32, Arity),

    /// Operand does not have the arity required by the opcode
    #[error("arity mismatch: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Arity required by the opcode or slot
        expected: Arity,
        /// Arity that was actually provided
        actual: Arity,
    },

    /// Input slot index is past the end of the input declarations
    #[error("input slot {0} is out of range ({1} declared)")]
    BadInputSlot(u32, usize),

    /// Output slot index is past the end of the output declarations
    #[error("output slot {0} is out of range ({1} declared)")]
    BadOutputSlot(u32, usize),

    /// Uniform index must be less than the group size
    #[error("uniform index {0} is out of range (group size is {1})")]
    BadUniformIndex(u32, u32),

    /// A second vertex position output was declared
    #[error("program already has a vertex position output")]
    DuplicatePosition,

    /// Register count does not match the number of defined registers
    #[error("program claims {0} registers, but defines {1}")]
    RegisterCountMismatch(u32, usize),

    /// A declared output is never written by a `store`
    #[error("output slot {0} is never written")]
    UnwrittenOutput(usize),

    /// An input layout was compiled without any attributes
    #[error("input layout has no attributes")]
    EmptyLayout,

    /// Integer registers cannot be read from vertex buffers
    #[error("attribute arity {0} is not supported")]
    BadAttributeArity(Arity),

    ////////////////////////////////////////////////////////////////////////////
    /// No resource with the given id
    #[error("unknown resource {0}")]
    UnknownResource(u64),

    /// A resource with the given id already exists
    #[error("resource {0} already exists")]
    ResourceExists(u64),

    /// Resource exists, but is not of the requested kind
    #[error("resource {0} is not a {1}")]
    WrongResourceKind(u64, &'static str),

    /// Textures must have a non-zero size
    #[error("bad texture size {0}x{1}")]
    BadTextureSize(u32, u32),

    /// Clear rectangle does not fit within the texture
    #[error("rectangle [{min_x}, {max_x}) x [{min_y}, {max_y}) is invalid")]
    BadRect {
        /// Minimum X (inclusive)
        min_x: u32,
        /// Maximum X (exclusive)
        max_x: u32,
        /// Minimum Y (inclusive)
        min_y: u32,
        /// Maximum Y (exclusive)
        max_y: u32,
    },

    /// Backing storage could not be allocated
    #[error("could not allocate {0} bytes")]
    OutOfMemory(usize),

    ////////////////////////////////////////////////////////////////////////////
    /// Blob does not start with the expected magic number
    #[error("bad magic number in {0} blob")]
    BadMagic(&'static str),

    /// Blob was produced by an incompatible compiler
    #[error("version mismatch: blob is v{0}, runtime expects v{1}")]
    VersionMismatch(u32, u32),

    /// Blob is structurally invalid
    #[error("malformed blob: {0}")]
    MalformedBlob(&'static str),

    /// Opcode byte does not name a known instruction
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// Program used as a vertex shader has no position output
    #[error("vertex program has no position output")]
    MissingPosition,

    /// Program used as a fragment shader declares a position output
    #[error("fragment program has a position output")]
    UnexpectedPosition,

    /// Fragment program declares no color output
    #[error("fragment program has no color output")]
    MissingColorOutput,

    /// Input layout does not match the vertex program's inputs
    #[error("input layout does not match vertex program inputs")]
    LayoutMismatch,

    /// Fragment inputs do not match the vertex program's varyings
    #[error("fragment inputs do not match vertex outputs")]
    VaryingMismatch,

    /// Wrong number of input values bound to a program
    #[error("expected {expected} inputs, got {actual}")]
    BadInputCount {
        /// Number of inputs declared by the program
        expected: usize,
        /// Number of values provided
        actual: usize,
    },

    /// Vertex count is not a whole number of triangles
    #[error("vertex count {0} is not a multiple of 3")]
    BadVertexCount(usize),

    /// Attribute read goes past the end of the vertex buffer
    #[error(
        "attribute {attribute} of vertex {vertex} is outside the vertex buffer"
    )]
    VertexFetchOutOfBounds {
        /// Index of the vertex being fetched
        vertex: usize,
        /// Index of the attribute within the layout
        attribute: usize,
    },

    /// Program reads uniforms, but no uniform buffer is bound
    #[error("no uniform buffer is bound")]
    MissingUniformBuffer,

    /// Uniform read goes past the end of the uniform buffer
    #[error("uniform ({0}, {1}) is outside the uniform buffer")]
    UniformOutOfBounds(u32, u32),

    /// Program samples a texture, but no sampler texture is bound
    #[error("no sampler texture is bound")]
    MissingSampler,

    /// Output, depth, and sampler textures must be distinct
    #[error("texture {0} is bound to more than one pipeline slot")]
    AliasedTargets(u64),

    /// Depth texture size differs from the color target size
    #[error("depth target is {0}x{1}, color target is {2}x{3}")]
    TargetSizeMismatch(u32, u32, u32, u32),
}
