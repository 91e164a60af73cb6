//! Flat C interface
//!
//! Every function here mirrors an entry point of the `libgpu` C headers.
//! Handles are opaque pointers to [`Gpu`], [`ShaderBuilder`], and
//! [`InputLayoutBuilder`] objects; fallible calls return `false` on error
//! (with the error logged at `debug` level) and leave their out-parameters
//! untouched.
//!
//! Optional resource ids in [`libgpu_execute_graphics_pipeline`] are given as
//! [`LIBGPU_NO_RESOURCE`].
use crate::{
    DrawCall, Error, Gpu,
    compiler::compile_shader,
    layout::InputLayoutBuilder,
    resource::Rect,
    shader::ShaderBuilder,
};
use std::ffi::c_void;

/// Resource id meaning "nothing bound"
pub const LIBGPU_NO_RESOURCE: u64 = u64::MAX;

fn report<T>(what: &str, r: Result<T, Error>) -> Option<T> {
    match r {
        Ok(v) => Some(v),
        Err(e) => {
            log::debug!("{what} failed: {e}");
            None
        }
    }
}

/// Runs a fallible closure on a handle, converting the result to a `bool`
///
/// # Safety
/// `ptr` must be null or a valid handle of the given type.
unsafe fn with<T, F>(ptr: *mut T, what: &str, f: F) -> bool
where
    F: FnOnce(&mut T) -> Result<(), Error>,
{
    match unsafe { ptr.as_mut() } {
        Some(t) => report(what, f(t)).is_some(),
        None => {
            log::debug!("{what} failed: null handle");
            false
        }
    }
}

/// Hands a byte vector to the caller as a `(pointer, length)` pair
///
/// # Safety
/// `data` and `len` must be valid for writes.
unsafe fn export_blob(bytes: Vec<u8>, data: *mut *mut c_void, len: *mut usize) {
    let bytes = bytes.into_boxed_slice();
    let n = bytes.len();
    let ptr = Box::into_raw(bytes) as *mut u8;
    unsafe {
        *data = ptr as *mut c_void;
        *len = n;
    }
}

fn optional(id: u64) -> Option<u64> {
    (id != LIBGPU_NO_RESOURCE).then_some(id)
}

////////////////////////////////////////////////////////////////////////////////
// GPU context

/// Creates a new GPU context
///
/// The context must be destroyed with [`libgpu_gpu_destroy`].
#[unsafe(no_mangle)]
pub extern "C" fn libgpu_gpu_create() -> *mut Gpu {
    Box::into_raw(Box::new(Gpu::new()))
}

/// Destroys a GPU context and every resource it owns
///
/// # Safety
/// `gpu` must be null or a pointer returned by [`libgpu_gpu_create`] which
/// has not yet been destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_gpu_destroy(gpu: *mut Gpu) {
    if !gpu.is_null() {
        drop(unsafe { Box::from_raw(gpu) });
    }
}

/// Creates a zeroed texture
///
/// # Safety
/// `gpu` must be null or a valid context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_gpu_create_texture(
    gpu: *mut Gpu,
    id: u64,
    width: u32,
    height: u32,
) -> bool {
    unsafe {
        with(gpu, "create_texture", |g| {
            g.resources_mut().create_texture(id, width, height)
        })
    }
}

/// Destroys a texture
///
/// # Safety
/// `gpu` must be null or a valid context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_gpu_free_texture(
    gpu: *mut Gpu,
    id: u64,
) -> bool {
    unsafe { with(gpu, "free_texture", |g| g.resources_mut().free_texture(id)) }
}

/// Fills the rectangle `[minx, maxx) x [miny, maxy)` with a color
///
/// # Safety
/// `gpu` must be null or a valid context, and `rgba` must be null or point to
/// four floats.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_gpu_clear_color(
    gpu: *mut Gpu,
    id: u64,
    rgba: *const f32,
    minx: u32,
    maxx: u32,
    miny: u32,
    maxy: u32,
) -> bool {
    if rgba.is_null() {
        log::debug!("clear_color failed: null color");
        return false;
    }
    let rgba = unsafe { *(rgba as *const [f32; 4]) };
    let rect = Rect {
        min_x: minx,
        max_x: maxx,
        min_y: miny,
        max_y: maxy,
    };
    unsafe {
        with(gpu, "clear_color", |g| {
            g.resources_mut().clear_color(id, rgba, rect)
        })
    }
}

/// Fills the rectangle `[minx, maxx) x [miny, maxy)` with a depth value
///
/// # Safety
/// `gpu` must be null or a valid context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_gpu_clear_depth(
    gpu: *mut Gpu,
    id: u64,
    val: u32,
    minx: u32,
    maxx: u32,
    miny: u32,
    maxy: u32,
) -> bool {
    let rect = Rect {
        min_x: minx,
        max_x: maxx,
        min_y: miny,
        max_y: maxy,
    };
    unsafe {
        with(gpu, "clear_depth", |g| {
            g.resources_mut().clear_depth(id, val, rect)
        })
    }
}

/// Creates a zero-initialized dumb buffer
///
/// # Safety
/// `gpu` must be null or a valid context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_gpu_create_dumb(
    gpu: *mut Gpu,
    id: u64,
    size: u64,
) -> bool {
    unsafe {
        with(gpu, "create_dumb", |g| {
            let size = usize::try_from(size)
                .map_err(|_| Error::OutOfMemory(usize::MAX))?;
            g.resources_mut().create_dumb(id, size)
        })
    }
}

/// Destroys a dumb buffer
///
/// # Safety
/// `gpu` must be null or a valid context.  Pointers previously returned by
/// [`libgpu_gpu_get_dumb`] for this buffer become dangling.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_free_dumb(gpu: *mut Gpu, id: u64) {
    unsafe { with(gpu, "free_dumb", |g| g.resources_mut().free_dumb(id)) };
}

/// Returns a pointer to the contents of a dumb buffer
///
/// # Safety
/// `gpu` must be null or a valid context, and `data` must be valid for
/// writes.  The returned pointer is valid until the buffer is freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_gpu_get_dumb(
    gpu: *mut Gpu,
    id: u64,
    data: *mut *mut c_void,
) -> bool {
    unsafe {
        with(gpu, "get_dumb", |g| {
            let d = g.resources_mut().dumb_mut(id)?;
            *data = d.as_mut_ptr() as *mut c_void;
            Ok(())
        })
    }
}

/// Returns the size and contents of a texture
///
/// # Safety
/// `gpu` must be null or a valid context, and every out-parameter must be
/// valid for writes.  The returned pointer is valid until the texture is
/// freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_gpu_get_tex_data(
    gpu: *mut Gpu,
    id: u64,
    width: *mut u32,
    height: *mut u32,
    stride: *mut u32,
    data: *mut *mut c_void,
) -> bool {
    unsafe {
        with(gpu, "get_tex_data", |g| {
            let t = g.resources_mut().texture_mut(id)?;
            *width = t.width();
            *height = t.height();
            *stride = t.stride() as u32;
            *data = t.data_mut().as_mut_ptr() as *mut c_void;
            Ok(())
        })
    }
}

/// Runs a draw call
///
/// `vs`, `fs`, and `format` are dumb buffers holding compiled blobs;
/// `ubo`, `depth_tex`, and `sampler_tex` may be [`LIBGPU_NO_RESOURCE`].
/// `num_inputs` is the number of vertices to draw.
///
/// # Safety
/// `gpu` must be null or a valid context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_execute_graphics_pipeline(
    gpu: *mut Gpu,
    vs: u64,
    fs: u64,
    vb: u64,
    format: u64,
    ubo: u64,
    output_tex: u64,
    depth_tex: u64,
    sampler_tex: u64,
    num_inputs: usize,
) -> bool {
    let call = DrawCall {
        vs,
        fs,
        vertex_buffer: vb,
        format,
        ubo: optional(ubo),
        output: output_tex,
        depth: optional(depth_tex),
        sampler: optional(sampler_tex),
        vertex_count: num_inputs,
    };
    unsafe { with(gpu, "execute", |g| g.execute(&call).map(|_| ())) }
}

////////////////////////////////////////////////////////////////////////////////
// Shader builder

/// Creates a new shader builder
///
/// The builder must be destroyed with [`libgpu_free_shader`].
#[unsafe(no_mangle)]
pub extern "C" fn libgpu_create_shader() -> *mut ShaderBuilder {
    Box::into_raw(Box::new(ShaderBuilder::new()))
}

/// Destroys a shader builder
///
/// # Safety
/// `shader` must be null or a pointer returned by [`libgpu_create_shader`]
/// which has not yet been freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_free_shader(shader: *mut ShaderBuilder) {
    if !shader.is_null() {
        drop(unsafe { Box::from_raw(shader) });
    }
}

macro_rules! shader_fn {
    (
        $(#[$meta:meta])*
        $name:ident($($arg:ident: $ty:ty),*) => $method:ident
    ) => {
        $(#[$meta])*
        ///
        /// # Safety
        /// `shader` must be null or a valid shader builder.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(
            shader: *mut ShaderBuilder,
            $($arg: $ty),*
        ) -> bool {
            unsafe {
                with(shader, stringify!($method), |s| s.$method($($arg),*))
            }
        }
    };
}

shader_fn!(
    /// Declares a scalar input
    libgpu_shader_push_input_32() => push_input_32
);
shader_fn!(
    /// Declares a `vec2` input
    libgpu_shader_push_input_vec2() => push_input_vec2
);
shader_fn!(
    /// Declares a `vec3` input
    libgpu_shader_push_input_vec3() => push_input_vec3
);
shader_fn!(
    /// Declares a `vec4` input
    libgpu_shader_push_input_vec4() => push_input_vec4
);
shader_fn!(
    /// Declares a scalar output
    libgpu_shader_push_output_32() => push_output_32
);
shader_fn!(
    /// Declares a `vec2` output
    libgpu_shader_push_output_vec2() => push_output_vec2
);
shader_fn!(
    /// Declares a `vec3` output
    libgpu_shader_push_output_vec3() => push_output_vec3
);
shader_fn!(
    /// Declares a `vec4` output
    libgpu_shader_push_output_vec4() => push_output_vec4
);
shader_fn!(
    /// Declares the clip-space position output
    libgpu_shader_push_output_vertex_position() => push_output_vertex_position
);
shader_fn!(
    /// Computes the sine of a scalar register
    libgpu_shader_push_command_fsin(id: u32, input_id: u32) => fsin
);
shader_fn!(
    /// Multiplies two float registers
    libgpu_shader_push_command_fmul(id: u32, input_a: u32, input_b: u32) => fmul
);
shader_fn!(
    /// Adds two float registers
    libgpu_shader_push_command_fadd(id: u32, input_a: u32, input_b: u32) => fadd
);
shader_fn!(
    /// Adds two integer registers
    libgpu_shader_push_command_iadd(id: u32, input_a: u32, input_b: u32) => iadd
);
shader_fn!(
    /// Binds a register to an input slot
    libgpu_shader_push_command_load_input_reference(id: u32, input_idx: u32)
        => load_input
);
shader_fn!(
    /// Binds a register to the current value of an output slot
    libgpu_shader_push_command_load_output_reference(id: u32, output_idx: u32)
        => load_output
);
shader_fn!(
    /// Extracts one channel of a vector register
    libgpu_shader_push_command_load_channel_reference(
        id: u32,
        source: u32,
        sub_idx: u32
    ) => load_channel
);
shader_fn!(
    /// Reads a `vec4` from the uniform buffer
    libgpu_shader_push_command_load_ubo_vec4(id: u32, a: u32, b: u32)
        => load_ubo_vec4
);
shader_fn!(
    /// Loads an integer constant
    libgpu_shader_push_command_load_constant_32(id: u32, val: u32)
        => load_constant_32
);
shader_fn!(
    /// Loads a `vec2` constant
    libgpu_shader_push_command_load_constant_vec2(id: u32, x: f32, y: f32)
        => load_constant_vec2
);
shader_fn!(
    /// Loads a `vec4` constant
    libgpu_shader_push_command_load_constant_vec4(
        id: u32,
        x: f32,
        y: f32,
        z: f32,
        w: f32
    ) => load_constant_vec4
);
shader_fn!(
    /// Copies register `src` into the new register `dest`
    libgpu_shader_push_command_load(src: u32, dest: u32) => load
);
shader_fn!(
    /// Writes register `src` into output slot `dest`
    libgpu_shader_push_command_store(src: u32, dest: u32) => store
);
shader_fn!(
    /// Samples the bound sampler texture at a `vec2` coordinate
    libgpu_shader_push_command_sample_texture(id: u32, uv: u32)
        => sample_texture
);

/// Builds a `vec4` from one channel of each of four registers
///
/// # Safety
/// `shader` must be null or a valid shader builder.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn libgpu_shader_push_command_mov4(
    shader: *mut ShaderBuilder,
    id: u32,
    x_id: u32,
    x_sub_id: u8,
    y_id: u32,
    y_sub_id: u8,
    z_id: u32,
    z_sub_id: u8,
    w_id: u32,
    w_sub_id: u8,
) -> bool {
    let src = [
        (x_id, x_sub_id),
        (y_id, y_sub_id),
        (z_id, z_sub_id),
        (w_id, w_sub_id),
    ];
    unsafe { with(shader, "mov4", |s| s.mov4(id, src)) }
}

/// Multiplies a `vec4` register by a `vec4` built from four swizzles
///
/// # Safety
/// `shader` must be null or a valid shader builder.
#[unsafe(no_mangle)]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn libgpu_shader_push_command_fmul_by_v4_swizzle(
    shader: *mut ShaderBuilder,
    id: u32,
    input_a: u32,
    x_id: u32,
    x_sub_id: u8,
    y_id: u32,
    y_sub_id: u8,
    z_id: u32,
    z_sub_id: u8,
    w_id: u32,
    w_sub_id: u8,
) -> bool {
    let src = [
        (x_id, x_sub_id),
        (y_id, y_sub_id),
        (z_id, z_sub_id),
        (w_id, w_sub_id),
    ];
    unsafe {
        with(shader, "fmul_by_v4_swizzle", |s| {
            s.fmul_by_v4_swizzle(id, input_a, src)
        })
    }
}

/// Compiles a shader into a blob
///
/// The blob must be released with [`libgpu_free_blob`].
///
/// # Safety
/// `shader` must be null or a valid shader builder, and `data` and `len` must
/// be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_compile_shader(
    shader: *mut ShaderBuilder,
    data: *mut *mut c_void,
    len: *mut usize,
) -> bool {
    unsafe {
        with(shader, "compile_shader", |s| {
            let blob = compile_shader(s)?;
            export_blob(blob.into_bytes(), data, len);
            Ok(())
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Input layouts

/// Creates a new input layout builder
///
/// The builder must be destroyed with [`libgpu_shader_free_input_defs`].
#[unsafe(no_mangle)]
pub extern "C" fn libgpu_shader_create_input_defs() -> *mut InputLayoutBuilder {
    Box::into_raw(Box::new(InputLayoutBuilder::new()))
}

/// Destroys an input layout builder
///
/// # Safety
/// `defs` must be null or a pointer returned by
/// [`libgpu_shader_create_input_defs`] which has not yet been freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_shader_free_input_defs(
    defs: *mut InputLayoutBuilder,
) {
    if !defs.is_null() {
        drop(unsafe { Box::from_raw(defs) });
    }
}

macro_rules! input_fn {
    ($(#[$meta:meta])* $name:ident => $method:ident) => {
        $(#[$meta])*
        ///
        /// # Safety
        /// `defs` must be null or a valid input layout builder.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(
            defs: *mut InputLayoutBuilder,
            offs: u32,
            stride: u32,
        ) -> bool {
            unsafe {
                with(defs, stringify!($method), |d| d.$method(offs, stride))
            }
        }
    };
}

input_fn!(
    /// Appends a scalar attribute
    libgpu_shader_input_defs_push_32 => push_32
);
input_fn!(
    /// Appends a `vec2` attribute
    libgpu_shader_input_defs_push_vec2 => push_vec2
);
input_fn!(
    /// Appends a `vec3` attribute
    libgpu_shader_input_defs_push_vec3 => push_vec3
);
input_fn!(
    /// Appends a `vec4` attribute
    libgpu_shader_input_defs_push_vec4 => push_vec4
);

/// Compiles an input layout into a blob
///
/// The blob must be released with [`libgpu_free_blob`].
///
/// # Safety
/// `defs` must be null or a valid input layout builder, and `data` and `len`
/// must be valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_shader_input_compile(
    defs: *mut InputLayoutBuilder,
    data: *mut *mut c_void,
    len: *mut usize,
) -> bool {
    unsafe {
        with(defs, "input_compile", |d| {
            export_blob(d.compile()?, data, len);
            Ok(())
        })
    }
}

/// Releases a blob returned by [`libgpu_compile_shader`] or
/// [`libgpu_shader_input_compile`]
///
/// # Safety
/// `data` and `len` must be exactly as returned by one of those functions,
/// and the blob must not already have been released.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libgpu_free_blob(data: *mut c_void, len: usize) {
    if !data.is_null() {
        let slice = std::ptr::slice_from_raw_parts_mut(data as *mut u8, len);
        drop(unsafe { Box::from_raw(slice) });
    }
}
