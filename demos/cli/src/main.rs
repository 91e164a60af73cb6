use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;
use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use softgpu::{
    DrawCall, Gpu,
    compiler::compile_shader,
    layout::InputLayoutBuilder,
    render::{PipelineConfig, ThreadPool},
    resource::Rect,
    shader::{Arity, ShaderBuilder},
};

/// Renders built-in scenes with the software GPU
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Scene to render
    #[clap(value_enum, default_value_t = Scene::Gradient)]
    scene: Scene,

    /// Name of a `.png` file to write
    #[clap(short, long)]
    out: Option<PathBuf>,

    /// Number of threads to use
    #[clap(short, long)]
    threads: Option<NonZeroUsize>,

    /// Number of times to render (for benchmarking)
    #[clap(short = 'N', default_value_t = 1)]
    n: usize,

    /// Image size
    #[clap(short, long, default_value_t = 256)]
    size: u32,
}

#[derive(ValueEnum, Copy, Clone, Debug)]
enum Scene {
    /// Single triangle with a color at each corner
    Gradient,
    /// Two intersecting triangles, resolved with a depth buffer
    Depth,
    /// Checkerboard floor in perspective
    Checker,
}

const VS: u64 = 1;
const FS: u64 = 2;
const FORMAT: u64 = 3;
const VERTICES: u64 = 4;
const COLOR: u64 = 5;
const DEPTH: u64 = 6;
const SAMPLER: u64 = 7;

fn bytes(f: &[f32]) -> Vec<u8> {
    f.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Vertex program: `vec4` clip position and a varying, passed through
fn passthrough_vertex(varying: Arity) -> Result<ShaderBuilder> {
    let mut vs = ShaderBuilder::new();
    vs.push_input_vec4()?;
    vs.push_input(varying)?;
    vs.push_output_vertex_position()?;
    vs.push_output(varying)?;
    vs.load_input(0, 0)?;
    vs.load_input(1, 1)?;
    vs.store(0, 0)?;
    vs.store(1, 1)?;
    Ok(vs)
}

fn upload(
    gpu: &mut Gpu,
    mut vs: ShaderBuilder,
    mut fs: ShaderBuilder,
    format: &InputLayoutBuilder,
    vertices: &[f32],
) -> Result<()> {
    gpu.upload_shader(VS, &compile_shader(&mut vs)?)?;
    gpu.upload_shader(FS, &compile_shader(&mut fs)?)?;
    let r = gpu.resources_mut();
    r.create_dumb_from(FORMAT, &format.compile()?)?;
    r.create_dumb_from(VERTICES, &bytes(vertices))?;
    Ok(())
}

/// Builds a scene with `vec4 position, vec4 color` vertices
fn colored(gpu: &mut Gpu, vertices: &[f32]) -> Result<usize> {
    let mut fs = ShaderBuilder::new();
    fs.push_input_vec4()?;
    fs.push_output_vec4()?;
    fs.load_input(0, 0)?;
    fs.store(0, 0)?;

    let mut format = InputLayoutBuilder::new();
    format.push_vec4(0, 32)?;
    format.push_vec4(16, 32)?;

    let vs = passthrough_vertex(Arity::Vec4)?;
    upload(gpu, vs, fs, &format, vertices)?;
    Ok(vertices.len() / 8)
}

fn gradient(gpu: &mut Gpu) -> Result<usize> {
    #[rustfmt::skip]
    let vertices = [
        -0.8, -0.8, 0.5, 1.0,   1.0, 0.0, 0.0, 1.0,
         0.8, -0.8, 0.5, 1.0,   0.0, 1.0, 0.0, 1.0,
         0.0,  0.8, 0.5, 1.0,   0.0, 0.0, 1.0, 1.0,
    ];
    colored(gpu, &vertices)
}

fn depth(gpu: &mut Gpu) -> Result<usize> {
    // The red triangle leans back from left to right and the blue triangle
    // leans forward, so they cross at x = 0
    #[rustfmt::skip]
    let vertices = [
        -0.9, -0.6, 0.2, 1.0,   1.0, 0.2, 0.2, 1.0,
         0.9, -0.2, 0.8, 1.0,   1.0, 0.6, 0.2, 1.0,
        -0.9,  0.6, 0.2, 1.0,   1.0, 0.2, 0.2, 1.0,

        -0.9, -0.2, 0.8, 1.0,   0.2, 0.2, 1.0, 1.0,
         0.9, -0.6, 0.2, 1.0,   0.2, 0.6, 1.0, 1.0,
         0.9,  0.6, 0.2, 1.0,   0.2, 0.2, 1.0, 1.0,
    ];
    colored(gpu, &vertices)
}

fn checker(gpu: &mut Gpu) -> Result<usize> {
    let fov = std::f32::consts::FRAC_PI_3;
    let proj = Matrix4::new_perspective(1.0, fov, 0.1, 20.0);
    let view = Matrix4::look_at_rh(
        &Point3::new(0.0, 1.5, 3.0),
        &Point3::new(0.0, 0.0, -2.0),
        &Vector3::y(),
    );
    let m = proj * view;

    // Floor quad in world space, with texture coordinates
    let corners = [
        ([-4.0, 0.0, 2.0], [0.0, 1.0]),
        ([4.0, 0.0, 2.0], [1.0, 1.0]),
        ([4.0, 0.0, -12.0], [1.0, 0.0]),
        ([-4.0, 0.0, -12.0], [0.0, 0.0]),
    ];
    let mut vertices = vec![];
    for i in [0, 1, 2, 0, 2, 3] {
        let ([x, y, z], uv) = corners[i];
        let clip = m * Vector4::new(x, y, z, 1.0);
        // nalgebra's projection maps depth to [-1, 1]; remap to [0, 1]
        let z = (clip.z + clip.w) / 2.0;
        vertices.extend([clip.x, clip.y, z, clip.w]);
        vertices.extend(uv);
    }

    let mut fs = ShaderBuilder::new();
    fs.push_input_vec2()?;
    fs.push_output_vec4()?;
    fs.load_input(0, 0)?;
    fs.sample_texture(1, 0)?;
    fs.store(1, 0)?;

    let mut format = InputLayoutBuilder::new();
    format.push_vec4(0, 24)?;
    format.push_vec2(16, 24)?;

    let vs = passthrough_vertex(Arity::Vec2)?;
    upload(gpu, vs, fs, &format, &vertices)?;

    let r = gpu.resources_mut();
    let n = 8;
    r.create_texture(SAMPLER, n, n)?;
    for y in 0..n {
        for x in 0..n {
            let c = if (x + y) % 2 == 0 { 0.9 } else { 0.1 };
            let rect = Rect {
                min_x: x,
                max_x: x + 1,
                min_y: y,
                max_y: y + 1,
            };
            r.clear_color(SAMPLER, [c, c, c, 1.0], rect)?;
        }
    }
    Ok(vertices.len() / 6)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .init();
    let args = Args::parse();

    let threads = match args.threads {
        Some(n) if n.get() == 1 => None,
        Some(n) => Some(ThreadPool::Custom(
            rayon::ThreadPoolBuilder::new()
                .num_threads(n.get())
                .build()?,
        )),
        None => Some(ThreadPool::Global),
    };
    let mut gpu = Gpu::with_config(PipelineConfig {
        threads,
        ..Default::default()
    });

    let start = Instant::now();
    let vertex_count = match args.scene {
        Scene::Gradient => gradient(&mut gpu)?,
        Scene::Depth => depth(&mut gpu)?,
        Scene::Checker => checker(&mut gpu)?,
    };
    let size = args.size;
    let full = Rect::full(size, size);
    let r = gpu.resources_mut();
    r.create_texture(COLOR, size, size)?;
    r.create_texture(DEPTH, size, size)?;
    info!("Built {:?} scene in {:?}", args.scene, start.elapsed());

    let call = DrawCall {
        vs: VS,
        fs: FS,
        vertex_buffer: VERTICES,
        format: FORMAT,
        ubo: None,
        output: COLOR,
        depth: Some(DEPTH),
        sampler: matches!(args.scene, Scene::Checker).then_some(SAMPLER),
        vertex_count,
    };

    let start = Instant::now();
    for _ in 0..args.n {
        let r = gpu.resources_mut();
        r.clear_color(COLOR, [0.1, 0.1, 0.15, 1.0], full)?;
        r.clear_depth(DEPTH, u32::MAX, full)?;
        let stats = gpu.execute(&call)?;
        log::debug!("{stats:?}");
    }
    info!(
        "Rendered {}x at {:?} ms/frame",
        args.n,
        start.elapsed().as_micros() as f64 / 1000.0 / (args.n as f64)
    );

    if let Some(out) = args.out {
        let t = gpu.resources().texture(COLOR)?;
        image::save_buffer(
            &out,
            t.data(),
            t.width(),
            t.height(),
            image::ColorType::Rgba8,
        )
        .with_context(|| format!("failed to write {out:?}"))?;
        info!("Wrote {out:?}");
    }
    Ok(())
}
