use criterion::{
    BenchmarkId, Criterion, black_box, criterion_group, criterion_main,
};
use softgpu::{
    DrawCall, Gpu,
    compiler::compile_shader,
    layout::InputLayoutBuilder,
    render::{PipelineConfig, ThreadPool},
    shader::ShaderBuilder,
};

/// Builds a context holding a full-screen gradient draw at the given size
fn gradient_scene(size: u32, config: PipelineConfig) -> (Gpu, DrawCall) {
    let mut vs = ShaderBuilder::new();
    vs.push_input_vec3().unwrap();
    vs.push_input_vec4().unwrap();
    vs.push_output_vertex_position().unwrap();
    vs.push_output_vec4().unwrap();
    vs.load_input(0, 0).unwrap();
    vs.load_input(1, 1).unwrap();
    vs.load_constant_vec4(2, 0.0, 0.0, 0.0, 1.0).unwrap();
    vs.mov4(3, [(0, 0), (0, 1), (0, 2), (2, 3)]).unwrap();
    vs.store(3, 0).unwrap();
    vs.store(1, 1).unwrap();

    let mut fs = ShaderBuilder::new();
    fs.push_input_vec4().unwrap();
    fs.push_output_vec4().unwrap();
    fs.load_input(0, 0).unwrap();
    fs.store(0, 0).unwrap();

    let mut format = InputLayoutBuilder::new();
    format.push_vec3(0, 28).unwrap();
    format.push_vec4(12, 28).unwrap();

    let vertices: Vec<u8> = [
        [-1.0, -1.0, 0.5, 1.0, 0.0, 0.0, 1.0],
        [3.0, -1.0, 0.5, 0.0, 1.0, 0.0, 1.0],
        [-1.0, 3.0, 0.5, 0.0, 0.0, 1.0, 1.0],
    ]
    .iter()
    .flatten()
    .flat_map(|f: &f32| f.to_le_bytes())
    .collect();

    let mut gpu = Gpu::with_config(config);
    gpu.upload_shader(1, &compile_shader(&mut vs).unwrap())
        .unwrap();
    gpu.upload_shader(2, &compile_shader(&mut fs).unwrap())
        .unwrap();
    let r = gpu.resources_mut();
    r.create_dumb_from(3, &format.compile().unwrap()).unwrap();
    r.create_dumb_from(4, &vertices).unwrap();
    r.create_texture(5, size, size).unwrap();
    r.create_texture(6, size, size).unwrap();

    let call = DrawCall {
        vs: 1,
        fs: 2,
        vertex_buffer: 4,
        format: 3,
        ubo: None,
        output: 5,
        depth: Some(6),
        sampler: None,
        vertex_count: 3,
    };
    (gpu, call)
}

pub fn gradient_size_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("speed vs image size (gradient)");
    for size in [64, 128, 256, 512, 1024] {
        let (mut gpu, call) = gradient_scene(size, PipelineConfig::default());
        group.bench_function(BenchmarkId::new("draw", size), move |b| {
            b.iter(|| black_box(gpu.execute(&call).unwrap()))
        });
    }
}

pub fn gradient_thread_sweep(c: &mut Criterion) {
    let mut group =
        c.benchmark_group("speed vs threads (gradient) (1024 x 1024)");
    for threads in [1, 2, 4, 8] {
        let config = if threads == 1 {
            PipelineConfig::single_threaded()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap();
            PipelineConfig {
                threads: Some(ThreadPool::Custom(pool)),
                ..PipelineConfig::default()
            }
        };
        let (mut gpu, call) = gradient_scene(1024, config);
        group.bench_function(BenchmarkId::new("draw", threads), move |b| {
            b.iter(|| black_box(gpu.execute(&call).unwrap()))
        });
    }
}

criterion_group!(benches, gradient_size_sweep, gradient_thread_sweep);
criterion_main!(benches);
