//! Vertex fetch and vertex shading
use crate::{
    Error,
    compiler::Program,
    layout::InputLayout,
    render::PipelineConfig,
    vm::{Bindings, ShaderVm, Value},
};
use rayon::prelude::*;

/// Output of the vertex stage for a single vertex
#[derive(Clone, Debug, PartialEq)]
pub struct ShadedVertex {
    /// Clip-space position
    pub clip: [f32; 4],
    /// Every varying, flattened into float components in slot order
    pub varyings: Vec<f32>,
}

/// Per-worker scratch data for the vertex stage
#[derive(Default)]
struct Worker {
    vm: ShaderVm,
    inputs: Vec<Value>,
}

impl Worker {
    fn shade(
        &mut self,
        vs: &Program,
        layout: &InputLayout,
        buffer: &[u8],
        bindings: &Bindings,
        vertex: usize,
    ) -> Result<ShadedVertex, Error> {
        self.inputs.clear();
        layout.fetch_into(buffer, vertex, &mut self.inputs)?;
        let out = self.vm.run(vs, &self.inputs, bindings)?;

        let pos = vs.position().ok_or(Error::MissingPosition)? as usize;
        let clip = out[pos].as_vec4()?;
        let varyings = vs
            .varyings()
            .flat_map(|(i, _)| out[i].components())
            .copied()
            .collect();
        Ok(ShadedVertex { clip, varyings })
    }
}

/// Runs the vertex program over `count` vertices
///
/// Vertices are independent, so they're shaded in parallel when the config
/// provides a thread pool.  If any vertex fails, one of the errors is returned.
pub fn shade_vertices(
    config: &PipelineConfig,
    vs: &Program,
    layout: &InputLayout,
    buffer: &[u8],
    bindings: &Bindings,
    count: usize,
) -> Result<Vec<ShadedVertex>, Error> {
    match &config.threads {
        None => {
            let mut w = Worker::default();
            (0..count)
                .map(|i| w.shade(vs, layout, buffer, bindings, i))
                .collect()
        }
        Some(p) => p.run(|| {
            (0..count)
                .into_par_iter()
                .map_init(Worker::default, |w, i| {
                    w.shade(vs, layout, buffer, bindings, i)
                })
                .collect()
        }),
    }
}
