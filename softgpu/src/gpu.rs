//! GPU context and draw calls
use crate::{
    Error,
    compiler::{CompiledShader, Program},
    layout::InputLayout,
    render::{DrawStats, Pipeline, PipelineConfig, draw},
    resource::{ResourceTable, Texture},
    vm::Bindings,
};

/// A single draw call, with every resource given by id
///
/// `vs`, `fs`, and `format` name dumb buffers holding a compiled vertex
/// program, fragment program, and input layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
    /// Dumb buffer holding the compiled vertex program
    pub vs: u64,
    /// Dumb buffer holding the compiled fragment program
    pub fs: u64,
    /// Dumb buffer holding vertex data
    pub vertex_buffer: u64,
    /// Dumb buffer holding the compiled input layout
    pub format: u64,
    /// Dumb buffer holding uniforms, if the programs read any
    pub ubo: Option<u64>,
    /// Color target texture
    pub output: u64,
    /// Depth target texture; depth testing is disabled if this is `None`
    pub depth: Option<u64>,
    /// Texture used by sampling instructions
    pub sampler: Option<u64>,
    /// Number of vertices to draw; must be a multiple of 3
    pub vertex_count: usize,
}

/// A software GPU: a resource table plus pipeline settings
#[derive(Debug, Default)]
pub struct Gpu {
    resources: ResourceTable,
    config: PipelineConfig,
}

impl Gpu {
    /// Builds a context with the default pipeline configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context with the given pipeline configuration
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            resources: ResourceTable::new(),
            config,
        }
    }

    /// Borrows the resource table
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Borrows the resource table mutably
    pub fn resources_mut(&mut self) -> &mut ResourceTable {
        &mut self.resources
    }

    /// Returns the pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stores a compiled shader in a new dumb buffer
    pub fn upload_shader(
        &mut self,
        id: u64,
        shader: &CompiledShader,
    ) -> Result<(), Error> {
        self.resources.create_dumb_from(id, shader.as_bytes())
    }

    /// Runs a draw call
    ///
    /// The output, depth, and sampler textures must be distinct.  On error,
    /// any pixels already written are left in place.
    pub fn execute(&mut self, call: &DrawCall) -> Result<DrawStats, Error> {
        let targets = [Some(call.output), call.depth, call.sampler];
        for (i, a) in targets.iter().enumerate() {
            if let Some(a) = a {
                if targets[i + 1..].contains(&Some(*a)) {
                    return Err(Error::AliasedTargets(*a));
                }
            }
        }

        let vs = Program::from_bytes(self.resources.dumb(call.vs)?)?;
        let fs = Program::from_bytes(self.resources.dumb(call.fs)?)?;
        let layout =
            InputLayout::from_bytes(self.resources.dumb(call.format)?)?;

        // Bound buffers can't be checked once the targets leave the table,
        // since a taken texture reads as an unknown id
        self.resources.dumb(call.vertex_buffer)?;
        if let Some(id) = call.ubo {
            self.resources.dumb(id)?;
        }

        // Pull the targets out of the table so that they can be written while
        // the rest of the table is borrowed
        let mut color = self.resources.take_texture(call.output)?;
        let mut depth = match call.depth {
            Some(id) => match self.resources.take_texture(id) {
                Ok(t) => Some((id, t)),
                Err(e) => {
                    self.resources.restore_texture(call.output, color);
                    return Err(e);
                }
            },
            None => None,
        };

        let pipeline = Pipeline {
            vs: &vs,
            fs: &fs,
            layout: &layout,
        };
        let out = self.draw_into(
            call,
            &pipeline,
            &mut color,
            depth.as_mut().map(|(_, t)| t),
        );

        self.resources.restore_texture(call.output, color);
        if let Some((id, t)) = depth {
            self.resources.restore_texture(id, t);
        }
        match &out {
            Ok(stats) => log::debug!("draw {call:?}: {stats:?}"),
            Err(e) => log::debug!("draw {call:?} failed: {e}"),
        }
        out
    }

    fn draw_into(
        &self,
        call: &DrawCall,
        pipeline: &Pipeline,
        color: &mut Texture,
        depth: Option<&mut Texture>,
    ) -> Result<DrawStats, Error> {
        let vertices = self.resources.dumb(call.vertex_buffer)?;
        let uniforms = call.ubo.map(|id| self.resources.dumb(id)).transpose()?;
        let sampler = call
            .sampler
            .map(|id| self.resources.texture(id).map(|t| t.view()))
            .transpose()?;
        let bindings = Bindings { uniforms, sampler };
        draw(
            &self.config,
            pipeline,
            vertices,
            call.vertex_count,
            bindings,
            color,
            depth,
        )
    }
}
