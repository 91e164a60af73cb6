//! The triangle pipeline
//!
//! [`draw`] runs a complete draw call over decoded programs and borrowed
//! buffers: vertex fetch and shading, primitive assembly, rasterization with
//! perspective-correct interpolation, depth testing, fragment shading, and
//! write-back.  Most callers will go through [`Gpu::execute`](crate::Gpu),
//! which resolves resource ids and decodes blobs before calling [`draw`].
//!
//! Both stages are parallelized with [`rayon`]: vertices are shaded
//! independently, then the render target is split into horizontal bands
//! (see [`PipelineConfig::band_rows`]).  Each band is owned by one worker,
//! which walks every triangle in submission order, so no pixel is touched by
//! two workers and the output is deterministic.
use crate::{
    Error,
    compiler::{Program, Stage},
    layout::InputLayout,
    resource::Texture,
    vm::Bindings,
};

mod config;
mod raster;
mod vertex;

pub use config::{PipelineConfig, ThreadPool};
pub use raster::depth_value;
pub use vertex::{ShadedVertex, shade_vertices};

use raster::{FragmentStage, Triangle};

/// Programs and layout for a draw call
#[derive(Copy, Clone, Debug)]
pub struct Pipeline<'a> {
    /// Vertex program
    pub vs: &'a Program,
    /// Fragment program
    pub fs: &'a Program,
    /// Vertex buffer layout, matching the vertex program's inputs
    pub layout: &'a InputLayout,
}

impl Pipeline<'_> {
    /// Checks that the programs and layout fit together
    ///
    /// Returns the number of interpolated floats read by the fragment program.
    pub fn check(&self) -> Result<usize, Error> {
        if self.vs.stage() != Stage::Vertex {
            return Err(Error::MissingPosition);
        }
        if self.fs.stage() != Stage::Fragment {
            return Err(Error::UnexpectedPosition);
        }
        if self.fs.outputs().is_empty() {
            return Err(Error::MissingColorOutput);
        }
        if !self.layout.matches(self.vs.inputs()) {
            return Err(Error::LayoutMismatch);
        }
        // Only float outputs can be interpolated
        let mut varyings = self.vs.varyings();
        let mut width = 0;
        for a in self.fs.inputs() {
            match varyings.next() {
                Some((_, v)) if v == *a && a.is_float() => {
                    width += a.width()
                }
                _ => return Err(Error::VaryingMismatch),
            }
        }
        Ok(width)
    }
}

/// Summary of a completed draw
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Number of vertices shaded
    pub vertices: usize,
    /// Number of triangles which reached the rasterizer
    pub triangles: usize,
    /// Number of triangles culled (behind the camera, degenerate, or
    /// entirely outside the target)
    pub culled: usize,
}

/// Runs a draw call
///
/// `vertex_count` must be a multiple of 3; consecutive triples of vertices
/// form triangles.  `depth`, if present, must match the color target's size.
///
/// Errors abort the draw; pixels written before the error are not rolled
/// back.
pub fn draw(
    config: &PipelineConfig,
    pipeline: &Pipeline,
    vertices: &[u8],
    vertex_count: usize,
    bindings: Bindings,
    color: &mut Texture,
    depth: Option<&mut Texture>,
) -> Result<DrawStats, Error> {
    let varying_width = pipeline.check()?;
    if vertex_count % 3 != 0 {
        return Err(Error::BadVertexCount(vertex_count));
    }
    if let Some(d) = &depth {
        if (d.width(), d.height()) != (color.width(), color.height()) {
            return Err(Error::TargetSizeMismatch(
                d.width(),
                d.height(),
                color.width(),
                color.height(),
            ));
        }
    }
    for (p, name) in [(pipeline.vs, "vertex"), (pipeline.fs, "fragment")] {
        if p.uses_uniforms() && bindings.uniforms.is_none() {
            log::debug!("{name} program reads uniforms, but none are bound");
            return Err(Error::MissingUniformBuffer);
        }
        if p.uses_sampler() && bindings.sampler.is_none() {
            log::debug!("{name} program samples, but no texture is bound");
            return Err(Error::MissingSampler);
        }
    }

    let shaded = shade_vertices(
        config,
        pipeline.vs,
        pipeline.layout,
        vertices,
        &bindings,
        vertex_count,
    )?;

    let (width, height) = (color.width(), color.height());
    let mut stats = DrawStats {
        vertices: vertex_count,
        ..DrawStats::default()
    };
    let mut tris = Vec::with_capacity(vertex_count / 3);
    for (i, v) in shaded.chunks_exact(3).enumerate() {
        match Triangle::new([&v[0], &v[1], &v[2]], width, height) {
            Some(t) => tris.push(t),
            None => {
                log::trace!("culled triangle {i}");
                stats.culled += 1;
            }
        }
    }
    stats.triangles = tris.len();

    let stage = FragmentStage {
        fs: pipeline.fs,
        bindings,
        varying_width,
    };
    raster::rasterize(
        config,
        &stage,
        &tris,
        width,
        color.data_mut(),
        depth.map(|d| d.data_mut()),
    )?;
    Ok(stats)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        compiler::lower,
        layout::InputLayoutBuilder,
        resource::Rect,
        shader::{Arity, ShaderBuilder},
    };

    /// Vertex program: `vec4` position in, position + `vec2` varying out
    fn vertex_program() -> Program {
        let mut b = ShaderBuilder::new();
        b.push_input_vec4().unwrap();
        b.push_input_vec2().unwrap();
        b.push_output_vertex_position().unwrap();
        b.push_output_vec2().unwrap();
        b.load_input(0, 0).unwrap();
        b.load_input(1, 1).unwrap();
        b.store(0, 0).unwrap();
        b.store(1, 1).unwrap();
        lower(&b).unwrap()
    }

    /// Fragment program: color = (u, v, 0, 1)
    fn fragment_program() -> Program {
        let mut b = ShaderBuilder::new();
        b.push_input_vec2().unwrap();
        b.push_output_vec4().unwrap();
        b.load_input(0, 0).unwrap();
        b.load_constant_vec4(1, 0.0, 0.0, 0.0, 1.0).unwrap();
        b.mov4(2, [(0, 0), (0, 1), (1, 2), (1, 3)]).unwrap();
        b.store(2, 0).unwrap();
        lower(&b).unwrap()
    }

    fn layout() -> InputLayout {
        let mut l = InputLayoutBuilder::new();
        l.push_vec4(0, 24).unwrap();
        l.push_vec2(16, 24).unwrap();
        l.build().unwrap()
    }

    fn buffer(v: &[[f32; 6]]) -> Vec<u8> {
        v.iter()
            .flat_map(|v| v.iter().flat_map(|f| f.to_le_bytes()))
            .collect()
    }

    #[test]
    fn pipeline_checks() {
        let vs = vertex_program();
        let fs = fragment_program();
        let layout = layout();
        let p = Pipeline {
            vs: &vs,
            fs: &fs,
            layout: &layout,
        };
        assert_eq!(p.check(), Ok(2));

        let swapped = Pipeline {
            vs: &fs,
            fs: &vs,
            layout: &layout,
        };
        assert_eq!(swapped.check(), Err(Error::MissingPosition));
        let both = Pipeline {
            vs: &vs,
            fs: &vs,
            layout: &layout,
        };
        assert_eq!(both.check(), Err(Error::UnexpectedPosition));

        let mut l = InputLayoutBuilder::new();
        l.push_vec4(0, 16).unwrap();
        let short = l.build().unwrap();
        let p = Pipeline {
            vs: &vs,
            fs: &fs,
            layout: &short,
        };
        assert_eq!(p.check(), Err(Error::LayoutMismatch));

        let mut b = ShaderBuilder::new();
        b.push_input(Arity::Vec3).unwrap();
        b.push_output_vec4().unwrap();
        b.load_constant_vec4(0, 1.0, 1.0, 1.0, 1.0).unwrap();
        b.store(0, 0).unwrap();
        let bad_fs = lower(&b).unwrap();
        let p = Pipeline {
            vs: &vs,
            fs: &bad_fs,
            layout: &layout,
        };
        assert_eq!(p.check(), Err(Error::VaryingMismatch));

        // Integer outputs can't be interpolated, even when the types match
        let mut b = ShaderBuilder::new();
        b.push_input_vec4().unwrap();
        b.push_output_vertex_position().unwrap();
        b.push_output(Arity::Int).unwrap();
        b.load_input(0, 0).unwrap();
        b.store(0, 0).unwrap();
        b.load_constant_32(1, 7).unwrap();
        b.store(1, 1).unwrap();
        let int_vs = lower(&b).unwrap();
        let mut b = ShaderBuilder::new();
        b.push_input(Arity::Int).unwrap();
        b.push_output_vec4().unwrap();
        b.load_constant_vec4(0, 1.0, 1.0, 1.0, 1.0).unwrap();
        b.store(0, 0).unwrap();
        let int_fs = lower(&b).unwrap();
        let mut l = InputLayoutBuilder::new();
        l.push_vec4(0, 16).unwrap();
        let vec4_layout = l.build().unwrap();
        let p = Pipeline {
            vs: &int_vs,
            fs: &int_fs,
            layout: &vec4_layout,
        };
        assert_eq!(p.check(), Err(Error::VaryingMismatch));

        let empty_fs = lower(&ShaderBuilder::new()).unwrap();
        let p = Pipeline {
            vs: &vs,
            fs: &empty_fs,
            layout: &layout,
        };
        assert_eq!(p.check(), Err(Error::MissingColorOutput));
    }

    #[test]
    fn interpolated_varyings() {
        let vs = vertex_program();
        let fs = fragment_program();
        let layout = layout();
        let p = Pipeline {
            vs: &vs,
            fs: &fs,
            layout: &layout,
        };

        // Full-screen triangle with uv = (x, y) in [0, 1] over the target
        let buf = buffer(&[
            [-1.0, 1.0, 0.0, 1.0, 0.0, 0.0],
            [3.0, 1.0, 0.0, 1.0, 2.0, 0.0],
            [-1.0, -3.0, 0.0, 1.0, 0.0, 2.0],
        ]);
        for config in [
            PipelineConfig::default(),
            PipelineConfig::single_threaded(),
            PipelineConfig {
                band_rows: 1,
                ..PipelineConfig::default()
            },
        ] {
            let mut color = Texture::new(4, 4).unwrap();
            let stats = draw(
                &config,
                &p,
                &buf,
                3,
                Bindings::default(),
                &mut color,
                None,
            )
            .unwrap();
            assert_eq!(stats.triangles, 1);
            for y in 0..4 {
                for x in 0..4 {
                    let u = (x as f32 + 0.5) / 4.0;
                    let v = (y as f32 + 0.5) / 4.0;
                    let expected = [
                        (u * 255.0).round() as u8,
                        (v * 255.0).round() as u8,
                        0,
                        255,
                    ];
                    assert_eq!(color.color_at(x, y), expected);
                }
            }
        }
    }

    #[test]
    fn depth_test() {
        let vs = vertex_program();
        let fs = fragment_program();
        let layout = layout();
        let p = Pipeline {
            vs: &vs,
            fs: &fs,
            layout: &layout,
        };

        let tri = |z: f32, u: f32| {
            buffer(&[
                [-1.0, 1.0, z, 1.0, u, 0.0],
                [3.0, 1.0, z, 1.0, u, 0.0],
                [-1.0, -3.0, z, 1.0, u, 0.0],
            ])
        };
        let mut color = Texture::new(4, 4).unwrap();
        let mut depth = Texture::new(4, 4).unwrap();
        depth
            .clear_depth(depth_value(0.5), Rect::full(4, 4))
            .unwrap();
        let config = PipelineConfig::default();

        // Farther than the cleared depth: nothing changes
        draw(
            &config,
            &p,
            &tri(0.75, 1.0),
            3,
            Bindings::default(),
            &mut color,
            Some(&mut depth),
        )
        .unwrap();
        assert!(color.data().iter().all(|b| *b == 0));
        assert_eq!(depth.depth_at(0, 0), depth_value(0.5));

        // Equal depth passes
        draw(
            &config,
            &p,
            &tri(0.5, 1.0),
            3,
            Bindings::default(),
            &mut color,
            Some(&mut depth),
        )
        .unwrap();
        assert_eq!(color.color_at(2, 2), [255, 0, 0, 255]);

        // Nearer depth passes and updates the depth target
        draw(
            &config,
            &p,
            &tri(0.25, 0.0),
            3,
            Bindings::default(),
            &mut color,
            Some(&mut depth),
        )
        .unwrap();
        assert_eq!(color.color_at(1, 3), [0, 0, 0, 255]);
        assert_eq!(depth.depth_at(1, 3), depth_value(0.25));

        // Outside of [0, 1] is clipped
        draw(
            &config,
            &p,
            &tri(-0.5, 1.0),
            3,
            Bindings::default(),
            &mut color,
            Some(&mut depth),
        )
        .unwrap();
        assert_eq!(color.color_at(1, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn later_triangles_win_ties() {
        let vs = vertex_program();
        let fs = fragment_program();
        let layout = layout();
        let p = Pipeline {
            vs: &vs,
            fs: &fs,
            layout: &layout,
        };
        let mut rows = vec![];
        for u in [1.0, 0.5, 0.0] {
            rows.push([-1.0, 1.0, 0.5, 1.0, u, 0.0]);
            rows.push([3.0, 1.0, 0.5, 1.0, u, 0.0]);
            rows.push([-1.0, -3.0, 0.5, 1.0, u, 0.0]);
        }
        let buf = buffer(&rows);
        let mut color = Texture::new(8, 8).unwrap();
        let mut depth = Texture::new(8, 8).unwrap();
        depth.clear_depth(u32::MAX, Rect::full(8, 8)).unwrap();
        draw(
            &PipelineConfig {
                band_rows: 3,
                ..PipelineConfig::default()
            },
            &p,
            &buf,
            9,
            Bindings::default(),
            &mut color,
            Some(&mut depth),
        )
        .unwrap();
        assert!(color.data().chunks(4).all(|c| c == [0, 0, 0, 255]));
    }

    #[test]
    fn draw_errors() {
        let vs = vertex_program();
        let fs = fragment_program();
        let layout = layout();
        let p = Pipeline {
            vs: &vs,
            fs: &fs,
            layout: &layout,
        };
        let buf = buffer(&[[0.0; 6]; 5]);
        let mut color = Texture::new(4, 4).unwrap();
        let config = PipelineConfig::default();
        assert_eq!(
            draw(&config, &p, &buf, 4, Bindings::default(), &mut color, None),
            Err(Error::BadVertexCount(4))
        );
        assert_eq!(
            draw(&config, &p, &buf, 6, Bindings::default(), &mut color, None),
            Err(Error::VertexFetchOutOfBounds {
                vertex: 5,
                attribute: 0
            })
        );
        let mut depth = Texture::new(4, 2).unwrap();
        assert_eq!(
            draw(
                &config,
                &p,
                &buf,
                3,
                Bindings::default(),
                &mut color,
                Some(&mut depth)
            ),
            Err(Error::TargetSizeMismatch(4, 2, 4, 4))
        );

        // Degenerate triangles are culled, not errors
        let stats =
            draw(&config, &p, &buf, 3, Bindings::default(), &mut color, None)
                .unwrap();
        assert_eq!(stats.culled, 1);
        assert_eq!(stats.triangles, 0);
    }
}
