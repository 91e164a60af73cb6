//! Triangle setup, rasterization, and the fragment stage
use crate::{
    Error,
    compiler::Program,
    render::{PipelineConfig, ShadedVertex},
    resource::pack_color,
    vm::{Bindings, ShaderVm, Value},
};
use nalgebra::Point2;
use rayon::prelude::*;

/// Signed area test for point `p` against the edge `a -> b`
#[inline]
fn edge(a: Point2<f32>, b: Point2<f32>, p: Point2<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Checks whether the edge `a -> b` is a top or left edge
///
/// This assumes the triangle has positive area under [`edge`], in screen
/// coordinates where Y points down.
#[inline]
fn is_top_left(a: Point2<f32>, b: Point2<f32>) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

/// Pixel-space bounding box, half-open on both axes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Bounds {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
}

/// A triangle after the perspective divide and viewport transform
#[derive(Clone, Debug)]
pub(crate) struct Triangle<'a> {
    /// Screen-space positions, wound so that `area > 0`
    pos: [Point2<f32>; 3],
    /// Whether the edge opposite each vertex is a top or left edge
    top_left: [bool; 3],
    /// NDC depth of each vertex
    z: [f32; 3],
    /// `1 / w` for each vertex
    inv_w: [f32; 3],
    varyings: [&'a [f32]; 3],
    area: f32,
    bounds: Bounds,
}

impl<'a> Triangle<'a> {
    /// Assembles a triangle from three shaded vertices
    ///
    /// Returns `None` if the triangle is culled: any vertex at `w <= 0`, a
    /// degenerate (zero-area) triangle, or one which misses the target.
    pub(crate) fn new(
        v: [&'a ShadedVertex; 3],
        width: u32,
        height: u32,
    ) -> Option<Self> {
        if v.iter().any(|v| !(v.clip[3] > 0.0)) {
            return None;
        }
        let mut pos = v.map(|v| {
            let [x, y, _, w] = v.clip;
            Point2::new(
                (x / w + 1.0) / 2.0 * width as f32,
                (1.0 - y / w) / 2.0 * height as f32,
            )
        });
        let mut z = v.map(|v| v.clip[2] / v.clip[3]);
        let mut inv_w = v.map(|v| 1.0 / v.clip[3]);
        let mut varyings = v.map(|v| v.varyings.as_slice());

        let mut area = edge(pos[0], pos[1], pos[2]);
        if area < 0.0 {
            pos.swap(1, 2);
            z.swap(1, 2);
            inv_w.swap(1, 2);
            varyings.swap(1, 2);
            area = -area;
        }
        if !(area > 0.0) || !area.is_finite() {
            return None;
        }

        let min_x = pos.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let max_x = pos.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let min_y = pos.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_y = pos.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        let clamp = |v: f32, size: u32| v.clamp(0.0, size as f32) as u32;
        let bounds = Bounds {
            min_x: clamp(min_x.floor(), width),
            max_x: clamp(max_x.ceil(), width),
            min_y: clamp(min_y.floor(), height),
            max_y: clamp(max_y.ceil(), height),
        };
        if bounds.min_x >= bounds.max_x || bounds.min_y >= bounds.max_y {
            return None;
        }

        let top_left = [
            is_top_left(pos[1], pos[2]),
            is_top_left(pos[2], pos[0]),
            is_top_left(pos[0], pos[1]),
        ];
        Some(Self {
            pos,
            top_left,
            z,
            inv_w,
            varyings,
            area,
            bounds,
        })
    }

    /// Returns barycentric weights if the pixel center is covered
    #[inline]
    fn cover(&self, x: u32, y: u32) -> Option<[f32; 3]> {
        let p = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
        let [a, b, c] = self.pos;
        let w = [edge(b, c, p), edge(c, a, p), edge(a, b, p)];
        let inside = w
            .iter()
            .zip(self.top_left)
            .all(|(w, tl)| *w > 0.0 || (*w == 0.0 && tl));
        inside.then(|| w.map(|w| w / self.area))
    }

    /// Converts screen-space barycentrics into perspective-correct weights
    #[inline]
    fn perspective(&self, b: [f32; 3]) -> [f32; 3] {
        let p = [
            b[0] * self.inv_w[0],
            b[1] * self.inv_w[1],
            b[2] * self.inv_w[2],
        ];
        let sum = p[0] + p[1] + p[2];
        p.map(|p| p / sum)
    }

    /// Interpolates NDC depth with perspective correction
    ///
    /// This divides once at the end, so a triangle with constant depth
    /// produces exactly that depth at every pixel.
    #[inline]
    fn depth(&self, b: [f32; 3]) -> f32 {
        let mut num = 0.0;
        let mut den = 0.0;
        for i in 0..3 {
            let q = b[i] * self.inv_w[i];
            num += q * self.z[i];
            den += q;
        }
        num / den
    }
}

/// Converts NDC depth in `[0, 1]` into a stored depth value
#[inline]
pub fn depth_value(z: f32) -> u32 {
    (z as f64 * u32::MAX as f64).round() as u32
}

/// A horizontal strip of the render target, owned by one worker
pub(crate) struct Band<'a> {
    y0: u32,
    rows: u32,
    width: u32,
    color: &'a mut [u8],
    depth: Option<&'a mut [u8]>,
}

/// Fragment-stage state, shared by every band
pub(crate) struct FragmentStage<'a> {
    pub fs: &'a Program,
    pub bindings: Bindings<'a>,
    /// Number of interpolated floats consumed by the fragment program
    pub varying_width: usize,
}

/// Per-worker scratch data for the fragment stage
#[derive(Default)]
struct Worker {
    vm: ShaderVm,
    inputs: Vec<Value>,
    interp: Vec<f32>,
}

impl Worker {
    fn render_band(
        &mut self,
        stage: &FragmentStage,
        tris: &[Triangle],
        band: &mut Band,
    ) -> Result<(), Error> {
        let stride = band.width as usize * 4;
        let band_end = band.y0 + band.rows;
        for t in tris {
            let y_min = t.bounds.min_y.max(band.y0);
            let y_max = t.bounds.max_y.min(band_end);
            for y in y_min..y_max {
                for x in t.bounds.min_x..t.bounds.max_x {
                    let Some(b) = t.cover(x, y) else {
                        continue;
                    };
                    let z = t.depth(b);
                    if !(0.0..=1.0).contains(&z) {
                        continue;
                    }
                    let offset =
                        (y - band.y0) as usize * stride + x as usize * 4;
                    let d = depth_value(z);
                    if let Some(depth) = band.depth.as_deref_mut() {
                        let texel = &depth[offset..offset + 4];
                        let stored = u32::from_le_bytes([
                            texel[0], texel[1], texel[2], texel[3],
                        ]);
                        if d > stored {
                            continue;
                        }
                    }

                    let color = self.shade(stage, t, t.perspective(b))?;
                    band.color[offset..offset + 4].copy_from_slice(&color);
                    if let Some(depth) = band.depth.as_deref_mut() {
                        depth[offset..offset + 4]
                            .copy_from_slice(&d.to_le_bytes());
                    }
                }
            }
        }
        Ok(())
    }

    /// Interpolates varyings and runs the fragment program
    fn shade(
        &mut self,
        stage: &FragmentStage,
        t: &Triangle,
        p: [f32; 3],
    ) -> Result<[u8; 4], Error> {
        self.interp.clear();
        self.interp.extend((0..stage.varying_width).map(|i| {
            p[0] * t.varyings[0][i]
                + p[1] * t.varyings[1][i]
                + p[2] * t.varyings[2][i]
        }));

        self.inputs.clear();
        let mut rest = self.interp.as_slice();
        for a in stage.fs.inputs() {
            let (c, r) = rest.split_at(a.width());
            let v = Value::from_components(*a, c)
                .ok_or(Error::VaryingMismatch)?;
            self.inputs.push(v);
            rest = r;
        }

        let out = self.vm.run(stage.fs, &self.inputs, &stage.bindings)?;
        let mut rgba = [0.0, 0.0, 0.0, 1.0];
        let c = out.first().ok_or(Error::MissingColorOutput)?.components();
        rgba[..c.len()].copy_from_slice(c);
        Ok(pack_color(rgba))
    }
}

/// Rasterizes triangles into the color (and optional depth) target
///
/// The target is split into bands of `config.band_rows` rows, which are
/// rendered independently; each band walks every triangle in order, so a
/// pixel's final value doesn't depend on scheduling.
pub(crate) fn rasterize(
    config: &PipelineConfig,
    stage: &FragmentStage,
    tris: &[Triangle],
    width: u32,
    color: &mut [u8],
    depth: Option<&mut [u8]>,
) -> Result<(), Error> {
    let rows = config.band_rows.max(1);
    let chunk = width as usize * 4 * rows;
    let height = (color.len() / (width as usize * 4)) as u32;
    let mut bands: Vec<Band> = color
        .chunks_mut(chunk)
        .enumerate()
        .map(|(i, color)| {
            let y0 = (i * rows) as u32;
            Band {
                y0,
                rows: (rows as u32).min(height - y0),
                width,
                color,
                depth: None,
            }
        })
        .collect();
    if let Some(depth) = depth {
        for (b, d) in bands.iter_mut().zip(depth.chunks_mut(chunk)) {
            b.depth = Some(d);
        }
    }

    match &config.threads {
        None => {
            let mut w = Worker::default();
            bands
                .iter_mut()
                .try_for_each(|b| w.render_band(stage, tris, b))
        }
        Some(p) => p.run(|| {
            bands.par_iter_mut().try_for_each_init(Worker::default, |w, b| {
                w.render_band(stage, tris, b)
            })
        }),
    }
}
