//! Textures, dumb buffers, and the table which owns them
//!
//! Every resource lives in a single [`ResourceTable`], keyed by a
//! caller-chosen `u64`.  Textures and dumb buffers share one id namespace.
use crate::Error;
use std::collections::HashMap;

/// Converts a float color into RGBA8, clamping each channel to `[0, 1]`
pub fn pack_color(rgba: [f32; 4]) -> [u8; 4] {
    rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Converts an RGBA8 texel into float channels in `[0, 1]`
pub fn unpack_color(rgba: [u8; 4]) -> [f32; 4] {
    rgba.map(|c| c as f32 / 255.0)
}

/// Half-open pixel rectangle `[min_x, max_x) x [min_y, max_y)`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect {
    /// Minimum X (inclusive)
    pub min_x: u32,
    /// Maximum X (exclusive)
    pub max_x: u32,
    /// Minimum Y (inclusive)
    pub min_y: u32,
    /// Maximum Y (exclusive)
    pub max_y: u32,
}

impl Rect {
    /// Builds a rectangle covering an entire `width x height` image
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            min_x: 0,
            max_x: width,
            min_y: 0,
            max_y: height,
        }
    }

    /// Checks whether the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    fn bad(&self) -> Error {
        Error::BadRect {
            min_x: self.min_x,
            max_x: self.max_x,
            min_y: self.min_y,
            max_y: self.max_y,
        }
    }
}

/// Borrowed view of a texture, used for sampling
#[derive(Copy, Clone, Debug)]
pub struct TextureRef<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> TextureRef<'a> {
    /// Builds a view of tightly-packed 32-bit texels
    ///
    /// # Panics
    /// If `data` is not exactly `width * height * 4` bytes
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            data,
        }
    }

    /// Returns the texel at the given position as RGBA8
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Nearest-neighbor sample at a normalized coordinate
    ///
    /// Coordinates are clamped to `[0, 1]`; `(0, 0)` is the top-left corner.
    pub fn sample_nearest(&self, u: f32, v: f32) -> [f32; 4] {
        let pick = |t: f32, size: u32| {
            let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
            ((t * size as f32).floor() as u32).min(size - 1)
        };
        let x = pick(u, self.width);
        let y = pick(v, self.height);
        unpack_color(self.texel(x, y))
    }
}

/// A 2D image with 32 bits per texel
///
/// Used as a color target, texels are RGBA8 (in byte order R, G, B, A); used
/// as a depth target, texels are little-endian `u32` depth values.  Row 0 is
/// the top row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Texture {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Texture {
    /// Allocates a zeroed texture
    pub fn new(width: u32, height: u32) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            return Err(Error::BadTextureSize(width, height));
        }
        let size = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(Error::OutOfMemory(usize::MAX))?;
        let data = alloc_zeroed(size)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Returns the width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the number of bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Returns the raw texel data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the raw texel data, mutably
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns a borrowed view for sampling
    pub fn view(&self) -> TextureRef<'_> {
        TextureRef {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Reads a texel as RGBA8
    pub fn color_at(&self, x: u32, y: u32) -> [u8; 4] {
        self.view().texel(x, y)
    }

    /// Reads a texel as a depth value
    pub fn depth_at(&self, x: u32, y: u32) -> u32 {
        u32::from_le_bytes(self.view().texel(x, y))
    }

    /// Fills a rectangle with a color
    pub fn clear_color(
        &mut self,
        rgba: [f32; 4],
        rect: Rect,
    ) -> Result<(), Error> {
        self.fill(pack_color(rgba), rect)
    }

    /// Fills a rectangle with a depth value
    pub fn clear_depth(&mut self, depth: u32, rect: Rect) -> Result<(), Error> {
        self.fill(depth.to_le_bytes(), rect)
    }

    fn fill(&mut self, texel: [u8; 4], rect: Rect) -> Result<(), Error> {
        if rect.max_x > self.width || rect.max_y > self.height {
            return Err(rect.bad());
        }
        if rect.is_empty() {
            return Ok(());
        }
        let stride = self.stride();
        for row in self
            .data
            .chunks_exact_mut(stride)
            .skip(rect.min_y as usize)
            .take((rect.max_y - rect.min_y) as usize)
        {
            let span =
                &mut row[rect.min_x as usize * 4..rect.max_x as usize * 4];
            for px in span.chunks_exact_mut(4) {
                px.copy_from_slice(&texel);
            }
        }
        Ok(())
    }
}

fn alloc_zeroed(size: usize) -> Result<Vec<u8>, Error> {
    let mut data = Vec::new();
    data.try_reserve_exact(size)
        .map_err(|_| Error::OutOfMemory(size))?;
    data.resize(size, 0);
    Ok(data)
}

/// A resource stored in the table
#[derive(Clone, Debug)]
pub enum Resource {
    /// 2D image
    Texture(Texture),
    /// Untyped byte buffer
    Dumb(Vec<u8>),
}

impl Resource {
    fn kind(&self) -> &'static str {
        match self {
            Resource::Texture(..) => "texture",
            Resource::Dumb(..) => "dumb buffer",
        }
    }
}

/// Owner of every texture and dumb buffer, keyed by `u64` id
#[derive(Clone, Debug, Default)]
pub struct ResourceTable {
    resources: HashMap<u64, Resource>,
}

impl ResourceTable {
    /// Builds an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Checks whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Checks whether a resource with the given id exists
    pub fn contains(&self, id: u64) -> bool {
        self.resources.contains_key(&id)
    }

    fn insert(&mut self, id: u64, r: Resource) -> Result<(), Error> {
        if self.resources.contains_key(&id) {
            return Err(Error::ResourceExists(id));
        }
        log::debug!("created {} {id}", r.kind());
        self.resources.insert(id, r);
        Ok(())
    }

    fn get(&self, id: u64) -> Result<&Resource, Error> {
        self.resources.get(&id).ok_or(Error::UnknownResource(id))
    }

    fn get_mut(&mut self, id: u64) -> Result<&mut Resource, Error> {
        self.resources.get_mut(&id).ok_or(Error::UnknownResource(id))
    }

    /// Creates a zeroed `width x height` texture
    pub fn create_texture(
        &mut self,
        id: u64,
        width: u32,
        height: u32,
    ) -> Result<(), Error> {
        if self.contains(id) {
            return Err(Error::ResourceExists(id));
        }
        let t = Texture::new(width, height)?;
        self.insert(id, Resource::Texture(t))
    }

    /// Destroys a texture
    pub fn free_texture(&mut self, id: u64) -> Result<(), Error> {
        self.texture(id)?;
        self.resources.remove(&id);
        Ok(())
    }

    /// Borrows a texture
    pub fn texture(&self, id: u64) -> Result<&Texture, Error> {
        match self.get(id)? {
            Resource::Texture(t) => Ok(t),
            _ => Err(Error::WrongResourceKind(id, "texture")),
        }
    }

    /// Borrows a texture mutably
    pub fn texture_mut(&mut self, id: u64) -> Result<&mut Texture, Error> {
        match self.get_mut(id)? {
            Resource::Texture(t) => Ok(t),
            _ => Err(Error::WrongResourceKind(id, "texture")),
        }
    }

    /// Fills a rectangle of a texture with a color
    pub fn clear_color(
        &mut self,
        id: u64,
        rgba: [f32; 4],
        rect: Rect,
    ) -> Result<(), Error> {
        self.texture_mut(id)?.clear_color(rgba, rect)
    }

    /// Fills a rectangle of a texture with a depth value
    pub fn clear_depth(
        &mut self,
        id: u64,
        depth: u32,
        rect: Rect,
    ) -> Result<(), Error> {
        self.texture_mut(id)?.clear_depth(depth, rect)
    }

    /// Creates a zero-initialized dumb buffer of `size` bytes
    pub fn create_dumb(&mut self, id: u64, size: usize) -> Result<(), Error> {
        if self.contains(id) {
            return Err(Error::ResourceExists(id));
        }
        let data = alloc_zeroed(size)?;
        self.insert(id, Resource::Dumb(data))
    }

    /// Creates a dumb buffer holding a copy of `bytes`
    pub fn create_dumb_from(
        &mut self,
        id: u64,
        bytes: &[u8],
    ) -> Result<(), Error> {
        self.create_dumb(id, bytes.len())?;
        self.dumb_mut(id)?.copy_from_slice(bytes);
        Ok(())
    }

    /// Destroys a dumb buffer
    pub fn free_dumb(&mut self, id: u64) -> Result<(), Error> {
        self.dumb(id)?;
        self.resources.remove(&id);
        Ok(())
    }

    /// Borrows the contents of a dumb buffer
    pub fn dumb(&self, id: u64) -> Result<&[u8], Error> {
        match self.get(id)? {
            Resource::Dumb(d) => Ok(d),
            _ => Err(Error::WrongResourceKind(id, "dumb buffer")),
        }
    }

    /// Borrows the contents of a dumb buffer mutably
    pub fn dumb_mut(&mut self, id: u64) -> Result<&mut [u8], Error> {
        match self.get_mut(id)? {
            Resource::Dumb(d) => Ok(d),
            _ => Err(Error::WrongResourceKind(id, "dumb buffer")),
        }
    }

    /// Removes a texture from the table so that it can be borrowed
    /// alongside other resources
    ///
    /// It must be returned with [`restore_texture`](Self::restore_texture).
    pub(crate) fn take_texture(&mut self, id: u64) -> Result<Texture, Error> {
        self.texture(id)?;
        match self.resources.remove(&id) {
            Some(Resource::Texture(t)) => Ok(t),
            _ => Err(Error::UnknownResource(id)),
        }
    }

    pub(crate) fn restore_texture(&mut self, id: u64, t: Texture) {
        self.resources.insert(id, Resource::Texture(t));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clear_subrect() {
        let mut r = ResourceTable::new();
        r.create_texture(1, 4, 4).unwrap();
        let rect = Rect {
            min_x: 1,
            max_x: 3,
            min_y: 1,
            max_y: 3,
        };
        r.clear_color(1, [1.0, 0.5, 0.0, 1.0], rect).unwrap();
        let t = r.texture(1).unwrap();
        let mut set = 0;
        for y in 0..4 {
            for x in 0..4 {
                let c = t.color_at(x, y);
                if (1..3).contains(&x) && (1..3).contains(&y) {
                    assert_eq!(c, [255, 128, 0, 255]);
                    set += 1;
                } else {
                    assert_eq!(c, [0; 4]);
                }
            }
        }
        assert_eq!(set, 4);

        r.create_texture(2, 4, 4).unwrap();
        r.clear_depth(2, 0xDEAD_BEEF, rect).unwrap();
        let t = r.texture(2).unwrap();
        let n = (0..16)
            .filter(|i| t.depth_at(i % 4, i / 4) == 0xDEAD_BEEF)
            .count();
        assert_eq!(n, 4);
        assert_eq!(t.depth_at(0, 0), 0);
    }

    #[test]
    fn clear_bounds() {
        let mut r = ResourceTable::new();
        r.create_texture(1, 4, 4).unwrap();
        let bad = Rect {
            min_x: 0,
            max_x: 5,
            min_y: 0,
            max_y: 4,
        };
        assert!(matches!(
            r.clear_color(1, [1.0; 4], bad),
            Err(Error::BadRect { max_x: 5, .. })
        ));
        let empty = Rect {
            min_x: 3,
            max_x: 1,
            min_y: 0,
            max_y: 4,
        };
        r.clear_color(1, [1.0; 4], empty).unwrap();
        assert!(r.texture(1).unwrap().data().iter().all(|b| *b == 0));

        r.clear_color(1, [2.0, -1.0, 0.25, 1.0], Rect::full(4, 4))
            .unwrap();
        assert_eq!(r.texture(1).unwrap().color_at(3, 3), [255, 0, 64, 255]);
    }

    #[test]
    fn resource_kinds() {
        let mut r = ResourceTable::new();
        assert_eq!(r.create_texture(1, 0, 4), Err(Error::BadTextureSize(0, 4)));
        r.create_texture(1, 2, 2).unwrap();
        assert_eq!(r.create_dumb(1, 8), Err(Error::ResourceExists(1)));
        r.create_dumb_from(2, &[1, 2, 3]).unwrap();
        assert_eq!(r.dumb(2).unwrap(), &[1, 2, 3]);
        assert_eq!(
            r.dumb(1),
            Err(Error::WrongResourceKind(1, "dumb buffer"))
        );
        assert_eq!(
            r.texture(2).map(|_| ()),
            Err(Error::WrongResourceKind(2, "texture"))
        );
        assert_eq!(
            r.free_texture(2),
            Err(Error::WrongResourceKind(2, "texture"))
        );
        assert_eq!(r.free_dumb(3), Err(Error::UnknownResource(3)));

        let t = r.texture(1).unwrap();
        assert_eq!((t.width(), t.height(), t.stride()), (2, 2, 8));
        assert_eq!(t.data().len(), 16);

        r.free_texture(1).unwrap();
        r.free_dumb(2).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn nearest_sampling() {
        // 2x2: red, green / blue, white
        let data = [
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ];
        let t = TextureRef::new(2, 2, &data);
        assert_eq!(t.sample_nearest(0.25, 0.25), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(t.sample_nearest(0.75, 0.25), [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(t.sample_nearest(0.25, 0.75), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(t.sample_nearest(1.0, 1.0), [1.0; 4]);
        assert_eq!(t.sample_nearest(-5.0, 7.0), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(t.sample_nearest(f32::NAN, 0.0), [1.0, 0.0, 0.0, 1.0]);
    }
}
