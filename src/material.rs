/// Materials and the arena that hands out stable handles to them
use crate::color::Rgba;
use crate::geometry::Fragment;
use std::sync::Arc;

/// Surface description consumed by the deferred shading stage.
pub trait Material: Send + Sync {
    fn use_mipmap(&self) -> bool {
        false
    }

    /// Texel count along one side of the bound texture, 0 if untextured.
    fn texture_size(&self) -> f32 {
        0.0
    }

    fn receive_shadow(&self) -> bool {
        true
    }

    fn ambient_occlusion(&self) -> bool {
        false
    }

    fn shade(&self, frag: &Fragment) -> Rgba;
}

/// Shades with the interpolated vertex color.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexColorMaterial;

impl Material for VertexColorMaterial {
    fn shade(&self, frag: &Fragment) -> Rgba {
        frag.col
    }
}

/// Flat color, optionally lit by a single directional light (Lambert).
#[derive(Debug, Clone, Copy)]
pub struct SolidMaterial {
    pub color: Rgba,
    pub light_dir: Option<glam::Vec3>,
    pub ambient: f32,
    pub shadows: bool,
}

impl SolidMaterial {
    pub fn new(color: Rgba) -> Self {
        Self {
            color,
            light_dir: None,
            ambient: 0.2,
            shadows: true,
        }
    }

    pub fn lit(mut self, light_dir: glam::Vec3) -> Self {
        self.light_dir = Some(light_dir.normalize_or_zero());
        self
    }
}

impl Material for SolidMaterial {
    fn receive_shadow(&self) -> bool {
        self.shadows
    }

    fn shade(&self, frag: &Fragment) -> Rgba {
        let Some(l) = self.light_dir else {
            return self.color;
        };
        let n = frag.nor.truncate().normalize_or_zero();
        let diffuse = n.dot(-l).max(0.0);
        self.color.scale_rgb((self.ambient + (1.0 - self.ambient) * diffuse).min(1.0))
    }
}

/// Generation-checked handle into a [`MaterialArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId {
    index: u32,
    generation: u32,
}

impl MaterialId {
    /// Handle of the arena's built-in default material.
    pub const DEFAULT: MaterialId = MaterialId {
        index: 0,
        generation: 0,
    };

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }
}

struct Slot {
    generation: u32,
    material: Option<Arc<dyn Material>>,
}

/// Owns the materials of one scene. Slot 0 always holds the default material.
pub struct MaterialArena {
    default: Arc<dyn Material>,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Default for MaterialArena {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialArena {
    pub fn new() -> Self {
        Self::with_default(Arc::new(VertexColorMaterial))
    }

    pub fn with_default(default: Arc<dyn Material>) -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                material: Some(Arc::clone(&default)),
            }],
            default,
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, material: Arc<dyn Material>) -> MaterialId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.material = Some(material);
            return MaterialId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            material: Some(material),
        });
        MaterialId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: MaterialId) -> Option<&Arc<dyn Material>> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.material.as_ref())
    }

    /// Resolve `id`, falling back to the default material for `None` or
    /// stale handles.
    pub fn resolve(&self, id: Option<MaterialId>) -> &Arc<dyn Material> {
        id.and_then(|id| self.get(id))
            .unwrap_or_else(|| self.default_material())
    }

    pub fn default_material(&self) -> &Arc<dyn Material> {
        &self.default
    }

    /// Remove a material. Stale handles to the slot resolve to `None`.
    ///
    /// Panics when asked to remove the default material.
    pub fn remove(&mut self, id: MaterialId) -> Option<Arc<dyn Material>> {
        assert!(id.index != 0, "the default material cannot be removed");
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let material = slot.material.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(material)
    }

    /// Drop every material except the default. Outstanding handles go stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate().skip(1) {
            if slot.material.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
    }

    /// Live materials, including the default.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.material.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_does_not_resolve_after_reuse() {
        let mut arena = MaterialArena::new();
        let red = arena.insert(Arc::new(SolidMaterial::new(Rgba::new(255, 0, 0, 255))));
        assert_eq!(arena.len(), 2);
        assert!(arena.remove(red).is_some());
        assert!(arena.get(red).is_none());

        let blue = arena.insert(Arc::new(SolidMaterial::new(Rgba::new(0, 0, 255, 255))));
        assert_eq!(blue.index(), red.index());
        assert!(arena.get(red).is_none());
        assert!(arena.get(blue).is_some());

        let frag = Fragment::default();
        assert_eq!(arena.resolve(Some(blue)).shade(&frag), Rgba::new(0, 0, 255, 255));
        assert_eq!(arena.resolve(Some(red)).shade(&frag), frag.col);
    }

    #[test]
    #[should_panic(expected = "default material")]
    fn default_material_cannot_be_removed() {
        let mut arena = MaterialArena::new();
        arena.remove(MaterialId::DEFAULT);
    }

    #[test]
    fn clear_keeps_default() {
        let mut arena = MaterialArena::new();
        let id = arena.insert(Arc::new(VertexColorMaterial));
        arena.clear();
        assert_eq!(arena.len(), 1);
        assert!(arena.get(MaterialId::DEFAULT).is_some());
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn lit_material_darkens_faces_away_from_light() {
        let m = SolidMaterial::new(Rgba::new(200, 200, 200, 255)).lit(glam::Vec3::NEG_Z);
        let mut frag = Fragment::default();
        frag.nor = glam::Vec4::Z;
        assert_eq!(m.shade(&frag), Rgba::new(200, 200, 200, 255));
        frag.nor = glam::Vec4::NEG_Z;
        assert_eq!(m.shade(&frag), Rgba::new(40, 40, 40, 255));
    }
}
