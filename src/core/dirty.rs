//! Per-entity change tracking.

bitflags::bitflags! {
    /// Material attributes changed since the last sync.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MaterialDirtyBits: u32 {
        /// The material network (parameters, textures, connections) changed.
        const DIRTY_PARAMS = 1 << 2;
        /// The material resource (network map) was replaced.
        const DIRTY_RESOURCE = 1 << 3;

        const ALL_DIRTY = Self::DIRTY_PARAMS.bits() | Self::DIRTY_RESOURCE.bits();
    }
}

impl MaterialDirtyBits {
    /// Nothing changed.
    pub const CLEAN: Self = Self::empty();

    #[inline]
    pub fn is_clean(self) -> bool {
        self.is_empty()
    }
}

impl Default for MaterialDirtyBits {
    fn default() -> Self {
        Self::ALL_DIRTY
    }
}
