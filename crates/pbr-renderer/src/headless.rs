//! In-memory implementation of the resource binding provider.
//!
//! Bindings record what gets wired to each variable. Used by tests and tools
//! that exercise the material core without a GPU.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::{
    GpuBuffer, GpuTexture, PbrRenderer, ShaderResourceBinding, ShaderResourceVariable, ShaderType,
};
use crate::flags::TextureAttribId;
use crate::settings::RendererSettings;
use crate::{FRAME_ATTRIBS_VAR, MATERIAL_TEXTURES_VAR, PRIMITIVE_ATTRIBS_VAR};

/// Primitive attribute buffer capacity of the headless renderer.
const PRIMITIVE_ATTRIBS_BUFFER_SIZE: u64 = 64 * 1024;

/// Kind of resource a variable accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    ConstantBuffer,
    Texture,
    TextureArray(u32),
}

/// What is currently bound to a variable.
#[derive(Clone, Debug, Default)]
pub enum BoundResource {
    #[default]
    Empty,
    Texture(Arc<GpuTexture>),
    TextureArray(Vec<Option<Arc<GpuTexture>>>),
    BufferRange {
        buffer: Arc<GpuBuffer>,
        offset: u64,
        size: u64,
    },
}

impl BoundResource {
    /// Unique ids of bound textures (array elements in order, unbound elements skipped).
    pub fn texture_ids(&self) -> Vec<i32> {
        match self {
            Self::Texture(tex) => vec![tex.unique_id()],
            Self::TextureArray(textures) => {
                textures.iter().flatten().map(|t| t.unique_id()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct HeadlessVariable {
    name: String,
    kind: VariableKind,
    bound: Mutex<BoundResource>,
}

impl HeadlessVariable {
    fn new(name: &str, kind: VariableKind) -> Arc<Self> {
        let bound = match kind {
            VariableKind::TextureArray(size) => {
                BoundResource::TextureArray(vec![None; size as usize])
            }
            _ => BoundResource::Empty,
        };
        Arc::new(Self {
            name: name.to_string(),
            kind,
            bound: Mutex::new(bound),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    /// Snapshot of the bound resource.
    pub fn bound(&self) -> BoundResource {
        self.bound.lock().clone()
    }
}

impl ShaderResourceVariable for HeadlessVariable {
    fn set(&self, texture: &Arc<GpuTexture>) {
        if self.kind != VariableKind::Texture {
            tracing::error!(
                variable = %self.name,
                kind = ?self.kind,
                "texture bound to a non-texture variable"
            );
            return;
        }
        *self.bound.lock() = BoundResource::Texture(Arc::clone(texture));
    }

    fn set_array(&self, textures: &[Arc<GpuTexture>], first_element: u32) {
        let VariableKind::TextureArray(size) = self.kind else {
            tracing::error!(
                variable = %self.name,
                kind = ?self.kind,
                "texture array bound to a non-array variable"
            );
            return;
        };
        let first = first_element as usize;
        if first + textures.len() > size as usize {
            tracing::error!(
                variable = %self.name,
                first_element,
                count = textures.len(),
                size,
                "texture array range out of bounds"
            );
            return;
        }

        let mut bound = self.bound.lock();
        if let BoundResource::TextureArray(elements) = &mut *bound {
            for (slot, tex) in elements[first..].iter_mut().zip(textures) {
                *slot = Some(Arc::clone(tex));
            }
        }
    }

    fn set_buffer_range(&self, buffer: &Arc<GpuBuffer>, offset: u64, size: u64) {
        if self.kind != VariableKind::ConstantBuffer {
            tracing::error!(
                variable = %self.name,
                kind = ?self.kind,
                "buffer bound to a non-buffer variable"
            );
            return;
        }
        if offset + size > buffer.size() {
            tracing::error!(
                variable = %self.name,
                offset,
                size,
                buffer_size = buffer.size(),
                "buffer range out of bounds"
            );
            return;
        }
        *self.bound.lock() = BoundResource::BufferRange {
            buffer: Arc::clone(buffer),
            offset,
            size,
        };
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Resource binding with the PBR pipeline's variable set.
#[derive(Debug)]
pub struct HeadlessResourceBinding {
    serial: usize,
    variables: HashMap<(ShaderType, String), Arc<HeadlessVariable>>,
}

impl HeadlessResourceBinding {
    fn new(serial: usize, settings: &RendererSettings) -> Self {
        let mut variables = HashMap::new();
        let mut add = |stage: ShaderType, name: &str, kind: VariableKind| {
            variables.insert((stage, name.to_string()), HeadlessVariable::new(name, kind));
        };

        add(ShaderType::Vertex, FRAME_ATTRIBS_VAR, VariableKind::ConstantBuffer);
        add(ShaderType::Pixel, FRAME_ATTRIBS_VAR, VariableKind::ConstantBuffer);
        add(ShaderType::Pixel, PRIMITIVE_ATTRIBS_VAR, VariableKind::ConstantBuffer);
        add(
            ShaderType::Pixel,
            MATERIAL_TEXTURES_VAR,
            VariableKind::TextureArray(settings.material_textures_array_size),
        );
        for id in TextureAttribId::ALL {
            add(ShaderType::Pixel, id.shader_name(), VariableKind::Texture);
        }

        Self { serial, variables }
    }

    /// Creation order of this binding within its renderer.
    pub fn serial(&self) -> usize {
        self.serial
    }

    /// Concrete variable lookup.
    pub fn variable(&self, stage: ShaderType, name: &str) -> Option<&Arc<HeadlessVariable>> {
        self.variables.get(&(stage, name.to_string()))
    }

    /// What is bound to a variable, if the variable exists.
    pub fn bound(&self, stage: ShaderType, name: &str) -> Option<BoundResource> {
        self.variable(stage, name).map(|v| v.bound())
    }
}

impl ShaderResourceBinding for HeadlessResourceBinding {
    fn variable_by_name(
        &self,
        stage: ShaderType,
        name: &str,
    ) -> Option<Arc<dyn ShaderResourceVariable>> {
        self.variable(stage, name)
            .map(|v| Arc::clone(v) as Arc<dyn ShaderResourceVariable>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Renderer that creates [`HeadlessResourceBinding`]s.
#[derive(Debug)]
pub struct HeadlessRenderer {
    settings: RendererSettings,
    primitive_attribs: Arc<GpuBuffer>,
    bindings_created: AtomicUsize,
}

impl HeadlessRenderer {
    pub fn new(settings: RendererSettings) -> Self {
        Self {
            settings,
            primitive_attribs: GpuBuffer::new(
                "PBR primitive attribs",
                PRIMITIVE_ATTRIBS_BUFFER_SIZE,
            ),
            bindings_created: AtomicUsize::new(0),
        }
    }

    /// Number of resource bindings created so far.
    pub fn bindings_created(&self) -> usize {
        self.bindings_created.load(Ordering::Acquire)
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(RendererSettings::default())
    }
}

impl PbrRenderer for HeadlessRenderer {
    fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    fn create_resource_binding(&self) -> Option<Arc<dyn ShaderResourceBinding>> {
        let serial = self.bindings_created.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(serial, "creating headless resource binding");
        Some(Arc::new(HeadlessResourceBinding::new(serial, &self.settings)))
    }

    fn primitive_attribs_buffer(&self) -> &Arc<GpuBuffer> {
        &self.primitive_attribs
    }

    fn init_common_srb_vars(
        &self,
        srb: &dyn ShaderResourceBinding,
        frame_attribs: &Arc<GpuBuffer>,
    ) {
        for stage in [ShaderType::Vertex, ShaderType::Pixel] {
            if let Some(var) = srb.variable_by_name(stage, FRAME_ATTRIBS_VAR) {
                var.set_buffer_range(frame_attribs, 0, frame_attribs.size());
            }
        }
    }

    fn set_material_texture(
        &self,
        srb: &dyn ShaderResourceBinding,
        texture: &Arc<GpuTexture>,
        id: TextureAttribId,
    ) {
        match srb.variable_by_name(ShaderType::Pixel, id.shader_name()) {
            Some(var) => var.set(texture),
            None => tracing::warn!(slot = ?id, "material texture variable not found"),
        }
    }
}
