/// Indexed draw recording
///
/// Draw recording goes through the `DrawRecorder` seam so the command order
/// can be checked without a device: pipeline, viewport, scissor, index
/// buffer, vertex buffers, descriptor set, push constants, draw.

use ash::vk;
use nebula_render::nebula::render::Rect;

/// Sink for the commands of one indexed draw
pub(crate) trait DrawRecorder {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);

    fn set_viewport(&mut self, viewport: vk::Viewport);

    fn set_scissor(&mut self, scissor: vk::Rect2D);

    fn bind_index_buffer(&mut self, buffer: vk::Buffer, index_type: vk::IndexType);

    fn bind_vertex_buffers(&mut self, buffers: &[vk::Buffer]);

    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet);

    fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, data: &[u8]);

    fn draw_indexed(&mut self, index_count: u32, first_index: u32);
}

/// Push-constant upload for a draw
pub(crate) struct PushConstants<'a> {
    pub layout: vk::PipelineLayout,
    pub stages: vk::ShaderStageFlags,
    pub data: &'a [u8],
}

/// Everything one indexed draw binds
pub(crate) struct IndexedDraw<'a> {
    pub pipeline: vk::Pipeline,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub index_buffer: vk::Buffer,
    pub index_type: vk::IndexType,
    /// Vertex buffers in binding order, constant buffer last
    pub vertex_buffers: &'a [vk::Buffer],
    /// `None` when the stage has no samplers
    pub descriptor_set: Option<(vk::PipelineLayout, vk::DescriptorSet)>,
    /// `None` when the stage has no uniforms
    pub push_constants: Option<PushConstants<'a>>,
    pub first_index: u32,
    pub index_count: u32,
}

/// Record `draw` in the fixed order
pub(crate) fn record_indexed_draw(recorder: &mut dyn DrawRecorder, draw: &IndexedDraw<'_>) {
    recorder.bind_pipeline(draw.pipeline);
    recorder.set_viewport(draw.viewport);
    recorder.set_scissor(draw.scissor);
    recorder.bind_index_buffer(draw.index_buffer, draw.index_type);
    if !draw.vertex_buffers.is_empty() {
        recorder.bind_vertex_buffers(draw.vertex_buffers);
    }
    if let Some((layout, set)) = draw.descriptor_set {
        recorder.bind_descriptor_set(layout, set);
    }
    if let Some(push) = &draw.push_constants {
        recorder.push_constants(push.layout, push.stages, push.data);
    }
    recorder.draw_indexed(draw.index_count, draw.first_index);
}

/// Vulkan viewport for a bottom-left-origin rectangle
///
/// The negative height flips Y so clip-space +Y points up, as in OpenGL.
pub(crate) fn flipped_viewport(rect: Rect, surface_height: u32) -> vk::Viewport {
    vk::Viewport {
        x: rect.x as f32,
        y: surface_height as f32 - rect.y as f32,
        width: rect.width as f32,
        height: -(rect.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Vulkan scissor for a bottom-left-origin rectangle, clipped to non-negative offsets
pub(crate) fn flipped_scissor(rect: Rect, surface_height: u32) -> vk::Rect2D {
    let left = rect.x as i64;
    let right = left + rect.width.max(0) as i64;
    let top = surface_height as i64 - (rect.y as i64 + rect.height.max(0) as i64);
    let bottom = surface_height as i64 - rect.y as i64;

    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = right.max(x0);
    let y1 = bottom.max(y0);
    vk::Rect2D {
        offset: vk::Offset2D {
            x: x0 as i32,
            y: y0 as i32,
        },
        extent: vk::Extent2D {
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        },
    }
}

/// `DrawRecorder` writing into a live command buffer
pub(crate) struct CommandBufferRecorder<'a> {
    pub device: &'a ash::Device,
    pub command_buffer: vk::CommandBuffer,
    /// vkCmd* calls recorded
    pub calls: u64,
}

impl<'a> CommandBufferRecorder<'a> {
    pub fn new(device: &'a ash::Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            calls: 0,
        }
    }
}

impl DrawRecorder for CommandBufferRecorder<'_> {
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline)
        };
        self.calls += 1;
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe { self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]) };
        self.calls += 1;
    }

    fn set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe { self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]) };
        self.calls += 1;
    }

    fn bind_index_buffer(&mut self, buffer: vk::Buffer, index_type: vk::IndexType) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, buffer, 0, index_type)
        };
        self.calls += 1;
    }

    fn bind_vertex_buffers(&mut self, buffers: &[vk::Buffer]) {
        let offsets = vec![0u64; buffers.len()];
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, buffers, &offsets)
        };
        self.calls += 1;
    }

    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            )
        };
        self.calls += 1;
    }

    fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, data: &[u8]) {
        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, layout, stages, 0, data)
        };
        self.calls += 1;
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) {
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, 0, 0)
        };
        self.calls += 1;
    }
}

#[cfg(test)]
#[path = "vulkan_draw_tests.rs"]
mod tests;
