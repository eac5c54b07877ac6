/// Graphics pipeline cache keyed by fixed-function draw state
///
/// A pipeline bakes culling, blending, depth state, the vertex layout and the
/// shader pair. Everything else (viewport, scissor, textures, samplers,
/// uniform values) is dynamic or bound per draw and stays out of the key.

use std::ffi::CStr;

use ash::vk;
use nebula_render::engine_err;
use nebula_render::nebula::render::{BlendFactor, DrawState, ShaderStageHandle, VertexInputHandle};
use nebula_render::nebula::Result;
use rustc_hash::FxHashMap;

use crate::vulkan_context::vk_error;
use crate::vulkan_format::blend_factor_to_vk;
use crate::vulkan_vertex_input::VertexLayout;

/// Hashable identity of a graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub is_culling_enabled: bool,
    pub is_blending_enabled: bool,
    pub is_depth_test_enabled: bool,
    pub is_depth_write_enabled: bool,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
    pub vertex_input: VertexInputHandle,
    pub shader_stage: ShaderStageHandle,
}

impl PipelineKey {
    /// Key for drawing with `vertex_input` and `shader_stage` under `state`
    ///
    /// Blend factors only matter while blending is on; with blending off
    /// they are normalized so stale factors do not split the cache.
    pub fn from_draw_state(
        state: &DrawState,
        vertex_input: VertexInputHandle,
        shader_stage: ShaderStageHandle,
    ) -> Self {
        let (blend_src, blend_dst) = if state.is_blending_enabled {
            (state.blend_src, state.blend_dst)
        } else {
            (BlendFactor::One, BlendFactor::Zero)
        };
        Self {
            is_culling_enabled: state.is_culling_enabled,
            is_blending_enabled: state.is_blending_enabled,
            is_depth_test_enabled: state.is_depth_test_enabled,
            is_depth_write_enabled: state.is_depth_write_enabled,
            blend_src,
            blend_dst,
            vertex_input,
            shader_stage,
        }
    }
}

/// Pipelines by key, with hit/miss counters
///
/// Generic over the stored value so the lookup logic can be tested without
/// a device.
pub(crate) struct PipelineCache<P: Copy> {
    entries: FxHashMap<PipelineKey, P>,
    hits: u64,
    misses: u64,
}

impl<P: Copy> PipelineCache<P> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached pipeline for `key`, creating it on a miss
    ///
    /// A failed creation inserts nothing but still counts as a miss.
    pub fn get_or_try_insert_with(&mut self, key: PipelineKey, create: impl FnOnce() -> Result<P>) -> Result<P> {
        if let Some(pipeline) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(*pipeline);
        }
        self.misses += 1;
        let pipeline = create()?;
        self.entries.insert(key, pipeline);
        Ok(pipeline)
    }

    /// Remove every pipeline, handing them back for destruction
    pub fn clear(&mut self) -> Vec<P> {
        self.entries.drain().map(|(_, pipeline)| pipeline).collect()
    }

    /// Remove the pipelines whose key matches `pred`
    pub fn evict(&mut self, pred: impl Fn(&PipelineKey) -> bool) -> Vec<P> {
        let keys: Vec<PipelineKey> = self.entries.keys().filter(|key| pred(key)).copied().collect();
        keys.iter().filter_map(|key| self.entries.remove(key)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Everything besides the key needed to build a pipeline
pub(crate) struct PipelineInputs<'a> {
    pub vertex_module: vk::ShaderModule,
    pub vertex_entry: &'a CStr,
    pub fragment_module: vk::ShaderModule,
    pub fragment_entry: &'a CStr,
    pub layout: vk::PipelineLayout,
    pub vertex_layout: &'a VertexLayout,
    pub render_pass: vk::RenderPass,
    pub samples: vk::SampleCountFlags,
}

/// Create the graphics pipeline described by `key`
///
/// Viewport and scissor are dynamic. Front faces are counter-clockwise, as
/// seen through the flipped viewport.
pub(crate) fn create_graphics_pipeline(
    device: &ash::Device,
    key: &PipelineKey,
    inputs: &PipelineInputs<'_>,
) -> Result<vk::Pipeline> {
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(inputs.vertex_module)
            .name(inputs.vertex_entry),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(inputs.fragment_module)
            .name(inputs.fragment_entry),
    ];

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&inputs.vertex_layout.bindings)
        .vertex_attribute_descriptions(&inputs.vertex_layout.attributes);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Dynamic, only the counts matter
    let viewports = [vk::Viewport::default()];
    let scissors = [vk::Rect2D::default()];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let cull_mode = if key.is_culling_enabled {
        vk::CullModeFlags::BACK
    } else {
        vk::CullModeFlags::NONE
    };
    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(cull_mode)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(key.is_depth_test_enabled)
        .depth_write_enable(key.is_depth_write_enabled)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(inputs.samples);

    let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(key.is_blending_enabled)
        .src_color_blend_factor(blend_factor_to_vk(key.blend_src))
        .dst_color_blend_factor(blend_factor_to_vk(key.blend_dst))
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(blend_factor_to_vk(key.blend_src))
        .dst_alpha_blend_factor(blend_factor_to_vk(key.blend_dst))
        .alpha_blend_op(vk::BlendOp::ADD);
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(std::slice::from_ref(&color_blend_attachment));

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .depth_stencil_state(&depth_stencil_state)
        .multisample_state(&multisample_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(inputs.layout)
        .render_pass(inputs.render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
            .map_err(|(_, e)| vk_error("nebula::vulkan", "Failed to create graphics pipeline", e))?
    };
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| engine_err!("nebula::vulkan", "vkCreateGraphicsPipelines returned no pipeline"))
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
