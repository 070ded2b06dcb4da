//! The triangle renderer: one-shot setup and the per-frame loop body
//!
//! Setup builds, in order:
//! - Swapchain plus a depth render target sized to it
//! - Render pass and one framebuffer per swapchain image
//! - Descriptor layout, pipeline layout and the graphics pipeline
//! - Vertex and uniform buffers, the checkerboard texture and its descriptor set
//! - Command pool, one command buffer per swapchain image and two semaphores
//!
//! Each frame then re-records the command buffer of the acquired image,
//! submits it, presents, and waits for the queue to go idle.

use crate::{
    config::DemoConfig,
    error::CrateResult,
    graphics::{
        buffer::HostVisibleBuffer,
        context::VulkanContext,
        device::find_depth_format,
        pipeline::{
            create_descriptor_set_layout, create_graphics_pipeline, create_pipeline_layout,
            load_shader_module,
        },
        render_target::RenderTarget,
        scene::{TriangleUniforms, TRIANGLE_VERTICES},
        swapchain::SwapchainBundle,
        texture::Texture,
    },
};
use ash::{prelude::VkResult, vk, Device};
use std::sync::Arc;

/// Raw device objects owned by the renderer
///
/// Every handle starts null and is filled in as setup progresses. Destroying a
/// null handle is a no-op, so dropping a half-built set is safe.
struct DeviceObjects {
    context: Arc<VulkanContext>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    vertex_shader: vk::ShaderModule,
    fragment_shader: vk::ShaderModule,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
}

impl DeviceObjects {
    fn new(context: Arc<VulkanContext>) -> Self {
        Self {
            context,
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            vertex_shader: vk::ShaderModule::null(),
            fragment_shader: vk::ShaderModule::null(),
            descriptor_set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            descriptor_pool: vk::DescriptorPool::null(),
            descriptor_set: vk::DescriptorSet::null(),
            command_pool: vk::CommandPool::null(),
            command_buffers: Vec::new(),
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
        }
    }
}

impl Drop for DeviceObjects {
    fn drop(&mut self) {
        let device = self.context.device();
        unsafe {
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_semaphore(self.image_available, None);
            // Frees the command buffers and the descriptor set with them
            device.destroy_command_pool(self.command_pool, None);
            device.destroy_descriptor_pool(self.descriptor_pool, None);
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            device.destroy_shader_module(self.fragment_shader, None);
            device.destroy_shader_module(self.vertex_shader, None);
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Draws one textured triangle, rotating with elapsed time
///
/// Fields drop top to bottom: framebuffers and pipeline objects go before the
/// views they reference, and the context goes last.
pub struct TriangleRenderer {
    objects: DeviceObjects,
    depth_target: RenderTarget,
    texture: Texture,
    uniform_buffer: HostVisibleBuffer,
    vertex_buffer: HostVisibleBuffer,
    swapchain: SwapchainBundle,
    clear_color: [f32; 4],
    context: Arc<VulkanContext>,
}

impl TriangleRenderer {
    /// Build every resource the frame loop needs.
    ///
    /// `window_extent` is used only when the surface leaves the swapchain size
    /// up to the application.
    pub fn new(
        context: Arc<VulkanContext>,
        config: &DemoConfig,
        window_extent: vk::Extent2D,
    ) -> CrateResult<Self> {
        let swapchain = SwapchainBundle::new(context.clone(), window_extent)?;
        let extent = swapchain.extent();

        let depth_format = find_depth_format(context.instance(), context.physical_device())?;
        let depth_target =
            RenderTarget::depth(context.clone(), depth_format, extent.width, extent.height)?;
        log::info!("Depth attachment: {:?}", depth_format);

        let mut objects = DeviceObjects::new(context.clone());
        let device = context.device();

        objects.render_pass = create_render_pass(device, swapchain.format(), depth_format)?;
        for &color_view in swapchain.views() {
            let attachments = [color_view, depth_target.view()];
            let framebuffer = unsafe {
                device.create_framebuffer(
                    &vk::FramebufferCreateInfo::default()
                        .render_pass(objects.render_pass)
                        .attachments(&attachments)
                        .width(extent.width)
                        .height(extent.height)
                        .layers(1),
                    None,
                )?
            };
            objects.framebuffers.push(framebuffer);
        }

        objects.vertex_shader = load_shader_module(device, &config.vertex_shader)?;
        objects.fragment_shader = load_shader_module(device, &config.fragment_shader)?;
        objects.descriptor_set_layout = create_descriptor_set_layout(device)?;
        objects.pipeline_layout = create_pipeline_layout(device, objects.descriptor_set_layout)?;
        objects.pipeline = create_graphics_pipeline(
            device,
            objects.render_pass,
            objects.pipeline_layout,
            objects.vertex_shader,
            objects.fragment_shader,
        )?;

        let vertex_buffer = HostVisibleBuffer::with_data(
            context.clone(),
            bytemuck::cast_slice(&TRIANGLE_VERTICES),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let uniform_buffer = HostVisibleBuffer::new(
            context.clone(),
            std::mem::size_of::<TriangleUniforms>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;
        let texture = Texture::checkerboard(context.clone())?;

        objects.command_pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                    .queue_family_index(context.queue_family_index()),
                None,
            )?
        };
        objects.command_buffers = unsafe {
            device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(objects.command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(swapchain.image_count() as u32),
            )?
        };

        submit_once(&context, objects.command_pool, |command_buffer| {
            texture.record_layout_transition(command_buffer)
        })?;

        objects.descriptor_pool = create_descriptor_pool(device)?;
        objects.descriptor_set = allocate_descriptor_set(
            device,
            objects.descriptor_pool,
            objects.descriptor_set_layout,
        )?;
        write_descriptor_set(device, objects.descriptor_set, &uniform_buffer, &texture);

        objects.image_available =
            unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };
        objects.render_finished =
            unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)? };

        log::info!(
            "Renderer ready: {} swapchain images at {}x{}",
            swapchain.image_count(),
            extent.width,
            extent.height
        );

        Ok(Self {
            objects,
            depth_target,
            texture,
            uniform_buffer,
            vertex_buffer,
            swapchain,
            clear_color: config.clear_color,
            context,
        })
    }

    /// Render one frame with the triangle rotated by `elapsed_secs` radians.
    ///
    /// Returns only after the graphics queue has gone idle, so every resource
    /// is free for reuse by the next call.
    pub fn render_frame(&mut self, elapsed_secs: f32) -> CrateResult<()> {
        let image_index = self
            .swapchain
            .acquire_next_image(self.objects.image_available)?;
        let command_buffer = self.objects.command_buffers[image_index as usize];
        let framebuffer = self.objects.framebuffers[image_index as usize];
        let extent = self.swapchain.extent();
        let device = self.context.device();

        unsafe {
            device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(
                command_buffer,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;

            let clear_values = [
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: self.clear_color,
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                },
            ];
            let render_area = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_begin_render_pass(
                command_buffer,
                &vk::RenderPassBeginInfo::default()
                    .render_pass(self.objects.render_pass)
                    .framebuffer(framebuffer)
                    .render_area(render_area)
                    .clear_values(&clear_values),
                vk::SubpassContents::INLINE,
            );

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[render_area]);

            // Safe to overwrite: the previous frame drained the queue
            let aspect_ratio = extent.width as f32 / extent.height as f32;
            let uniforms = TriangleUniforms::at_time(elapsed_secs, aspect_ratio);
            self.uniform_buffer.write(bytemuck::bytes_of(&uniforms))?;

            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.objects.pipeline_layout,
                0,
                &[self.objects.descriptor_set],
                &[],
            );
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.objects.pipeline,
            );
            device.cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer.buffer()],
                &[0],
            );
            device.cmd_draw(command_buffer, TRIANGLE_VERTICES.len() as u32, 1, 0, 0);

            device.cmd_end_render_pass(command_buffer);
            device.end_command_buffer(command_buffer)?;

            let wait_semaphores = [self.objects.image_available];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let command_buffers = [command_buffer];
            let signal_semaphores = [self.objects.render_finished];
            device.queue_submit(
                self.context.queue(),
                &[vk::SubmitInfo::default()
                    .wait_semaphores(&wait_semaphores)
                    .wait_dst_stage_mask(&wait_stages)
                    .command_buffers(&command_buffers)
                    .signal_semaphores(&signal_semaphores)],
                vk::Fence::null(),
            )?;
        }

        self.swapchain.present(
            self.context.queue(),
            image_index,
            self.objects.render_finished,
        )?;

        // Drain the queue before the next frame touches the uniform buffer or semaphores
        self.context.wait_queue_idle()?;
        Ok(())
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn depth_target(&self) -> &RenderTarget {
        &self.depth_target
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }
}

impl Drop for TriangleRenderer {
    fn drop(&mut self) {
        if let Err(e) = unsafe { self.context.device().device_wait_idle() } {
            log::warn!("device_wait_idle failed before renderer teardown: {e}");
        }
    }
}

/// Single subpass with a cleared color attachment handed to presentation and a
/// cleared depth attachment discarded after the pass.
fn create_render_pass(
    device: &Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> VkResult<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];
    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    // The acquire semaphore is waited on at color output; depth clears happen earlier
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .dst_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )];

    unsafe {
        device.create_render_pass(
            &vk::RenderPassCreateInfo::default()
                .attachments(&attachments)
                .subpasses(&subpasses)
                .dependencies(&dependencies),
            None,
        )
    }
}

fn create_descriptor_pool(device: &Device) -> VkResult<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1),
        vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1),
    ];
    unsafe {
        device.create_descriptor_pool(
            &vk::DescriptorPoolCreateInfo::default()
                .max_sets(1)
                .pool_sizes(&pool_sizes),
            None,
        )
    }
}

fn allocate_descriptor_set(
    device: &Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
) -> VkResult<vk::DescriptorSet> {
    let set_layouts = [layout];
    let sets = unsafe {
        device.allocate_descriptor_sets(
            &vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&set_layouts),
        )?
    };
    sets.into_iter()
        .next()
        .ok_or(vk::Result::ERROR_OUT_OF_POOL_MEMORY)
}

fn write_descriptor_set(
    device: &Device,
    set: vk::DescriptorSet,
    uniform_buffer: &HostVisibleBuffer,
    texture: &Texture,
) {
    let buffer_infos = [vk::DescriptorBufferInfo::default()
        .buffer(uniform_buffer.buffer())
        .offset(0)
        .range(uniform_buffer.size())];
    let image_infos = [vk::DescriptorImageInfo::default()
        .sampler(texture.sampler())
        .image_view(texture.view())
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
    let writes = [
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_infos),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos),
    ];
    unsafe { device.update_descriptor_sets(&writes, &[]) };
}

/// Record commands with `record` into a temporary buffer, submit, and wait for completion.
fn submit_once(
    context: &VulkanContext,
    command_pool: vk::CommandPool,
    record: impl FnOnce(vk::CommandBuffer),
) -> VkResult<()> {
    let device = context.device();
    unsafe {
        let command_buffer = device
            .allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )?
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_OUT_OF_HOST_MEMORY)?;

        let result = (|| {
            device.begin_command_buffer(
                command_buffer,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;
            record(command_buffer);
            device.end_command_buffer(command_buffer)?;

            let command_buffers = [command_buffer];
            device.queue_submit(
                context.queue(),
                &[vk::SubmitInfo::default().command_buffers(&command_buffers)],
                vk::Fence::null(),
            )?;
            device.queue_wait_idle(context.queue())
        })();

        device.free_command_buffers(command_pool, &[command_buffer]);
        result
    }
}
