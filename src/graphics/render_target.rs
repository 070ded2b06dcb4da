//! Render targets: one GPU image, its device-local memory and its view(s)
//!
//! A target is built from a [`RenderTargetKind`] tag and a [`RenderTargetDesc`].
//! The tag fixes the image type, view type and aspect through a small static
//! table, so call sites cannot pair an array view with a 2D image or a depth
//! aspect with a color format's usage.
//!
//! Construction runs the same recipe for every kind:
//! 1. create the image
//! 2. allocate memory sized to its requirements and bind it
//! 3. create the whole-image view, plus one 2D view per layer for array targets
//!
//! Everything is released when the target is dropped. A failure part-way
//! through releases whatever was already created before the error is returned.

use crate::graphics::{
    context::{GraphicsContext, VulkanContext},
    error::GraphicsError,
    memory::{self, Allocation},
};
use ash::vk;
use std::sync::Arc;

/// Which flavour of render target to build
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderTargetKind {
    /// 2D image, one layer, one 2D color view
    Color,
    /// 2D image, one layer, one 2D depth view
    Depth,
    /// 2D image with N layers, one 2D-array view over all layers plus one 2D view per layer
    Texture2DArray,
}

struct KindLayout {
    image_type: vk::ImageType,
    view_type: vk::ImageViewType,
    aspect: vk::ImageAspectFlags,
    default_usage: vk::ImageUsageFlags,
    per_layer_views: bool,
}

const COLOR_LAYOUT: KindLayout = KindLayout {
    image_type: vk::ImageType::TYPE_2D,
    view_type: vk::ImageViewType::TYPE_2D,
    aspect: vk::ImageAspectFlags::COLOR,
    default_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
    per_layer_views: false,
};

const DEPTH_LAYOUT: KindLayout = KindLayout {
    image_type: vk::ImageType::TYPE_2D,
    view_type: vk::ImageViewType::TYPE_2D,
    aspect: vk::ImageAspectFlags::DEPTH,
    default_usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
    per_layer_views: false,
};

const TEXTURE_2D_ARRAY_LAYOUT: KindLayout = KindLayout {
    image_type: vk::ImageType::TYPE_2D,
    view_type: vk::ImageViewType::TYPE_2D_ARRAY,
    aspect: vk::ImageAspectFlags::COLOR,
    default_usage: vk::ImageUsageFlags::from_raw(
        vk::ImageUsageFlags::SAMPLED.as_raw() | vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw(),
    ),
    per_layer_views: true,
};

impl RenderTargetKind {
    fn layout(self) -> &'static KindLayout {
        match self {
            RenderTargetKind::Color => &COLOR_LAYOUT,
            RenderTargetKind::Depth => &DEPTH_LAYOUT,
            RenderTargetKind::Texture2DArray => &TEXTURE_2D_ARRAY_LAYOUT,
        }
    }

    pub fn image_type(self) -> vk::ImageType {
        self.layout().image_type
    }

    /// View type of the whole-image view.
    pub fn view_type(self) -> vk::ImageViewType {
        self.layout().view_type
    }

    pub fn aspect(self) -> vk::ImageAspectFlags {
        self.layout().aspect
    }

    /// Usage applied when the description does not override it.
    pub fn default_usage(self) -> vk::ImageUsageFlags {
        self.layout().default_usage
    }

    /// Whether each array layer also gets its own 2D view.
    pub fn has_layer_views(self) -> bool {
        self.layout().per_layer_views
    }
}

/// Creation parameters for a [`RenderTarget`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub format: vk::Format,
    pub width: u32,
    pub height: u32,
    /// Always 1 for the 2D kinds.
    pub depth: u32,
    pub array_layers: u32,
    /// `None` selects the kind's default usage.
    pub usage: Option<vk::ImageUsageFlags>,
    /// Properties the backing memory type must provide.
    pub memory_properties: vk::MemoryPropertyFlags,
}

impl RenderTargetDesc {
    /// A single-layer 2D description in device-local memory with the kind's default usage.
    pub fn new(format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            depth: 1,
            array_layers: 1,
            usage: None,
            memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }

    pub fn with_array_layers(self, array_layers: u32) -> Self {
        Self {
            array_layers,
            ..self
        }
    }

    pub fn with_usage(self, usage: vk::ImageUsageFlags) -> Self {
        Self {
            usage: Some(usage),
            ..self
        }
    }

    pub fn with_memory_properties(self, memory_properties: vk::MemoryPropertyFlags) -> Self {
        Self {
            memory_properties,
            ..self
        }
    }

    /// Check the description against the kind and resolve the usage it implies.
    pub fn validate(&self, kind: RenderTargetKind) -> Result<vk::ImageUsageFlags, GraphicsError> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(GraphicsError::InvalidDescription(
                "width, height and depth must be non-zero",
            ));
        }
        if self.array_layers == 0 {
            return Err(GraphicsError::InvalidDescription(
                "array layer count must be non-zero",
            ));
        }
        if kind.image_type() == vk::ImageType::TYPE_2D && self.depth != 1 {
            return Err(GraphicsError::InvalidDescription("2D targets have a depth of 1"));
        }
        if !kind.has_layer_views() && self.array_layers != 1 {
            return Err(GraphicsError::InvalidDescription(
                "color and depth targets have exactly one layer",
            ));
        }

        let usage = self.usage.unwrap_or_else(|| kind.default_usage());
        if usage.is_empty() {
            return Err(GraphicsError::InvalidDescription("usage must not be empty"));
        }
        let depth_usage = usage.contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        if kind.aspect().contains(vk::ImageAspectFlags::DEPTH) && !depth_usage {
            return Err(GraphicsError::InvalidDescription(
                "depth targets need depth-stencil attachment usage",
            ));
        }
        if kind.aspect().contains(vk::ImageAspectFlags::COLOR) && depth_usage {
            return Err(GraphicsError::InvalidDescription(
                "color targets cannot be depth-stencil attachments",
            ));
        }
        Ok(usage)
    }
}

/// A GPU image with its own memory block and view(s)
///
/// Immutable after construction; the only operations are read accessors and drop.
pub struct RenderTarget<C: GraphicsContext = VulkanContext> {
    context: Arc<C>,
    kind: RenderTargetKind,
    format: vk::Format,
    extent: vk::Extent3D,
    array_layers: u32,
    usage: vk::ImageUsageFlags,
    image: vk::Image,
    allocation: Option<Allocation>,
    view: vk::ImageView,
    layer_views: Vec<vk::ImageView>,
}

impl<C: GraphicsContext> RenderTarget<C> {
    /// Build a target of `kind` described by `desc`.
    pub fn new(
        context: Arc<C>,
        kind: RenderTargetKind,
        desc: &RenderTargetDesc,
    ) -> Result<Self, GraphicsError> {
        let usage = desc.validate(kind)?;
        let extent = vk::Extent3D {
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
        };

        let image = context
            .create_image(
                &vk::ImageCreateInfo::default()
                    .image_type(kind.image_type())
                    .format(desc.format)
                    .extent(extent)
                    .mip_levels(1)
                    .array_layers(desc.array_layers)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .tiling(vk::ImageTiling::OPTIMAL)
                    .usage(usage)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .initial_layout(vk::ImageLayout::UNDEFINED),
            )
            .map_err(GraphicsError::ImageCreationFailed)?;

        // From here on, dropping `target` releases whatever has been created so far.
        let mut target = Self {
            context,
            kind,
            format: desc.format,
            extent,
            array_layers: desc.array_layers,
            usage,
            image,
            allocation: None,
            view: vk::ImageView::null(),
            layer_views: Vec::new(),
        };

        let requirements = target.context.image_memory_requirements(image);
        let allocation = memory::allocate(&*target.context, &requirements, desc.memory_properties)?;
        target.allocation = Some(allocation);
        target
            .context
            .bind_image_memory(image, allocation.memory, 0)
            .map_err(GraphicsError::MemoryBindFailed)?;

        target.view = target.create_view(kind.view_type(), 0, desc.array_layers)?;

        if kind.has_layer_views() {
            target.layer_views.reserve(desc.array_layers as usize);
            for layer in 0..desc.array_layers {
                let view = target.create_view(vk::ImageViewType::TYPE_2D, layer, 1)?;
                target.layer_views.push(view);
            }
        }

        log::debug!(
            "created {:?} render target {}x{}x{} ({} layers, {:?}, {} bytes)",
            kind,
            extent.width,
            extent.height,
            extent.depth,
            target.array_layers,
            target.format,
            allocation.size
        );

        Ok(target)
    }

    /// 2D color target with the default color-attachment usage.
    pub fn color(
        context: Arc<C>,
        format: vk::Format,
        width: u32,
        height: u32,
    ) -> Result<Self, GraphicsError> {
        Self::new(
            context,
            RenderTargetKind::Color,
            &RenderTargetDesc::new(format, width, height),
        )
    }

    /// 2D depth target with the default depth-stencil-attachment usage.
    pub fn depth(
        context: Arc<C>,
        format: vk::Format,
        width: u32,
        height: u32,
    ) -> Result<Self, GraphicsError> {
        Self::new(
            context,
            RenderTargetKind::Depth,
            &RenderTargetDesc::new(format, width, height),
        )
    }

    /// Layered color target with the default sampled + color-attachment usage.
    pub fn texture_2d_array(
        context: Arc<C>,
        format: vk::Format,
        width: u32,
        height: u32,
        array_layers: u32,
    ) -> Result<Self, GraphicsError> {
        Self::new(
            context,
            RenderTargetKind::Texture2DArray,
            &RenderTargetDesc::new(format, width, height).with_array_layers(array_layers),
        )
    }

    fn create_view(
        &self,
        view_type: vk::ImageViewType,
        base_layer: u32,
        layer_count: u32,
    ) -> Result<vk::ImageView, GraphicsError> {
        self.context
            .create_image_view(
                &vk::ImageViewCreateInfo::default()
                    .image(self.image)
                    .view_type(view_type)
                    .format(self.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::R,
                        g: vk::ComponentSwizzle::G,
                        b: vk::ComponentSwizzle::B,
                        a: vk::ComponentSwizzle::A,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: self.kind.aspect(),
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: base_layer,
                        layer_count,
                    }),
            )
            .map_err(|result| GraphicsError::ViewCreationFailed {
                base_layer,
                layer_count,
                result,
            })
    }

    pub fn kind(&self) -> RenderTargetKind {
        self.kind
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.extent.width
    }

    pub fn height(&self) -> u32 {
        self.extent.height
    }

    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.usage
    }

    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.kind.aspect()
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// The view over every layer of the image.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// One 2D view per array layer, indexed by layer; empty for non-array kinds.
    pub fn layer_views(&self) -> &[vk::ImageView] {
        &self.layer_views
    }

    /// Whole-image view plus per-layer views.
    pub fn view_count(&self) -> usize {
        1 + self.layer_views.len()
    }

    pub fn memory(&self) -> vk::DeviceMemory {
        self.allocation
            .map(|a| a.memory)
            .unwrap_or_else(vk::DeviceMemory::null)
    }

    /// Size of the backing allocation; never less than the image's requirement.
    pub fn memory_size(&self) -> vk::DeviceSize {
        self.allocation.map(|a| a.size).unwrap_or(0)
    }

    pub fn memory_type_index(&self) -> Option<u32> {
        self.allocation.map(|a| a.memory_type_index)
    }
}

impl<C: GraphicsContext> Drop for RenderTarget<C> {
    fn drop(&mut self) {
        for view in self.layer_views.drain(..) {
            self.context.destroy_image_view(view);
        }
        if self.view != vk::ImageView::null() {
            self.context.destroy_image_view(self.view);
        }
        self.context.destroy_image(self.image);
        if let Some(allocation) = self.allocation.take() {
            self.context.free_memory(allocation.memory);
        }
    }
}

impl<C: GraphicsContext> std::fmt::Debug for RenderTarget<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("extent", &self.extent)
            .field("array_layers", &self.array_layers)
            .field("usage", &self.usage)
            .field("image", &self.image)
            .field("views", &self.view_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_table_matches_variants() {
        use RenderTargetKind::*;

        assert_eq!(Color.view_type(), vk::ImageViewType::TYPE_2D);
        assert_eq!(Color.aspect(), vk::ImageAspectFlags::COLOR);
        assert_eq!(Color.default_usage(), vk::ImageUsageFlags::COLOR_ATTACHMENT);
        assert!(!Color.has_layer_views());

        assert_eq!(Depth.view_type(), vk::ImageViewType::TYPE_2D);
        assert_eq!(Depth.aspect(), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            Depth.default_usage(),
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        );
        assert!(!Depth.has_layer_views());

        assert_eq!(Texture2DArray.view_type(), vk::ImageViewType::TYPE_2D_ARRAY);
        assert_eq!(Texture2DArray.aspect(), vk::ImageAspectFlags::COLOR);
        assert_eq!(
            Texture2DArray.default_usage(),
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::COLOR_ATTACHMENT
        );
        assert!(Texture2DArray.has_layer_views());

        for kind in [Color, Depth, Texture2DArray] {
            assert_eq!(kind.image_type(), vk::ImageType::TYPE_2D);
        }
    }

    #[test]
    fn validate_resolves_default_usage() {
        let desc = RenderTargetDesc::new(vk::Format::R8G8B8A8_UNORM, 64, 64);
        assert_eq!(
            desc.validate(RenderTargetKind::Color),
            Ok(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        );

        let sampled = desc.with_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED);
        assert_eq!(
            sampled.validate(RenderTargetKind::Color),
            Ok(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED)
        );
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let zero_width = RenderTargetDesc::new(vk::Format::R8G8B8A8_UNORM, 0, 64);
        let zero_height = RenderTargetDesc::new(vk::Format::R8G8B8A8_UNORM, 64, 0);
        let zero_layers = RenderTargetDesc::new(vk::Format::R8G8B8A8_UNORM, 64, 64).with_array_layers(0);
        for desc in [zero_width, zero_height] {
            assert!(matches!(
                desc.validate(RenderTargetKind::Color),
                Err(GraphicsError::InvalidDescription(_))
            ));
        }
        assert!(matches!(
            zero_layers.validate(RenderTargetKind::Texture2DArray),
            Err(GraphicsError::InvalidDescription(_))
        ));
    }

    #[test]
    fn validate_rejects_layered_single_layer_kinds() {
        let desc = RenderTargetDesc::new(vk::Format::R8G8B8A8_UNORM, 64, 64).with_array_layers(2);
        assert!(desc.validate(RenderTargetKind::Color).is_err());
        assert!(desc.validate(RenderTargetKind::Texture2DArray).is_ok());

        let thick = RenderTargetDesc {
            depth: 2,
            ..RenderTargetDesc::new(vk::Format::R8G8B8A8_UNORM, 64, 64)
        };
        assert!(thick.validate(RenderTargetKind::Color).is_err());
    }

    #[test]
    fn validate_checks_aspect_against_usage() {
        let depth_as_sampled = RenderTargetDesc::new(vk::Format::D32_SFLOAT, 64, 64)
            .with_usage(vk::ImageUsageFlags::SAMPLED);
        assert!(depth_as_sampled.validate(RenderTargetKind::Depth).is_err());

        let color_as_depth = RenderTargetDesc::new(vk::Format::R8G8B8A8_UNORM, 64, 64)
            .with_usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
        assert!(color_as_depth.validate(RenderTargetKind::Color).is_err());

        let empty = RenderTargetDesc::new(vk::Format::R8G8B8A8_UNORM, 64, 64)
            .with_usage(vk::ImageUsageFlags::empty());
        assert!(empty.validate(RenderTargetKind::Color).is_err());
    }
}
