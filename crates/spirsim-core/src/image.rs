//! Image descriptors, pixel formats, samplers and the image handle table
//!
//! Images live in global memory as tightly packed texels:
//!
//! ```text
//! texel(i, j, k, layer) = address
//!     + (i + (j + (k + layer * depth) * height) * width) * pixel_size
//! ```
//!
//! Kernel code never sees an [`Image`] directly. The register file carries
//! an opaque [`ImageHandle`], and builtins resolve it through the
//! [`ImageTable`] owned by the work-item environment.

use crate::error::{Result, SimError};
use std::collections::HashMap;

// ================================================================================================
// Channel Formats
// ================================================================================================

/// Channel order of an image format. Discriminants are the OpenCL values
/// reported by `get_image_channel_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChannelOrder {
    R = 0x10B0,
    A = 0x10B1,
    Rg = 0x10B2,
    Ra = 0x10B3,
    Rgb = 0x10B4,
    Rgba = 0x10B5,
    Bgra = 0x10B6,
    Argb = 0x10B7,
    Intensity = 0x10B8,
    Luminance = 0x10B9,
    Rx = 0x10BA,
    Rgx = 0x10BB,
    Rgbx = 0x10BC,
}

impl ChannelOrder {
    pub fn from_raw(raw: u32) -> Option<Self> {
        use ChannelOrder::*;
        [R, A, Rg, Ra, Rgb, Rgba, Bgra, Argb, Intensity, Luminance, Rx, Rgx, Rgbx]
            .into_iter()
            .find(|order| *order as u32 == raw)
    }

    /// Channels stored per texel.
    pub fn num_channels(self) -> usize {
        match self {
            Self::R | Self::Rx | Self::A | Self::Intensity | Self::Luminance => 1,
            Self::Rg | Self::Rgx | Self::Ra => 2,
            Self::Rgb | Self::Rgbx => 3,
            Self::Rgba | Self::Argb | Self::Bgra => 4,
        }
    }

    /// Whether out-of-range reads return alpha 0 (else alpha is 1).
    pub fn has_zero_alpha_border(self) -> bool {
        !matches!(self, Self::R | Self::Rg | Self::Rgb | Self::Luminance)
    }
}

/// Storage type of one channel. Discriminants are the OpenCL values
/// reported by `get_image_channel_data_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChannelType {
    SnormInt8 = 0x10D0,
    SnormInt16 = 0x10D1,
    UnormInt8 = 0x10D2,
    UnormInt16 = 0x10D3,
    SignedInt8 = 0x10D7,
    SignedInt16 = 0x10D8,
    SignedInt32 = 0x10D9,
    UnsignedInt8 = 0x10DA,
    UnsignedInt16 = 0x10DB,
    UnsignedInt32 = 0x10DC,
    HalfFloat = 0x10DD,
    Float = 0x10DE,
}

impl ChannelType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        use ChannelType::*;
        [
            SnormInt8,
            SnormInt16,
            UnormInt8,
            UnormInt16,
            SignedInt8,
            SignedInt16,
            SignedInt32,
            UnsignedInt8,
            UnsignedInt16,
            UnsignedInt32,
            HalfFloat,
            Float,
        ]
        .into_iter()
        .find(|ty| *ty as u32 == raw)
    }

    /// Bytes per channel.
    pub fn size(self) -> usize {
        match self {
            Self::SnormInt8 | Self::UnormInt8 | Self::SignedInt8 | Self::UnsignedInt8 => 1,
            Self::SnormInt16 | Self::UnormInt16 | Self::SignedInt16 | Self::UnsignedInt16 | Self::HalfFloat => 2,
            Self::SignedInt32 | Self::UnsignedInt32 | Self::Float => 4,
        }
    }
}

/// Channel order × channel data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageFormat {
    pub order: ChannelOrder,
    pub data_type: ChannelType,
}

impl ImageFormat {
    pub fn new(order: ChannelOrder, data_type: ChannelType) -> Self {
        Self { order, data_type }
    }

    /// Build a format from raw OpenCL enum values.
    pub fn from_raw(order: u32, data_type: u32) -> Result<Self> {
        match (ChannelOrder::from_raw(order), ChannelType::from_raw(data_type)) {
            (Some(order), Some(data_type)) => Ok(Self { order, data_type }),
            _ => Err(SimError::UnsupportedImageFormat { order, data_type }),
        }
    }

    pub fn channel_size(&self) -> usize {
        self.data_type.size()
    }

    pub fn num_channels(&self) -> usize {
        self.order.num_channels()
    }

    pub fn pixel_size(&self) -> usize {
        self.channel_size() * self.num_channels()
    }
}

// ================================================================================================
// Geometry
// ================================================================================================

/// Image dimensionality. Discriminants are the OpenCL memory object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ImageType {
    Image2D = 0x10F1,
    Image3D = 0x10F2,
    Image2DArray = 0x10F3,
    Image1D = 0x10F4,
    Image1DArray = 0x10F5,
    Image1DBuffer = 0x10F6,
}

/// Image extents. Unused dimensions are 1 so texel addressing stays uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub image_type: ImageType,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub array_size: usize,
}

impl ImageDesc {
    pub fn image_1d(width: usize) -> Self {
        Self::new(ImageType::Image1D, width, 1, 1, 1)
    }

    pub fn image_1d_array(width: usize, array_size: usize) -> Self {
        Self::new(ImageType::Image1DArray, width, 1, 1, array_size)
    }

    pub fn image_2d(width: usize, height: usize) -> Self {
        Self::new(ImageType::Image2D, width, height, 1, 1)
    }

    pub fn image_2d_array(width: usize, height: usize, array_size: usize) -> Self {
        Self::new(ImageType::Image2DArray, width, height, 1, array_size)
    }

    pub fn image_3d(width: usize, height: usize, depth: usize) -> Self {
        Self::new(ImageType::Image3D, width, height, depth, 1)
    }

    /// Descriptor with zero extents raised to 1.
    pub fn new(image_type: ImageType, width: usize, height: usize, depth: usize, array_size: usize) -> Self {
        Self {
            image_type,
            width: width.max(1),
            height: height.max(1),
            depth: depth.max(1),
            array_size: array_size.max(1),
        }
    }

    pub fn is_1d(&self) -> bool {
        matches!(
            self.image_type,
            ImageType::Image1D | ImageType::Image1DArray | ImageType::Image1DBuffer
        )
    }

    pub fn is_2d(&self) -> bool {
        matches!(self.image_type, ImageType::Image2D | ImageType::Image2DArray)
    }
}

/// An image stored in global memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image {
    /// Base address of texel (0, 0, 0) in global memory.
    pub address: u64,
    pub format: ImageFormat,
    pub desc: ImageDesc,
}

impl Image {
    pub fn new(address: u64, format: ImageFormat, desc: ImageDesc) -> Self {
        Self { address, format, desc }
    }

    /// Bytes occupied by every texel of every layer.
    pub fn byte_size(&self) -> usize {
        self.format.pixel_size() * self.desc.width * self.desc.height * self.desc.depth * self.desc.array_size
    }

    /// Address of channel `channel` of the texel at `(i, j, k)` in `layer`.
    ///
    /// Coordinates must already be in range.
    pub fn texel_address(&self, i: usize, j: usize, k: usize, layer: usize, channel: usize) -> u64 {
        let desc = &self.desc;
        let index = i + (j + (k + layer * desc.depth) * desc.height) * desc.width;
        self.address + (index * self.format.pixel_size() + channel * self.format.channel_size()) as u64
    }
}

// ================================================================================================
// Samplers
// ================================================================================================

pub const CLK_NORMALIZED_COORDS_TRUE: u32 = 0x0001;
pub const CLK_ADDRESS_NONE: u32 = 0x0000;
pub const CLK_ADDRESS_CLAMP_TO_EDGE: u32 = 0x0002;
pub const CLK_ADDRESS_CLAMP: u32 = 0x0004;
pub const CLK_ADDRESS_REPEAT: u32 = 0x0006;
pub const CLK_ADDRESS_MIRRORED_REPEAT: u32 = 0x0008;
pub const CLK_ADDRESS_MASK: u32 = 0x000E;
pub const CLK_FILTER_NEAREST: u32 = 0x0010;
pub const CLK_FILTER_LINEAR: u32 = 0x0020;

/// What happens to coordinates outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    None,
    ClampToEdge,
    Clamp,
    Repeat,
    MirroredRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Decoded sampler bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampler {
    pub normalized: bool,
    pub addressing: AddressingMode,
    pub filter: FilterMode,
}

impl Default for Sampler {
    /// Sampler used by the sampler-less `read_image*` overloads.
    fn default() -> Self {
        Self {
            normalized: false,
            addressing: AddressingMode::None,
            filter: FilterMode::Nearest,
        }
    }
}

impl Sampler {
    pub fn from_bits(bits: u32) -> Result<Self> {
        let addressing = match bits & CLK_ADDRESS_MASK {
            CLK_ADDRESS_NONE => AddressingMode::None,
            CLK_ADDRESS_CLAMP_TO_EDGE => AddressingMode::ClampToEdge,
            CLK_ADDRESS_CLAMP => AddressingMode::Clamp,
            CLK_ADDRESS_REPEAT => AddressingMode::Repeat,
            CLK_ADDRESS_MIRRORED_REPEAT => AddressingMode::MirroredRepeat,
            _ => return Err(SimError::UnsupportedSampler(bits)),
        };
        let filter = if bits & CLK_FILTER_LINEAR != 0 {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        };
        Ok(Self {
            normalized: bits & CLK_NORMALIZED_COORDS_TRUE != 0,
            addressing,
            filter,
        })
    }
}

// ================================================================================================
// Image Table
// ================================================================================================

/// Opaque image reference carried in registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u64);

/// Registry of images visible to a kernel launch.
#[derive(Debug, Default, Clone)]
pub struct ImageTable {
    images: HashMap<ImageHandle, Image>,
    next_handle: u64,
}

impl ImageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image and return its handle. Handles start at 1.
    pub fn register(&mut self, image: Image) -> ImageHandle {
        self.next_handle += 1;
        let handle = ImageHandle(self.next_handle);
        self.images.insert(handle, image);
        handle
    }

    pub fn remove(&mut self, handle: ImageHandle) -> Option<Image> {
        self.images.remove(&handle)
    }

    pub fn get(&self, handle: ImageHandle) -> Result<&Image> {
        self.images.get(&handle).ok_or(SimError::InvalidImage(handle.0))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
