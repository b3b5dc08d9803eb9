//! Image builtins: `read_image*`, `write_image*` and `get_image_*` queries
//!
//! Sampling follows the OpenCL sampler rules in single precision:
//!
//! 1. Normalized coordinates are scaled by the image extents.
//! 2. Array images take the layer from the last coordinate, rounded and
//!    clamped to the array size.
//! 3. Nearest filtering picks one texel; linear filtering blends the 2, 4
//!    or 8 surrounding texels.
//! 4. Texels outside the image read as the border color: all zero, except
//!    alpha is 1.0 for orders without an alpha channel.
//!
//! Channels missing from the stored order are filled in the same way as a
//! device would (`0, 0, 0, 1` for `R`, alpha-only for `A`, and so on).

use super::call::Call;
use super::registry::{Builtin, BuiltinRegistry};
use crate::error::{Result, SimError};
use crate::fenv;
use crate::image::{AddressingMode, ChannelOrder, ChannelType, FilterMode, Image, ImageType, Sampler};
use crate::memory::AddressSpace;
use crate::value::TypedValue;
use half::f16;
use tracing::warn;

// ================================================================================================
// Coordinates
// ================================================================================================

/// Sampling position after normalization and layer extraction.
#[derive(Debug, Clone, Copy)]
struct Coords {
    /// Coordinates as passed (normalized or not).
    n: [f32; 3],
    /// Unnormalized coordinates.
    u: [f32; 3],
    layer: i64,
}

fn extents(image: &Image) -> [i64; 3] {
    [image.desc.width as i64, image.desc.height as i64, image.desc.depth as i64]
}

fn coordinate(call: &Call<'_>, index: usize, lane: usize, kind: char) -> Result<f32> {
    match kind {
        'i' => Ok(call.sint(index, lane)? as f32),
        'f' => Ok(call.float(index, lane)? as f32),
        _ => Err(call.unsupported()),
    }
}

fn read_coords(call: &Call<'_>, image: &Image, sampler: &Sampler, index: usize) -> Result<Coords> {
    let kind = call.overload().chars().last().unwrap_or_default();
    let width = if call.is_vector(index) { call.width(index)? } else { 1 };

    let mut n = [0.0f32; 3];
    for (lane, slot) in n.iter_mut().enumerate().take(width.min(3)) {
        *slot = coordinate(call, index, lane, kind)?;
    }

    let size = extents(image);
    let mut u = n;
    if sampler.normalized {
        for dim in 0..3 {
            u[dim] = n[dim] * size[dim] as f32;
        }
    }

    let last_layer = image.desc.array_size as i64 - 1;
    let mut layer = 0;
    let layer_dim = match image.desc.image_type {
        ImageType::Image1DArray => Some(1),
        ImageType::Image2DArray => Some(2),
        _ => None,
    };
    if let Some(dim) = layer_dim {
        layer = (n[dim].round_ties_even() as i64).clamp(0, last_layer);
        n[dim] = 0.0;
        u[dim] = 0.0;
    }

    Ok(Coords { n, u, layer })
}

fn nearest(addressing: AddressingMode, n: f32, u: f32, size: i64) -> i64 {
    match addressing {
        AddressingMode::None => u.floor() as i64,
        AddressingMode::ClampToEdge => (u.floor() as i64).clamp(0, size - 1),
        AddressingMode::Clamp => (u.floor() as i64).clamp(-1, size),
        AddressingMode::Repeat => (((n - n.floor()) * size as f32).floor() as i64) % size,
        AddressingMode::MirroredRepeat => {
            let mirrored = (n - 2.0 * (0.5 * n).round_ties_even()).abs();
            ((mirrored * size as f32).floor() as i64).min(size - 1)
        }
    }
}

/// Texels either side of `u` and the (possibly rewritten) unnormalized coordinate.
fn adjacent(addressing: AddressingMode, n: f32, u: f32, size: i64) -> (f32, i64, i64) {
    match addressing {
        AddressingMode::None => (u, u.floor() as i64, u.floor() as i64 + 1),
        AddressingMode::ClampToEdge => {
            let base = (u - 0.5).floor() as i64;
            (u, base.clamp(0, size - 1), (base + 1).clamp(0, size - 1))
        }
        AddressingMode::Clamp => {
            let base = (u - 0.5).floor() as i64;
            (u, base.clamp(-1, size), (base + 1).clamp(-1, size))
        }
        AddressingMode::Repeat => {
            let u = (n - n.floor()) * size as f32;
            let mut c0 = (u - 0.5).floor() as i64;
            let mut c1 = c0 + 1;
            if c0 < 0 {
                c0 += size;
            }
            if c1 >= size {
                c1 -= size;
            }
            (u, c0, c1)
        }
        AddressingMode::MirroredRepeat => {
            let u = (n - 2.0 * (0.5 * n).round_ties_even()).abs() * size as f32;
            let c0 = (u - 0.5).floor() as i64;
            (u, c0.max(0), (c0 + 1).min(size - 1))
        }
    }
}

fn frac(x: f32) -> f32 {
    x - x.floor()
}

// ================================================================================================
// Texel Access
// ================================================================================================

/// Where an output channel comes from.
enum Source {
    Stored(usize),
    Constant(f32),
}

fn input_channel(order: ChannelOrder, output: usize) -> Source {
    use ChannelOrder::*;
    match (order, output) {
        (R | Rx, 1 | 2) | (Rg | Rgx, 2) => Source::Constant(0.0),
        (R | Rx | Rg | Rgx | Rgb | Rgbx, 3) => Source::Constant(1.0),
        (Bgra, 0) => Source::Stored(2),
        (Bgra, 2) => Source::Stored(0),
        (Argb, c) => Source::Stored((c + 1) % 4),
        (A, 3) => Source::Stored(0),
        (A, _) => Source::Constant(0.0),
        (Ra, 3) => Source::Stored(1),
        (Ra, 1 | 2) => Source::Constant(0.0),
        (Intensity, _) => Source::Stored(0),
        (Luminance, 3) => Source::Constant(1.0),
        (Luminance, _) => Source::Stored(0),
        (_, c) => Source::Stored(c),
    }
}

/// Raw channel bytes, or the value to report without touching memory.
enum Fetch {
    Bytes([u8; 4]),
    Constant(f32),
}

fn fetch(call: &Call<'_>, image: &Image, pos: [i64; 3], layer: i64, output: usize) -> Result<Fetch> {
    let size = extents(image);
    if (0..3).any(|dim| pos[dim] < 0 || pos[dim] >= size[dim]) {
        let alpha = output == 3 && !image.format.order.has_zero_alpha_border();
        return Ok(Fetch::Constant(if alpha { 1.0 } else { 0.0 }));
    }

    let channel = match input_channel(image.format.order, output) {
        Source::Stored(channel) => channel,
        Source::Constant(value) => return Ok(Fetch::Constant(value)),
    };

    let address = image.texel_address(pos[0] as usize, pos[1] as usize, pos[2] as usize, layer as usize, channel);
    let mut bytes = [0u8; 4];
    // A failed load has been reported by the memory; the channel reads as zero.
    if call
        .memory(AddressSpace::Global)?
        .load(&mut bytes[..image.format.channel_size()], address)
        .is_err()
    {
        return Ok(Fetch::Constant(0.0));
    }
    Ok(Fetch::Bytes(bytes))
}

fn unsupported_format(image: &Image) -> SimError {
    SimError::UnsupportedImageFormat {
        order: image.format.order as u32,
        data_type: image.format.data_type as u32,
    }
}

fn read_normalized(call: &Call<'_>, image: &Image, pos: [i64; 3], layer: i64, output: usize) -> Result<f32> {
    let bytes = match fetch(call, image, pos, layer, output)? {
        Fetch::Constant(value) => return Ok(value),
        Fetch::Bytes(bytes) => bytes,
    };
    let half_word = u16::from_le_bytes([bytes[0], bytes[1]]);
    Ok(match image.format.data_type {
        ChannelType::SnormInt8 => (bytes[0] as i8 as f32 / 127.0).clamp(-1.0, 1.0),
        ChannelType::UnormInt8 => (bytes[0] as f32 / 255.0).clamp(0.0, 1.0),
        ChannelType::SnormInt16 => (half_word as i16 as f32 / 32767.0).clamp(-1.0, 1.0),
        ChannelType::UnormInt16 => (half_word as f32 / 65535.0).clamp(0.0, 1.0),
        ChannelType::Float => f32::from_le_bytes(bytes),
        ChannelType::HalfFloat => f16::from_bits(half_word).to_f32(),
        _ => return Err(unsupported_format(image)),
    })
}

fn read_signed(call: &Call<'_>, image: &Image, pos: [i64; 3], layer: i64, output: usize) -> Result<i32> {
    let bytes = match fetch(call, image, pos, layer, output)? {
        Fetch::Constant(value) => return Ok(value as i32),
        Fetch::Bytes(bytes) => bytes,
    };
    Ok(match image.format.data_type {
        ChannelType::SignedInt8 => bytes[0] as i8 as i32,
        ChannelType::SignedInt16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        ChannelType::SignedInt32 => i32::from_le_bytes(bytes),
        _ => return Err(unsupported_format(image)),
    })
}

fn read_unsigned(call: &Call<'_>, image: &Image, pos: [i64; 3], layer: i64, output: usize) -> Result<u32> {
    let bytes = match fetch(call, image, pos, layer, output)? {
        Fetch::Constant(value) => return Ok(value as u32),
        Fetch::Bytes(bytes) => bytes,
    };
    Ok(match image.format.data_type {
        ChannelType::UnsignedInt8 => bytes[0] as u32,
        ChannelType::UnsignedInt16 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
        ChannelType::UnsignedInt32 => u32::from_le_bytes(bytes),
        _ => return Err(unsupported_format(image)),
    })
}

// ================================================================================================
// Reads
// ================================================================================================

/// Image, sampler and coordinates of a `read_image*` call.
fn sample_args(call: &Call<'_>) -> Result<(Image, Sampler, Coords)> {
    let image = *call.image(0)?;
    let (sampler, index) = if call.operand_count() > 2 {
        (Sampler::from_bits(call.uint(1, 0)? as u32)?, 2)
    } else {
        (Sampler::default(), 1)
    };
    let coords = read_coords(call, &image, &sampler, index)?;
    Ok((image, sampler, coords))
}

fn nearest_texel(image: &Image, sampler: &Sampler, coords: &Coords) -> [i64; 3] {
    let size = extents(image);
    let mut pos = [0; 3];
    for dim in 0..3 {
        pos[dim] = nearest(sampler.addressing, coords.n[dim], coords.u[dim], size[dim]);
    }
    pos
}

fn read_imagef(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let (image, sampler, coords) = sample_args(call)?;

    if sampler.filter == FilterMode::Nearest {
        let pos = nearest_texel(&image, &sampler, &coords);
        for c in 0..4 {
            result.set_float(c, read_normalized(call, &image, pos, coords.layer, c)? as f64);
        }
        return Ok(());
    }

    let size = extents(&image);
    let mut u = [0.0f32; 3];
    let mut lo = [0i64; 3];
    let mut hi = [0i64; 3];
    for dim in 0..3 {
        (u[dim], lo[dim], hi[dim]) = adjacent(sampler.addressing, coords.n[dim], coords.u[dim], size[dim]);
    }

    // Dimensions the image does not have always sample row/slice 0.
    let used = if image.desc.is_1d() {
        1
    } else if image.desc.is_2d() {
        2
    } else {
        3
    };
    for dim in used..3 {
        lo[dim] = 0;
        hi[dim] = 0;
    }

    let a = frac(u[0] - 0.5);
    let b = frac(u[1] - 0.5);
    let g = frac(u[2] - 0.5);
    for c in 0..4 {
        let mut value = 0.0f32;
        for corner in 0..8 {
            let pick = |bit: usize, dim: usize| if corner & bit != 0 { hi[dim] } else { lo[dim] };
            let weight = |bit: usize, t: f32| if corner & bit != 0 { t } else { 1.0 - t };
            let pos = [pick(1, 0), pick(2, 1), pick(4, 2)];
            let texel = read_normalized(call, &image, pos, coords.layer, c)?;
            value += weight(1, a) * weight(2, b) * weight(4, g) * texel;
        }
        result.set_float(c, value as f64);
    }
    Ok(())
}

fn read_imagei(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let (image, sampler, coords) = sample_args(call)?;
    let pos = nearest_texel(&image, &sampler, &coords);
    for c in 0..4 {
        result.set_sint(c, read_signed(call, &image, pos, coords.layer, c)? as i64);
    }
    Ok(())
}

fn read_imageui(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let (image, sampler, coords) = sample_args(call)?;
    let pos = nearest_texel(&image, &sampler, &coords);
    for c in 0..4 {
        result.set_uint(c, read_unsigned(call, &image, pos, coords.layer, c)? as u64);
    }
    Ok(())
}

// ================================================================================================
// Writes
// ================================================================================================

/// Put `values` (RGBA) in the image's storage order.
fn reorder<T: Copy>(order: ChannelOrder, values: &mut [T; 4]) {
    match order {
        ChannelOrder::A => values[0] = values[3],
        ChannelOrder::Ra => values[1] = values[3],
        ChannelOrder::Argb => values.rotate_right(1),
        ChannelOrder::Bgra => values.swap(0, 2),
        _ => {}
    }
}

/// Store one quantized texel at the integer coordinate in argument 1.
fn write_texel<T: Copy>(
    call: &Call<'_>,
    image: &Image,
    mut values: [T; 4],
    quantize: impl Fn(T, ChannelType, &mut [u8]) -> Result<()>,
) -> Result<()> {
    let mut pos = [0i64; 3];
    pos[0] = call.sint(1, 0)?;
    if call.is_vector(1) {
        pos[1] = call.sint(1, 1)?;
        if call.width(1)? > 2 {
            pos[2] = call.sint(1, 2)?;
        }
    }

    // The layer of an array image is the coordinate after the last dimension.
    let pixel_size = image.format.pixel_size();
    let desc = &image.desc;
    let size = match desc.image_type {
        ImageType::Image1DArray => [desc.width, desc.array_size, 1],
        ImageType::Image2DArray => [desc.width, desc.height, desc.array_size],
        _ => [desc.width, desc.height, desc.depth],
    }
    .map(|extent| extent as i64);
    if (0..3).any(|dim| pos[dim] < 0 || pos[dim] >= size[dim]) {
        warn!(builtin = call.name(), x = pos[0], y = pos[1], z = pos[2], "image write out of bounds");
        return Err(SimError::invalid_address(AddressSpace::Global, image.address, pixel_size as u64));
    }

    reorder(image.format.order, &mut values);
    let channel_size = image.format.channel_size();
    let mut texel = [0u8; 16];
    for (c, value) in values.iter().take(image.format.num_channels()).enumerate() {
        quantize(*value, image.format.data_type, &mut texel[c * channel_size..(c + 1) * channel_size])?;
    }

    let address = image.texel_address(pos[0] as usize, pos[1] as usize, pos[2] as usize, 0, 0);
    call.memory(AddressSpace::Global)?.store(&texel[..pixel_size], address)
}

fn write_imagef(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    let image = *call.image(0)?;
    let mut values = [0.0f32; 4];
    for (c, value) in values.iter_mut().enumerate() {
        *value = call.float(2, c)? as f32;
    }
    let unsupported = unsupported_format(&image);
    write_texel(call, &image, values, |v, ty, out| {
        let quantized = |scale: f32, lo: f32, hi: f32| fenv::rint((v * scale).clamp(lo, hi) as f64);
        match ty {
            ChannelType::SnormInt8 => out[0] = quantized(127.0, -128.0, 127.0) as i8 as u8,
            ChannelType::UnormInt8 => out[0] = quantized(255.0, 0.0, 255.0) as u8,
            ChannelType::SnormInt16 => out.copy_from_slice(&(quantized(32767.0, -32768.0, 32767.0) as i16).to_le_bytes()),
            ChannelType::UnormInt16 => out.copy_from_slice(&(quantized(65535.0, 0.0, 65535.0) as u16).to_le_bytes()),
            ChannelType::Float => out.copy_from_slice(&v.to_le_bytes()),
            ChannelType::HalfFloat => out.copy_from_slice(&f16::from_f32(v).to_bits().to_le_bytes()),
            _ => return Err(unsupported.clone()),
        }
        Ok(())
    })
}

fn write_imagei(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    let image = *call.image(0)?;
    let mut values = [0i32; 4];
    for (c, value) in values.iter_mut().enumerate() {
        *value = call.sint(2, c)? as i32;
    }
    let unsupported = unsupported_format(&image);
    write_texel(call, &image, values, |v, ty, out| {
        match ty {
            ChannelType::SignedInt8 => out[0] = v.clamp(-128, 127) as i8 as u8,
            ChannelType::SignedInt16 => out.copy_from_slice(&(v.clamp(-32768, 32767) as i16).to_le_bytes()),
            ChannelType::SignedInt32 => out.copy_from_slice(&v.to_le_bytes()),
            _ => return Err(unsupported.clone()),
        }
        Ok(())
    })
}

fn write_imageui(call: &mut Call<'_>, _result: &mut TypedValue) -> Result<()> {
    let image = *call.image(0)?;
    let mut values = [0u32; 4];
    for (c, value) in values.iter_mut().enumerate() {
        *value = call.sint(2, c)? as u32;
    }
    let unsupported = unsupported_format(&image);
    write_texel(call, &image, values, |v, ty, out| {
        match ty {
            ChannelType::UnsignedInt8 => out[0] = v.min(u8::MAX as u32) as u8,
            ChannelType::UnsignedInt16 => out.copy_from_slice(&(v.min(u16::MAX as u32) as u16).to_le_bytes()),
            ChannelType::UnsignedInt32 => out.copy_from_slice(&v.to_le_bytes()),
            _ => return Err(unsupported.clone()),
        }
        Ok(())
    })
}

// ================================================================================================
// Queries
// ================================================================================================

fn get_image_array_size(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    result.set_sint(0, call.image(0)?.desc.array_size as i64);
    Ok(())
}

fn get_image_channel_data_type(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    result.set_sint(0, call.image(0)?.format.data_type as i64);
    Ok(())
}

fn get_image_channel_order(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    result.set_sint(0, call.image(0)?.format.order as i64);
    Ok(())
}

fn get_image_dim(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    let desc = call.image(0)?.desc;
    result.set_sint(0, desc.width as i64);
    result.set_sint(1, desc.height as i64);
    if result.num() > 2 {
        result.set_sint(2, desc.depth as i64);
        result.set_sint(3, 0);
    }
    Ok(())
}

fn get_image_depth(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    result.set_sint(0, call.image(0)?.desc.depth as i64);
    Ok(())
}

fn get_image_height(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    result.set_sint(0, call.image(0)?.desc.height as i64);
    Ok(())
}

fn get_image_width(call: &mut Call<'_>, result: &mut TypedValue) -> Result<()> {
    result.set_sint(0, call.image(0)?.desc.width as i64);
    Ok(())
}

pub(super) fn register(registry: &mut BuiltinRegistry) {
    registry.add("get_image_array_size", Builtin::Call(get_image_array_size));
    registry.add("get_image_channel_data_type", Builtin::Call(get_image_channel_data_type));
    registry.add("get_image_channel_order", Builtin::Call(get_image_channel_order));
    registry.add("get_image_dim", Builtin::Call(get_image_dim));
    registry.add("get_image_depth", Builtin::Call(get_image_depth));
    registry.add("get_image_height", Builtin::Call(get_image_height));
    registry.add("get_image_width", Builtin::Call(get_image_width));
    registry.add("read_imagef", Builtin::Call(read_imagef));
    registry.add("read_imagei", Builtin::Call(read_imagei));
    registry.add("read_imageui", Builtin::Call(read_imageui));
    registry.add("write_imagef", Builtin::Call(write_imagef));
    registry.add("write_imagei", Builtin::Call(write_imagei));
    registry.add("write_imageui", Builtin::Call(write_imageui));
}
