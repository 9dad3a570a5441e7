use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::DynamicImage;
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;

/// Letterbox parameters needed to map boxes back onto the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Resizes an image into a square model input, padding with gray, and lays
/// it out as a `[1, 3, H, W]` tensor scaled to `0..=1`.
pub struct PreProcessor {
    pub input_size: (u32, u32),
}

impl PreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self { input_size }
    }

    pub fn preprocess(
        &self,
        image: &DynamicImage,
    ) -> anyhow::Result<(Array<f32, IxDyn>, Letterbox)> {
        let _s = span!("preprocess_image");

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot run detection on an empty {}x{} image", width, height);
        }

        tracing::trace!(width, height, "Preprocessing image dimensions");

        let (letterbox, padded) = self.resize_and_letterbox(rgb.as_raw(), width, height)?;
        let input = self.to_tensor(&padded)?;

        Ok((input, letterbox))
    }

    fn resize_and_letterbox(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(Letterbox, Vec<u8>)> {
        let _s = span!("resize_and_letterbox");

        let (input_width, input_height) = self.input_size;
        let scale = (input_width as f32 / width as f32).min(input_height as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, input_width);
        let new_height = ((height as f32 * scale) as u32).clamp(1, input_height);

        let offset_x = (input_width - new_width) / 2;
        let offset_y = (input_height - new_height) / 2;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        let mut padded = vec![LETTERBOX_COLOR; (input_width * input_height * 3) as usize];
        let resized_data = resized.buffer();
        let stride = input_width * 3;
        let row_len = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;
            padded[dst_row..dst_row + row_len]
                .copy_from_slice(&resized_data[src_row..src_row + row_len]);
        }

        let letterbox = Letterbox {
            orig_width: width,
            orig_height: height,
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        };

        Ok((letterbox, padded))
    }

    fn to_tensor(&self, padded: &[u8]) -> anyhow::Result<Array<f32, IxDyn>> {
        let width = self.input_size.0 as usize;
        let height = self.input_size.1 as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];
        for (i, px) in padded.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(
            IxDyn(&[1, 3, height, width]),
            output,
        )?)
    }
}
