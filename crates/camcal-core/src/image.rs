#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Image filled with a single intensity.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl<'a> GrayImageView<'a> {
    /// Build a view, checking that the buffer covers `width * height` pixels.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Option<Self> {
        (width.checked_mul(height)? == data.len()).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> u8 {
        get_gray(self, x, y)
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample at `(x, y)`; pixels outside the image read as zero.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}

/// Average-pool the image by an integer `factor`.
///
/// Output pixel `(x, y)` covers source pixels `factor*x .. factor*x + factor`,
/// so its centre maps back to `factor * x + (factor - 1) / 2` in the source.
/// Trailing rows/columns that do not fill a whole block are dropped.
pub fn downsample_box(src: &GrayImageView<'_>, factor: usize) -> GrayImage {
    let factor = factor.max(1);
    let out_w = src.width / factor;
    let out_h = src.height / factor;
    let area = (factor * factor) as u32;
    let mut data = Vec::with_capacity(out_w * out_h);

    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut acc = 0u32;
            for dy in 0..factor {
                let row = (oy * factor + dy) * src.width + ox * factor;
                acc += src.data[row..row + factor]
                    .iter()
                    .map(|&v| v as u32)
                    .sum::<u32>();
            }
            data.push(((acc + area / 2) / area) as u8);
        }
    }

    GrayImage {
        width: out_w,
        height: out_h,
        data,
    }
}
