//! Image preprocessing and augmentation.
//!
//! A [`Compose`] pipeline runs geometric [`Transform`]s on an RGB image,
//! converts it to a `[3, H, W]` tensor in `[0, 1]`, then applies
//! per-channel [`Normalize`].

use crate::primitives::Tensor;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use rand::Rng;

/// ImageNet channel means used by torchvision pretrained weights.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Random affine augmentation: rotation, translation, scale and x-shear
/// about the image center. Uncovered pixels are filled with black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomAffine {
    /// Rotation range in degrees
    pub degrees: (f32, f32),
    /// Maximum absolute translation as a fraction of width and height
    pub translate: (f32, f32),
    /// Isotropic scale range
    pub scale: (f32, f32),
    /// X-shear range in degrees
    pub shear: (f32, f32),
}

impl Default for RandomAffine {
    fn default() -> Self {
        Self {
            degrees: (-180.0, 180.0),
            translate: (0.1, 0.1),
            scale: (0.9, 1.1),
            shear: (-5.0, 5.0),
        }
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f32, f32)) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

impl RandomAffine {
    fn apply<R: Rng + ?Sized>(&self, img: &RgbImage, rng: &mut R) -> RgbImage {
        let (w, h) = img.dimensions();
        let angle = sample(rng, self.degrees).to_radians();
        let scale = sample(rng, self.scale);
        let shear = sample(rng, self.shear).to_radians();
        let max_dx = self.translate.0 * w as f32;
        let max_dy = self.translate.1 * h as f32;
        let tx = sample(rng, (-max_dx, max_dx)).round();
        let ty = sample(rng, (-max_dy, max_dy)).round();

        // forward map A = s · R(angle) · Shear(shear)
        let (sin, cos) = angle.sin_cos();
        let k = shear.tan();
        let a = [
            [scale * cos, scale * (cos * k - sin)],
            [scale * sin, scale * (sin * k + cos)],
        ];
        let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
        if det.abs() < f32::EPSILON {
            return RgbImage::new(w, h);
        }
        let inv = [
            [a[1][1] / det, -a[0][1] / det],
            [-a[1][0] / det, a[0][0] / det],
        ];

        let cx = (w as f32 - 1.0) * 0.5;
        let cy = (h as f32 - 1.0) * 0.5;
        RgbImage::from_fn(w, h, |x, y| {
            let dx = x as f32 - cx - tx;
            let dy = y as f32 - cy - ty;
            let sx = (inv[0][0] * dx + inv[0][1] * dy + cx).round();
            let sy = (inv[1][0] * dx + inv[1][1] * dy + cy).round();
            if sx >= 0.0 && sy >= 0.0 && (sx as u32) < w && (sy as u32) < h {
                *img.get_pixel(sx as u32, sy as u32)
            } else {
                Rgb([0, 0, 0])
            }
        })
    }
}

/// A geometric image transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Resize to exactly `width` x `height` with bilinear filtering
    Resize {
        /// Target width
        width: u32,
        /// Target height
        height: u32,
    },
    /// Mirror left-right with probability `p`
    RandomHorizontalFlip {
        /// Flip probability
        p: f32,
    },
    /// Mirror top-bottom with probability `p`
    RandomVerticalFlip {
        /// Flip probability
        p: f32,
    },
    /// Random affine warp
    RandomAffine(RandomAffine),
}

impl Transform {
    /// Whether the transform draws from the RNG.
    #[must_use]
    pub fn is_random(&self) -> bool {
        !matches!(self, Transform::Resize { .. })
    }

    fn apply<R: Rng + ?Sized>(&self, mut img: RgbImage, rng: &mut R) -> RgbImage {
        match self {
            Transform::Resize { width, height } => {
                imageops::resize(&img, *width, *height, FilterType::Triangle)
            }
            Transform::RandomHorizontalFlip { p } => {
                if rng.gen::<f32>() < *p {
                    imageops::flip_horizontal_in_place(&mut img);
                }
                img
            }
            Transform::RandomVerticalFlip { p } => {
                if rng.gen::<f32>() < *p {
                    imageops::flip_vertical_in_place(&mut img);
                }
                img
            }
            Transform::RandomAffine(affine) => affine.apply(&img, rng),
        }
    }
}

/// Per-channel `(x - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalize {
    /// Channel means
    pub mean: [f32; 3],
    /// Channel standard deviations
    pub std: [f32; 3],
}

impl Default for Normalize {
    fn default() -> Self {
        Self {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

/// Transform pipeline ending in tensor conversion and normalization.
///
/// # Example
///
/// ```
/// use aapso::data::Compose;
/// use image::{DynamicImage, RgbImage};
/// use rand::SeedableRng;
///
/// let img = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let t = Compose::training(32).apply(img, &mut rng);
/// assert_eq!(t.shape(), &[3, 32, 32]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Compose {
    transforms: Vec<Transform>,
    normalize: Normalize,
}

impl Compose {
    /// Pipeline from explicit transforms.
    #[must_use]
    pub fn new(transforms: Vec<Transform>, normalize: Normalize) -> Self {
        Self {
            transforms,
            normalize,
        }
    }

    /// Training augmentation: resize, random flips, random affine.
    #[must_use]
    pub fn training(size: u32) -> Self {
        Self::new(
            vec![
                Transform::Resize {
                    width: size,
                    height: size,
                },
                Transform::RandomHorizontalFlip { p: 0.5 },
                Transform::RandomVerticalFlip { p: 0.5 },
                Transform::RandomAffine(RandomAffine::default()),
            ],
            Normalize::default(),
        )
    }

    /// Deterministic evaluation pipeline: resize only.
    #[must_use]
    pub fn evaluation(size: u32) -> Self {
        Self::new(
            vec![Transform::Resize {
                width: size,
                height: size,
            }],
            Normalize::default(),
        )
    }

    /// Whether every step is deterministic.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        !self.transforms.iter().any(Transform::is_random)
    }

    /// Runs the pipeline, returning a normalized `[3, H, W]` tensor.
    pub fn apply<R: Rng + ?Sized>(&self, img: DynamicImage, rng: &mut R) -> Tensor {
        let rgb = self
            .transforms
            .iter()
            .fold(img.to_rgb8(), |acc, t| t.apply(acc, rng));
        self.to_tensor(&rgb)
    }

    fn to_tensor(&self, img: &RgbImage) -> Tensor {
        let (w, h) = img.dimensions();
        let plane = (w * h) as usize;
        let mut t = Tensor::zeros(&[3, h as usize, w as usize]);
        let data = t.data_mut();
        for (i, px) in img.pixels().enumerate() {
            for c in 0..3 {
                let v = f32::from(px.0[c]) / 255.0;
                data[c * plane + i] = (v - self.normalize.mean[c]) / self.normalize.std[c];
            }
        }
        t
    }
}
