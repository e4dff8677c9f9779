//! Class-per-directory image datasets.

use super::transforms::Compose;
use super::Dataset;
use crate::error::{AapsoError, Result};
use crate::primitives::Tensor;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions recognized as images (case-insensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| AapsoError::Data {
        path: dir.to_path_buf(),
        message: format!("cannot read directory: {e}"),
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Labeled images laid out as `root/<class>/<image>`.
///
/// Classes are the sub-directory names in sorted order; class `i` is the
/// `i`-th name. Samples are listed class by class, files sorted by path.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<(PathBuf, usize)>,
    transform: Compose,
}

impl ImageFolder {
    /// Scans `root`, taking every sub-directory as a class.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is unreadable, has no class directories,
    /// or a class directory holds no images.
    pub fn new<P: AsRef<Path>>(root: P, transform: Compose) -> Result<Self> {
        let root = root.as_ref();
        let classes: Vec<String> = sorted_entries(root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        if classes.is_empty() {
            return Err(AapsoError::Data {
                path: root.to_path_buf(),
                message: "no class directories found".into(),
            });
        }
        Self::with_classes(root, &classes, transform)
    }

    /// Scans `root` against a fixed class list, e.g. the training split's.
    ///
    /// Classes without a directory under `root` contribute no samples.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` has a directory outside `classes`, an
    /// existing class directory holds no images, or nothing is found.
    pub fn with_classes<P: AsRef<Path>>(
        root: P,
        classes: &[String],
        transform: Compose,
    ) -> Result<Self> {
        let root = root.as_ref();
        let index: BTreeMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        for dir in sorted_entries(root)?.into_iter().filter(|p| p.is_dir()) {
            let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !index.contains_key(name) {
                return Err(AapsoError::Data {
                    path: dir.clone(),
                    message: format!("class '{name}' is not among the known classes"),
                });
            }
        }

        let mut samples = Vec::new();
        for (label, class) in classes.iter().enumerate() {
            let dir = root.join(class);
            if !dir.is_dir() {
                continue;
            }
            let images: Vec<PathBuf> = sorted_entries(&dir)?
                .into_iter()
                .filter(|p| is_image(p))
                .collect();
            if images.is_empty() {
                return Err(AapsoError::Data {
                    path: dir,
                    message: format!(
                        "found no valid image for class '{class}'; supported extensions are {}",
                        IMAGE_EXTENSIONS.join(", ")
                    ),
                });
            }
            debug!(class = %class, label, images = images.len(), "indexed class");
            samples.extend(images.into_iter().map(|p| (p, label)));
        }
        if samples.is_empty() {
            return Err(AapsoError::empty_input(&format!(
                "no images under {}",
                root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            classes: classes.to_vec(),
            samples,
            transform,
        })
    }

    /// Dataset root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Class names; index `i` is label `i`.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Class name to label map.
    #[must_use]
    pub fn class_to_idx(&self) -> BTreeMap<String, usize> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect()
    }

    /// `(path, label)` pairs in sample order.
    #[must_use]
    pub fn samples(&self) -> &[(PathBuf, usize)] {
        &self.samples
    }

    /// Labels in sample order.
    #[must_use]
    pub fn targets(&self) -> Vec<usize> {
        self.samples.iter().map(|(_, l)| *l).collect()
    }

    /// The same samples under a different transform pipeline.
    #[must_use]
    pub fn with_transform(&self, transform: Compose) -> Self {
        Self {
            transform,
            ..self.clone()
        }
    }
}

impl Dataset for ImageFolder {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn get(&self, index: usize, rng: &mut StdRng) -> Result<(Tensor, usize)> {
        let (path, label) = self.samples.get(index).ok_or_else(|| {
            AapsoError::Other(format!("sample index {index} out of range {}", self.samples.len()))
        })?;
        let img = image::open(path).map_err(|e| AapsoError::Image {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok((self.transform.apply(img, rng), *label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn write_png(path: &Path, shade: u8) {
        RgbImage::from_pixel(6, 6, Rgb([shade, shade, shade]))
            .save(path)
            .expect("write png");
    }

    fn tree(root: &Path, layout: &[(&str, usize)]) {
        for (class, n) in layout {
            let dir = root.join(class);
            fs::create_dir_all(&dir).expect("mkdir");
            for i in 0..*n {
                write_png(&dir.join(format!("img_{i}.png")), (i * 40) as u8);
            }
        }
    }

    #[test]
    fn test_classes_are_sorted_and_indexed() {
        let dir = tempdir().expect("temp dir");
        tree(dir.path(), &[("zebra", 2), ("ant", 3)]);
        fs::write(dir.path().join("ant").join("notes.txt"), "skip").expect("write");

        let ds = ImageFolder::new(dir.path(), Compose::evaluation(4)).expect("valid tree");
        assert_eq!(ds.classes(), &["ant".to_string(), "zebra".to_string()]);
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.targets(), vec![0, 0, 0, 1, 1]);
        assert_eq!(ds.class_to_idx()["zebra"], 1);
    }

    #[test]
    fn test_get_loads_and_transforms() {
        let dir = tempdir().expect("temp dir");
        tree(dir.path(), &[("a", 1), ("b", 1)]);
        let ds = ImageFolder::new(dir.path(), Compose::evaluation(4)).expect("valid tree");
        let (t, label) = ds.get(1, &mut StdRng::seed_from_u64(0)).expect("image");
        assert_eq!(t.shape(), &[3, 4, 4]);
        assert_eq!(label, 1);
        assert!(ds.get(2, &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_empty_class_is_an_error() {
        let dir = tempdir().expect("temp dir");
        tree(dir.path(), &[("full", 2)]);
        fs::create_dir_all(dir.path().join("empty")).expect("mkdir");
        assert!(ImageFolder::new(dir.path(), Compose::evaluation(4)).is_err());
    }

    #[test]
    fn test_missing_or_classless_root() {
        let dir = tempdir().expect("temp dir");
        assert!(ImageFolder::new(dir.path(), Compose::evaluation(4)).is_err());
        assert!(ImageFolder::new(dir.path().join("nope"), Compose::evaluation(4)).is_err());
    }

    #[test]
    fn test_validation_split_reuses_training_classes() {
        let dir = tempdir().expect("temp dir");
        tree(&dir.path().join("train"), &[("a", 2), ("b", 2), ("c", 2)]);
        tree(&dir.path().join("val"), &[("a", 1), ("c", 1)]);

        let train = ImageFolder::new(dir.path().join("train"), Compose::evaluation(4))
            .expect("train");
        let val = ImageFolder::with_classes(
            dir.path().join("val"),
            train.classes(),
            Compose::evaluation(4),
        )
        .expect("val");
        assert_eq!(val.targets(), vec![0, 2]);

        tree(&dir.path().join("val"), &[("stranger", 1)]);
        assert!(ImageFolder::with_classes(
            dir.path().join("val"),
            train.classes(),
            Compose::evaluation(4)
        )
        .is_err());
    }

    #[test]
    fn test_unreadable_image_reports_path() {
        let dir = tempdir().expect("temp dir");
        let class = dir.path().join("broken");
        fs::create_dir_all(&class).expect("mkdir");
        fs::write(class.join("bad.png"), b"not a png").expect("write");
        let ds = ImageFolder::new(dir.path(), Compose::evaluation(4)).expect("indexed");
        match ds.get(0, &mut StdRng::seed_from_u64(0)) {
            Err(AapsoError::Image { path, .. }) => assert!(path.ends_with("bad.png")),
            other => panic!("expected image error, got {other:?}"),
        }
    }
}
