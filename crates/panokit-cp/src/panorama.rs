//! The panorama aggregate: images, their variables and the ordered control points.

use std::collections::BTreeSet;

use panokit_image::ImageSize;
use serde::{Deserialize, Serialize};

use crate::control_point::{ControlPoint, CpIndexSet};
use crate::error::PanoramaError;
use crate::mask::MaskPolygon;
use crate::optimizer::Variable;

/// Output projection of the panorama.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Pinhole projection.
    #[default]
    Rectilinear,
    /// Cylindrical projection.
    Cylindrical,
    /// Equirectangular projection, the usual choice for full spherical panoramas.
    Equirectangular,
}

/// Global options of a panorama that affect optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanoramaOptions {
    /// Output projection.
    pub projection: Projection,
    /// Image whose orientation anchors the optimisation.
    pub optimize_reference_image: usize,
    /// Sigma of the Huber m-estimator, `0` for plain least squares.
    pub huber_sigma: f64,
}

impl Default for PanoramaOptions {
    fn default() -> Self {
        Self {
            projection: Projection::Rectilinear,
            optimize_reference_image: 0,
            huber_sigma: 0.0,
        }
    }
}

/// Orientation, field of view and lens distortion of one image.
///
/// Angles are in degrees; `a`, `b`, `c` are radial distortion coefficients and
/// `d`, `e` the lens centre shift in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageVariables {
    /// Yaw in degrees.
    pub yaw: f64,
    /// Pitch in degrees.
    pub pitch: f64,
    /// Roll in degrees.
    pub roll: f64,
    /// Horizontal field of view in degrees.
    pub hfov: f64,
    /// Radial distortion coefficient `a`.
    pub a: f64,
    /// Radial distortion coefficient `b`.
    pub b: f64,
    /// Radial distortion coefficient `c`.
    pub c: f64,
    /// Horizontal centre shift `d`.
    pub d: f64,
    /// Vertical centre shift `e`.
    pub e: f64,
}

impl ImageVariables {
    /// Value of a single variable.
    pub fn get(&self, variable: Variable) -> f64 {
        match variable {
            Variable::Yaw => self.yaw,
            Variable::Pitch => self.pitch,
            Variable::Roll => self.roll,
            Variable::Hfov => self.hfov,
            Variable::A => self.a,
            Variable::B => self.b,
            Variable::C => self.c,
            Variable::D => self.d,
            Variable::E => self.e,
        }
    }

    /// Set a single variable.
    pub fn set(&mut self, variable: Variable, value: f64) {
        let slot = match variable {
            Variable::Yaw => &mut self.yaw,
            Variable::Pitch => &mut self.pitch,
            Variable::Roll => &mut self.roll,
            Variable::Hfov => &mut self.hfov,
            Variable::A => &mut self.a,
            Variable::B => &mut self.b,
            Variable::C => &mut self.c,
            Variable::D => &mut self.d,
            Variable::E => &mut self.e,
        };
        *slot = value;
    }

    /// Whether any lens distortion or shift parameter is set.
    pub fn has_lens_parameters(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e]
            .iter()
            .any(|&v| v != 0.0)
    }
}

/// One source image of the panorama.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanoImage {
    /// Size of the image in pixels.
    #[serde(with = "image_size")]
    pub size: ImageSize,
    /// Geometric variables.
    #[serde(default)]
    pub variables: ImageVariables,
    /// Mask polygons in image coordinates.
    #[serde(default)]
    pub masks: Vec<MaskPolygon>,
    /// Stack the image belongs to; images of one stack share their orientation.
    #[serde(default)]
    pub stack: Option<usize>,
}

impl PanoImage {
    /// An image of the given size and horizontal field of view.
    pub fn new(size: ImageSize, hfov: f64) -> Self {
        Self {
            size,
            variables: ImageVariables {
                hfov,
                ..Default::default()
            },
            masks: Vec::new(),
            stack: None,
        }
    }

    /// The image centre in pixel coordinates.
    pub fn center(&self) -> [f64; 2] {
        [self.size.width as f64 / 2.0, self.size.height as f64 / 2.0]
    }

    /// Whether the yaw of both images is linked, i.e. they belong to the same stack.
    pub fn yaw_linked_with(&self, other: &PanoImage) -> bool {
        matches!((self.stack, other.stack), (Some(a), Some(b)) if a == b)
    }
}

mod image_size {
    use panokit_image::ImageSize;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(size: &ImageSize, s: S) -> Result<S::Ok, S::Error> {
        [size.width, size.height].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ImageSize, D::Error> {
        let [width, height] = <[usize; 2]>::deserialize(d)?;
        Ok(ImageSize { width, height })
    }
}

/// Images, their control points and the global options.
///
/// The order of the control points is their identity: index sets such as
/// [`CpIndexSet`] refer to positions in [`Panorama::control_points`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panorama {
    images: Vec<PanoImage>,
    control_points: Vec<ControlPoint>,
    options: PanoramaOptions,
}

impl Panorama {
    /// An empty panorama with the given options.
    pub fn new(options: PanoramaOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Number of images.
    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    /// The images in order.
    pub fn images(&self) -> &[PanoImage] {
        &self.images
    }

    /// Mutable access to the images, e.g. for an optimizer writing back variables.
    pub fn images_mut(&mut self) -> &mut [PanoImage] {
        &mut self.images
    }

    /// The image at `index`.
    pub fn image(&self, index: usize) -> Result<&PanoImage, PanoramaError> {
        self.images.get(index).ok_or(PanoramaError::InvalidImageIndex {
            index,
            count: self.images.len(),
        })
    }

    /// Append an image and return its index.
    pub fn add_image(&mut self, image: PanoImage) -> usize {
        self.images.push(image);
        self.images.len() - 1
    }

    /// The control points in order.
    pub fn control_points(&self) -> &[ControlPoint] {
        &self.control_points
    }

    /// Mutable access to the control points, e.g. for an optimizer writing residuals.
    pub fn control_points_mut(&mut self) -> &mut [ControlPoint] {
        &mut self.control_points
    }

    fn check_control_point(&self, cp: &ControlPoint) -> Result<(), PanoramaError> {
        for index in [cp.image_a, cp.image_b] {
            self.image(index)?;
        }
        Ok(())
    }

    /// Append a control point and return its index.
    ///
    /// # Errors
    ///
    /// Both images of the control point must exist.
    pub fn add_control_point(&mut self, cp: ControlPoint) -> Result<usize, PanoramaError> {
        self.check_control_point(&cp)?;
        self.control_points.push(cp);
        Ok(self.control_points.len() - 1)
    }

    /// Replace all control points.
    ///
    /// # Errors
    ///
    /// Every control point must reference existing images; nothing changes otherwise.
    pub fn set_control_points(&mut self, cps: Vec<ControlPoint>) -> Result<(), PanoramaError> {
        for cp in &cps {
            self.check_control_point(cp)?;
        }
        self.control_points = cps;
        Ok(())
    }

    /// Keep only the control points matching `keep`, preserving their order.
    pub fn retain_control_points(&mut self, keep: impl FnMut(&ControlPoint) -> bool) {
        self.control_points.retain(keep);
    }

    /// Remove the control points at the given indices.
    ///
    /// Indices refer to the sequence before the call, so the union of several removal
    /// sets computed on the same panorama can be applied at once. Out of range
    /// indices are ignored.
    ///
    /// # Returns
    ///
    /// The number of removed control points.
    pub fn remove_control_points(&mut self, indices: &CpIndexSet) -> usize {
        let before = self.control_points.len();
        let mut index = 0;
        self.control_points.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        before - self.control_points.len()
    }

    /// Global options.
    pub fn options(&self) -> &PanoramaOptions {
        &self.options
    }

    /// Replace the global options.
    pub fn set_options(&mut self, options: PanoramaOptions) {
        self.options = options;
    }

    /// Snapshot of the variables of all images.
    pub fn variables(&self) -> Vec<ImageVariables> {
        self.images.iter().map(|img| img.variables).collect()
    }

    /// Restore the variables of all images from a snapshot.
    ///
    /// # Errors
    ///
    /// The snapshot must hold one entry per image.
    pub fn update_variables(&mut self, variables: &[ImageVariables]) -> Result<(), PanoramaError> {
        if variables.len() != self.images.len() {
            return Err(PanoramaError::VariableCountMismatch {
                expected: self.images.len(),
                actual: variables.len(),
            });
        }
        for (image, vars) in self.images.iter_mut().zip(variables) {
            image.variables = *vars;
        }
        Ok(())
    }

    /// Whether all images belong to a single stack.
    ///
    /// Images without a stack are stacks of their own.
    pub fn is_single_stack(&self) -> bool {
        let mut stacks = BTreeSet::new();
        let mut loose = 0;
        for image in &self.images {
            match image.stack {
                Some(stack) => {
                    stacks.insert(stack);
                }
                None => loose += 1,
            }
        }
        stacks.len() + loose == 1
    }

    /// A panorama made of the given images and the control points between them.
    ///
    /// Images are renumbered in the order given, duplicates and unknown indices are
    /// skipped. Control points are kept when both of their images are part of the
    /// subset, in their original order. The optimisation reference moves to the
    /// first image of the subset unless it is part of it.
    ///
    /// # Returns
    ///
    /// The sub-panorama and, for each of its control points, the index of that
    /// control point in `self`.
    pub fn subset(&self, images: &[usize]) -> (Panorama, Vec<usize>) {
        let mut new_index = vec![None; self.images.len()];
        let mut sub = Panorama::new(self.options);
        for &index in images {
            if new_index.get(index) == Some(&None) {
                new_index[index] = Some(sub.add_image(self.images[index].clone()));
            }
        }

        sub.options.optimize_reference_image = new_index
            .get(self.options.optimize_reference_image)
            .copied()
            .flatten()
            .unwrap_or(0);

        let mut origin = Vec::new();
        for (cp_index, cp) in self.control_points.iter().enumerate() {
            let renumber = |image: usize| new_index.get(image).copied().flatten();
            if let (Some(a), Some(b)) = (renumber(cp.image_a), renumber(cp.image_b)) {
                sub.control_points.push(ControlPoint {
                    image_a: a,
                    image_b: b,
                    ..*cp
                });
                origin.push(cp_index);
            }
        }

        (sub, origin)
    }
}
