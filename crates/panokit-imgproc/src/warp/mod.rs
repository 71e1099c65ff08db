mod affine;
pub use affine::{get_rotation_matrix2d, resample_affine, transform_point};
