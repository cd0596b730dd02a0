// Hardware-tiled int8 kernels: conv1x1 with skip fusion, border-mirrored filter2d
pub mod error;
pub mod kernels;
pub mod case;

pub use error::ShapeError;
