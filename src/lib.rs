pub mod clustering;
pub mod dense;
pub mod nmf;
pub mod statistics;
mod utils;

pub use utils::Direction;
pub use utils::Normalize;

pub use dense::{separate_signed, SignedParts};
pub use nmf::{check_kkt, convex_nmf, initialize_kmeans, NmfError};
