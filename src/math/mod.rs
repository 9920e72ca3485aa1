//! Numerical building blocks: working-precision scalars, quadrature,
//! Legendre polynomials and singular value decompositions.

pub mod gauss;
pub mod legendre;
pub mod real;
pub mod svd;

pub use gauss::*;
pub use legendre::*;
pub use real::*;
pub use svd::*;
