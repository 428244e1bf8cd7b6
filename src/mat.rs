//! Small square matrices used for force Jacobians.

use crate::float::Float;
use crate::vec::{Vec, Vec2, Vec3};
use core::ops::{Add, Neg, Sub};

/// Square matrix paired with a [`Vec`] type of the same dimension.
pub trait Mat:
    Copy
    + Clone
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + PartialEq
    + Default
    + core::fmt::Debug
{
    /// Column/row vector type.
    type Vector: Vec;

    /// Zero matrix.
    fn zero() -> Self;

    /// Identity matrix.
    fn identity() -> Self;

    /// Scale every entry.
    fn scale(self, s: <Self::Vector as Vec>::Scalar) -> Self;

    /// Matrix-vector product.
    fn mul_vec(self, v: Self::Vector) -> Self::Vector;

    /// Transposed matrix.
    fn transpose(self) -> Self;

    /// Build a matrix from its columns.
    fn from_columns(columns: &[Self::Vector]) -> Self;
}

/// Row-major N×N matrix.
macro_rules! square_matrix {
    ($name:ident, $vec:ident, $n:expr, [$($c:ident),+]) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq)]
        pub struct $name<F: Float> {
            pub m: [[F; $n]; $n],
        }

        impl<F: Float> $name<F> {
            /// Build from rows.
            pub fn new(m: [[F; $n]; $n]) -> Self {
                $name { m }
            }
        }

        impl<F: Float> Add for $name<F> {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                let mut m = self.m;
                for r in 0..$n {
                    for c in 0..$n {
                        m[r][c] = m[r][c] + rhs.m[r][c];
                    }
                }
                $name { m }
            }
        }

        impl<F: Float> Sub for $name<F> {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                self + (-rhs)
            }
        }

        impl<F: Float> Neg for $name<F> {
            type Output = Self;
            fn neg(self) -> Self {
                $name { m: self.m.map(|row| row.map(|v| -v)) }
            }
        }

        impl<F: Float> Mat for $name<F> {
            type Vector = $vec<F>;

            fn zero() -> Self {
                $name { m: [[F::zero(); $n]; $n] }
            }

            fn identity() -> Self {
                let mut m = [[F::zero(); $n]; $n];
                for (i, row) in m.iter_mut().enumerate() {
                    row[i] = F::one();
                }
                $name { m }
            }

            fn scale(self, s: F) -> Self {
                $name { m: self.m.map(|row| row.map(|v| v * s)) }
            }

            fn mul_vec(self, v: $vec<F>) -> $vec<F> {
                let input = [$(v.$c),+];
                let out = self.m.map(|row| {
                    let mut acc = F::zero();
                    for c in 0..$n {
                        acc = acc + row[c] * input[c];
                    }
                    acc
                });
                let [$($c),+] = out;
                $vec { $($c),+ }
            }

            fn transpose(self) -> Self {
                let mut m = self.m;
                for r in 0..$n {
                    for c in 0..$n {
                        m[r][c] = self.m[c][r];
                    }
                }
                $name { m }
            }

            fn from_columns(columns: &[$vec<F>]) -> Self {
                let mut m = [[F::zero(); $n]; $n];
                for (c, column) in columns.iter().take($n).enumerate() {
                    let values = [$(column.$c),+];
                    for r in 0..$n {
                        m[r][c] = values[r];
                    }
                }
                $name { m }
            }
        }
    };
}

square_matrix!(Mat2, Vec2, 2, [x, y]);
square_matrix!(Mat3, Vec3, 3, [x, y, z]);

impl<F: Float> Mat2<F> {
    /// Counter-clockwise rotation by `degrees`.
    pub fn rotation(degrees: F) -> Self {
        let theta = degrees.to_radians();
        let (c, s) = (theta.cos(), theta.sin());
        Mat2::new([[c, -s], [s, c]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_times_vector() {
        let v = Vec2::new(3.0f64, -1.0);
        assert_eq!(Mat2::identity().mul_vec(v), v);
    }

    #[test]
    fn rotation_quarter_turn() {
        let r = Mat2::rotation(90.0f64).mul_vec(Vec2::new(1.0, 0.0));
        assert!(r.x.abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn transpose_swaps_off_diagonal() {
        let m = Mat3::new([[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert_eq!(m.transpose().m[0][2], 7.0);
    }

    #[test]
    fn from_columns_layout() {
        let m = Mat2::from_columns(&[Vec2::new(1.0f64, 2.0), Vec2::new(3.0, 4.0)]);
        assert_eq!(m.m, [[1.0, 3.0], [2.0, 4.0]]);
    }
}
