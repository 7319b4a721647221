//! Affine transforms for points and vectors, in scalar and lane-packed form.
//!
//! `a * b` composes so that `b` is applied first, matching how the cumulative
//! world-to-instance transforms are built while descending into instances.

use std::ops::Mul;

use ultraviolet::{Mat3, Mat4, Vec3, Vec4};

use super::packet::{LaneMask, Vec3K};

/// Relative tolerance used when deciding whether a transform is a similarity.
pub const SIMILARITY_EPS: f32 = 1e-4;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AffineSpace3 {
    /// Linear part, columns are the images of the unit axes.
    pub l: Mat3,

    /// Translation.
    pub p: Vec3,
}

impl AffineSpace3 {
    pub fn new(l: Mat3, p: Vec3) -> Self {
        Self { l, p }
    }

    pub fn identity() -> Self {
        Self::new(Mat3::identity(), Vec3::zero())
    }

    pub fn from_translation(p: Vec3) -> Self {
        Self::new(Mat3::identity(), p)
    }

    pub fn from_scale(scale: f32) -> Self {
        Self::from_nonuniform_scale(Vec3::broadcast(scale))
    }

    pub fn from_nonuniform_scale(scale: Vec3) -> Self {
        Self::new(
            Mat3::new(
                Vec3::new(scale.x, 0.0, 0.0),
                Vec3::new(0.0, scale.y, 0.0),
                Vec3::new(0.0, 0.0, scale.z),
            ),
            Vec3::zero(),
        )
    }

    pub fn from_rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(
            Mat3::new(
                Vec3::new(c, s, 0.0),
                Vec3::new(-s, c, 0.0),
                Vec3::unit_z(),
            ),
            Vec3::zero(),
        )
    }

    /// Reads the affine part of a 4x4 matrix, the bottom row is ignored.
    pub fn from_mat4(mat: &Mat4) -> Self {
        let col = |v: Vec4| Vec3::new(v.x, v.y, v.z);
        Self::new(
            Mat3::new(col(mat.cols[0]), col(mat.cols[1]), col(mat.cols[2])),
            col(mat.cols[3]),
        )
    }

    pub fn to_mat4(&self) -> Mat4 {
        let [x, y, z] = self.l.cols;
        Mat4::new(
            Vec4::new(x.x, x.y, x.z, 0.0),
            Vec4::new(y.x, y.y, y.z, 0.0),
            Vec4::new(z.x, z.y, z.z, 0.0),
            Vec4::new(self.p.x, self.p.y, self.p.z, 1.0),
        )
    }

    /// Applies `self` first and `next` after it.
    pub fn then(&self, next: &AffineSpace3) -> Self {
        *next * *self
    }

    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.l * point + self.p
    }

    #[inline]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.l * vector
    }

    pub fn determinant(&self) -> f32 {
        self.l.determinant()
    }

    /// Whether the linear part can be inverted.
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det.abs() >= f32::MIN_POSITIVE
    }

    pub fn inversed(&self) -> Self {
        let l = self.l.inversed();
        Self::new(l, -(l * self.p))
    }

    /// Returns the uniform scale factor if the transform is a similarity
    /// (rotation, uniform scale and translation only), `None` if it shears
    /// or scales the axes differently.
    pub fn similarity_scale(&self) -> Option<f32> {
        let [x, y, z] = self.l.cols;

        let sx = x.mag();
        let sy = y.mag();
        let sz = z.mag();

        if !(sx > 0.0 && sx.is_finite()) {
            return None;
        }

        let len_tol = SIMILARITY_EPS * sx;
        if (sx - sy).abs() > len_tol || (sx - sz).abs() > len_tol {
            return None;
        }

        let dot_tol = SIMILARITY_EPS * sx * sx;
        if x.dot(y).abs() > dot_tol || x.dot(z).abs() > dot_tol || y.dot(z).abs() > dot_tol {
            return None;
        }

        Some(sx)
    }

    /// Element-wise linear interpolation between two transforms.
    pub fn lerp(&self, other: &AffineSpace3, t: f32) -> Self {
        let mix = |a: Vec3, b: Vec3| a + (b - a) * t;
        let [ax, ay, az] = self.l.cols;
        let [bx, by, bz] = other.l.cols;

        Self::new(
            Mat3::new(mix(ax, bx), mix(ay, by), mix(az, bz)),
            mix(self.p, other.p),
        )
    }
}

impl Default for AffineSpace3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for AffineSpace3 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.l * rhs.l, self.l * rhs.p + self.p)
    }
}

impl From<Mat4> for AffineSpace3 {
    fn from(mat: Mat4) -> Self {
        Self::from_mat4(&mat)
    }
}

/// `K` affine transforms, one per packet lane, stored as columns of lane
/// vectors.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AffineSpace3K<const K: usize> {
    pub vx: Vec3K<K>,
    pub vy: Vec3K<K>,
    pub vz: Vec3K<K>,
    pub p: Vec3K<K>,
}

impl<const K: usize> AffineSpace3K<K> {
    /// The same transform in every lane.
    pub fn splat(xfm: &AffineSpace3) -> Self {
        let [x, y, z] = xfm.l.cols;
        Self {
            vx: Vec3K::splat(x),
            vy: Vec3K::splat(y),
            vz: Vec3K::splat(z),
            p: Vec3K::splat(xfm.p),
        }
    }

    pub fn from_fn(mut f: impl FnMut(usize) -> AffineSpace3) -> Self {
        let mut out = Self::splat(&AffineSpace3::identity());
        for i in 0..K {
            out.set_lane(i, &f(i));
        }
        out
    }

    /// Evaluates `f` for the active lanes only, inactive lanes get the identity.
    pub fn from_active(valid: LaneMask<K>, mut f: impl FnMut(usize) -> AffineSpace3) -> Self {
        let mut out = Self::splat(&AffineSpace3::identity());
        for i in valid.lanes() {
            out.set_lane(i, &f(i));
        }
        out
    }

    pub fn lane(&self, i: usize) -> AffineSpace3 {
        AffineSpace3::new(
            Mat3::new(self.vx.lane(i), self.vy.lane(i), self.vz.lane(i)),
            self.p.lane(i),
        )
    }

    pub fn set_lane(&mut self, i: usize, xfm: &AffineSpace3) {
        let [x, y, z] = xfm.l.cols;
        self.vx.set_lane(i, x);
        self.vy.set_lane(i, y);
        self.vz.set_lane(i, z);
        self.p.set_lane(i, xfm.p);
    }

    #[inline]
    pub fn transform_point(&self, point: &Vec3K<K>) -> Vec3K<K> {
        let mut out = self.transform_vector(point);
        for i in 0..K {
            out.x[i] += self.p.x[i];
            out.y[i] += self.p.y[i];
            out.z[i] += self.p.z[i];
        }
        out
    }

    #[inline]
    pub fn transform_vector(&self, vector: &Vec3K<K>) -> Vec3K<K> {
        let mut out = *vector;
        for i in 0..K {
            let (x, y, z) = (vector.x[i], vector.y[i], vector.z[i]);
            out.x[i] = self.vx.x[i] * x + self.vy.x[i] * y + self.vz.x[i] * z;
            out.y[i] = self.vx.y[i] * x + self.vy.y[i] * y + self.vz.y[i] * z;
            out.z[i] = self.vx.z[i] * x + self.vy.z[i] * y + self.vz.z[i] * z;
        }
        out
    }
}
