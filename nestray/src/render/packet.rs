//! Fixed-width ray packets, stored as structure of arrays.
//!
//! The width is a const generic so the same code serves every SIMD width;
//! the crate features only pick which width callers should prefer.

use std::ops::{BitAnd, BitAndAssign, BitOr, Not};

use ultraviolet::Vec3;

use super::{
    instance_stack::{INVALID_GEOMETRY_ID, MAX_INSTANCE_LEVEL_COUNT},
    math::{Hit, Ray},
};

#[cfg(feature = "no-simd")]
pub const NATIVE_PACKET_WIDTH: usize = 4;

#[cfg(all(feature = "avx2", not(feature = "no-simd"), not(feature = "avx512")))]
pub const NATIVE_PACKET_WIDTH: usize = 8;

#[cfg(feature = "avx512")]
pub const NATIVE_PACKET_WIDTH: usize = 16;

#[cfg(not(any(feature = "no-simd", feature = "avx2", feature = "avx512")))]
pub const NATIVE_PACKET_WIDTH: usize = 4;

/// One bit per lane, bit `i` set means lane `i` is active.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LaneMask<const K: usize>(u32);

impl<const K: usize> LaneMask<K> {
    /// All `K` lanes set. Fails to compile for `K == 0` or `K > 32`.
    const ALL: u32 = u32::MAX >> (32 - K);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn full() -> Self {
        Self(Self::ALL)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    pub fn from_fn(mut f: impl FnMut(usize) -> bool) -> Self {
        let mut bits = 0;
        for i in 0..K {
            if f(i) {
                bits |= 1 << i;
            }
        }
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn lane(&self, i: usize) -> bool {
        self.0 & (1 << i) != 0
    }

    pub fn set(&mut self, i: usize, on: bool) {
        if on {
            self.0 |= 1 << i;
        } else {
            self.0 &= !(1 << i);
        }
    }

    #[inline]
    pub fn none(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn any(&self) -> bool {
        self.0 != 0
    }

    pub fn all(&self) -> bool {
        self.0 == Self::ALL
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Indices of the active lanes, in ascending order.
    pub fn lanes(&self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let i = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(i)
        })
    }
}

impl<const K: usize> BitAnd for LaneMask<K> {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl<const K: usize> BitAndAssign for LaneMask<K> {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl<const K: usize> BitOr for LaneMask<K> {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl<const K: usize> Not for LaneMask<K> {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vec3K<const K: usize> {
    pub x: [f32; K],
    pub y: [f32; K],
    pub z: [f32; K],
}

impl<const K: usize> Vec3K<K> {
    pub fn splat(v: Vec3) -> Self {
        Self {
            x: [v.x; K],
            y: [v.y; K],
            z: [v.z; K],
        }
    }

    pub fn from_fn(mut f: impl FnMut(usize) -> Vec3) -> Self {
        let mut out = Self::splat(Vec3::zero());
        for i in 0..K {
            out.set_lane(i, f(i));
        }
        out
    }

    #[inline]
    pub fn lane(&self, i: usize) -> Vec3 {
        Vec3::new(self.x[i], self.y[i], self.z[i])
    }

    #[inline]
    pub fn set_lane(&mut self, i: usize, v: Vec3) {
        self.x[i] = v.x;
        self.y[i] = v.y;
        self.z[i] = v.z;
    }
}

/// `K` independent rays.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayK<const K: usize> {
    pub org: Vec3K<K>,
    pub dir: Vec3K<K>,
    pub tnear: [f32; K],
    pub tfar: [f32; K],
    pub time: [f32; K],
    pub mask: [u32; K],
}

impl<const K: usize> RayK<K> {
    pub fn from_fn(mut f: impl FnMut(usize) -> Ray) -> Self {
        let mut out = Self::splat(&Ray::new(Vec3::zero(), Vec3::unit_x()));
        for i in 0..K {
            out.set_lane(i, &f(i));
        }
        out
    }

    pub fn splat(ray: &Ray) -> Self {
        Self {
            org: Vec3K::splat(ray.org),
            dir: Vec3K::splat(ray.dir),
            tnear: [ray.tnear; K],
            tfar: [ray.tfar; K],
            time: [ray.time; K],
            mask: [ray.mask; K],
        }
    }

    pub fn lane(&self, i: usize) -> Ray {
        Ray {
            org: self.org.lane(i),
            dir: self.dir.lane(i),
            tnear: self.tnear[i],
            tfar: self.tfar[i],
            time: self.time[i],
            mask: self.mask[i],
        }
    }

    pub fn set_lane(&mut self, i: usize, ray: &Ray) {
        self.org.set_lane(i, ray.org);
        self.dir.set_lane(i, ray.dir);
        self.tnear[i] = ray.tnear;
        self.tfar[i] = ray.tfar;
        self.time[i] = ray.time;
        self.mask[i] = ray.mask;
    }

    /// Lanes whose mask shares at least one bit with `mask`.
    pub fn mask_test(&self, mask: u32) -> LaneMask<K> {
        LaneMask::from_fn(|i| self.mask[i] & mask != 0)
    }

    /// Lanes an occlusion query marked as blocked.
    pub fn occluded_lanes(&self) -> LaneMask<K> {
        LaneMask::from_fn(|i| self.tfar[i] < 0.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HitK<const K: usize> {
    pub ng: Vec3K<K>,
    pub u: [f32; K],
    pub v: [f32; K],
    pub prim_id: [u32; K],
    pub geom_id: [u32; K],
    pub inst_id: [[u32; K]; MAX_INSTANCE_LEVEL_COUNT],
}

impl<const K: usize> HitK<K> {
    pub fn new() -> Self {
        Self {
            ng: Vec3K::splat(Vec3::zero()),
            u: [0.0; K],
            v: [0.0; K],
            prim_id: [INVALID_GEOMETRY_ID; K],
            geom_id: [INVALID_GEOMETRY_ID; K],
            inst_id: [[INVALID_GEOMETRY_ID; K]; MAX_INSTANCE_LEVEL_COUNT],
        }
    }

    pub fn lane(&self, i: usize) -> Hit {
        Hit {
            ng: self.ng.lane(i),
            u: self.u[i],
            v: self.v[i],
            prim_id: self.prim_id[i],
            geom_id: self.geom_id[i],
            inst_id: std::array::from_fn(|level| self.inst_id[level][i]),
        }
    }

    pub fn set_lane(&mut self, i: usize, hit: &Hit) {
        self.ng.set_lane(i, hit.ng);
        self.u[i] = hit.u;
        self.v[i] = hit.v;
        self.prim_id[i] = hit.prim_id;
        self.geom_id[i] = hit.geom_id;
        for (level, id) in hit.inst_id.iter().enumerate() {
            self.inst_id[level][i] = *id;
        }
    }
}

impl<const K: usize> Default for HitK<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayHitK<const K: usize> {
    pub ray: RayK<K>,
    pub hit: HitK<K>,
}

impl<const K: usize> RayHitK<K> {
    pub fn new(ray: RayK<K>) -> Self {
        Self {
            ray,
            hit: HitK::new(),
        }
    }
}
