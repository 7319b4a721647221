use ultraviolet::Vec3;

use super::{
    affine::AffineSpace3,
    instance_stack::{INVALID_GEOMETRY_ID, MAX_INSTANCE_LEVEL_COUNT},
};

pub const PI: f32 = std::f32::consts::PI;
pub const HALF_PI: f32 = std::f32::consts::FRAC_PI_2;

/// A single ray.
///
/// `tfar` shrinks as closer hits are found. An occlusion query that hits
/// something sets it to negative infinity.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub org: Vec3,
    pub dir: Vec3,
    pub tnear: f32,
    pub tfar: f32,

    /// Time in `[0, 1]`, used to sample motion blurred instances.
    pub time: f32,

    /// Ray mask, tested against the mask of every instance.
    pub mask: u32,
}

impl Ray {
    pub fn new(org: Vec3, dir: Vec3) -> Self {
        Self {
            org,
            dir,
            tnear: 0.0,
            tfar: f32::INFINITY,
            time: 0.0,
            mask: u32::MAX,
        }
    }

    pub fn with_range(mut self, tnear: f32, tfar: f32) -> Self {
        self.tnear = tnear;
        self.tfar = tfar;
        self
    }

    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.org + self.dir * t
    }

    /// Whether `t` lies inside the currently valid segment of the ray.
    pub fn accepts(&self, t: f32) -> bool {
        t >= self.tnear && t < self.tfar
    }

    /// Whether an occlusion query already found a blocker.
    pub fn is_occluded(&self) -> bool {
        self.tfar < 0.0
    }
}

/// Hit record written by leaf intersectors.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hit {
    /// Geometric normal, in the local frame of the geometry that was hit.
    pub ng: Vec3,
    pub u: f32,
    pub v: f32,
    pub prim_id: u32,
    pub geom_id: u32,

    /// Instance ids from the outermost to the innermost instance the ray
    /// passed through, padded with [`INVALID_GEOMETRY_ID`].
    pub inst_id: [u32; MAX_INSTANCE_LEVEL_COUNT],
}

impl Hit {
    pub fn new() -> Self {
        Self {
            ng: Vec3::zero(),
            u: 0.0,
            v: 0.0,
            prim_id: INVALID_GEOMETRY_ID,
            geom_id: INVALID_GEOMETRY_ID,
            inst_id: [INVALID_GEOMETRY_ID; MAX_INSTANCE_LEVEL_COUNT],
        }
    }

    pub fn is_hit(&self) -> bool {
        self.geom_id != INVALID_GEOMETRY_ID
    }

    /// Number of instance levels between the scene root and the geometry.
    pub fn instance_depth(&self) -> usize {
        self.inst_id
            .iter()
            .take_while(|&&id| id != INVALID_GEOMETRY_ID)
            .count()
    }
}

impl Default for Hit {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayHit {
    pub ray: Ray,
    pub hit: Hit,
}

impl RayHit {
    pub fn new(ray: Ray) -> Self {
        Self {
            ray,
            hit: Hit::new(),
        }
    }
}

impl From<Ray> for RayHit {
    fn from(ray: Ray) -> Self {
        Self::new(ray)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a zero volume AABB at a point.
    pub fn at_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Creates a new AABB at a point with a half-size.
    ///
    /// All components of `half_size` should be positive.
    pub fn at_point_with_half_size(point: Vec3, half_size: Vec3) -> Self {
        Self {
            min: point - half_size,
            max: point + half_size,
        }
    }

    /// Creates a new "null" AABB, where the minimum is positive infinity and the maximum is negative infinity.
    ///
    /// This is useful for initializing an AABB that will only be expanded by other
    /// AABBs or points, since min or max with any point will be that point.
    pub fn null() -> Self {
        Self {
            min: Vec3::broadcast(f32::INFINITY),
            max: Vec3::broadcast(f32::NEG_INFINITY),
        }
    }

    /// An AABB covering all of space.
    pub fn infinite() -> Self {
        Self {
            min: Vec3::broadcast(f32::NEG_INFINITY),
            max: Vec3::broadcast(f32::INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn is_finite(&self) -> bool {
        self.min.x.is_finite()
            && self.min.y.is_finite()
            && self.min.z.is_finite()
            && self.max.x.is_finite()
            && self.max.y.is_finite()
            && self.max.z.is_finite()
    }

    /// Transforms the AABB by an affine transform, returning the AABB of the
    /// transformed box.
    pub fn transformed(&self, xfm: &AffineSpace3) -> Self {
        if self.is_empty() {
            return *self;
        }

        if !self.is_finite() {
            return Self::infinite();
        }

        let mut bbox = Self::at_point(xfm.p);

        for i in 0..3 {
            for j in 0..3 {
                let m = xfm.l.cols[j][i];
                let a = m * self.min[j];
                let b = m * self.max[j];
                bbox.min[i] += a.min(b);
                bbox.max[i] += a.max(b);
            }
        }

        bbox
    }

    /// Contains the point in the AABB.
    pub fn contain_point(&mut self, point: Vec3) -> &mut Self {
        self.min = self.min.min_by_component(point);
        self.max = self.max.max_by_component(point);
        self
    }

    /// Contains the AABB in the AABB.
    pub fn contain_aabb(&mut self, other: &AABB) -> &mut Self {
        if other.is_empty() {
            return self;
        }
        self.contain_point(other.min).contain_point(other.max)
    }

    /// Squared distance from a point to the closest point of the box, zero inside.
    pub fn distance_sq(&self, point: Vec3) -> f32 {
        let mut d = 0.0;
        for i in 0..3 {
            let e = (self.min[i] - point[i]).max(point[i] - self.max[i]).max(0.0);
            d += e * e;
        }
        d
    }

    pub fn overlaps(&self, other: &AABB) -> bool {
        !(self.is_empty() || other.is_empty())
            && self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}
