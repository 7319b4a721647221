//! Instance leaves: a shared child scene placed into a parent scene through
//! a static or time-sampled transform.

use std::sync::Arc;

use log::{debug, warn};

use crate::render::{
    affine::{AffineSpace3, AffineSpace3K},
    error::InstanceError,
    instance_stack::INVALID_GEOMETRY_ID,
    packet::LaneMask,
    scene::Scene,
};

use super::{BoundedGeometry, AABB};

#[derive(Debug, Clone)]
enum InstanceTransform {
    Static {
        local2world: AffineSpace3,
        world2local: AffineSpace3,
    },

    /// At least two samples, evenly spread over the time range.
    Motion { samples: Vec<AffineSpace3> },
}

#[derive(Debug, Clone)]
pub struct Instance {
    object: Arc<Scene>,
    mask: u32,
    geom_id: u32,
    transform: InstanceTransform,
    time_range: (f32, f32),
}

impl Instance {
    /// Places `object` into a parent scene through a fixed transform.
    pub fn new(object: Arc<Scene>, local2world: AffineSpace3) -> Result<Self, InstanceError> {
        if !local2world.is_invertible() {
            return Err(InstanceError::SingularTransform { time_step: 0 });
        }

        debug!(
            "created static instance of a scene with {} geometries",
            object.len()
        );

        Ok(Self {
            object,
            mask: u32::MAX,
            geom_id: INVALID_GEOMETRY_ID,
            transform: InstanceTransform::Static {
                local2world,
                world2local: local2world.inversed(),
            },
            time_range: (0.0, 1.0),
        })
    }

    /// Places `object` into a parent scene through a transform sampled at
    /// evenly spaced times. A single sample gives a static instance.
    pub fn new_motion(
        object: Arc<Scene>,
        samples: Vec<AffineSpace3>,
    ) -> Result<Self, InstanceError> {
        if let Some(time_step) = samples.iter().position(|xfm| !xfm.is_invertible()) {
            return Err(InstanceError::SingularTransform { time_step });
        }

        match samples.len() {
            0 => Err(InstanceError::EmptyMotionSamples),
            1 => Self::new(object, samples[0]),
            steps => {
                debug!(
                    "created motion instance with {} time steps of a scene with {} geometries",
                    steps,
                    object.len()
                );

                Ok(Self {
                    object,
                    mask: u32::MAX,
                    geom_id: INVALID_GEOMETRY_ID,
                    transform: InstanceTransform::Motion { samples },
                    time_range: (0.0, 1.0),
                })
            }
        }
    }

    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask;
        self
    }

    /// Sets the ray time interval the samples are spread over. Ray times
    /// outside of it use the first or last sample.
    pub fn with_time_range(mut self, start: f32, end: f32) -> Result<Self, InstanceError> {
        if !(start < end) {
            return Err(InstanceError::InvalidTimeRange { start, end });
        }

        if !self.is_motion() {
            warn!("time range set on a static instance has no effect");
        }

        self.time_range = (start, end);
        Ok(self)
    }

    /// Replaces the transform with a static one.
    pub fn set_transform(&mut self, local2world: AffineSpace3) -> Result<(), InstanceError> {
        if !local2world.is_invertible() {
            return Err(InstanceError::SingularTransform { time_step: 0 });
        }

        self.transform = InstanceTransform::Static {
            local2world,
            world2local: local2world.inversed(),
        };
        Ok(())
    }

    pub fn object(&self) -> &Scene {
        &self.object
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Id of this instance in its parent scene, assigned on attach.
    pub fn geom_id(&self) -> u32 {
        self.geom_id
    }

    pub(crate) fn set_geom_id(&mut self, geom_id: u32) {
        self.geom_id = geom_id;
    }

    pub fn is_motion(&self) -> bool {
        matches!(self.transform, InstanceTransform::Motion { .. })
    }

    pub fn num_time_steps(&self) -> usize {
        match &self.transform {
            InstanceTransform::Static { .. } => 1,
            InstanceTransform::Motion { samples } => samples.len(),
        }
    }

    pub fn time_range(&self) -> (f32, f32) {
        self.time_range
    }

    /// The static transform, or the first sample of a motion instance.
    pub fn local2world(&self) -> AffineSpace3 {
        match &self.transform {
            InstanceTransform::Static { local2world, .. } => *local2world,
            InstanceTransform::Motion { samples } => samples[0],
        }
    }

    pub fn world2local(&self) -> AffineSpace3 {
        match &self.transform {
            InstanceTransform::Static { world2local, .. } => *world2local,
            InstanceTransform::Motion { samples } => samples[0].inversed(),
        }
    }

    /// Transform at `time`, interpolated between the two bracketing samples.
    pub fn local2world_at(&self, time: f32) -> AffineSpace3 {
        match &self.transform {
            InstanceTransform::Static { local2world, .. } => *local2world,
            InstanceTransform::Motion { samples } => {
                let (itime, ftime) = self.time_segment(time, samples.len() - 1);
                samples[itime].lerp(&samples[itime + 1], ftime)
            }
        }
    }

    /// Inverse of [`Instance::local2world_at`]. Interpolating samples can
    /// produce a singular transform, rays then simply miss the instance.
    pub fn world2local_at(&self, time: f32) -> AffineSpace3 {
        match &self.transform {
            InstanceTransform::Static { world2local, .. } => *world2local,
            InstanceTransform::Motion { .. } => self.local2world_at(time).inversed(),
        }
    }

    /// Per-lane world to local transforms, identity in inactive lanes.
    pub fn world2local_k<const K: usize>(
        &self,
        valid: LaneMask<K>,
        time: &[f32; K],
    ) -> AffineSpace3K<K> {
        match &self.transform {
            InstanceTransform::Static { world2local, .. } => AffineSpace3K::splat(world2local),
            InstanceTransform::Motion { .. } => {
                AffineSpace3K::from_active(valid, |i| self.world2local_at(time[i]))
            }
        }
    }

    /// Maps `time` to a segment index in `0..segments` and the position
    /// inside that segment.
    fn time_segment(&self, time: f32, segments: usize) -> (usize, f32) {
        let (start, end) = self.time_range;
        let normalized = ((time - start) / (end - start)).clamp(0.0, 1.0);

        // NaN times land on the first sample
        let normalized = if normalized.is_nan() { 0.0 } else { normalized };

        let scaled = normalized * segments as f32;
        let itime = (scaled.floor() as usize).min(segments - 1);
        (itime, scaled - itime as f32)
    }
}

impl BoundedGeometry for Instance {
    fn bounding_box(&self) -> AABB {
        let local = self.object.bounds();

        match &self.transform {
            InstanceTransform::Static { local2world, .. } => local.transformed(local2world),
            InstanceTransform::Motion { samples } => {
                let mut bounds = AABB::null();
                for xfm in samples {
                    bounds.contain_aabb(&local.transformed(xfm));
                }
                bounds
            }
        }
    }
}
