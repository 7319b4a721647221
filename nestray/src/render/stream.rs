//! Batches of independent traversals, spread over the rayon thread pool.
//!
//! The scene is shared read-only. Every worker gets its own
//! [`UserContext`], the instance stack is per traversal state.

use log::debug;
use rayon::prelude::*;

use super::{
    context::{IntersectContext, UserContext},
    math::{Ray, RayHit},
    packet::{LaneMask, RayHitK},
    scene::Scene,
};

pub fn intersect_stream(scene: &Scene, rays: &mut [RayHit]) {
    debug!("intersecting a stream of {} rays", rays.len());

    rays.par_iter_mut().for_each_init(UserContext::new, |user, ray| {
        let mut context = IntersectContext::new(scene, user);
        scene.intersect(ray, &mut context);
    });
}

/// Returns for each ray whether it is blocked.
pub fn occluded_stream(scene: &Scene, rays: &mut [Ray]) -> Vec<bool> {
    debug!("testing occlusion of a stream of {} rays", rays.len());

    rays.par_iter_mut()
        .map_init(UserContext::new, |user, ray| {
            let mut context = IntersectContext::new(scene, user);
            scene.occluded(ray, &mut context)
        })
        .collect()
}

/// Intersects packets, each with its own set of active lanes.
pub fn intersect_packets<const K: usize>(
    scene: &Scene,
    packets: &mut [(LaneMask<K>, RayHitK<K>)],
) {
    debug!("intersecting {} packets of {} rays", packets.len(), K);

    packets
        .par_iter_mut()
        .for_each_init(UserContext::new, |user, (valid, ray)| {
            let mut context = IntersectContext::new(scene, user);
            scene.intersect_packet(*valid, ray, &mut context);
        });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{rngs::StdRng, Rng, SeedableRng};
    use ultraviolet::Vec3;

    use crate::render::{
        affine::AffineSpace3,
        packet::RayK,
        raytracable::{Instance, Sphere},
    };

    use super::*;

    fn world() -> Scene {
        let mut child = Scene::new();
        child.attach(Sphere::new(Vec3::zero(), 1.0));
        let child = Arc::new(child);

        let mut world = Scene::new();
        for i in 0..4 {
            let xfm = AffineSpace3::from_rotation_z(i as f32)
                .then(&AffineSpace3::from_translation(Vec3::new(4.0 * i as f32, 0.0, 0.0)));
            world.attach(Instance::new(child.clone(), xfm).unwrap());
        }
        world
    }

    fn random_rays(count: usize) -> Vec<Ray> {
        let mut rng = StdRng::seed_from_u64(7);
        (0..count)
            .map(|_| {
                let target = Vec3::new(rng.gen_range(-2.0..14.0), rng.gen_range(-2.0..2.0), 0.0);
                let org = Vec3::new(rng.gen_range(-2.0..14.0), -20.0, rng.gen_range(-1.0..1.0));
                Ray::new(org, target - org)
            })
            .collect()
    }

    #[test]
    fn test_stream_matches_sequential() {
        let world = world();
        let rays = random_rays(512);

        let mut stream: Vec<RayHit> = rays.iter().copied().map(RayHit::new).collect();
        intersect_stream(&world, &mut stream);

        let mut shadows = rays.clone();
        let occluded = occluded_stream(&world, &mut shadows);

        let mut user = UserContext::new();
        for (i, ray) in rays.iter().enumerate() {
            let mut context = IntersectContext::new(&world, &mut user);
            let mut single = RayHit::new(*ray);
            world.intersect(&mut single, &mut context);

            assert_eq!(stream[i], single);
            assert_eq!(occluded[i], single.hit.is_hit());
        }
    }

    #[test]
    fn test_packets() {
        let world = world();

        // aimed clearly inside or clearly between the spheres
        let rays: Vec<Ray> = (0..64)
            .map(|i| {
                let x = 4.0 * (i % 4) as f32 + [0.0, 0.4, -0.5, 2.0][(i / 4) % 4];
                Ray::new(Vec3::new(x, -20.0, 0.1), Vec3::unit_y())
            })
            .collect();

        let mut packets: Vec<_> = rays
            .chunks(8)
            .map(|chunk| {
                (
                    LaneMask::<8>::full(),
                    RayHitK::new(RayK::from_fn(|i| chunk[i])),
                )
            })
            .collect();
        intersect_packets(&world, &mut packets);

        let mut user = UserContext::new();
        for (p, (_, packet)) in packets.iter().enumerate() {
            for i in 0..8 {
                let mut context = IntersectContext::new(&world, &mut user);
                let mut single = RayHit::new(rays[p * 8 + i]);
                world.intersect(&mut single, &mut context);

                assert_eq!(packet.hit.lane(i).geom_id, single.hit.geom_id);
                assert_eq!(packet.hit.lane(i).inst_id, single.hit.inst_id);
            }
        }
    }
}
