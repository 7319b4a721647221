//! Bounded record of the instances a traversal is currently nested in.
//!
//! Entry `i` holds the transforms accumulated from the traversal root down to
//! nesting level `i`, not just the transform introduced at that level.

use std::ops::{Deref, DerefMut};

use super::{affine::AffineSpace3, context::UserContext};

/// How many instances can be nested inside each other. Deeper instances are
/// skipped by the traversal.
pub const MAX_INSTANCE_LEVEL_COUNT: usize = 8;

/// Marks unused instance stack slots and hit records without a hit.
pub const INVALID_GEOMETRY_ID: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct InstanceStack {
    inst_id: [u32; MAX_INSTANCE_LEVEL_COUNT],
    world2inst: [AffineSpace3; MAX_INSTANCE_LEVEL_COUNT],
    inst2world: [AffineSpace3; MAX_INSTANCE_LEVEL_COUNT],
    size: usize,
}

impl InstanceStack {
    pub fn new() -> Self {
        Self {
            inst_id: [INVALID_GEOMETRY_ID; MAX_INSTANCE_LEVEL_COUNT],
            world2inst: [AffineSpace3::identity(); MAX_INSTANCE_LEVEL_COUNT],
            inst2world: [AffineSpace3::identity(); MAX_INSTANCE_LEVEL_COUNT],
            size: 0,
        }
    }

    /// Pushes an instance with its own (not accumulated) transforms.
    ///
    /// Returns `false` and leaves the stack untouched when it is already
    /// `MAX_INSTANCE_LEVEL_COUNT` deep.
    #[inline]
    pub fn push(
        &mut self,
        instance_id: u32,
        world2inst: &AffineSpace3,
        inst2world: &AffineSpace3,
    ) -> bool {
        let size = self.size;
        if size >= MAX_INSTANCE_LEVEL_COUNT {
            return false;
        }

        self.inst_id[size] = instance_id;

        if size == 0 {
            self.world2inst[0] = *world2inst;
            self.inst2world[0] = *inst2world;
        } else {
            self.world2inst[size] = *world2inst * self.world2inst[size - 1];
            self.inst2world[size] = self.inst2world[size - 1] * *inst2world;
        }

        self.size += 1;
        true
    }

    /// Pops the innermost instance. Must not be called on an empty stack.
    #[inline]
    pub fn pop(&mut self) {
        debug_assert!(self.size > 0, "pop on an empty instance stack");
        self.size -= 1;
        self.inst_id[self.size] = INVALID_GEOMETRY_ID;
    }

    pub fn depth(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self) -> bool {
        self.size >= MAX_INSTANCE_LEVEL_COUNT
    }

    /// Ids of the instances currently entered, outermost first.
    pub fn ids(&self) -> &[u32] {
        &self.inst_id[..self.size]
    }

    /// All id slots, unused ones hold [`INVALID_GEOMETRY_ID`].
    pub fn id_slots(&self) -> [u32; MAX_INSTANCE_LEVEL_COUNT] {
        self.inst_id
    }

    /// Accumulated world to instance transform of the innermost instance.
    pub fn world2inst(&self) -> Option<&AffineSpace3> {
        self.size.checked_sub(1).map(|top| &self.world2inst[top])
    }

    /// Accumulated instance to world transform of the innermost instance.
    pub fn inst2world(&self) -> Option<&AffineSpace3> {
        self.size.checked_sub(1).map(|top| &self.inst2world[top])
    }

    pub fn world2inst_at(&self, level: usize) -> Option<&AffineSpace3> {
        self.world2inst[..self.size].get(level)
    }

    pub fn inst2world_at(&self, level: usize) -> Option<&AffineSpace3> {
        self.inst2world[..self.size].get(level)
    }
}

impl Default for InstanceStack {
    fn default() -> Self {
        Self::new()
    }
}

/// An entered instance. Pops it from the stack when dropped, so every
/// successful push is matched by exactly one pop on every exit path.
#[derive(Debug)]
pub struct InstanceScope<'a> {
    user: &'a mut UserContext,
}

impl<'a> InstanceScope<'a> {
    /// Enters an instance, or returns `None` if the stack is full.
    #[inline]
    pub fn push(
        user: &'a mut UserContext,
        instance_id: u32,
        world2inst: &AffineSpace3,
        inst2world: &AffineSpace3,
    ) -> Option<Self> {
        if user.inst_stack.push(instance_id, world2inst, inst2world) {
            Some(Self { user })
        } else {
            None
        }
    }
}

impl Deref for InstanceScope<'_> {
    type Target = UserContext;

    fn deref(&self) -> &UserContext {
        &*self.user
    }
}

impl DerefMut for InstanceScope<'_> {
    fn deref_mut(&mut self) -> &mut UserContext {
        &mut *self.user
    }
}

impl Drop for InstanceScope<'_> {
    fn drop(&mut self) {
        self.user.inst_stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use ultraviolet::Vec3;

    use super::*;

    fn translation(x: f32, y: f32, z: f32) -> AffineSpace3 {
        AffineSpace3::from_translation(Vec3::new(x, y, z))
    }

    #[test]
    fn test_push_pop() {
        let mut stack = InstanceStack::new();
        let xfm = translation(1.0, 0.0, 0.0);

        assert!(stack.push(4, &xfm.inversed(), &xfm));
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.ids(), &[4]);
        assert_eq!(stack.world2inst(), Some(&xfm.inversed()));
        assert_eq!(stack.inst2world(), Some(&xfm));

        stack.pop();
        assert!(stack.is_empty());
        assert_eq!(stack.id_slots(), [INVALID_GEOMETRY_ID; MAX_INSTANCE_LEVEL_COUNT]);
        assert_eq!(stack.world2inst(), None);
    }

    #[test]
    fn test_depth_limit() {
        let mut stack = InstanceStack::new();
        let xfm = translation(0.0, 1.0, 0.0);

        for i in 0..MAX_INSTANCE_LEVEL_COUNT {
            assert_eq!(stack.depth(), i);
            assert!(stack.push(i as u32, &xfm.inversed(), &xfm));
            assert_eq!(stack.depth(), i + 1);
        }

        assert!(stack.is_full());

        let before = stack.clone();
        assert!(!stack.push(99, &xfm, &xfm));
        assert_eq!(stack.depth(), MAX_INSTANCE_LEVEL_COUNT);
        assert_eq!(stack.id_slots(), before.id_slots());
        assert_eq!(stack.world2inst(), before.world2inst());
        assert_eq!(stack.inst2world(), before.inst2world());

        // the accumulated translation went up by one per level
        let top = stack.inst2world().unwrap();
        assert_eq!(top.p, Vec3::new(0.0, MAX_INSTANCE_LEVEL_COUNT as f32, 0.0));
    }

    #[test]
    fn test_composition() {
        let t1 = translation(1.0, 2.0, 3.0).then(&AffineSpace3::from_rotation_z(0.4));
        let t2 = AffineSpace3::from_nonuniform_scale(Vec3::new(2.0, 1.0, 0.5))
            .then(&translation(-4.0, 0.0, 1.0));

        let mut stack = InstanceStack::new();
        assert!(stack.push(0, &t1.inversed(), &t1));
        assert!(stack.push(1, &t2.inversed(), &t2));

        let world2inst = *stack.world2inst_at(1).unwrap();
        let inst2world = *stack.inst2world_at(1).unwrap();
        assert_eq!(world2inst, t2.inversed() * t1.inversed());
        assert_eq!(inst2world, t1 * t2);

        let point = Vec3::new(3.0, -7.0, 11.0);
        let sequential = t2.inversed().transform_point(t1.inversed().transform_point(point));
        let cumulative = world2inst.transform_point(point);
        assert!((sequential - cumulative).mag() <= 1e-5 * sequential.mag().max(1.0));

        let back = inst2world.transform_point(cumulative);
        assert!((back - point).mag() <= 1e-4 * point.mag());
    }

    #[test]
    fn test_scope_pops_on_drop() {
        let mut user = UserContext::new();
        let xfm = translation(1.0, 1.0, 1.0);

        {
            let mut outer = InstanceScope::push(&mut user, 1, &xfm, &xfm).unwrap();
            assert_eq!(outer.inst_stack.depth(), 1);

            {
                let inner = InstanceScope::push(&mut outer, 2, &xfm, &xfm).unwrap();
                assert_eq!(inner.inst_stack.ids(), &[1, 2]);
            }

            assert_eq!(outer.inst_stack.ids(), &[1]);
        }

        assert!(user.inst_stack.is_empty());
    }

    #[test]
    fn test_scope_refused_when_full() {
        let mut user = UserContext::new();
        let xfm = AffineSpace3::identity();

        for i in 0..MAX_INSTANCE_LEVEL_COUNT {
            assert!(user.inst_stack.push(i as u32, &xfm, &xfm));
        }

        assert!(InstanceScope::push(&mut user, 42, &xfm, &xfm).is_none());
        assert_eq!(user.inst_stack.depth(), MAX_INSTANCE_LEVEL_COUNT);
    }
}
