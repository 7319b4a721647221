use thiserror::Error;

/// Reasons an instance can not be built. Traversal itself never fails.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InstanceError {
    #[error("transform at time step {time_step} is not invertible")]
    SingularTransform { time_step: usize },

    #[error("a motion instance needs at least one transform sample")]
    EmptyMotionSamples,

    #[error("invalid time range [{start}, {end}], start must be smaller than end")]
    InvalidTimeRange { start: f32, end: f32 },
}
