//! Hardware-facing infrastructure: the TWAI peripheral driver seam and the
//! registry enforcing exclusive ownership of the controller.
pub mod registry;
pub mod twai;
