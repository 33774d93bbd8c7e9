//! Contracts between the adapter and a protocol stack: the synchronous
//! boolean-result transport, and the asynchronous bus/timer pair.
pub mod can_bus;
pub mod frame_transport;
pub mod korri_timer;
