// Gateway module for personas - follows the Train Station Pattern
// All external access must go through this gateway

mod registry;

pub use registry::Persona;
