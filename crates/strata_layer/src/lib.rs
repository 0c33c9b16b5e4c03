//! Layer descriptors, the ordered layer stack, and the stack resolver.
//!
//! A layer is one slice of application source that can add to, extend, or
//! override definitions from the layers beneath it. The [`LayerResolver`]
//! locates and parses layer descriptors on a search path, resolves their
//! `extends` lists depth-first, and places each layer into a [`LayerStack`]
//! so that no layer ever precedes a layer it extends and every compiled layer
//! precedes every dynamic one.

#![warn(missing_docs)]

pub mod codes;
pub mod descriptor;
pub mod error;
pub mod layer;
pub mod resolver;
pub mod stack;

pub use descriptor::{parse_descriptor, DescriptorError, LayerDescriptor, DESCRIPTOR_EXTENSION};
pub use error::LayerError;
pub use layer::Layer;
pub use resolver::LayerResolver;
pub use stack::LayerStack;
