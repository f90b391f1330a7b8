//! id Tech 3 format decoding for repacking: BSP entity/shader lumps, MD3
//! surface materials, shader scripts. Geometry is never decoded; the packer
//! only needs reference relationships.
#![forbid(unsafe_code)]

pub mod bsp;
pub mod md3;
pub mod shader;
