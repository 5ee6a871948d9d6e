pub mod bsdf;
pub mod camera;
pub mod config;
pub mod demo_scenes;
pub mod driver;
pub mod error;
pub mod hash_grid;
pub mod ibl;
pub mod image;
pub mod path_state;
pub mod pt;
pub mod rng;
pub mod scene;
pub mod surface;
pub mod texture;
pub mod vcm;
