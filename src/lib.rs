pub mod camera;
pub mod demo;
pub mod model;
pub mod rendering;
