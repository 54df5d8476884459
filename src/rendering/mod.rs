pub mod backend;
pub mod batch_assembler;
pub mod config;
pub mod error;
pub mod frame_list;
pub mod object_registry;
pub mod offscreen;
pub mod recording_backend;
pub mod scene;
pub mod slot_table;
pub mod wgpu_backend;
