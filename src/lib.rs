//! # Arbor
//!
//! A handle-based scene graph and resource management core for 3D engines.
//!
//! The umbrella crate ties the workspace together behind a single [`Engine`]
//! context:
//!
//! - `arbor_core`: handles, errors, the diagnostic queue, bounds
//! - `arbor_resources`: named, typed, reference-counted resources
//! - `arbor_animation`: animation stages and layered blending
//! - `arbor_scene`: the node tree, transforms, queries, cameras and emitters
//!
//! Drawing is left to an external pipeline: [`Engine::render`] produces a
//! [`RenderQueue`] per camera and hands it to the installed [`RenderBackend`].

pub mod engine;
pub mod options;
pub mod render;
pub mod stats;

pub use engine::Engine;
pub use options::{EngineOption, EngineOptions};
pub use render::{EmitterDraw, LightDraw, MeshDraw, Overlay, RenderBackend, RenderQueue};
pub use stats::EngineStat;

pub use arbor_core::{ArborError, BoundingBox, LogLevel, Message, NodeHandle, ResHandle, Result};
pub use arbor_resources::{
    AnimParam, GeoParam, MatParam, PartEffParam, PipeParam, ResElem, ResFlags, ResParam, ResStream, ResourceType,
    ShaderParam, StreamMap, TexParam, TextureFormat,
};
pub use arbor_scene::{
    CameraParam, EmitterParam, JointParam, LightParam, MeshParam, ModelParam, NodeFlags, NodeParam, NodeType, RayHit,
    SceneSettings,
};

pub use arbor_animation;
pub use arbor_core;
pub use arbor_resources;
pub use arbor_scene;
