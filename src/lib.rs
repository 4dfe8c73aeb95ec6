//! Map canvas engine for a personal task manager.
//!
//! Domains, projects and tasks are drawn as nested circles on a pannable,
//! zoomable map. The crate owns layout, hit-testing, gesture recognition,
//! undoable re-parenting and adaptive rendering; the surrounding
//! application supplies records, storage and UI through [`engine::Host`]
//! and pixels through [`render::Painter`].
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | `EngineCore` context object and the [`engine::Host`] seam |
//! | [`record`] | Domain, project and task records and the record store |
//! | [`layout`] | Pure records-to-positions layout and tag edges |
//! | [`scene`] | Rebuildable node index, hit-testing and culling |
//! | [`camera`] | Pan/zoom camera, coordinate conversion, fit animation |
//! | [`input`] | Pointer gesture state machine |
//! | [`transaction`] | Attach/detach/move mutations, pending slot, undo ring |
//! | [`render`] | Layered drawing and the frame-time quality governor |
//! | [`config`] | Engine options |
//! | [`consts`] | Shared numeric constants |
//! | `web` | Canvas 2D painter (feature `web`) |

pub mod camera;
pub mod config;
pub mod consts;
pub mod engine;
pub mod input;
pub mod layout;
pub mod record;
pub mod render;
pub mod scene;
pub mod transaction;

#[cfg(feature = "web")]
pub mod web;
