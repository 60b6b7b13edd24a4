//! Browser-side core of the ripple mirror.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It turns raw
//! mouse and touch input into charges (held, jittering discs that emit
//! expanding ripples), draws bonds between concurrently held charges, and
//! replicates every gesture through the relay so all clients see each other.
//! The host JavaScript layer is responsible only for wiring DOM events and the
//! websocket to the engine and for carrying out the returned
//! [`engine::Action`]s.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`mirror`] | Charge collection, bonds, garbage collection, charge factory |
//! | [`sync`] | Outbound commands and inbound relay frames |
//! | [`charge`] | One press gesture: lifecycle, jitter, ripples |
//! | [`press`] | Input source to charge tracking |
//! | [`tween`] | Animated properties and easing |
//! | [`color`] | RGBA colours |
//! | [`viewport`] | Client/fractional/pixel coordinate conversion |
//! | [`render`] | The `Painter` drawing seam |
//! | [`consts`] | Shared numeric constants (timings, widths, precision) |

pub mod charge;
pub mod color;
pub mod consts;
pub mod engine;
pub mod mirror;
pub mod press;
pub mod render;
pub mod sync;
pub mod tween;
pub mod viewport;
