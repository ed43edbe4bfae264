//! Navigation gating between the signed-out and signed-in screen groups.

pub mod gate;

pub use gate::{GateState, GateView, NavigationGate, Navigator, Route, ScreenGroup};
