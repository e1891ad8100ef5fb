//! Risk management module.
//!
//! Provides position sizing for both strategies:
//! - Breakout: fixed dollar risk per trade, minimum one contract
//! - Straddle: fixed capital per trade, skipped when it cannot fund one

pub mod position_sizer;

pub use position_sizer::{PositionSizer, SizingResult};
