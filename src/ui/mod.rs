/// User interface module
///
/// The frame has a single screen: the current photo on black.

pub mod frame;

pub use frame::DisplayFrame;
