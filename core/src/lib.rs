pub mod archive;
pub mod codec;
pub mod compositor;
pub mod engine;
pub mod error;
pub mod grid;
pub mod interpreter;
pub mod pathing;
pub mod pool;
pub mod rules;
pub mod save;
pub mod sprite;
pub mod vm;

pub mod prelude {
    pub use crate::archive::Archive;
    pub use crate::compositor::{compose_frame, Blitter, DirtyRects, Palette, Rect, Surface};
    pub use crate::engine::{ActionTable, EngineState};
    pub use crate::error::{FormatError, LogicError, VmError};
    pub use crate::grid::Grid;
    pub use crate::interpreter::{do_actions, sweep_tick, Rng};
    pub use crate::pool::{Object, ObjectPool};
    pub use crate::rules::{Actions, ObjectAction};
    pub use crate::save::{GameScreen, GameScreens, SaveError, SaveHeader, ScrambleKey};
    pub use crate::vm::{memory::Memory, VmHost, VmThread};
}
