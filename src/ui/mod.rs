/// Terminal collaborators: keyboard input, rendering and sound.

pub mod input;
pub mod renderer;
pub mod sound;
