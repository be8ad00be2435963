mod message;
mod note;

pub use message::{Message, Role};
pub use note::{Note, NoteBuilder};
