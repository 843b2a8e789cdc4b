pub mod collaborators;
pub mod contracts;
pub mod paper;
