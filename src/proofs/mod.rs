pub mod artifact;
pub mod generators;
pub mod helper;
pub mod provers;
