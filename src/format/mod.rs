/*!
Reference documentation for the envelope format.

These modules hold no code. They describe what is on the wire, for anyone implementing the format
elsewhere.

- [`envelope`]: the header layout and how compression applies to the body.
- [`builtins`]: the built-in namespace and its primitive containers.
*/

pub mod builtins;
pub mod envelope;
