//! Expression parser module: infix token streams to postfix order.

pub mod precedence;
pub mod shunting_yard;

pub use shunting_yard::to_postfix;
