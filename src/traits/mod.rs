//! Operator and numeric-trait implementations for the scalar types.

mod dual_num_traits;
mod dual_ops;
mod var_num_traits;
mod var_ops;
