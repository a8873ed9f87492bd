pub mod buffer_ops;
