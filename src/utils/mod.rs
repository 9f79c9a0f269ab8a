/// File utilities
pub mod files;

/// Hugging Face utilities
pub mod hugging_face;

/// Tensor Utilities
pub mod tensors;

/// Utilities for classification tasks
pub mod classes;

/// Device selection and seeding
pub mod device;
