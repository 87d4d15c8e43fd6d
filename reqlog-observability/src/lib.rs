pub mod rotating_file;

pub use rotating_file::RotatingFileWriter;
