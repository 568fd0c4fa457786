pub mod bitstream_io;
pub mod codecs;
pub mod errors;
