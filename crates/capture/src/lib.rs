pub mod access;
pub mod capture_dir;
pub mod config;
pub mod device;
pub mod encoder;
pub mod files;
pub mod source;
pub mod synthetic;

pub use access::DeviceAccessRequester;
pub use capture_dir::CaptureDir;
pub use config::CameraConfig;
pub use device::{CameraDevice, PixelFormat, camera_available};
pub use encoder::{FrameEncoder, MjpegPassthrough, YuyvEncoder};
pub use files::FsFileStore;
pub use source::{CameraSlot, V4lStillSource};
pub use synthetic::SyntheticFrameSource;
