pub mod delivery;
pub mod subscription;
