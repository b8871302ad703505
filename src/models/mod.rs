//! Model storage and inference

pub mod manager;
pub mod yolo;

pub use manager::ModelManager;
pub use yolo::{ModelDetection, YoloModel, COCO_CLASSES};
