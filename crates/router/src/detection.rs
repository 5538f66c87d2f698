use hisho_protocol::BoundingBox;

/// Draws detector output over the screen.
pub trait DetectionOverlay: Send + Sync {
    fn show_detection(&self, boxes: &[BoundingBox], resnet_alive: bool);
}
