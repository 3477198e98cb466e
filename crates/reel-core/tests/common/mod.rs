#![allow(dead_code)]

pub mod render_server;

use reel_core::script::{ProductionRequest, SceneData, Script, VideoStyle};

/// A three-scene request (5s + 3s + 2s).
pub fn sample_request() -> ProductionRequest {
    let scene = |text: &str, duration| SceneData {
        text: text.to_string(),
        duration,
        image_keywords: vec!["city".to_string()],
        transition: "fade".to_string(),
    };
    ProductionRequest::new(Script {
        title: "Morning news".to_string(),
        scenes: vec![
            scene("intro", 5.0),
            scene("headline", 3.0),
            scene("outro", 2.0),
        ],
        total_duration: 10.0,
        style: VideoStyle::Business,
    })
}
