//! Animation collaborator types
//!
//! The scene-graph core only does bookkeeping here: nodes own a list of
//! animations and a map of named frame ranges, and fan range creation and
//! deletion out to every animation in the list. Actual playback and keyframe
//! evaluation live outside this crate; `begin_animation` hands callers an
//! [`Animatable`] record describing what to play.

use std::collections::HashMap;

use crate::scene::NodeKey;

/// A named sub-range of an animation's frame span.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationRange {
    /// Range name, unique per node
    pub name: String,
    /// First frame of the range (inclusive)
    pub from: f32,
    /// Last frame of the range (inclusive)
    pub to: f32,
}

impl AnimationRange {
    /// Create a new animation range
    pub fn new(name: impl Into<String>, from: f32, to: f32) -> Self {
        Self {
            name: name.into(),
            from,
            to,
        }
    }
}

/// A single animation track attached to a node.
///
/// Keyframe storage and interpolation are external concerns; the core keeps
/// only the identity of the track and its named ranges so that node-level
/// range operations can fan out.
#[derive(Debug, Clone, Default)]
pub struct Animation {
    /// Track name
    pub name: String,
    ranges: HashMap<String, AnimationRange>,
}

impl Animation {
    /// Create a new animation track
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ranges: HashMap::new(),
        }
    }

    /// Register a named frame range on this track.
    pub fn create_range(&mut self, name: &str, from: f32, to: f32) {
        self.ranges
            .insert(name.to_owned(), AnimationRange::new(name, from, to));
    }

    /// Remove a named frame range from this track.
    ///
    /// `delete_frames` is forwarded from the node-level call; a full playback
    /// implementation would drop the keyframes inside the range as well.
    pub fn delete_range(&mut self, name: &str, _delete_frames: bool) {
        self.ranges.remove(name);
    }

    /// Look up a named range on this track.
    pub fn get_range(&self, name: &str) -> Option<&AnimationRange> {
        self.ranges.get(name)
    }
}

/// Playback handle returned by [`crate::Scene::begin_animation`].
///
/// Describes the frame span to play for a node; the embedding animation
/// engine drives the actual playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Animatable {
    /// Node the playback targets
    pub target: NodeKey,
    /// First frame (inclusive)
    pub from: f32,
    /// Last frame (inclusive)
    pub to: f32,
    /// Whether playback should loop
    pub loop_animation: bool,
    /// Playback speed multiplier
    pub speed_ratio: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_round_trip() {
        let mut animation = Animation::new("walk_cycle");
        animation.create_range("walk", 0.0, 30.0);

        let range = animation.get_range("walk").unwrap();
        assert_eq!(range.from, 0.0);
        assert_eq!(range.to, 30.0);

        animation.delete_range("walk", true);
        assert!(animation.get_range("walk").is_none());
    }

    #[test]
    fn test_delete_missing_range_is_noop() {
        let mut animation = Animation::new("idle");
        animation.delete_range("missing", false);
        assert!(animation.get_range("missing").is_none());
    }
}
