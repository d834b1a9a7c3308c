use serde::{Deserialize, Serialize};

/// Per-video UI playback state.
///
/// Videos start paused and muted; toggles only flip the descriptor once the
/// rendering surface accepted the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackDescriptor {
    pub playing: bool,
    pub muted: bool,
}

impl Default for PlaybackDescriptor {
    fn default() -> Self {
        Self {
            playing: false,
            muted: true,
        }
    }
}

impl PlaybackDescriptor {
    pub fn toggled_play(self) -> Self {
        Self {
            playing: !self.playing,
            ..self
        }
    }

    pub fn toggled_mute(self) -> Self {
        Self {
            muted: !self.muted,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_paused_and_muted() {
        let desc = PlaybackDescriptor::default();
        assert!(!desc.playing);
        assert!(desc.muted);
    }

    #[test]
    fn test_toggles_are_independent() {
        let desc = PlaybackDescriptor::default().toggled_play();
        assert_eq!(desc, PlaybackDescriptor { playing: true, muted: true });

        let desc = desc.toggled_mute().toggled_play();
        assert_eq!(desc, PlaybackDescriptor { playing: false, muted: false });
    }
}
