use dashmap::DashMap;

use crate::common::{UserId, VoiceTarget};

/// Per-user default voice destination for commands sent outside a guild.
#[derive(Default)]
pub struct VoicePreferences {
    targets: DashMap<UserId, VoiceTarget>,
}

impl VoicePreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, user_id: UserId, target: VoiceTarget) {
        self.targets.insert(user_id, target);
    }

    pub fn unbind(&self, user_id: &UserId) -> Option<VoiceTarget> {
        self.targets.remove(user_id).map(|(_, target)| target)
    }

    pub fn get(&self, user_id: &UserId) -> Option<VoiceTarget> {
        self.targets.get(user_id).map(|t| t.clone())
    }
}
