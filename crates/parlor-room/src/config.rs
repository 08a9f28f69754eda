//! Room configuration.

/// Settings applied to every room the server manages.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Minimum participants required to start a game.
    pub min_participants: usize,

    /// Hard upper bound on any room's capacity. Requested capacities are
    /// clamped into `1..=max_capacity`.
    pub max_capacity: usize,

    /// Capacity used when a room is created without one.
    pub default_capacity: usize,

    /// Length of generated room codes.
    pub code_length: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_participants: 2,
            max_capacity: 16,
            default_capacity: 8,
            code_length: 6,
        }
    }
}

impl RoomConfig {
    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called by [`RoomStore::new`](crate::RoomStore::new). Rules:
    /// - `max_capacity` and `min_participants` are at least 1.
    /// - `default_capacity` is clamped into `1..=max_capacity`.
    /// - `code_length` is at least 4 (shorter codes collide too easily).
    pub fn validated(mut self) -> Self {
        self.max_capacity = self.max_capacity.max(1);
        self.min_participants = self.min_participants.max(1);
        self.default_capacity = self.default_capacity.clamp(1, self.max_capacity);
        self.code_length = self.code_length.max(4);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.min_participants, 2);
        assert_eq!(config.max_capacity, 16);
        assert_eq!(config.default_capacity, 8);
        assert_eq!(config.code_length, 6);
    }

    #[test]
    fn test_validated_clamps_degenerate_values() {
        let config = RoomConfig {
            min_participants: 0,
            max_capacity: 0,
            default_capacity: 50,
            code_length: 1,
        }
        .validated();

        assert_eq!(config.min_participants, 1);
        assert_eq!(config.max_capacity, 1);
        assert_eq!(config.default_capacity, 1);
        assert_eq!(config.code_length, 4);
    }

    #[test]
    fn test_validated_keeps_sane_values() {
        let config = RoomConfig::default().validated();
        assert_eq!(config.default_capacity, 8);
        assert_eq!(config.max_capacity, 16);
    }
}
