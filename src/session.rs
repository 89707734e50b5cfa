use crate::{config::Config, models::Side};

/// Identity of the local player, injected into the components that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    player_address: Option<String>,
    side: Side,
}

impl SessionContext {
    pub fn new(player_address: Option<String>, side: Side) -> Self {
        Self {
            player_address: player_address.filter(|addr| !addr.trim().is_empty()),
            side,
        }
    }

    /// Falls back to X when `PLAYER_SIDE` is not a valid side code.
    pub fn from_config(config: &Config) -> Self {
        let side = Side::from_code(config.player_side as u128).unwrap_or(Side::X);
        Self::new(config.player_address.clone(), side)
    }

    pub fn player_address(&self) -> Option<&str> {
        self.player_address.as_deref()
    }

    pub fn side(&self) -> Side {
        self.side
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(None, Side::X)
    }
}
