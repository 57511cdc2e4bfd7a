use arena_core::{MatchConfig, PacketLossSimulation};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_clients: usize,
    pub match_config: MatchConfig,
    pub global_packet_loss: Option<PacketLossSimulation>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", arena_core::DEFAULT_PORT),
            max_clients: 2,
            match_config: MatchConfig::default(),
            global_packet_loss: None,
        }
    }
}
