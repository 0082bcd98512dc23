pub mod discord_client;
pub mod market_client;
pub mod ml_client;
