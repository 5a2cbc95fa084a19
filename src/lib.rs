pub mod cascade;
pub mod club_resolver;
pub mod config;
pub mod error;
pub mod http_cache;
pub mod http_client;
pub mod ingest;
pub mod join;
pub mod lookup;
pub mod match_row;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod pool;
pub mod record;
pub mod report;
pub mod roster;
pub mod similarity;
