use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,

    /// Peer addresses for the replicated log; empty or a single entry
    /// makes this node a self-elected leader.
    pub peers: Vec<String>,

    pub election_timeout_ms: u64,
    pub snapshot_interval_secs: u64,

    pub query_cache_entries: usize, // Cached search results per collection
    pub worker_queue_depth: usize,  // Bounded depth of each index worker's inbox
    pub batch_size: usize,          // Records validated per rayon batch in add_many
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: PathBuf::from("./data"),
            peers: Vec::new(),
            election_timeout_ms: 1000,
            snapshot_interval_secs: 3600,
            query_cache_entries: 1000,
            worker_queue_depth: 64,
            batch_size: 1000,
        }
    }
}
