//! The split/tee primitive (spec 4.7): pure bookkeeping for the side
//! target list. The actual non-blocking FIFO writes live in
//! `tmcp-transport`'s `FifoWriter`; this module just owns the configured
//! set of targets and their standing policy.

/// Side targets a split/tee module writes to, in addition to stdout.
/// Every side write uses `retry=true, exitOnClose=false` so a side-channel
/// failure can never affect the primary stdout chain.
#[derive(Debug, Clone, Default)]
pub struct SplitTargets {
    /// Positional paths given on the command line
    pub paths: Vec<String>,
}

impl SplitTargets {
    /// Build from the positional path list.
    pub fn new(paths: Vec<String>) -> Self {
        SplitTargets { paths }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_positional_paths_in_order() {
        let targets = SplitTargets::new(vec!["a.fifo".into(), "b.fifo".into()]);
        assert_eq!(targets.paths, vec!["a.fifo".to_string(), "b.fifo".to_string()]);
    }
}
