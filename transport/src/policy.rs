//! Per-channel lifecycle policy and its resolution order.

use std::collections::HashMap;

/// The two policy bits attached to every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    /// Terminate the process on EOF (read) or broken-pipe (write)
    pub exit_on_close: bool,
    /// Swallow transient write errors so the caller may retry
    pub retry: bool,
}

impl ChannelPolicy {
    /// Built-in default for `stdin`/`stdout`/`stderr`.
    pub const STANDARD: ChannelPolicy = ChannelPolicy {
        exit_on_close: true,
        retry: false,
    };

    /// Built-in default for every other channel (FIFOs, files, explicit FDs).
    pub const OTHER: ChannelPolicy = ChannelPolicy {
        exit_on_close: false,
        retry: false,
    };

    fn default_for(channel_id: &str) -> ChannelPolicy {
        match channel_id {
            "stdin" | "stdout" | "stderr" => ChannelPolicy::STANDARD,
            _ => ChannelPolicy::OTHER,
        }
    }
}

/// Inputs to [`resolve`], one per precedence tier (lowest to highest):
/// built-in default < module-supplied option < legacy `linger` alias <
/// global `--exit-on-close`/`--retry` parameter.
#[derive(Default)]
pub struct Resolution<'a> {
    /// Module-supplied override for this specific call, if any
    pub module_option: Option<ChannelPolicy>,
    /// Legacy `linger` flag: when present, `exit_on_close = !linger`
    pub legacy_linger: Option<bool>,
    /// Parsed `--exit-on-close=channelId=bool,...` map
    pub global_exit_on_close: Option<&'a HashMap<String, bool>>,
    /// Parsed `--retry=channelId=bool,...` map
    pub global_retry: Option<&'a HashMap<String, bool>>,
}

/// Compute the effective policy for `channel_id`, applying each tier in
/// order. Shared by both read and write.
pub fn resolve(channel_id: &str, r: Resolution<'_>) -> ChannelPolicy {
    let mut policy = ChannelPolicy::default_for(channel_id);

    if let Some(module) = r.module_option {
        policy = module;
    }
    if let Some(linger) = r.legacy_linger {
        policy.exit_on_close = !linger;
    }
    if let Some(v) = r.global_exit_on_close.and_then(|m| m.get(channel_id)) {
        policy.exit_on_close = *v;
    }
    if let Some(v) = r.global_retry.and_then(|m| m.get(channel_id)) {
        policy.retry = *v;
    }
    policy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_differ_by_channel_kind() {
        assert_eq!(resolve("stdin", Resolution::default()), ChannelPolicy::STANDARD);
        assert_eq!(resolve("side:0", Resolution::default()), ChannelPolicy::OTHER);
    }

    #[test]
    fn precedence_order_is_deterministic() {
        let mut global = HashMap::new();
        global.insert("stdin".to_string(), false);
        let resolution = Resolution {
            module_option: Some(ChannelPolicy { exit_on_close: true, retry: false }),
            legacy_linger: Some(true), // exit_on_close = false
            global_exit_on_close: Some(&global), // overrides back to false (same), but proves ordering
            global_retry: None,
        };
        let policy = resolve("stdin", resolution);
        // global parameter wins over legacy linger wins over module option wins over default
        assert!(!policy.exit_on_close);
    }
}
