//! Settings snapshot to `monerod` command line.

use super::{NetworkType, NodeSettings, RpcSslMode};
use std::fmt::Display;

/// Accumulates arguments, emitting a flag only when its value is not the
/// default.
struct ArgList {
    args: Vec<String>,
}

impl ArgList {
    fn new() -> Self {
        Self { args: Vec::new() }
    }

    fn switch(&mut self, enabled: bool, flag: &str) {
        if enabled {
            self.args.push(flag.to_string());
        }
    }

    fn changed<T: PartialEq + Display>(&mut self, flag: &str, value: &T, default: &T) {
        if value != default {
            self.pair(flag, value.to_string());
        }
    }

    /// Text setting with a non-empty default. Blank counts as unset.
    fn changed_text(&mut self, flag: &str, value: &str, default: &str) {
        let value = value.trim();
        if !value.is_empty() && value != default {
            self.pair(flag, value.to_string());
        }
    }

    /// Text setting whose default is the empty string.
    fn text(&mut self, flag: &str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.pair(flag, value.to_string());
        }
    }

    /// Comma-separated list; one flag per non-empty entry.
    fn list(&mut self, flag: &str, value: &str) {
        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            self.pair(flag, entry.to_string());
        }
    }

    fn pair(&mut self, flag: &str, value: String) {
        self.args.push(flag.to_string());
        self.args.push(value);
    }
}

/// Translate a settings snapshot into `monerod` arguments.
///
/// Pure: the same snapshot always yields the same list, in a fixed section
/// order. An all-default snapshot yields only `--non-interactive`.
///
/// `mining.bg_idle_threshold` and `mining.bg_miner_target` both feed
/// `--bg-mining-miner-target`; when both are set only the miner target is
/// passed, since the daemon rejects a repeated single-value option.
pub fn to_daemon_args(settings: &NodeSettings) -> Vec<String> {
    let d = NodeSettings::default();
    let mut out = ArgList::new();

    out.switch(settings.advanced.non_interactive, "--non-interactive");

    // Network
    let net = &settings.network;
    match net.network_type {
        NetworkType::Mainnet => {}
        NetworkType::Testnet => out.switch(true, "--testnet"),
        NetworkType::Stagenet => out.switch(true, "--stagenet"),
    }
    out.switch(net.offline, "--offline");
    out.switch(net.no_sync, "--no-sync");
    out.switch(net.public_node, "--public-node");
    out.switch(net.sync_pruned_blocks, "--sync-pruned-blocks");
    out.switch(net.pad_transactions, "--pad-transactions");

    // P2P
    let p2p = &settings.p2p;
    out.changed_text("--p2p-bind-ip", &p2p.bind_ip, &d.p2p.bind_ip);
    out.changed("--p2p-bind-port", &p2p.bind_port, &d.p2p.bind_port);
    out.switch(p2p.use_ipv6, "--p2p-use-ipv6");
    out.changed("--p2p-external-port", &p2p.external_port, &d.p2p.external_port);
    out.changed("--out-peers", &p2p.out_peers, &d.p2p.out_peers);
    out.changed("--in-peers", &p2p.in_peers, &d.p2p.in_peers);
    out.changed(
        "--max-connections-per-ip",
        &p2p.max_connections_per_ip,
        &d.p2p.max_connections_per_ip,
    );
    out.switch(p2p.hide_my_port, "--hide-my-port");
    out.switch(p2p.allow_local_ip, "--allow-local-ip");
    out.list("--add-priority-node", &p2p.priority_nodes);
    out.list("--add-exclusive-node", &p2p.exclusive_nodes);
    out.list("--seed-node", &p2p.seed_nodes);
    out.text("--ban-list", &p2p.ban_list);

    // Bandwidth
    let bw = &settings.bandwidth;
    out.changed("--limit-rate-up", &bw.limit_rate_up, &d.bandwidth.limit_rate_up);
    out.changed("--limit-rate-down", &bw.limit_rate_down, &d.bandwidth.limit_rate_down);

    // RPC
    let rpc = &settings.rpc;
    out.changed_text("--rpc-bind-ip", &rpc.bind_ip, &d.rpc.bind_ip);
    out.changed("--rpc-bind-port", &rpc.bind_port, &d.rpc.bind_port);
    out.changed_text(
        "--rpc-restricted-bind-ip",
        &rpc.restricted_bind_ip,
        &d.rpc.restricted_bind_ip,
    );
    out.changed(
        "--rpc-restricted-bind-port",
        &rpc.restricted_bind_port,
        &d.rpc.restricted_bind_port,
    );
    out.switch(rpc.restricted, "--restricted-rpc");
    out.switch(rpc.use_ipv6, "--rpc-use-ipv6");
    out.text("--rpc-login", &rpc.login);
    out.switch(rpc.confirm_external_bind, "--confirm-external-bind");
    out.text("--rpc-access-control-origins", &rpc.access_control_origins);
    out.changed("--rpc-max-connections", &rpc.max_connections, &d.rpc.max_connections);
    out.switch(rpc.disable_ban, "--disable-rpc-ban");

    // RPC TLS
    let ssl = &settings.rpcssl;
    match ssl.mode {
        RpcSslMode::Autodetect => {}
        RpcSslMode::Enabled => out.pair("--rpc-ssl", "enabled".into()),
        RpcSslMode::Disabled => out.pair("--rpc-ssl", "disabled".into()),
    }
    out.text("--rpc-ssl-private-key", &ssl.private_key);
    out.text("--rpc-ssl-certificate", &ssl.certificate);
    out.text("--rpc-ssl-ca-certificates", &ssl.ca_certificates);
    out.switch(ssl.allow_any_cert, "--rpc-ssl-allow-any-cert");
    out.switch(ssl.allow_chained, "--rpc-ssl-allow-chained");

    // Messaging: disabling wins over every other messaging setting
    let zmq = &settings.messaging;
    if zmq.disabled {
        out.switch(true, "--no-zmq");
    } else {
        out.changed_text("--zmq-rpc-bind-ip", &zmq.bind_ip, &d.messaging.bind_ip);
        out.changed("--zmq-rpc-bind-port", &zmq.bind_port, &d.messaging.bind_port);
        out.text("--zmq-pub", &zmq.publish);
    }

    // Proxy
    let proxy = &settings.proxy;
    out.text("--proxy", &proxy.address);
    out.switch(proxy.allow_dns_leaks, "--allow-dns-leaks");
    out.text("--tx-proxy", &proxy.tx_proxy);
    out.text("--anonymous-inbound", &proxy.anonymous_inbound);

    // Bootstrap daemon
    let boot = &settings.bootstrap;
    out.text("--bootstrap-daemon-address", &boot.address);
    out.text("--bootstrap-daemon-login", &boot.login);
    out.text("--bootstrap-daemon-proxy", &boot.proxy);

    // Blockchain
    let chain = &settings.blockchain;
    out.switch(chain.prune, "--prune-blockchain");
    out.changed_text("--db-sync-mode", &chain.db_sync_mode, &d.blockchain.db_sync_mode);
    out.switch(chain.db_salvage, "--db-salvage");
    out.switch(!chain.fast_block_sync, "--fast-block-sync=0");
    out.switch(chain.keep_alt_blocks, "--keep-alt-blocks");
    out.changed(
        "--max-txpool-weight",
        &chain.max_txpool_weight,
        &d.blockchain.max_txpool_weight,
    );
    out.changed(
        "--block-sync-size",
        &chain.block_sync_size,
        &d.blockchain.block_sync_size,
    );

    // DNS
    let dns = &settings.dns;
    out.switch(dns.enforce_checkpoints, "--enforce-dns-checkpoints");
    out.switch(dns.disable_checkpoints, "--disable-dns-checkpoints");
    out.switch(dns.enable_blocklist, "--enable-dns-blocklist");
    out.changed_text("--check-updates", &dns.check_updates, &d.dns.check_updates);

    // NAT
    out.changed_text("--igd", &settings.nat.igd, &d.nat.igd);

    // Mining
    let mining = &settings.mining;
    if !mining.address.trim().is_empty() && mining.threads != 0 {
        out.pair("--start-mining", mining.address.trim().to_string());
        out.pair("--mining-threads", mining.threads.to_string());
    }
    out.switch(mining.bg_enable, "--bg-mining-enable");
    out.switch(mining.bg_ignore_battery, "--bg-mining-ignore-battery");
    let bg_target = if mining.bg_miner_target != 0 {
        mining.bg_miner_target
    } else {
        mining.bg_idle_threshold
    };
    out.changed("--bg-mining-miner-target", &bg_target, &0);

    // Logging
    let log = &settings.logging;
    out.changed_text("--log-level", &log.level, &d.logging.level);
    out.changed("--max-log-file-size", &log.max_file_size, &d.logging.max_file_size);
    out.changed("--max-log-files", &log.max_files, &d.logging.max_files);

    // Performance
    let perf = &settings.performance;
    out.changed(
        "--max-concurrency",
        &perf.max_concurrency,
        &d.performance.max_concurrency,
    );
    out.changed(
        "--prep-blocks-threads",
        &perf.prep_blocks_threads,
        &d.performance.prep_blocks_threads,
    );

    // Advanced
    let adv = &settings.advanced;
    out.text("--config-file", &adv.config_file);
    out.text("--data-dir", &adv.data_dir);
    out.text("--extra-messages-file", &adv.extra_messages_file);

    // Free-form flags go last so they can override anything above
    out.args
        .extend(settings.runtime.extra_flags.split_whitespace().map(String::from));

    out.args
}
