//! Runtime Configuration
//!
//! Command line / environment surface of the `causal-kv` binary, and the timeout settings
//! shared by every node. Library users build `Timeouts` directly (`Timeouts::default()` in tests).

use crate::clock::ProcessId;
use crate::topology::transport::CallPolicy;

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Timeouts and retry budgets used by replicas, clients and the coordinator.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Per-call timeout for Put/Get/epoch/link calls.
    pub rpc_timeout: Duration,
    /// Attempts for idempotent client-facing calls.
    pub rpc_attempts: usize,
    /// Budget for a claim (spans the claimed subtree) and for a scatter.
    pub gather_timeout: Duration,
    /// A claim older than this is considered abandoned by its root.
    pub round_timeout: Duration,
    /// How many times a contended round is retried before giving up.
    pub round_attempts: usize,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_millis(500),
            rpc_attempts: 3,
            gather_timeout: Duration::from_secs(10),
            round_timeout: Duration::from_secs(30),
            round_attempts: 5,
        }
    }
}

impl Timeouts {
    pub fn rpc_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: self.rpc_timeout,
            attempts: self.rpc_attempts,
        }
    }

    /// Policy for the coordinator's `/stabilize` call, which lasts a whole round.
    pub fn round_policy(&self) -> CallPolicy {
        let per_round = self.gather_timeout * 2 + self.rpc_timeout;
        CallPolicy::once(per_round * self.round_attempts.max(1) as u32)
    }
}

#[derive(Args, Debug, Clone)]
pub struct TimeoutArgs {
    #[arg(long, env = "CAUSAL_KV_RPC_TIMEOUT_MS", default_value_t = 500)]
    pub rpc_timeout_ms: u64,

    #[arg(long, env = "CAUSAL_KV_RPC_ATTEMPTS", default_value_t = 3)]
    pub rpc_attempts: usize,

    #[arg(long, env = "CAUSAL_KV_GATHER_TIMEOUT_MS", default_value_t = 10_000)]
    pub gather_timeout_ms: u64,

    #[arg(long, env = "CAUSAL_KV_ROUND_TIMEOUT_MS", default_value_t = 30_000)]
    pub round_timeout_ms: u64,

    #[arg(long, env = "CAUSAL_KV_ROUND_ATTEMPTS", default_value_t = 5)]
    pub round_attempts: usize,
}

impl From<&TimeoutArgs> for Timeouts {
    fn from(args: &TimeoutArgs) -> Self {
        Self {
            rpc_timeout: Duration::from_millis(args.rpc_timeout_ms),
            rpc_attempts: args.rpc_attempts,
            gather_timeout: Duration::from_millis(args.gather_timeout_ms),
            round_timeout: Duration::from_millis(args.round_timeout_ms),
            round_attempts: args.round_attempts,
        }
    }
}

/// `<id>=<addr:port>`, e.g. `1=127.0.0.1:6001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAddr {
    pub id: ProcessId,
    pub addr: SocketAddr,
}

impl FromStr for NodeAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, addr) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <id>=<addr:port>, got '{}'", s))?;
        let id: ProcessId = id
            .trim()
            .parse()
            .map_err(|e| format!("invalid id '{}': {}", id, e))?;
        let addr: SocketAddr = addr
            .trim()
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr, e))?;
        Ok(Self { id, addr })
    }
}

#[derive(Parser, Debug)]
#[command(name = "causal-kv", about = "Partition-tolerant causal key-value store")]
pub struct Cli {
    #[arg(long, env = "CAUSAL_KV_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a replica server.
    Replica(ReplicaArgs),
    /// Run a client session exposed over HTTP.
    Client(ClientArgs),
    /// Stabilize every component of a deployment, one round per component.
    Stabilize(StabilizeArgs),
}

#[derive(Args, Debug)]
pub struct ReplicaArgs {
    #[arg(long)]
    pub id: ProcessId,

    #[arg(long)]
    pub bind: SocketAddr,

    /// Initially linked peers, repeatable.
    #[arg(long = "peer")]
    pub peers: Vec<NodeAddr>,

    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    #[arg(long)]
    pub id: ProcessId,

    #[arg(long)]
    pub bind: SocketAddr,

    /// Replicas the session starts linked to, repeatable.
    #[arg(long = "replica")]
    pub replicas: Vec<NodeAddr>,

    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}

#[derive(Args, Debug)]
pub struct StabilizeArgs {
    /// Every replica of the deployment, repeatable.
    #[arg(long = "replica", required = true)]
    pub replicas: Vec<NodeAddr>,

    /// Only run a single round rooted at this replica.
    #[arg(long)]
    pub root: Option<ProcessId>,

    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}
