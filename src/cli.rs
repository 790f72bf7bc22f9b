// File: src/cli.rs
//
// Command-line arguments for the OPR stratum miner: a clap derive
// struct with a `validate` method returning `Result<(), String>`,
// covering session identity and first-connect credentials. No config
// file or credential vault — just the fields needed to construct a
// client and dial a pool.
//
// Tree Location:
// - src/cli.rs (command-line arguments)
// - Depends on: clap

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "opr-miner",
    author,
    version,
    about = "Stratum client and CPU worker pool for an OPR mining pool"
)]
pub struct Args {
    /// Pool address in host:port form.
    #[arg(short = 'o', long = "pool", value_name = "HOST:PORT")]
    pub pool: String,

    /// Username the pool credits shares to.
    #[arg(short = 'u', long = "username", value_name = "USERNAME")]
    pub username: String,

    /// This miner's name, distinguishing it from the user's other rigs.
    #[arg(long = "minername", default_value = "miner1", value_name = "NAME")]
    pub minername: String,

    /// Client version string reported during subscribe.
    #[arg(long = "version-string", default_value = "opr-miner/0.1.0")]
    pub version_string: String,

    /// Password for first-connect authorization.
    #[arg(short = 'p', long = "password", default_value = "")]
    pub password: String,

    /// Invite code for first-connect authorization.
    #[arg(long = "invite-code", default_value = "")]
    pub invite_code: String,

    /// Payout address for first-connect authorization.
    #[arg(long = "payout-address", default_value = "")]
    pub payout_address: String,

    /// Number of CPU hashing workers. 0 selects `num_cpus::get()`.
    #[arg(short = 't', long = "threads", default_value_t = 0)]
    pub threads: u32,

    /// Directory used to memoize the LXRHash lookup table.
    #[arg(long = "hash-table-dir", default_value = "./hash-table", value_name = "DIR")]
    pub hash_table_dir: PathBuf,
}

impl Args {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.trim().is_empty() {
            return Err("Username is required. Use --username NAME".to_string());
        }
        if !self.pool.contains(':') {
            return Err("Pool address must be in format HOST:PORT (e.g., pool.example.com:3333)".to_string());
        }
        let parts: Vec<&str> = self.pool.rsplitn(2, ':').collect();
        if parts.len() != 2 || parts[0].parse::<u16>().is_err() {
            return Err("Pool port must be a valid number (1-65535)".to_string());
        }
        Ok(())
    }

    pub fn worker_count(&self) -> u32 {
        if self.threads == 0 {
            num_cpus::get() as u32
        } else {
            self.threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            pool: "pool.example.com:3333".into(),
            username: "user".into(),
            minername: "miner1".into(),
            version_string: "opr-miner/0.1.0".into(),
            password: String::new(),
            invite_code: String::new(),
            payout_address: String::new(),
            threads: 0,
            hash_table_dir: PathBuf::from("./hash-table"),
        }
    }

    #[test]
    fn rejects_empty_username() {
        let mut args = base_args();
        args.username = String::new();
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_pool_address_without_port() {
        let mut args = base_args();
        args.pool = "pool.example.com".into();
        assert!(args.validate().is_err());
    }

    #[test]
    fn accepts_well_formed_args() {
        assert!(base_args().validate().is_ok());
    }

    #[test]
    fn zero_threads_resolves_to_num_cpus() {
        let args = base_args();
        assert_eq!(args.worker_count(), num_cpus::get() as u32);
    }
}
